//! A compiled program: instruction words plus the side tables of semantic
//! callbacks they index.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::instruction::{self, Instr, Opcode};
use crate::machine::Parser;
use crate::semantics::{Semantics, SyntaxView};

pub type SemanticPredicate = Rc<dyn Fn(&mut Parser) -> bool>;
pub type SemanticAction = Rc<dyn Fn(&mut Semantics)>;
pub type SemanticCapture = Rc<dyn Fn(&mut Semantics, SyntaxView)>;

#[derive(Clone)]
pub struct Program {
    pub(crate) code: Vec<Instr>,
    pub(crate) predicates: Vec<SemanticPredicate>,
    pub(crate) actions: Vec<SemanticAction>,
    pub(crate) captures: Vec<SemanticCapture>,
    pub(crate) matches_eps: bool,
}

impl Default for Program {
    fn default() -> Program {
        Program::new()
    }
}

impl Program {
    pub fn new() -> Program {
        Program {
            code: Vec::new(),
            predicates: Vec::new(),
            actions: Vec::new(),
            captures: Vec::new(),
            matches_eps: true,
        }
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    pub fn matches_eps(&self) -> bool {
        self.matches_eps
    }

    /// Append another program, rebasing its side table indices into ours.
    pub(crate) fn concatenate(&mut self, src: &Program) -> Result<()> {
        self.code
            .len()
            .checked_add(src.code.len())
            .ok_or(Error::ProgramLimit)?;
        let mut i = 0;
        while i < src.code.len() {
            let mut prefix = src.code[i];
            let len = instruction::words(prefix);
            let rebase = match prefix.op_raw() {
                op if op == Opcode::Predicate as u8 => self.predicates.len(),
                op if op == Opcode::Action as u8 => self.actions.len(),
                op if op == Opcode::EndCapture as u8 => self.captures.len(),
                _ => 0,
            };
            if rebase != 0 {
                let val = prefix.val() as usize + rebase;
                if val > u16::MAX as usize {
                    return Err(Error::ResourceLimit);
                }
                prefix.set_val(val as u16);
            }
            self.code.push(prefix);
            self.code
                .extend_from_slice(src.code.get(i + 1..i + len).ok_or(Error::BadOpcode)?);
            i += len;
        }
        self.predicates.extend(src.predicates.iter().cloned());
        self.actions.extend(src.actions.iter().cloned());
        self.captures.extend(src.captures.iter().cloned());
        self.matches_eps = self.matches_eps && src.matches_eps;
        Ok(())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pc = 0;
        while pc < self.code.len() {
            let at = pc;
            match instruction::decode(&self.code, &mut pc) {
                Ok(d) => {
                    write!(f, "{at}: {:?}", d.op)?;
                    if d.alt != 0 {
                        write!(f, "/{}", d.alt)?;
                    }
                    if d.imm != 0 {
                        write!(f, " imm={}", d.imm)?;
                    }
                    if d.off != 0 {
                        write!(f, " off={}", d.off)?;
                    }
                    if !d.str_.is_empty() {
                        write!(f, " str={:?}", d.str_)?;
                    }
                    writeln!(f)?;
                }
                Err(_) => {
                    writeln!(f, "{at}: <corrupt>")?;
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::instruction::alt;

    #[test]
    fn concatenate_rebases_side_tables() {
        let mut dst = Program::new();
        dst.actions.push(Rc::new(|_: &mut Semantics| {}));
        dst.code.push(Instr::prefix(Opcode::Action, 0, 0));

        let mut src = Program::new();
        src.actions.push(Rc::new(|_: &mut Semantics| {}));
        src.code.push(Instr::prefix(Opcode::Action, 0, 0));
        src.code.push(Instr::prefix(Opcode::Accept, alt::ACCEPT_FINAL, 0));
        src.matches_eps = false;

        dst.concatenate(&src).unwrap();
        assert_eq!(dst.actions.len(), 2);
        assert_eq!(dst.code.len(), 3);
        // the appended action now indexes the combined table
        assert_eq!(dst.code[1].val(), 1);
        assert!(!dst.matches_eps);
    }

    #[test]
    fn concatenate_keeps_payload_words() {
        let mut dst = Program::new();
        let mut src = Program::new();
        let val = ((2 - 1) << 8 | (2 - 1)) as u16;
        src.code.push(Instr::prefix(Opcode::Match, crate::instruction::AUX_STR, val));
        src.code.push(Instr::bytes(b"ab"));

        dst.concatenate(&src).unwrap();
        assert_eq!(dst.code.len(), 2);
        let mut pc = 0;
        let d = instruction::decode(&dst.code, &mut pc).unwrap();
        assert!(d.str_.eq_bytes(b"ab"));
    }
}
