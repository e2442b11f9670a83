//! Append-only instruction encoders.
//!
//! One `Encoder` serves as the whole hierarchy: a sink variant selects
//! whether words are counted only (for pre-computing forward offsets),
//! collected raw, or appended to a program together with side table entries
//! and callee records.
//!
//! The zero-length stack mirrors structural scope during lowering. Every
//! consuming emission clears the current scope; alternation and repetition
//! push, fold, and pop scopes. The resulting flag feeds `Program::matches_eps`
//! and the left-most flag of recorded callees, which drives left-recursion
//! detection in the linker.

use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grammar::{Callee, Grammar, ProgramRef, Rule};
use crate::instruction::{Instr, Opcode, AUX_OFF, AUX_STR, MAX_STR_LEN};
use crate::program::{Program, SemanticAction, SemanticCapture, SemanticPredicate};
use crate::utf8;

pub struct Encoder<'a> {
    sink: Sink<'a>,
    zero_length: Vec<bool>,
}

enum Sink<'a> {
    Length(usize),
    Raw(&'a mut Vec<Instr>),
    Program {
        program: &'a mut Program,
        callees: Option<&'a mut Vec<Callee>>,
    },
}

/// Run `f` against a program encoder and seal `matches_eps` afterwards.
pub(crate) fn program_session(
    program: &mut Program,
    callees: Option<&mut Vec<Callee>>,
    f: impl FnOnce(&mut Encoder) -> Result<()>,
) -> Result<()> {
    let mut encoder = Encoder {
        sink: Sink::Program { program, callees },
        zero_length: vec![true],
    };
    f(&mut encoder)?;
    let eps = encoder.matches_eps();
    if let Sink::Program { program, .. } = encoder.sink {
        program.matches_eps = eps;
    }
    Ok(())
}

impl<'a> Encoder<'a> {
    pub(crate) fn raw(instructions: &'a mut Vec<Instr>) -> Encoder<'a> {
        Encoder {
            sink: Sink::Raw(instructions),
            zero_length: vec![true],
        }
    }

    fn length() -> Encoder<'static> {
        Encoder {
            sink: Sink::Length(0),
            zero_length: vec![true],
        }
    }

    /// Words emitted so far.
    pub fn len(&self) -> usize {
        match &self.sink {
            Sink::Length(n) => *n,
            Sink::Raw(instructions) => instructions.len(),
            Sink::Program { program, .. } => program.code.len(),
        }
    }

    fn should_evaluate_length(&self) -> bool {
        !matches!(self.sink, Sink::Length(_))
    }

    /// Compiled length of an expression, without emitting it. Inside a
    /// length-only encoder this short-circuits to zero; the produced offsets
    /// are never read there.
    pub fn evaluate_length<E: Expression + ?Sized>(&self, expr: &E) -> Result<usize> {
        if !self.should_evaluate_length() {
            return Ok(0);
        }
        let mut encoder = Encoder::length();
        expr.encode(&mut encoder)?;
        Ok(encoder.len())
    }

    // Zero-length analysis.

    /// Mark the current scope as consuming input.
    pub fn zclr(&mut self, consumed: bool) {
        if consumed {
            if let Some(top) = self.zero_length.last_mut() {
                *top = false;
            }
        }
    }

    /// Open a scope, copying the entry `n` positions from the top.
    pub fn zpsh(&mut self, n: usize) {
        let value = self.zero_length[self.zero_length.len() - n];
        self.zero_length.push(value);
    }

    pub fn zpop(&mut self) {
        self.zero_length.pop();
    }

    /// Fold the top `n` scopes with AND into the scope below them.
    pub fn zand(&mut self, n: usize) {
        let len = self.zero_length.len();
        let folded = self.zero_length[len - n..].iter().all(|z| *z);
        self.zero_length.truncate(len - n);
        if let Some(top) = self.zero_length.last_mut() {
            *top = folded;
        }
    }

    pub fn matches_eps(&self) -> bool {
        self.zero_length.last().copied().unwrap_or(true)
    }

    // Appending.

    pub fn append(&mut self, instr: Instr) -> Result<()> {
        match &mut self.sink {
            Sink::Length(n) => *n = n.checked_add(1).ok_or(Error::ProgramLimit)?,
            Sink::Raw(instructions) => instructions.push(instr),
            Sink::Program { program, .. } => program.code.push(instr),
        }
        Ok(())
    }

    pub fn append_program(&mut self, p: &Program) -> Result<()> {
        match &mut self.sink {
            Sink::Length(n) => *n = n.checked_add(p.code.len()).ok_or(Error::ProgramLimit)?,
            Sink::Raw(_) => return Err(Error::BadGrammar),
            Sink::Program { program, .. } => program.concatenate(p)?,
        }
        Ok(())
    }

    fn add_item<T>(items: &mut Vec<T>, item: T) -> Result<u16> {
        if items.len() >= u16::MAX as usize {
            return Err(Error::ResourceLimit);
        }
        items.push(item);
        Ok((items.len() - 1) as u16)
    }

    fn add_predicate(&mut self, predicate: SemanticPredicate) -> Result<u16> {
        match &mut self.sink {
            Sink::Program { program, .. } => Self::add_item(&mut program.predicates, predicate),
            _ => Ok(0),
        }
    }

    fn add_action(&mut self, action: SemanticAction) -> Result<u16> {
        match &mut self.sink {
            Sink::Program { program, .. } => Self::add_item(&mut program.actions, action),
            _ => Ok(0),
        }
    }

    fn add_capture(&mut self, capture: SemanticCapture) -> Result<u16> {
        match &mut self.sink {
            Sink::Program { program, .. } => Self::add_item(&mut program.captures, capture),
            _ => Ok(0),
        }
    }

    fn add_callee(&mut self, rule: Option<&Rule>, target: ProgramRef, offset: usize) {
        let left_most = self.matches_eps();
        let eps = target.matches_eps();
        if let Some(top) = self.zero_length.last_mut() {
            *top = left_most && eps;
        }
        if let Sink::Program {
            callees: Some(callees),
            ..
        } = &mut self.sink
        {
            callees.push(Callee {
                rule: rule.cloned(),
                target,
                offset,
                left_most,
            });
        }
    }

    // Encoding.

    pub fn encode(&mut self, op: Opcode, alt: u8, imm: u16) -> Result<()> {
        self.append(Instr::prefix(op, alt, imm))
    }

    pub fn encode_off(&mut self, op: Opcode, alt: u8, off: isize, imm: u16) -> Result<()> {
        self.append(Instr::prefix(op, AUX_OFF | alt, imm))?;
        self.append(Instr::offset(off)?)
    }

    /// Emit an instruction with an inline string payload. `count` lands in
    /// the high immediate byte (rune count for literals, first-bound length
    /// for ranges).
    pub fn encode_str(&mut self, op: Opcode, alt: u8, count: usize, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if !(1..=MAX_STR_LEN).contains(&count) || bytes.len() > MAX_STR_LEN {
            return Err(Error::ResourceLimit);
        }
        let val = (((count - 1) << 8) | (bytes.len() - 1)) as u16;
        self.append(Instr::prefix(op, AUX_STR | alt, val))?;
        for chunk in bytes.chunks(4) {
            self.append(Instr::bytes(chunk))?;
        }
        Ok(())
    }

    pub fn encode_predicate(&mut self, predicate: SemanticPredicate) -> Result<()> {
        let index = self.add_predicate(predicate)?;
        self.encode(Opcode::Predicate, 0, index)
    }

    pub fn encode_action(&mut self, action: SemanticAction) -> Result<()> {
        let index = self.add_action(action)?;
        self.encode(Opcode::Action, 0, index)
    }

    pub fn encode_capture_end(&mut self, capture: SemanticCapture) -> Result<()> {
        let index = self.add_capture(capture)?;
        self.encode(Opcode::EndCapture, 0, index)
    }

    /// Emit a literal match. Literals longer than the inline payload limit
    /// are split into several instructions at rune boundaries.
    pub fn match_bytes(&mut self, text: &str) -> Result<()> {
        let mut bytes = text.as_bytes();
        while bytes.len() > MAX_STR_LEN {
            let chunk = &bytes[..MAX_STR_LEN];
            let mut end = chunk.len();
            while end > 0 && !utf8::is_lead(chunk[end - 1]) {
                end -= 1;
            }
            end = end.saturating_sub(1);
            if end == 0 {
                return Err(Error::BadStringExpression(text.to_string()));
            }
            let chunk = &chunk[..end];
            self.encode_str(Opcode::Match, 0, utf8::count_runes(chunk), chunk)?;
            bytes = &bytes[end..];
        }
        if !bytes.is_empty() {
            self.encode_str(Opcode::Match, 0, utf8::count_runes(bytes), bytes)?;
        }
        self.zclr(!text.is_empty());
        Ok(())
    }

    /// Emit a rune range match, with the inline payload holding both bounds.
    pub fn match_range(&mut self, first: &str, last: &str) -> Result<()> {
        if first == last {
            return self.match_bytes(first);
        }
        let mut bytes = Vec::with_capacity(first.len() + last.len());
        bytes.extend_from_slice(first.as_bytes());
        bytes.extend_from_slice(last.as_bytes());
        self.encode_str(Opcode::MatchRange, 0, first.len(), &bytes)?;
        self.zclr(true);
        Ok(())
    }

    /// Emit a rule call, inlining the body when the rule is small, closed,
    /// and referenced without precedence.
    pub fn call_rule(&mut self, rule: &Rule, prec: u16, allow_inlining: bool) -> Result<()> {
        let inline = allow_inlining && prec == 0 && rule.with_data(|data| {
            !data.encoding
                && data.callees.is_empty()
                && !data.program.code.is_empty()
                && data.program.code.len() <= 8
                && data.program.predicates.len() <= 1
                && data.program.actions.len() <= 1
                && data.program.captures.len() <= 1
        });
        if inline {
            let (eps, result) = rule.with_data(|data| {
                (data.program.matches_eps, self.append_program(&data.program))
            });
            self.zclr(!eps);
            result
        } else {
            self.add_callee(Some(rule), ProgramRef::Rule(rule.clone()), self.len());
            self.encode_off(Opcode::Call, 0, 0, prec)
        }
    }

    /// Emit a call into another linked grammar, targeting its start rule
    /// body past the three bootstrap words.
    pub fn call_grammar(&mut self, grammar: &Grammar, prec: u16) -> Result<()> {
        self.add_callee(None, ProgramRef::Program(grammar.program_rc()), self.len());
        self.encode_off(Opcode::Call, 0, 3, prec)
    }
}
