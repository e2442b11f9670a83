//! Rules and the grammar linker.
//!
//! A rule owns its compiled program plus a record of every outbound call.
//! `start` walks the rules reachable from a start rule, concatenates their
//! programs into one flat grammar program, detects left-recursive call
//! sites, and patches every call with its precedence and relative offset.
//! Nothing references the rule graph after linking.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::encoder::{self, Encoder};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::instruction::{alt, Instr, Opcode};
use crate::program::Program;

/// A grammar rule. `Rule` is a shared handle: clones refer to the same rule,
/// which is what lets rules reference each other (and themselves) before
/// they are defined.
#[derive(Clone, Default)]
pub struct Rule {
    inner: Rc<RefCell<RuleData>>,
}

#[derive(Default)]
pub(crate) struct RuleData {
    pub(crate) program: Program,
    pub(crate) callees: Vec<Callee>,
    pub(crate) encoding: bool,
}

/// One outbound call recorded while encoding a rule body.
pub(crate) struct Callee {
    pub(crate) rule: Option<Rule>,
    pub(crate) target: ProgramRef,
    pub(crate) offset: usize,
    pub(crate) left_most: bool,
}

/// A callable program, keyed by identity for the linker's address map.
#[derive(Clone)]
pub(crate) enum ProgramRef {
    Rule(Rule),
    Program(Rc<Program>),
}

impl ProgramRef {
    pub(crate) fn key(&self) -> usize {
        match self {
            ProgramRef::Rule(rule) => Rc::as_ptr(&rule.inner) as *const () as usize,
            ProgramRef::Program(program) => Rc::as_ptr(program) as *const () as usize,
        }
    }

    pub(crate) fn matches_eps(&self) -> bool {
        match self {
            ProgramRef::Rule(rule) => rule.with_data(|data| data.program.matches_eps),
            ProgramRef::Program(program) => program.matches_eps,
        }
    }

    fn concatenate_into(&self, dst: &mut Program) -> Result<()> {
        match self {
            ProgramRef::Rule(rule) => rule.with_data(|data| dst.concatenate(&data.program)),
            ProgramRef::Program(program) => dst.concatenate(program),
        }
    }
}

impl Rule {
    pub fn new() -> Rule {
        Rule::default()
    }

    /// Build a rule from an expression in one step.
    pub fn of<E: Expression>(expr: E) -> Result<Rule> {
        let rule = Rule::new();
        rule.define(expr)?;
        Ok(rule)
    }

    /// Encode `expr` as this rule's body, replacing any previous definition.
    pub fn define<E: Expression>(&self, expr: E) -> Result<()> {
        {
            let mut data = self.inner.borrow_mut();
            data.program = Program::new();
            data.callees.clear();
            data.encoding = true;
        }
        let mut program = Program::new();
        let mut callees = Vec::new();
        let result =
            encoder::program_session(&mut program, Some(&mut callees), |enc| expr.encode(enc));
        let mut data = self.inner.borrow_mut();
        data.encoding = false;
        result?;
        data.program = program;
        data.callees = callees;
        Ok(())
    }

    /// A call expression with explicit left-recursion precedence.
    pub fn prec(&self, precedence: u16) -> RuleRef {
        RuleRef {
            rule: self.clone(),
            precedence,
        }
    }

    pub(crate) fn with_data<R>(&self, f: impl FnOnce(&RuleData) -> R) -> R {
        f(&self.inner.borrow())
    }

    fn ptr_eq(&self, other: &Rule) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Expression for Rule {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.call_rule(self, 0, true)
    }
}

/// A rule reference carrying a call precedence, as built by [`Rule::prec`].
pub struct RuleRef {
    rule: Rule,
    precedence: u16,
}

impl Expression for RuleRef {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.call_rule(&self.rule, self.precedence, true)
    }
}

/// A linked grammar. Owns a single flat program and shares nothing with the
/// rules it was linked from.
#[derive(Clone)]
pub struct Grammar {
    program: Rc<Program>,
}

impl Default for Grammar {
    fn default() -> Grammar {
        Grammar {
            program: Rc::new(Program::new()),
        }
    }
}

impl Grammar {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub(crate) fn program_rc(&self) -> Rc<Program> {
        Rc::clone(&self.program)
    }
}

impl Expression for Grammar {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.call_grammar(self, 0)
    }
}

/// Link all rules reachable from `start_rule` into a grammar.
pub fn start(start_rule: &Rule) -> Result<Grammar> {
    let mut grammar = Program::new();
    let mut addresses: FxHashMap<usize, usize> = FxHashMap::default();
    let mut calls: Vec<(ProgramRef, usize)> = Vec::new();
    let mut left_recursive: FxHashSet<usize> = FxHashSet::default();
    type CallStack = Vec<(Option<Rule>, bool)>;
    let mut unprocessed: Vec<(CallStack, ProgramRef)> = Vec::new();

    encoder::program_session(&mut grammar, None, |enc| {
        enc.call_rule(start_rule, 0, false)?;
        enc.encode(Opcode::Accept, alt::ACCEPT_FINAL, 0)
    })?;
    calls.push((ProgramRef::Rule(start_rule.clone()), 0));
    unprocessed.push((
        vec![(Some(start_rule.clone()), false)],
        ProgramRef::Rule(start_rule.clone()),
    ));

    while let Some((callstack, subprogram)) = unprocessed.pop() {
        let address = grammar.code.len();
        if addresses.contains_key(&subprogram.key()) {
            continue;
        }
        addresses.insert(subprogram.key(), address);
        subprogram.concatenate_into(&mut grammar)?;
        grammar.code.push(Instr::prefix(Opcode::Ret, 0, 0));

        let Some((Some(top_rule), _)) = callstack.last().cloned() else {
            continue;
        };
        top_rule.with_data(|data| {
            for callee in &data.callees {
                calls.push((callee.target.clone(), address + callee.offset));
                let mut enqueue = true;
                if callee.left_most {
                    if let Some(callee_rule) = &callee.rule {
                        for (caller_rule, caller_left_most) in callstack.iter().rev() {
                            let same = caller_rule
                                .as_ref()
                                .is_some_and(|caller| caller.ptr_eq(callee_rule));
                            if same {
                                left_recursive.insert(callee.target.key());
                                enqueue = false;
                                break;
                            }
                            if !caller_left_most {
                                break;
                            }
                        }
                    }
                }
                if enqueue {
                    let mut next = callstack.clone();
                    next.push((callee.rule.clone(), callee.left_most));
                    unprocessed.push((next, callee.target.clone()));
                }
            }
        });
    }

    for (target, call_site) in calls {
        let is_left_recursive = left_recursive.contains(&target.key());
        if let Some(prefix) = grammar.code.get_mut(call_site) {
            if prefix.op_raw() == Opcode::Call as u8 {
                let prec = prefix.val();
                prefix.set_val(if is_left_recursive { prec.max(1) } else { 0 });
            }
        }
        let address = *addresses.get(&target.key()).ok_or(Error::BadGrammar)?;
        let bias = grammar
            .code
            .get(call_site + 1)
            .ok_or(Error::BadGrammar)?
            .as_offset() as isize;
        let relative = bias + address as isize - (call_site as isize + 2);
        let relative = i32::try_from(relative).map_err(|_| Error::ProgramLimit)?;
        grammar.code[call_site + 1] = Instr::from_i32(relative);
    }

    log::debug!("linked grammar, {} words", grammar.code.len());
    log::trace!("{:?}", grammar);

    Ok(Grammar {
        program: Rc::new(grammar),
    })
}
