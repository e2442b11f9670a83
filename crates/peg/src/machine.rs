//! The parsing machine.
//!
//! A single dispatch loop decodes the linked grammar program and drives the
//! subject through it. Ordered choice pushes backtrack frames, rule calls
//! push return frames, captures push their start subject, and left-recursive
//! calls push a memo frame that implements the seed-and-grow algorithm:
//! plant a failing seed, re-enter the rule body while the answer keeps
//! growing, and commit the best answer when it stops.
//!
//! Input arrives through an append-only buffer fed by enqueued text and
//! stacked source callbacks, so parses can run ahead of their input. A cut
//! (non-final accept) replays pending semantics and truncates the consumed
//! window from the buffer.

mod stack;

use std::cell::Cell;
use std::cmp::Ordering;
use std::io::{self, BufRead};
use std::rc::Rc;

use sprig_ucd as ucd;

use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::instruction::{self, alt, Opcode};
use crate::program::Program;
use crate::semantics::{Semantics, SyntaxPosition, SyntaxRange};
use crate::utf8;

use self::stack::{BacktrackFrame, FrameKind, LrMemo, Subject, LR_FAIL};

/// The machine registers: input byte index, column, line, response count,
/// program counter, and fail counter.
#[derive(Debug, Clone, Copy)]
pub struct Registers {
    pub ir: usize,
    pub cr: usize,
    pub lr: usize,
    pub rc: usize,
    pub pc: usize,
    pub fc: usize,
}

type SourceFn<'a> = Box<dyn FnMut(&mut String) -> bool + 'a>;

pub struct Parser<'a> {
    grammar: &'a Grammar,
    semantics: &'a mut Semantics,
    input: String,
    registers: Registers,
    max_input: Subject,
    parsing: Rc<Cell<bool>>,
    reading: Rc<Cell<bool>>,
    cut_deferred: bool,
    cut_frame: usize,
    sources: Vec<SourceFn<'a>>,
    frames: Vec<FrameKind>,
    backtrack_stack: Vec<BacktrackFrame>,
    call_stack: Vec<usize>,
    capture_stack: Vec<Subject>,
    lrmemo_stack: Vec<LrMemo>,
}

/// Clears a reentrancy flag on every exit path, panics included.
struct Sentinel {
    flag: Rc<Cell<bool>>,
}

impl Sentinel {
    fn set(flag: &Rc<Cell<bool>>, error: Error) -> Result<Sentinel> {
        if flag.get() {
            return Err(error);
        }
        flag.set(true);
        Ok(Sentinel {
            flag: Rc::clone(flag),
        })
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl<'a> Parser<'a> {
    pub fn new(grammar: &'a Grammar, semantics: &'a mut Semantics) -> Parser<'a> {
        Parser {
            grammar,
            semantics,
            input: String::new(),
            registers: Registers {
                ir: 0,
                cr: 1,
                lr: 1,
                rc: 0,
                pc: 0,
                fc: 0,
            },
            max_input: Subject::start(),
            parsing: Rc::new(Cell::new(false)),
            reading: Rc::new(Cell::new(false)),
            cut_deferred: false,
            cut_frame: 0,
            sources: Vec::new(),
            frames: Vec::new(),
            backtrack_stack: Vec::new(),
            call_stack: Vec::new(),
            capture_stack: Vec::new(),
            lrmemo_stack: Vec::new(),
        }
    }

    /// Append text to the input buffer.
    pub fn enqueue(&mut self, text: &str) -> &mut Parser<'a> {
        self.input.push_str(text);
        self
    }

    /// Push an input source callback. Sources are popped when they signal
    /// exhaustion; the most recently pushed source is read first.
    pub fn push_source(
        &mut self,
        source: impl FnMut(&mut String) -> bool + 'a,
    ) -> Result<&mut Parser<'a>> {
        if self.reading.get() {
            return Err(Error::ReentrantRead);
        }
        self.sources.push(Box::new(source));
        Ok(self)
    }

    /// Unconsumed input currently buffered.
    pub fn input_view(&self) -> &str {
        &self.input[self.registers.ir..]
    }

    /// Byte index of the subject within the current input window.
    pub fn subject_index(&self) -> usize {
        self.registers.ir
    }

    pub fn input_position(&self) -> SyntaxPosition {
        SyntaxPosition {
            column: self.registers.cr,
            line: self.registers.lr,
        }
    }

    /// Highest position reached by any alternative, for diagnostics.
    pub fn max_input_position(&self) -> SyntaxPosition {
        SyntaxPosition {
            column: self.max_input.cr,
            line: self.max_input.lr,
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn semantics(&mut self) -> &mut Semantics {
        self.semantics
    }

    fn subject(&self) -> Subject {
        Subject {
            ir: self.registers.ir,
            cr: self.registers.cr,
            lr: self.registers.lr,
        }
    }

    fn set_subject(&mut self, subject: Subject) {
        self.registers.ir = subject.ir;
        self.registers.cr = subject.cr;
        self.registers.lr = subject.lr;
    }

    fn call_depth(&self) -> u16 {
        (self.call_stack.len() + self.lrmemo_stack.len()) as u16
    }

    fn bump_max_input(&mut self) {
        if self.registers.ir > self.max_input.ir {
            self.max_input = self.subject();
        }
    }

    /// True once `n` bytes are buffered at `ir`, reading more input on
    /// demand until the sources are exhausted.
    fn available(&mut self, n: usize, ir: usize) -> Result<bool> {
        loop {
            if self.input.len() >= ir + n {
                return Ok(true);
            }
            if !self.read_more()? {
                return Ok(false);
            }
        }
    }

    fn read_more(&mut self) -> Result<bool> {
        let _guard = Sentinel::set(&self.reading, Error::ReentrantRead)?;
        let mut text = String::new();
        while text.is_empty() {
            let Some(source) = self.sources.last_mut() else {
                break;
            };
            let more = source(&mut text);
            self.input.push_str(&text);
            if !more {
                self.sources.pop();
            }
        }
        Ok(!text.is_empty())
    }

    fn clamp_cut_frame(&mut self) {
        self.cut_frame = self.cut_frame.min(self.frames.len());
    }

    fn pop_backtrack(&mut self) {
        self.backtrack_stack.pop();
        self.frames.pop();
        self.clamp_cut_frame();
    }

    fn pop_call(&mut self) {
        self.call_stack.pop();
        self.frames.pop();
        self.clamp_cut_frame();
    }

    fn pop_capture(&mut self, program: &Program) {
        self.capture_stack.pop();
        self.frames.pop();
        self.clamp_cut_frame();
        self.run_deferred_cut(program);
    }

    fn pop_lrcall(&mut self, program: &Program) {
        self.lrmemo_stack.pop();
        self.frames.pop();
        self.clamp_cut_frame();
        self.run_deferred_cut(program);
    }

    /// A cut taken while captures or left-recursion memos were live fires
    /// as soon as the last such frame pops.
    fn run_deferred_cut(&mut self, program: &Program) {
        if self.cut_deferred && self.capture_stack.is_empty() && self.lrmemo_stack.is_empty() {
            self.accept_window(program);
        }
    }

    /// Commit the consumed window: replay semantics, truncate the buffer,
    /// and fence off the frame stack below the cut.
    fn accept_window(&mut self, program: &Program) {
        self.registers.fc = 0;
        self.semantics.accept(program, &self.input);
        self.input.drain(..self.registers.ir);
        self.registers.ir = 0;
        self.registers.rc = 0;
        self.max_input.ir = 0;
        self.cut_deferred = false;
        self.cut_frame = self.frames.len();
    }

    /// Unwind `fc + 1` failure units. Returns true when the parse has failed
    /// terminally.
    fn handle_failure(&mut self, program: &Program) -> bool {
        self.bump_max_input();
        let mut done = false;
        let mut fc = self.registers.fc + 1;
        while fc > 0 {
            if self.cut_frame >= self.frames.len() {
                done = true;
                break;
            }
            let Some(kind) = self.frames.last().copied() else {
                done = true;
                break;
            };
            match kind {
                FrameKind::Backtrack => {
                    if let Some(frame) = self.backtrack_stack.last().copied() {
                        self.set_subject(frame.subject);
                        self.registers.rc = frame.rc;
                        self.registers.pc = frame.pc;
                    }
                    self.pop_backtrack();
                }
                FrameKind::Call => {
                    self.pop_call();
                    fc += 1;
                }
                FrameKind::Capture => {
                    self.pop_capture(program);
                    fc += 1;
                }
                FrameKind::LrCall => {
                    let answered = match self.lrmemo_stack.last_mut() {
                        Some(memo) if memo.answer.ir != LR_FAIL => {
                            let answer = memo.answer;
                            let ret_pc = memo.ret_pc;
                            let rc = memo.rc;
                            let responses = std::mem::take(&mut memo.responses);
                            Some((answer, ret_pc, rc, responses))
                        }
                        _ => None,
                    };
                    match answered {
                        Some((answer, ret_pc, rc, responses)) => {
                            self.set_subject(answer);
                            self.registers.pc = ret_pc;
                            self.registers.rc =
                                self.semantics.restore_responses_after(rc, &responses);
                        }
                        None => fc += 1,
                    }
                    self.pop_lrcall(program);
                }
            }
            fc -= 1;
        }
        self.semantics.pop_responses_after(self.registers.rc);
        if done {
            log::trace!(
                "parse failed; furthest input at byte {} ({}:{})",
                self.max_input.ir,
                self.max_input.lr,
                self.max_input.cr
            );
        }
        done
    }

    /// Run the grammar against the buffered input. Returns whether the parse
    /// accepted. A rejected parse is not an error; errors are corrupt
    /// programs and reentrant calls.
    pub fn parse(&mut self) -> Result<bool> {
        let _guard = Sentinel::set(&self.parsing, Error::ReentrantParse)?;
        let grammar = self.grammar;
        let program = grammar.program();
        if program.code.is_empty() {
            return Err(Error::BadGrammar);
        }

        self.registers.rc = 0;
        self.registers.pc = 0;
        self.registers.fc = 0;
        self.cut_deferred = false;
        self.cut_frame = 0;
        self.semantics.clear();

        let mut result = false;
        let mut done = false;
        while !done {
            let mut pc = self.registers.pc;
            let d = instruction::decode(&program.code, &mut pc)?;
            self.registers.pc = pc;
            self.registers.fc = 0;
            let mut failed = false;

            match d.op {
                Opcode::Match => {
                    if !d.str_.is_empty() {
                        let n = d.str_.len();
                        if self.available(n, self.registers.ir)? {
                            let ir = self.registers.ir;
                            if d.str_.eq_bytes(&self.input.as_bytes()[ir..ir + n]) {
                                self.registers.ir += n;
                                self.registers.cr += d.imm;
                            } else {
                                failed = true;
                            }
                        } else {
                            failed = true;
                        }
                    }
                }
                Opcode::MatchAny => {
                    if self.available(1, self.registers.ir)? {
                        let ir = self.registers.ir;
                        self.registers.ir += utf8::size_of_first_rune(&self.input.as_bytes()[ir..]);
                        self.registers.cr += 1;
                    } else {
                        failed = true;
                    }
                }
                Opcode::MatchClass => {
                    if self.available(1, self.registers.ir)? {
                        let ir = self.registers.ir;
                        let (rune, size) = utf8::decode(&self.input.as_bytes()[ir..]);
                        let matched = match rune {
                            Some(rune) => {
                                let props = ucd::char_props(rune);
                                match d.alt {
                                    alt::MATCH_CLASS_PTYPE => props.any_of_ptype(
                                        ucd::Ptype::from_bits_truncate(d.str_.decode_u64()?),
                                    ),
                                    alt::MATCH_CLASS_GCTYPE => props.any_of_gc(
                                        ucd::Gctype::from_bits_truncate(d.str_.decode_u32()?),
                                    ),
                                    alt::MATCH_CLASS_SCTYPE => ucd::Script::from_raw(d.imm as u16)
                                        .is_some_and(|script| props.script() == script),
                                    _ => props.is(ucd::Ctype::from_bits_truncate(d.imm as u16)),
                                }
                            }
                            None => false,
                        };
                        if matched {
                            self.registers.ir += size.max(1);
                            self.registers.cr += 1;
                        } else {
                            failed = true;
                        }
                    } else {
                        failed = true;
                    }
                }
                Opcode::MatchRange => {
                    let (first, last) = d.str_.split_at(d.imm).ok_or(Error::BadOpcode)?;
                    let need = first.len().min(last.len());
                    if self.available(need, self.registers.ir)? {
                        let ir = self.registers.ir;
                        let bytes = self.input.as_bytes();
                        let size = utf8::size_of_first_rune(&bytes[ir..]);
                        let probe = &bytes[ir..(ir + size).min(bytes.len())];
                        if first.cmp_bytes(probe) == Ordering::Greater
                            || last.cmp_bytes(probe) == Ordering::Less
                        {
                            failed = true;
                        } else {
                            self.registers.ir += size;
                            self.registers.cr += 1;
                        }
                    } else {
                        failed = true;
                    }
                }
                Opcode::Choice => {
                    let target = self
                        .registers
                        .pc
                        .checked_add_signed(d.off)
                        .ok_or(Error::BadOpcode)?;
                    let subject = Subject {
                        ir: self.registers.ir.saturating_sub(d.imm & 0xff),
                        cr: self.registers.cr.saturating_sub(d.imm >> 8),
                        lr: self.registers.lr,
                    };
                    self.frames.push(FrameKind::Backtrack);
                    self.backtrack_stack.push(BacktrackFrame {
                        subject,
                        rc: self.registers.rc,
                        pc: target,
                    });
                }
                Opcode::Commit => {
                    if self.frames.last() != Some(&FrameKind::Backtrack) {
                        failed = true;
                    } else {
                        match d.alt {
                            alt::COMMIT_PARTIAL => {
                                let subject = self.subject();
                                let rc = self.registers.rc;
                                if let Some(frame) = self.backtrack_stack.last_mut() {
                                    frame.subject = subject;
                                    frame.rc = rc;
                                }
                            }
                            alt::COMMIT_BACK => {
                                if let Some(frame) = self.backtrack_stack.last().copied() {
                                    self.set_subject(frame.subject);
                                }
                                self.pop_backtrack();
                            }
                            _ => self.pop_backtrack(),
                        }
                        self.registers.pc = self
                            .registers
                            .pc
                            .checked_add_signed(d.off)
                            .ok_or(Error::BadOpcode)?;
                    }
                }
                Opcode::Jump => {
                    self.registers.pc = self
                        .registers
                        .pc
                        .checked_add_signed(d.off)
                        .ok_or(Error::BadOpcode)?;
                }
                Opcode::Call => {
                    let body = self
                        .registers
                        .pc
                        .checked_add_signed(d.off)
                        .ok_or(Error::BadOpcode)?;
                    if d.imm != 0 {
                        let mut hit = false;
                        for index in (0..self.lrmemo_stack.len()).rev() {
                            let memo = &self.lrmemo_stack[index];
                            if memo.seed.ir < self.registers.ir {
                                break;
                            }
                            if memo.seed.ir == self.registers.ir && memo.body_pc == body {
                                if memo.answer.ir == LR_FAIL || d.imm < memo.prec {
                                    failed = true;
                                } else {
                                    let answer = memo.answer;
                                    let rc = self.registers.rc;
                                    self.registers.rc = self
                                        .semantics
                                        .restore_responses_after(rc, &memo.responses);
                                    self.set_subject(answer);
                                }
                                hit = true;
                                break;
                            }
                        }
                        if !hit {
                            self.frames.push(FrameKind::LrCall);
                            self.lrmemo_stack.push(LrMemo {
                                seed: self.subject(),
                                answer: Subject {
                                    ir: LR_FAIL,
                                    cr: 0,
                                    lr: 0,
                                },
                                rc: self.registers.rc,
                                ret_pc: self.registers.pc,
                                body_pc: body,
                                responses: Vec::new(),
                                prec: d.imm,
                            });
                            self.registers.pc = body;
                        }
                    } else {
                        self.frames.push(FrameKind::Call);
                        self.call_stack.push(self.registers.pc);
                        self.registers.pc = body;
                    }
                }
                Opcode::Ret => match self.frames.last().copied() {
                    Some(FrameKind::Call) => {
                        if let Some(pc) = self.call_stack.last().copied() {
                            self.registers.pc = pc;
                        }
                        self.pop_call();
                    }
                    Some(FrameKind::LrCall) => {
                        let Some(memo) = self.lrmemo_stack.last() else {
                            return Err(Error::BadOpcode);
                        };
                        if memo.answer.ir == LR_FAIL || self.registers.ir > memo.answer.ir {
                            // the answer grew: snapshot it and re-enter the body
                            let subject = self.subject();
                            let rc = memo.rc;
                            let dropped = self.semantics.drop_responses_after(rc);
                            let Some(memo) = self.lrmemo_stack.last_mut() else {
                                return Err(Error::BadOpcode);
                            };
                            memo.answer = subject;
                            memo.responses = dropped;
                            let seed = memo.seed;
                            let body = memo.body_pc;
                            self.set_subject(seed);
                            self.registers.rc = rc;
                            self.registers.pc = body;
                        } else {
                            // no further growth: commit the best answer
                            let Some(memo) = self.lrmemo_stack.last_mut() else {
                                return Err(Error::BadOpcode);
                            };
                            let answer = memo.answer;
                            let ret_pc = memo.ret_pc;
                            let rc = memo.rc;
                            let responses = std::mem::take(&mut memo.responses);
                            self.set_subject(answer);
                            self.registers.pc = ret_pc;
                            self.registers.rc =
                                self.semantics.restore_responses_after(rc, &responses);
                            self.pop_lrcall(program);
                        }
                    }
                    _ => failed = true,
                },
                Opcode::Fail => {
                    self.registers.fc = d.imm;
                    failed = true;
                }
                Opcode::Accept => {
                    self.cut_deferred =
                        !self.capture_stack.is_empty() || !self.lrmemo_stack.is_empty();
                    if !self.cut_deferred {
                        self.accept_window(program);
                        if d.alt == alt::ACCEPT_FINAL {
                            result = true;
                            done = true;
                        }
                    }
                }
                Opcode::Newline => {
                    self.registers.cr = 1;
                    self.registers.lr += 1;
                }
                Opcode::Predicate => {
                    self.bump_max_input();
                    let Some(predicate) = program.predicates.get(d.imm).cloned() else {
                        return Err(Error::BadOpcode);
                    };
                    let accepted = predicate(self);
                    self.semantics.pop_responses_after(self.registers.rc);
                    if !accepted {
                        failed = true;
                    }
                }
                Opcode::Action => {
                    let depth = self.call_depth();
                    self.registers.rc = self.semantics.push_response(depth, d.imm as u16);
                }
                Opcode::BeginCapture => {
                    self.frames.push(FrameKind::Capture);
                    self.capture_stack.push(self.subject());
                }
                Opcode::EndCapture => {
                    if self.frames.last() != Some(&FrameKind::Capture) {
                        failed = true;
                    } else {
                        let Some(start) = self.capture_stack.last().copied() else {
                            return Err(Error::BadOpcode);
                        };
                        let end = self.subject();
                        self.pop_capture(program);
                        if start.ir > end.ir {
                            failed = true;
                        } else {
                            let depth = self.call_depth();
                            let range = SyntaxRange {
                                index: start.ir,
                                size: end.ir - start.ir,
                                start: SyntaxPosition {
                                    column: start.cr,
                                    line: start.lr,
                                },
                                end: SyntaxPosition {
                                    column: end.cr,
                                    line: end.lr,
                                },
                            };
                            self.registers.rc =
                                self.semantics
                                    .push_capture_response(depth, d.imm as u16, range);
                        }
                    }
                }
            }

            if failed {
                done = self.handle_failure(program);
            }
        }
        Ok(result)
    }
}

/// Parse `input` against `grammar`, discarding semantics.
pub fn parse(input: &str, grammar: &Grammar) -> Result<bool> {
    let mut semantics = Semantics::new();
    parse_with(input, grammar, &mut semantics)
}

/// Parse `input` against `grammar`, replaying accepted actions into
/// `semantics`.
pub fn parse_with(input: &str, grammar: &Grammar, semantics: &mut Semantics) -> Result<bool> {
    let mut parser = Parser::new(grammar, semantics);
    parser.enqueue(input);
    parser.parse()
}

/// Parse a reader line by line, appending a terminating newline per line.
pub fn parse_lines<R: BufRead>(
    reader: R,
    grammar: &Grammar,
    semantics: &mut Semantics,
) -> Result<bool> {
    let mut reader = reader;
    let mut parser = Parser::new(grammar, semantics);
    parser.push_source(move |out: &mut String| {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => {
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                out.push_str(&line);
                true
            }
        }
    })?;
    parser.parse()
}

/// Parse standard input line by line.
pub fn parse_stdin(grammar: &Grammar, semantics: &mut Semantics) -> Result<bool> {
    parse_lines(io::stdin().lock(), grammar, semantics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::*;
    use crate::grammar::{start, Rule};
    use crate::semantics::SyntaxView;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Action<Eps>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        let make = move |tag: &'static str| {
            let log = Rc::clone(&log2);
            action(eps(), move |_: &mut Semantics| log.borrow_mut().push(tag))
        };
        (log, make)
    }

    #[test]
    fn literal_and_eoi() {
        let rule = Rule::of(seq(lit("ab"), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("ab", &grammar).unwrap());
        assert!(!parse("a", &grammar).unwrap());
        assert!(!parse("abc", &grammar).unwrap());
        assert!(!parse("", &grammar).unwrap());
    }

    #[test]
    fn one_or_more_literal() {
        let rule = Rule::of(seq(one_or_more(lit("a")), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(!parse("", &grammar).unwrap());
        assert!(parse("a", &grammar).unwrap());
        assert!(parse("aaaa", &grammar).unwrap());
        assert!(!parse("aab", &grammar).unwrap());
    }

    #[test]
    fn predicate_gates_the_subject_index() {
        let gated = Rule::of(seq(
            lit("a"),
            pred(|parser: &mut Parser| parser.subject_index() <= 4),
        ))
        .unwrap();
        let rule = Rule::of(seq(one_or_more(gated.prec(1)), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(!parse("", &grammar).unwrap());
        assert!(!parse("b", &grammar).unwrap());
        assert!(parse("a", &grammar).unwrap());
        assert!(parse("aa", &grammar).unwrap());
        assert!(parse("aaa", &grammar).unwrap());
        assert!(parse("aaaa", &grammar).unwrap());
        assert!(!parse("aaaaa", &grammar).unwrap());
    }

    #[test]
    fn ordered_choice_is_greedy_and_fires_the_first_alternative() {
        let (log, act) = recorder();
        let rule = Rule::of(choice(
            seq(lit("a"), act("a")),
            seq(lit("ab"), act("ab")),
        ))
        .unwrap();
        let grammar = start(&rule).unwrap();
        let mut semantics = Semantics::new();
        let mut parser = Parser::new(&grammar, &mut semantics);
        parser.enqueue("ab");
        assert!(parser.parse().unwrap());
        // PEG ordered choice: the first alternative wins, one byte remains
        assert_eq!(parser.input_view(), "b");
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn left_recursion_folds_left_associatively() {
        let fold = Rc::new(RefCell::new(Vec::<String>::new()));
        let num = Rule::new();
        {
            let fold = Rc::clone(&fold);
            num.define(action(lit("1"), move |_: &mut Semantics| {
                fold.borrow_mut().push("1".to_string());
            }))
            .unwrap();
        }
        let expr = Rule::new();
        {
            let fold = Rc::clone(&fold);
            expr.define(choice(
                action(
                    seq(seq(expr.prec(1), lit("+")), num.clone()),
                    move |_: &mut Semantics| {
                        let mut fold = fold.borrow_mut();
                        let right = fold.pop().unwrap();
                        let left = fold.pop().unwrap();
                        fold.push(format!("({left}+{right})"));
                    },
                ),
                num.clone(),
            ))
            .unwrap();
        }
        let top = Rule::of(seq(expr.clone(), eoi())).unwrap();
        let grammar = start(&top).unwrap();

        assert!(parse("1+1+1", &grammar).unwrap());
        assert_eq!(fold.borrow().as_slice(), &["((1+1)+1)".to_string()]);

        fold.borrow_mut().clear();
        assert!(parse("1", &grammar).unwrap());
        assert_eq!(fold.borrow().as_slice(), &["1".to_string()]);

        assert!(!parse("1+", &grammar).unwrap());
        assert!(!parse("+1", &grammar).unwrap());
    }

    #[test]
    fn capture_reports_text_and_positions() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let cap = {
            let seen = Rc::clone(&seen);
            capture(
                one_or_more(chr_range('a', 'z')),
                move |_: &mut Semantics, view: SyntaxView| {
                    seen.borrow_mut()
                        .push((view.capture.to_string(), view.start, view.end));
                },
            )
        };
        let rule = Rule::of(seq(cap, seq(lit(" "), eoi()))).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("hello ", &grammar).unwrap());

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "hello");
        assert_eq!(seen[0].1, SyntaxPosition { column: 1, line: 1 });
        assert_eq!(seen[0].2, SyntaxPosition { column: 6, line: 1 });
    }

    #[test]
    fn capture_positions_across_lines() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let cap = {
            let seen = Rc::clone(&seen);
            capture(
                seq(seq(lit("a"), eol()), lit("b")),
                move |_: &mut Semantics, view: SyntaxView| {
                    seen.borrow_mut()
                        .push((view.capture.to_string(), view.start, view.end));
                },
            )
        };
        let rule = Rule::of(seq(cap, eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("a\nb", &grammar).unwrap());

        let seen = seen.borrow();
        assert_eq!(seen[0].0, "a\nb");
        assert_eq!(seen[0].1, SyntaxPosition { column: 1, line: 1 });
        assert_eq!(seen[0].2, SyntaxPosition { column: 2, line: 2 });
    }

    #[test]
    fn long_literals_match_like_one_literal() {
        let text = "a".repeat(300);
        let rule = Rule::of(seq(lit(text.clone()), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse(&text, &grammar).unwrap());

        let mut other = text.clone();
        other.replace_range(280..281, "b");
        assert!(!parse(&other, &grammar).unwrap());
        assert!(!parse(&text[..299], &grammar).unwrap());
    }

    #[test]
    fn negative_lookahead_on_empty_input() {
        let rule = Rule::of(seq(not_(lit("b")), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("", &grammar).unwrap());

        let rule = Rule::of(seq(not_(eps()), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(!parse("", &grammar).unwrap());
    }

    #[test]
    fn inlining_preserves_response_streams() {
        let (log_inline, act) = recorder();
        let inner = Rule::of(seq(lit("ab"), act("inner"))).unwrap();
        let outer = Rule::of(seq(inner.clone(), eoi())).unwrap();
        let grammar_inline = start(&outer).unwrap();

        let count_calls = |grammar: &Grammar| {
            let mut pc = 0;
            let mut calls = 0;
            while pc < grammar.program().code().len() {
                let d = instruction::decode(grammar.program().code(), &mut pc).unwrap();
                if d.op == Opcode::Call {
                    calls += 1;
                }
            }
            calls
        };
        // only the bootstrap call remains
        assert_eq!(count_calls(&grammar_inline), 1);

        assert!(parse("ab", &grammar_inline).unwrap());
        let fired_inline = log_inline.borrow().clone();

        let (log_called, act) = recorder();
        let inner = Rule::of(seq(lit("ab"), act("inner"))).unwrap();
        let outer = Rule::of(seq(inner.prec(1), eoi())).unwrap();
        let grammar_called = start(&outer).unwrap();
        assert_eq!(count_calls(&grammar_called), 2);

        assert!(parse("ab", &grammar_called).unwrap());
        assert_eq!(fired_inline, *log_called.borrow());
    }

    #[test]
    fn start_is_idempotent() {
        let inner = Rule::of(one_or_more(chr_range('0', '9'))).unwrap();
        let rule = Rule::of(seq(inner.prec(1), eoi())).unwrap();
        let first = start(&rule).unwrap();
        let second = start(&rule).unwrap();
        assert_eq!(first.program().code(), second.program().code());
        assert!(parse("123", &first).unwrap());
        assert!(parse("123", &second).unwrap());
    }

    #[test]
    fn streaming_sources_feed_the_buffer() {
        let rule = Rule::of(seq(lit("abcd"), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        let mut semantics = Semantics::new();
        let mut parser = Parser::new(&grammar, &mut semantics);

        let mut chunks: VecDeque<&str> = VecDeque::from(["ab", "cd"]);
        parser
            .push_source(move |out: &mut String| match chunks.pop_front() {
                Some(chunk) => {
                    out.push_str(chunk);
                    !chunks.is_empty()
                }
                None => false,
            })
            .unwrap();
        assert!(parser.parse().unwrap());
    }

    #[test]
    fn parse_lines_appends_newlines() {
        let rule = Rule::of(seq(
            seq(seq(lit("ab"), eol()), seq(lit("cd"), eol())),
            eoi(),
        ))
        .unwrap();
        let grammar = start(&rule).unwrap();
        let mut semantics = Semantics::new();
        let reader = io::Cursor::new("ab\ncd");
        assert!(parse_lines(reader, &grammar, &mut semantics).unwrap());
    }

    #[test]
    fn cut_truncates_consumed_input() {
        let probe = Rc::new(Cell::new(usize::MAX));
        let spy = {
            let probe = Rc::clone(&probe);
            pred(move |parser: &mut Parser| {
                probe.set(parser.input_view().len());
                true
            })
        };
        let rule = Rule::of(seq(
            seq(seq(lit("ab"), cut()), spy),
            seq(lit("cd"), eoi()),
        ))
        .unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("abcd", &grammar).unwrap());
        // after the cut only the unconsumed window remains buffered
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn reentrant_parse_is_an_error() {
        let saw = Rc::new(Cell::new(false));
        let spy = {
            let saw = Rc::clone(&saw);
            pred(move |parser: &mut Parser| {
                saw.set(matches!(parser.parse(), Err(Error::ReentrantParse)));
                true
            })
        };
        let rule = Rule::of(seq(lit("a"), spy)).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("a", &grammar).unwrap());
        assert!(saw.get());
    }

    #[test]
    fn empty_grammar_is_an_error() {
        let grammar = Grammar::default();
        assert!(matches!(parse("x", &grammar), Err(Error::BadGrammar)));
    }

    #[test]
    fn failed_parse_reports_the_furthest_position() {
        let rule = Rule::of(seq(lit("ab"), seq(lit("cd"), eoi()))).unwrap();
        let grammar = start(&rule).unwrap();
        let mut semantics = Semantics::new();
        let mut parser = Parser::new(&grammar, &mut semantics);
        parser.enqueue("abcX");
        assert!(!parser.parse().unwrap());
        assert_eq!(
            parser.max_input_position(),
            SyntaxPosition { column: 3, line: 1 }
        );
    }

    #[test]
    fn escape_prunes_deeper_siblings() {
        let (log, _) = recorder();
        let inner = {
            let log = Rc::clone(&log);
            Rule::of(action(lit("a"), move |_: &mut Semantics| {
                log.borrow_mut().push("inner");
            }))
            .unwrap()
        };
        let escape_first = {
            let log = Rc::clone(&log);
            action(eps(), move |semantics: &mut Semantics| {
                log.borrow_mut().push("outer");
                semantics.escape();
            })
        };
        let rule = Rule::of(seq(escape_first, one_or_more(inner.prec(1)))).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("aa", &grammar).unwrap());
        // the outer action escapes, pruning both deeper responses
        assert_eq!(*log.borrow(), vec!["outer"]);
    }

    #[test]
    fn attributes_flow_from_emit_to_action() {
        let sum = Rc::new(Cell::new(0));
        let grab = {
            let sum = Rc::clone(&sum);
            action(eps(), move |semantics: &mut Semantics| {
                let a = semantics.pop_attribute::<i32>().unwrap();
                let b = semantics.pop_attribute::<i32>().unwrap();
                sum.set(a + b);
            })
        };
        let rule = Rule::of(seq(
            seq(emit(lit("a"), || 17i32), emit(lit("b"), || 25i32)),
            grab,
        ))
        .unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("ab", &grammar).unwrap());
        assert_eq!(sum.get(), 42);
    }

    #[test]
    fn variables_are_keyed_by_call_depth() {
        let total: crate::Variable<i32> = crate::Variable::new();
        let deep = Rc::new(Cell::new(0));
        let shallow = Rc::new(Cell::new(-1));
        let bump = {
            let total = total.clone();
            let deep = Rc::clone(&deep);
            Rule::of(action(lit("x"), move |semantics: &mut Semantics| {
                total.with(semantics, |value| *value += 1);
                deep.set(total.get(semantics).unwrap_or(0));
            }))
            .unwrap()
        };
        let read = {
            let total = total.clone();
            let shallow = Rc::clone(&shallow);
            action(eps(), move |semantics: &mut Semantics| {
                shallow.set(total.get(semantics).unwrap_or(0));
            })
        };
        let rule = Rule::of(seq(one_or_more(bump.prec(1)), read)).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("xxx", &grammar).unwrap());
        // all three bump invocations share the depth-2 slot
        assert_eq!(deep.get(), 3);
        // the depth-1 action sees its own, untouched slot
        assert_eq!(shallow.get(), 0);
    }

    #[test]
    fn match_class_expressions() {
        use sprig_ucd::{Ctype, Gctype, Ptype, Script};

        let rule = Rule::of(seq(one_or_more(ctype(Ctype::ALPHA)), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("abcXYZ", &grammar).unwrap());
        assert!(parse("héllo", &grammar).unwrap());
        assert!(!parse("ab1", &grammar).unwrap());

        let rule = Rule::of(seq(one_or_more(gc(Gctype::ND)), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("0123", &grammar).unwrap());
        assert!(!parse("012a", &grammar).unwrap());

        let rule = Rule::of(seq(one_or_more(prop(Ptype::WHITE_SPACE)), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse(" \t\n", &grammar).unwrap());
        assert!(!parse(" x", &grammar).unwrap());

        let rule = Rule::of(seq(one_or_more(script(Script::Greek)), eoi())).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("λόγος", &grammar).unwrap());
        assert!(!parse("logos", &grammar).unwrap());
    }

    #[test]
    fn grammar_can_be_embedded_in_another() {
        let word = Rule::of(one_or_more(chr_range('a', 'z'))).unwrap();
        let inner = start(&word).unwrap();
        let rule = Rule::of(seq(inner.clone(), seq(lit("!"), eoi()))).unwrap();
        let grammar = start(&rule).unwrap();
        assert!(parse("hey!", &grammar).unwrap());
        assert!(!parse("!", &grammar).unwrap());
    }
}
