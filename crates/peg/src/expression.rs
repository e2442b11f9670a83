//! The combinator surface.
//!
//! An expression is anything that can emit itself into an encoder. The
//! builders here are plain functions returning small expression values;
//! composition nests the values, and encoding walks the tree emitting
//! instructions with the offsets pre-computed by length evaluation.

use std::rc::Rc;

use sprig_ucd::{Ctype, Gctype, Ptype, Script};

use crate::class;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::instruction::{alt, Instr, Opcode};
use crate::machine::Parser;
use crate::semantics::{Semantics, SyntaxView};

pub trait Expression {
    fn encode(&self, enc: &mut Encoder) -> Result<()>;
}

impl<E: Expression + ?Sized> Expression for &E {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        (**self).encode(enc)
    }
}

/// Literal text, matched byte for byte.
pub fn lit(text: impl Into<String>) -> Lit {
    Lit { text: text.into() }
}

/// A single literal rune.
pub fn chr(ch: char) -> Lit {
    Lit {
        text: ch.to_string(),
    }
}

pub struct Lit {
    text: String,
}

impl Expression for Lit {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.match_bytes(&self.text)
    }
}

/// One rune in the inclusive range `[first, last]`.
pub fn chr_range(first: char, last: char) -> ChrRange {
    ChrRange { first, last }
}

pub struct ChrRange {
    first: char,
    last: char,
}

impl Expression for ChrRange {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let mut first = [0u8; 4];
        let mut last = [0u8; 4];
        let first = self.first.encode_utf8(&mut first);
        let last = self.last.encode_utf8(&mut last);
        enc.match_range(first, last)
    }
}

/// Any single rune.
pub fn any() -> Any {
    Any
}

pub struct Any;

impl Expression for Any {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode(Opcode::MatchAny, 0, 0)?;
        enc.zclr(true);
        Ok(())
    }
}

/// The empty match.
pub fn eps() -> Eps {
    Eps
}

pub struct Eps;

impl Expression for Eps {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode(Opcode::Match, 0, 0)
    }
}

/// End of input.
pub fn eoi() -> Eoi {
    Eoi
}

pub struct Eoi;

impl Expression for Eoi {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode_off(Opcode::Choice, 0, 2, 0)?;
        enc.encode(Opcode::MatchAny, 0, 0)?;
        enc.encode(Opcode::Fail, 0, 1)
    }
}

/// End of line: `\r\n`, `\n`, or `\r`, bumping the line register.
pub fn eol() -> Eol {
    Eol
}

pub struct Eol;

impl Expression for Eol {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode_off(Opcode::Choice, 0, 4, 0)?;
        enc.match_bytes("\n")?;
        enc.encode_off(Opcode::Commit, 0, 7, 0)?;
        enc.match_bytes("\r")?;
        enc.encode_off(Opcode::Choice, 0, 3, 0)?;
        enc.match_bytes("\n")?;
        enc.encode(Opcode::Commit, 0, 0)?;
        enc.encode(Opcode::Newline, 0, 0)
    }
}

/// One space, line break (with line accounting), or other ASCII whitespace.
pub fn space() -> Space {
    Space
}

pub struct Space;

impl Expression for Space {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let eol_len = enc.evaluate_length(&Eol)?;
        enc.encode_off(Opcode::Choice, 0, 4, 0)?;
        enc.match_bytes(" ")?;
        enc.encode_off(Opcode::Commit, 0, (6 + eol_len) as isize, 0)?;
        enc.encode_off(Opcode::Choice, 0, (2 + eol_len) as isize, 0)?;
        Eol.encode(enc)?;
        enc.encode_off(Opcode::Commit, 0, 2, 0)?;
        enc.match_range("\t", "\r")
    }
}

/// The cut: commit pending actions and discard exhausted alternatives,
/// allowing the consumed input window to be released.
pub fn cut() -> Cut {
    Cut
}

pub struct Cut;

impl Expression for Cut {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode(Opcode::Accept, 0, 0)
    }
}

/// Reset the column register and bump the line register, without consuming
/// input. For grammars that track line breaks themselves.
pub fn nl() -> Newline {
    Newline
}

pub struct Newline;

impl Expression for Newline {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode(Opcode::Newline, 0, 0)
    }
}

/// `a` then `b`.
pub fn seq<A: Expression, B: Expression>(a: A, b: B) -> Seq<A, B> {
    Seq { a, b }
}

pub struct Seq<A, B> {
    a: A,
    b: B,
}

impl<A: Expression, B: Expression> Expression for Seq<A, B> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        self.a.encode(enc)?;
        self.b.encode(enc)
    }
}

/// Ordered choice: `a`, or `b` if `a` fails.
pub fn choice<A: Expression, B: Expression>(a: A, b: B) -> Choice<A, B> {
    Choice { a, b }
}

pub struct Choice<A, B> {
    a: A,
    b: B,
}

impl<A: Expression, B: Expression> Expression for Choice<A, B> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let len_a = enc.evaluate_length(&self.a)?;
        enc.encode_off(Opcode::Choice, 0, (2 + len_a) as isize, 0)?;
        enc.zpsh(1);
        self.a.encode(enc)?;
        let len_b = enc.evaluate_length(&self.b)?;
        enc.encode_off(Opcode::Commit, 0, len_b as isize, 0)?;
        enc.zpsh(2);
        self.b.encode(enc)?;
        enc.zand(2);
        Ok(())
    }
}

/// Zero or more repetitions of `e`.
pub fn zero_or_more<E: Expression>(e: E) -> Star<E> {
    Star { e }
}

pub struct Star<E> {
    e: E,
}

impl<E: Expression> Expression for Star<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let len = enc.evaluate_length(&self.e)?;
        enc.encode_off(Opcode::Choice, 0, (2 + len) as isize, 0)?;
        enc.zpsh(1);
        self.e.encode(enc)?;
        enc.zpop();
        enc.encode_off(
            Opcode::Commit,
            alt::COMMIT_PARTIAL,
            -((2 + len) as isize),
            0,
        )
    }
}

/// One or more repetitions of `e`.
pub fn one_or_more<E: Expression>(e: E) -> Plus<E> {
    Plus { e }
}

pub struct Plus<E> {
    e: E,
}

impl<E: Expression> Expression for Plus<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        self.e.encode(enc)?;
        Star { e: &self.e }.encode(enc)
    }
}

/// `e` or nothing.
pub fn optional<E: Expression>(e: E) -> Opt<E> {
    Opt { e }
}

pub struct Opt<E> {
    e: E,
}

impl<E: Expression> Expression for Opt<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        Choice { a: &self.e, b: Eps }.encode(enc)
    }
}

/// Positive lookahead: succeed iff `e` matches, consuming nothing.
pub fn and_<E: Expression>(e: E) -> And<E> {
    And { e }
}

pub struct And<E> {
    e: E,
}

impl<E: Expression> Expression for And<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let len = enc.evaluate_length(&self.e)?;
        enc.encode_off(Opcode::Choice, 0, (2 + len) as isize, 0)?;
        enc.zpsh(1);
        self.e.encode(enc)?;
        enc.zpop();
        enc.encode_off(Opcode::Commit, alt::COMMIT_BACK, 1, 0)?;
        enc.encode(Opcode::Fail, 0, 0)
    }
}

/// Negative lookahead: succeed iff `e` fails, consuming nothing.
pub fn not_<E: Expression>(e: E) -> Not<E> {
    Not { e }
}

pub struct Not<E> {
    e: E,
}

impl<E: Expression> Expression for Not<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let len = enc.evaluate_length(&self.e)?;
        enc.encode_off(Opcode::Choice, 0, (1 + len) as isize, 0)?;
        enc.zpsh(1);
        self.e.encode(enc)?;
        enc.zpop();
        enc.encode(Opcode::Fail, 0, 1)
    }
}

/// Attach a semantic action to `e`, fired on accept in match order.
pub fn action<E, F>(e: E, f: F) -> Action<E>
where
    E: Expression,
    F: Fn(&mut Semantics) + 'static,
{
    Action {
        e,
        f: Rc::new(f),
    }
}

/// Attach an attribute-producing action: on accept, `f`'s result is pushed
/// onto the semantics attribute stack.
pub fn emit<E, F, T>(e: E, f: F) -> Action<E>
where
    E: Expression,
    F: Fn() -> T + 'static,
    T: 'static,
{
    Action {
        e,
        f: Rc::new(move |semantics: &mut Semantics| semantics.push_attribute(f())),
    }
}

pub struct Action<E> {
    e: E,
    f: Rc<dyn Fn(&mut Semantics)>,
}

impl<E: Expression> Expression for Action<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        self.e.encode(enc)?;
        enc.encode_action(Rc::clone(&self.f))
    }
}

/// Capture the text matched by `e` and hand it to `f` on accept.
pub fn capture<E, F>(e: E, f: F) -> Capture<E>
where
    E: Expression,
    F: Fn(&mut Semantics, SyntaxView) + 'static,
{
    Capture {
        e,
        f: Rc::new(f),
    }
}

pub struct Capture<E> {
    e: E,
    f: Rc<dyn Fn(&mut Semantics, SyntaxView)>,
}

impl<E: Expression> Expression for Capture<E> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode(Opcode::BeginCapture, 0, 0)?;
        self.e.encode(enc)?;
        enc.encode_capture_end(Rc::clone(&self.f))
    }
}

/// A semantic predicate over the parser state. Failing the predicate fails
/// the current alternative.
pub fn pred<F>(f: F) -> Pred
where
    F: Fn(&mut Parser) -> bool + 'static,
{
    Pred { f: Rc::new(f) }
}

pub struct Pred {
    f: Rc<dyn Fn(&mut Parser) -> bool>,
}

impl Expression for Pred {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.encode_predicate(Rc::clone(&self.f))
    }
}

/// A compiled string pattern: literal runs, `.`, and bracket classes like
/// `[a-z]`, `[^abc]`, or `[[:alpha:]]`.
pub fn pattern(text: &str) -> Result<Pattern> {
    let (code, matches_eps) = class::compile(text)?;
    Ok(Pattern { code, matches_eps })
}

pub struct Pattern {
    code: Vec<Instr>,
    matches_eps: bool,
}

impl Expression for Pattern {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        for &instr in &self.code {
            enc.append(instr)?;
        }
        enc.zclr(!self.matches_eps);
        Ok(())
    }
}

/// One rune belonging to any class in the mask.
pub fn ctype(classes: Ctype) -> Class {
    Class {
        kind: ClassKind::Ctype(classes),
    }
}

/// One rune carrying any of the binary properties.
pub fn prop(properties: Ptype) -> Class {
    Class {
        kind: ClassKind::Ptype(properties),
    }
}

/// One rune in any of the general categories.
pub fn gc(categories: Gctype) -> Class {
    Class {
        kind: ClassKind::Gc(categories),
    }
}

/// One rune of the given script.
pub fn script(script: Script) -> Class {
    Class {
        kind: ClassKind::Script(script),
    }
}

enum ClassKind {
    Ctype(Ctype),
    Ptype(Ptype),
    Gc(Gctype),
    Script(Script),
}

pub struct Class {
    kind: ClassKind,
}

impl Expression for Class {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        match &self.kind {
            ClassKind::Ctype(classes) => {
                enc.encode(Opcode::MatchClass, 0, classes.bits())?;
            }
            ClassKind::Ptype(properties) => {
                enc.encode_str(
                    Opcode::MatchClass,
                    alt::MATCH_CLASS_PTYPE,
                    1,
                    &properties.bits().to_le_bytes(),
                )?;
            }
            ClassKind::Gc(categories) => {
                enc.encode_str(
                    Opcode::MatchClass,
                    alt::MATCH_CLASS_GCTYPE,
                    1,
                    &categories.bits().to_le_bytes(),
                )?;
            }
            ClassKind::Script(script) => {
                enc.encode(Opcode::MatchClass, alt::MATCH_CLASS_SCTYPE, *script as u16)?;
            }
        }
        enc.zclr(true);
        Ok(())
    }
}
