//! The string-expression compiler.
//!
//! Patterns like `a.[x-z]` mix literal runs, `.`, and bracket classes. The
//! compiler is bootstrapped on the engine itself: a small grammar over the
//! pattern text drives a generator whose semantic actions emit the matching
//! instructions. Bracket ranges are merged and lowered to an ordered choice
//! of `match_range` alternatives, named classes become a `match_class`, and
//! `[^...]` wraps the alternatives in a fail-on-match scaffold followed by
//! `match_any`.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::bail;
use sprig_ucd::Ctype;

use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::expression::{
    action, any, capture, choice, chr, eoi, eps, not_, one_or_more, optional, seq, zero_or_more,
};
use crate::grammar::{start, Grammar, Rule};
use crate::instruction::{Instr, Opcode};
use crate::machine;
use crate::semantics::{Semantics, SyntaxView};

struct Generator {
    code: Vec<Instr>,
    matches_eps: bool,
    ranges: Vec<(String, String)>,
    classes: Ctype,
    circumflex: bool,
    error: Option<anyhow::Error>,
    bad_class: Option<String>,
}

impl Generator {
    fn new() -> Generator {
        Generator {
            code: Vec::new(),
            matches_eps: true,
            ranges: Vec::new(),
            classes: Ctype::empty(),
            circumflex: false,
            error: None,
            bad_class: None,
        }
    }

    fn fail(&mut self, error: anyhow::Error) {
        self.error.get_or_insert(error);
    }

    fn push_eps(&mut self) {
        self.code.push(Instr::prefix(Opcode::Match, 0, 0));
    }

    fn push_dot(&mut self) {
        self.code.push(Instr::prefix(Opcode::MatchAny, 0, 0));
        self.matches_eps = false;
    }

    fn push_literal(&mut self, text: &str) {
        let mut encoder = Encoder::raw(&mut self.code);
        if let Err(error) = encoder.match_bytes(text) {
            self.fail(error.into());
            return;
        }
        self.matches_eps = false;
    }

    fn add_class(&mut self, name: &str) {
        match Ctype::from_name(name) {
            Some(classes) => self.classes |= classes,
            None => {
                self.bad_class.get_or_insert_with(|| name.to_string());
            }
        }
    }

    /// A `x-y` element; the capture text contains the dash.
    fn add_range(&mut self, text: &str) {
        let Some(dash) = text.find('-') else {
            self.fail(anyhow::anyhow!("range without a dash: {text:?}"));
            return;
        };
        let (first, last) = (&text[..dash], &text[dash + 1..]);
        if first <= last {
            self.ranges.push((first.to_string(), last.to_string()));
        } else {
            self.ranges.push((last.to_string(), first.to_string()));
        }
    }

    fn add_single(&mut self, text: &str) {
        self.ranges.push((text.to_string(), text.to_string()));
    }

    fn commit_bracket(&mut self) {
        if let Err(error) = self.commit_bracket_inner() {
            self.fail(error);
        }
        self.ranges.clear();
        self.classes = Ctype::empty();
        self.circumflex = false;
    }

    fn commit_bracket_inner(&mut self) -> anyhow::Result<()> {
        // merge overlapping and adjacent rune ranges
        self.ranges.sort();
        let mut merged: Vec<(String, String)> = Vec::new();
        for (first, last) in self.ranges.drain(..) {
            match merged.last_mut() {
                Some((_, merged_last)) if first.as_str() <= merged_last.as_str() => {
                    if last > *merged_last {
                        *merged_last = last;
                    }
                }
                _ => merged.push((first, last)),
            }
        }

        let mut alternatives: Vec<Vec<Instr>> = Vec::new();
        for (first, last) in &merged {
            let mut code = Vec::new();
            let mut encoder = Encoder::raw(&mut code);
            encoder.match_range(first, last)?;
            alternatives.push(code);
        }
        if !self.classes.is_empty() {
            alternatives.push(vec![Instr::prefix(
                Opcode::MatchClass,
                0,
                self.classes.bits(),
            )]);
        }

        // fold the alternatives into an ordered choice, right to left
        let Some(mut matches) = alternatives.pop() else {
            bail!("empty bracket expression");
        };
        while let Some(left) = alternatives.pop() {
            let mut both = Vec::new();
            let mut encoder = Encoder::raw(&mut both);
            encoder.encode_off(Opcode::Choice, 0, (2 + left.len()) as isize, 0)?;
            both.extend_from_slice(&left);
            let mut tail = Encoder::raw(&mut both);
            tail.encode_off(Opcode::Commit, 0, matches.len() as isize, 0)?;
            both.extend_from_slice(&matches);
            matches = both;
        }

        if self.circumflex {
            // any rune not matched by the alternatives: if they succeed the
            // commit lands on fail with the frame already gone, otherwise
            // backtrack into match_any
            let mut negated = Vec::new();
            let mut encoder = Encoder::raw(&mut negated);
            encoder.encode_off(Opcode::Choice, 0, (3 + matches.len()) as isize, 0)?;
            negated.extend_from_slice(&matches);
            let mut tail = Encoder::raw(&mut negated);
            tail.encode_off(Opcode::Commit, 0, 0, 0)?;
            tail.encode(Opcode::Fail, 0, 0)?;
            tail.encode(Opcode::MatchAny, 0, 0)?;
            matches = negated;
        }

        self.code.extend_from_slice(&matches);
        self.matches_eps = false;
        Ok(())
    }
}

fn class_grammar(generator: &Rc<RefCell<Generator>>) -> Result<Grammar> {
    let empty = Rule::new();
    {
        let g = Rc::clone(generator);
        empty.define(action(eps(), move |_: &mut Semantics| {
            g.borrow_mut().push_eps()
        }))?;
    }

    let dot = Rule::new();
    {
        let g = Rc::clone(generator);
        dot.define(action(chr('.'), move |_: &mut Semantics| {
            g.borrow_mut().push_dot()
        }))?;
    }

    let element = Rule::new();
    {
        let g_range = Rc::clone(generator);
        let g_class = Rc::clone(generator);
        let g_single = Rc::clone(generator);
        element.define(choice(
            capture(
                seq(seq(seq(any(), chr('-')), not_(chr(']'))), any()),
                move |_: &mut Semantics, x: SyntaxView| g_range.borrow_mut().add_range(x.capture),
            ),
            choice(
                capture(
                    seq(
                        seq(
                            seq(seq(chr('['), chr(':')), one_or_more(seq(not_(chr(':')), any()))),
                            chr(':'),
                        ),
                        chr(']'),
                    ),
                    move |_: &mut Semantics, x: SyntaxView| {
                        let name = &x.capture[2..x.capture.len() - 2];
                        g_class.borrow_mut().add_class(name)
                    },
                ),
                capture(any(), move |_: &mut Semantics, x: SyntaxView| {
                    g_single.borrow_mut().add_single(x.capture)
                }),
            ),
        ))?;
    }

    let bracket = Rule::new();
    {
        let g_caret = Rc::clone(generator);
        let g_commit = Rc::clone(generator);
        bracket.define(seq(
            seq(
                seq(
                    seq(
                        chr('['),
                        optional(action(chr('^'), move |_: &mut Semantics| {
                            g_caret.borrow_mut().circumflex = true
                        })),
                    ),
                    element.clone(),
                ),
                zero_or_more(seq(not_(chr(']')), element.clone())),
            ),
            action(chr(']'), move |_: &mut Semantics| {
                g_commit.borrow_mut().commit_bracket()
            }),
        ))?;
    }

    let sequence = Rule::new();
    {
        let g = Rc::clone(generator);
        sequence.define(capture(
            one_or_more(seq(not_(choice(chr('.'), chr('['))), any())),
            move |_: &mut Semantics, x: SyntaxView| g.borrow_mut().push_literal(x.capture),
        ))?;
    }

    let top = Rule::of(seq(
        choice(
            one_or_more(choice(dot.clone(), choice(bracket.clone(), sequence.clone()))),
            empty.clone(),
        ),
        eoi(),
    ))?;
    start(&top)
}

/// Compile a string pattern into instruction words plus its eps-matchability.
pub(crate) fn compile(text: &str) -> Result<(Vec<Instr>, bool)> {
    let generator = Rc::new(RefCell::new(Generator::new()));
    let grammar = class_grammar(&generator)?;
    let mut semantics = Semantics::new();
    let matched = machine::parse_with(text, &grammar, &mut semantics)?;
    if !matched {
        return Err(Error::BadStringExpression(text.to_string()));
    }
    let mut generator = generator.borrow_mut();
    if let Some(name) = generator.bad_class.take() {
        return Err(Error::BadCharacterClass(name));
    }
    if let Some(error) = generator.error.take() {
        return Err(Error::BadStringExpression(error.to_string()));
    }
    Ok((std::mem::take(&mut generator.code), generator.matches_eps))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::pattern;
    use crate::machine::parse;

    fn compiled(text: &str) -> Grammar {
        let top = Rule::of(seq(pattern(text).unwrap(), eoi())).unwrap();
        start(&top).unwrap()
    }

    #[test]
    fn dot_matches_one_rune() {
        let grammar = compiled(".");
        assert!(parse("a", &grammar).unwrap());
        assert!(parse("€", &grammar).unwrap());
        assert!(!parse("", &grammar).unwrap());
        assert!(!parse("ab", &grammar).unwrap());
    }

    #[test]
    fn bracket_matches_any_listed_rune() {
        let grammar = compiled("[abc]");
        for ok in ["a", "b", "c"] {
            assert!(parse(ok, &grammar).unwrap(), "expected {ok:?} to match");
        }
        for bad in ["d", "", "ab"] {
            assert!(!parse(bad, &grammar).unwrap(), "expected {bad:?} to fail");
        }
    }

    #[test]
    fn negated_bracket_matches_outside_the_range() {
        let grammar = compiled("[^a-z]");
        for ok in ["A", "0", "é", " "] {
            assert!(parse(ok, &grammar).unwrap(), "expected {ok:?} to match");
        }
        for bad in ["a", "m", "z", ""] {
            assert!(!parse(bad, &grammar).unwrap(), "expected {bad:?} to fail");
        }
    }

    #[test]
    fn named_class_in_brackets() {
        let grammar = compiled("[[:alpha:]]");
        assert!(parse("x", &grammar).unwrap());
        assert!(parse("É", &grammar).unwrap());
        assert!(!parse("7", &grammar).unwrap());

        let grammar = compiled("[[:digit:]a-f]");
        assert!(parse("3", &grammar).unwrap());
        assert!(parse("d", &grammar).unwrap());
        assert!(!parse("g", &grammar).unwrap());
    }

    #[test]
    fn ranges_merge_and_order_does_not_matter() {
        for text in ["[a-fc-k]", "[c-ka-f]", "[c-kf-a]"] {
            let grammar = compiled(text);
            assert!(parse("j", &grammar).unwrap(), "{text}");
            assert!(parse("a", &grammar).unwrap(), "{text}");
            assert!(!parse("m", &grammar).unwrap(), "{text}");
        }
    }

    #[test]
    fn literal_runs_mix_with_classes() {
        let grammar = compiled("ab.[0-9]z");
        assert!(parse("abX5z", &grammar).unwrap());
        assert!(parse("ab!0z", &grammar).unwrap());
        assert!(!parse("abX5y", &grammar).unwrap());
        assert!(!parse("abXxz", &grammar).unwrap());
    }

    #[test]
    fn empty_pattern_matches_empty_input() {
        let grammar = compiled("");
        assert!(parse("", &grammar).unwrap());
        assert!(!parse("a", &grammar).unwrap());
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(matches!(
            pattern("[abc"),
            Err(Error::BadStringExpression(_))
        ));
        assert!(matches!(
            pattern("[[:bogus:]]"),
            Err(Error::BadCharacterClass(name)) if name == "bogus"
        ));
    }
}
