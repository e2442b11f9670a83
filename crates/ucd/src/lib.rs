mod enums;
mod tables;

use std::cmp::Ordering;

use bitflags::bitflags;

pub use enums::{GeneralCategory, Script};

bitflags! {
    /// POSIX-style character classes, usable as a mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ctype: u16 {
        const ALPHA  = 1 << 0;
        const DIGIT  = 1 << 1;
        const XDIGIT = 1 << 2;
        const SPACE  = 1 << 3;
        const BLANK  = 1 << 4;
        const CNTRL  = 1 << 5;
        const GRAPH  = 1 << 6;
        const PRINT  = 1 << 7;
        const PUNCT  = 1 << 8;
        const UPPER  = 1 << 9;
        const LOWER  = 1 << 10;
        const WORD   = 1 << 11;
        const ALNUM  = Self::ALPHA.bits() | Self::DIGIT.bits();
    }
}

impl Ctype {
    /// Look up a class by its bracket expression name, e.g. `alpha` in `[:alpha:]`.
    pub fn from_name(name: &str) -> Option<Ctype> {
        let ctype = match name {
            "alnum" => Ctype::ALNUM,
            "alpha" => Ctype::ALPHA,
            "blank" => Ctype::BLANK,
            "cntrl" => Ctype::CNTRL,
            "digit" => Ctype::DIGIT,
            "graph" => Ctype::GRAPH,
            "lower" => Ctype::LOWER,
            "print" => Ctype::PRINT,
            "punct" => Ctype::PUNCT,
            "space" => Ctype::SPACE,
            "upper" => Ctype::UPPER,
            "word" => Ctype::WORD,
            "xdigit" => Ctype::XDIGIT,
            _ => return None,
        };
        Some(ctype)
    }
}

bitflags! {
    /// Binary character properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ptype: u64 {
        const WHITE_SPACE    = 1 << 0;
        const ALPHABETIC     = 1 << 1;
        const UPPERCASE      = 1 << 2;
        const LOWERCASE      = 1 << 3;
        const NONCHARACTER   = 1 << 4;
        const DASH           = 1 << 5;
        const QUOTATION_MARK = 1 << 6;
    }
}

bitflags! {
    /// General category flags. One bit per category plus the usual groups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Gctype: u32 {
        const LU = 1 << 0;
        const LL = 1 << 1;
        const LT = 1 << 2;
        const LM = 1 << 3;
        const LO = 1 << 4;
        const MN = 1 << 5;
        const MC = 1 << 6;
        const ME = 1 << 7;
        const ND = 1 << 8;
        const NL = 1 << 9;
        const NO = 1 << 10;
        const PC = 1 << 11;
        const PD = 1 << 12;
        const PS = 1 << 13;
        const PE = 1 << 14;
        const PI = 1 << 15;
        const PF = 1 << 16;
        const PO = 1 << 17;
        const SM = 1 << 18;
        const SC = 1 << 19;
        const SK = 1 << 20;
        const SO = 1 << 21;
        const ZS = 1 << 22;
        const ZL = 1 << 23;
        const ZP = 1 << 24;
        const CC = 1 << 25;
        const CF = 1 << 26;
        const CS = 1 << 27;
        const CO = 1 << 28;
        const CN = 1 << 29;

        const LETTER      = Self::LU.bits() | Self::LL.bits() | Self::LT.bits() | Self::LM.bits() | Self::LO.bits();
        const MARK        = Self::MN.bits() | Self::MC.bits() | Self::ME.bits();
        const NUMBER      = Self::ND.bits() | Self::NL.bits() | Self::NO.bits();
        const PUNCTUATION = Self::PC.bits() | Self::PD.bits() | Self::PS.bits() | Self::PE.bits()
            | Self::PI.bits() | Self::PF.bits() | Self::PO.bits();
        const SYMBOL      = Self::SM.bits() | Self::SC.bits() | Self::SK.bits() | Self::SO.bits();
        const SEPARATOR   = Self::ZS.bits() | Self::ZL.bits() | Self::ZP.bits();
        const OTHER       = Self::CC.bits() | Self::CF.bits() | Self::CS.bits() | Self::CO.bits() | Self::CN.bits();
    }
}

/// Property record for a single scalar value.
#[derive(Debug, Clone, Copy)]
pub struct CharProps {
    ctype: Ctype,
    ptype: Ptype,
    gc: GeneralCategory,
    script: Script,
}

impl CharProps {
    /// True if the character belongs to any class in the mask.
    pub fn is(&self, classes: Ctype) -> bool {
        self.ctype.intersects(classes)
    }

    pub fn any_of_ptype(&self, properties: Ptype) -> bool {
        self.ptype.intersects(properties)
    }

    pub fn any_of_gc(&self, categories: Gctype) -> bool {
        categories.intersects(self.gc.flag())
    }

    pub fn general_category(&self) -> GeneralCategory {
        self.gc
    }

    pub fn script(&self) -> Script {
        self.script
    }
}

/// Query the property record of a scalar value.
pub fn char_props(ch: char) -> CharProps {
    let gc = general_category(ch);
    CharProps {
        ctype: ctype_of(ch, gc),
        ptype: ptype_of(ch),
        gc,
        script: script_of(ch),
    }
}

fn general_category(ch: char) -> GeneralCategory {
    use GeneralCategory::*;

    if ch.is_ascii() {
        return ascii_category(ch);
    }

    if let Some(gc) = table_search(ch, tables::GENERAL_CATEGORY) {
        return gc;
    }

    // The table only covers what the std predicates cannot answer.
    if ch.is_lowercase() {
        Ll
    } else if ch.is_uppercase() {
        Lu
    } else if ch.is_alphabetic() {
        Lo
    } else if ch.is_numeric() {
        Nd
    } else if ch.is_whitespace() {
        Zs
    } else if ch.is_control() {
        Cc
    } else {
        Cn
    }
}

fn ascii_category(ch: char) -> GeneralCategory {
    use GeneralCategory::*;

    match ch {
        '\u{0}'..='\u{1f}' | '\u{7f}' => Cc,
        ' ' => Zs,
        '0'..='9' => Nd,
        'A'..='Z' => Lu,
        'a'..='z' => Ll,
        '_' => Pc,
        '-' => Pd,
        '(' | '[' | '{' => Ps,
        ')' | ']' | '}' => Pe,
        '$' => Sc,
        '+' | '<' | '=' | '>' | '|' | '~' => Sm,
        '^' | '`' => Sk,
        _ => Po,
    }
}

fn ctype_of(ch: char, gc: GeneralCategory) -> Ctype {
    use GeneralCategory as G;

    let mut ctype = Ctype::empty();
    if ch.is_alphabetic() {
        ctype |= Ctype::ALPHA;
    }
    if gc == G::Nd {
        ctype |= Ctype::DIGIT;
    }
    if ch.is_ascii_hexdigit() {
        ctype |= Ctype::XDIGIT;
    }
    if ch.is_whitespace() {
        ctype |= Ctype::SPACE;
    }
    if ch == '\t' || gc == G::Zs {
        ctype |= Ctype::BLANK;
    }
    if ch.is_control() {
        ctype |= Ctype::CNTRL;
    }
    if gc.flag().intersects(Gctype::PUNCTUATION | Gctype::SYMBOL) {
        ctype |= Ctype::PUNCT;
    }
    if ch.is_uppercase() {
        ctype |= Ctype::UPPER;
    }
    if ch.is_lowercase() {
        ctype |= Ctype::LOWER;
    }
    if gc
        .flag()
        .intersects(Gctype::LETTER | Gctype::MARK | Gctype::NUMBER | Gctype::PUNCTUATION | Gctype::SYMBOL)
    {
        ctype |= Ctype::GRAPH | Ctype::PRINT;
    }
    if gc == G::Zs {
        ctype |= Ctype::PRINT;
    }
    if ctype.intersects(Ctype::ALNUM) || ch == '_' {
        ctype |= Ctype::WORD;
    }
    ctype
}

fn ptype_of(ch: char) -> Ptype {
    let mut ptype = Ptype::empty();
    if ch.is_whitespace() {
        ptype |= Ptype::WHITE_SPACE;
    }
    if ch.is_alphabetic() {
        ptype |= Ptype::ALPHABETIC;
    }
    if ch.is_uppercase() {
        ptype |= Ptype::UPPERCASE;
    }
    if ch.is_lowercase() {
        ptype |= Ptype::LOWERCASE;
    }
    let num = ch as u32;
    if (0xfdd0..=0xfdef).contains(&num) || num & 0xfffe == 0xfffe {
        ptype |= Ptype::NONCHARACTER;
    }
    if table_contains(ch, tables::DASH) {
        ptype |= Ptype::DASH;
    }
    if table_contains(ch, tables::QUOTATION_MARK) {
        ptype |= Ptype::QUOTATION_MARK;
    }
    ptype
}

fn script_of(ch: char) -> Script {
    if ch.is_ascii() {
        if ch.is_ascii_alphabetic() {
            return Script::Latin;
        }
        return Script::Common;
    }

    table_search(ch, tables::SCRIPTS).unwrap_or(Script::Unknown)
}

fn table_contains(ch: char, table: &'static [(u32, u32)]) -> bool {
    let ch = ch as u32;
    table
        .binary_search_by(|(start, end)| {
            if ch < *start {
                Ordering::Greater
            } else if *end < ch {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

fn table_search<T: Copy>(ch: char, table: &'static [(u32, u32, T)]) -> Option<T> {
    let ch = ch as u32;
    let pos = table
        .binary_search_by(|(start, end, _)| {
            if ch < *start {
                Ordering::Greater
            } else if *end < ch {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        })
        .ok()?;
    let (_, _, value) = table[pos];
    Some(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ascii_classes() {
        assert!(char_props('a').is(Ctype::ALPHA | Ctype::LOWER));
        assert!(char_props('Z').is(Ctype::UPPER));
        assert!(!char_props('Z').is(Ctype::LOWER));
        assert!(char_props('7').is(Ctype::DIGIT | Ctype::XDIGIT | Ctype::WORD));
        assert!(char_props(' ').is(Ctype::SPACE | Ctype::BLANK | Ctype::PRINT));
        assert!(char_props('\t').is(Ctype::BLANK));
        assert!(char_props('\n').is(Ctype::CNTRL | Ctype::SPACE));
        assert!(char_props(';').is(Ctype::PUNCT | Ctype::GRAPH));
        assert!(char_props('_').is(Ctype::WORD));
        assert!(!char_props('_').is(Ctype::ALNUM));
    }

    #[test]
    fn class_names() {
        assert_eq!(Ctype::from_name("alpha"), Some(Ctype::ALPHA));
        assert_eq!(Ctype::from_name("alnum"), Some(Ctype::ALNUM));
        assert_eq!(Ctype::from_name("xdigit"), Some(Ctype::XDIGIT));
        assert_eq!(Ctype::from_name("bogus"), None);
    }

    #[test]
    fn general_categories() {
        assert_eq!(char_props('A').general_category(), GeneralCategory::Lu);
        assert_eq!(char_props('x').general_category(), GeneralCategory::Ll);
        assert_eq!(char_props('0').general_category(), GeneralCategory::Nd);
        assert_eq!(char_props('\u{0301}').general_category(), GeneralCategory::Mn);
        assert_eq!(char_props('\u{2014}').general_category(), GeneralCategory::Pd);
        assert_eq!(char_props('\u{20ac}').general_category(), GeneralCategory::Sc);
        assert!(char_props('é').any_of_gc(Gctype::LETTER));
        assert!(char_props('5').any_of_gc(Gctype::ND));
        assert!(!char_props('5').any_of_gc(Gctype::LETTER));
    }

    #[test]
    fn scripts() {
        assert_eq!(char_props('a').script(), Script::Latin);
        assert_eq!(char_props('é').script(), Script::Latin);
        assert_eq!(char_props('Ж').script(), Script::Cyrillic);
        assert_eq!(char_props('λ').script(), Script::Greek);
        assert_eq!(char_props('あ').script(), Script::Hiragana);
        assert_eq!(char_props('漢').script(), Script::Han);
        assert_eq!(char_props('1').script(), Script::Common);
    }

    #[test]
    fn properties() {
        assert!(char_props(' ').any_of_ptype(Ptype::WHITE_SPACE));
        assert!(char_props('k').any_of_ptype(Ptype::ALPHABETIC | Ptype::LOWERCASE));
        assert!(char_props('\u{2013}').any_of_ptype(Ptype::DASH));
        assert!(char_props('"').any_of_ptype(Ptype::QUOTATION_MARK));
        assert!(char_props('\u{fdd0}').any_of_ptype(Ptype::NONCHARACTER));
        assert!(!char_props('q').any_of_ptype(Ptype::UPPERCASE));
    }

    #[test]
    fn script_raw_roundtrip() {
        for script in [Script::Common, Script::Latin, Script::Han, Script::Unknown] {
            assert_eq!(Script::from_raw(script as u16), Some(script));
        }
        assert_eq!(Script::from_raw(0xffff), None);
    }
}
