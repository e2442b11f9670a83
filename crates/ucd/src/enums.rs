use crate::Gctype;

/// Unicode general category of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralCategory {
    Lu,
    Ll,
    Lt,
    Lm,
    Lo,
    Mn,
    Mc,
    Me,
    Nd,
    Nl,
    No,
    Pc,
    Pd,
    Ps,
    Pe,
    Pi,
    Pf,
    Po,
    Sm,
    Sc,
    Sk,
    So,
    Zs,
    Zl,
    Zp,
    Cc,
    Cf,
    Cs,
    Co,
    Cn,
}

impl GeneralCategory {
    /// The category as a single-bit mask.
    pub fn flag(self) -> Gctype {
        use GeneralCategory::*;
        match self {
            Lu => Gctype::LU,
            Ll => Gctype::LL,
            Lt => Gctype::LT,
            Lm => Gctype::LM,
            Lo => Gctype::LO,
            Mn => Gctype::MN,
            Mc => Gctype::MC,
            Me => Gctype::ME,
            Nd => Gctype::ND,
            Nl => Gctype::NL,
            No => Gctype::NO,
            Pc => Gctype::PC,
            Pd => Gctype::PD,
            Ps => Gctype::PS,
            Pe => Gctype::PE,
            Pi => Gctype::PI,
            Pf => Gctype::PF,
            Po => Gctype::PO,
            Sm => Gctype::SM,
            Sc => Gctype::SC,
            Sk => Gctype::SK,
            So => Gctype::SO,
            Zs => Gctype::ZS,
            Zl => Gctype::ZL,
            Zp => Gctype::ZP,
            Cc => Gctype::CC,
            Cf => Gctype::CF,
            Cs => Gctype::CS,
            Co => Gctype::CO,
            Cn => Gctype::CN,
        }
    }
}

/// Writing script of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Script {
    Unknown = 0,
    Common,
    Latin,
    Greek,
    Cyrillic,
    Armenian,
    Hebrew,
    Arabic,
    Devanagari,
    Bengali,
    Tamil,
    Thai,
    Georgian,
    Hangul,
    Han,
    Hiragana,
    Katakana,
}

impl Script {
    /// Inverse of `script as u16`, for scripts stored in instruction immediates.
    pub fn from_raw(raw: u16) -> Option<Script> {
        use Script::*;
        let script = match raw {
            0 => Unknown,
            1 => Common,
            2 => Latin,
            3 => Greek,
            4 => Cyrillic,
            5 => Armenian,
            6 => Hebrew,
            7 => Arabic,
            8 => Devanagari,
            9 => Bengali,
            10 => Tamil,
            11 => Thai,
            12 => Georgian,
            13 => Hangul,
            14 => Han,
            15 => Hiragana,
            16 => Katakana,
            _ => return None,
        };
        Some(script)
    }
}
