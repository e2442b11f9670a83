//! Range tables, sorted by start point and non-overlapping.
//!
//! The general category table only carries ranges the std char predicates
//! cannot classify (marks, punctuation, symbols, separators, format
//! characters); letters, digits, whitespace and controls resolve through the
//! fallback chain in `lib.rs`.

use crate::enums::{GeneralCategory, Script};

use GeneralCategory::*;

#[rustfmt::skip]
pub(crate) static GENERAL_CATEGORY: &[(u32, u32, GeneralCategory)] = &[
    (0x00a0, 0x00a0, Zs),
    (0x00a1, 0x00a1, Po),
    (0x00a2, 0x00a5, Sc),
    (0x00a6, 0x00a6, So),
    (0x00a7, 0x00a7, Po),
    (0x00a8, 0x00a8, Sk),
    (0x00a9, 0x00a9, So),
    (0x00ab, 0x00ab, Pi),
    (0x00ac, 0x00ac, Sm),
    (0x00ad, 0x00ad, Cf),
    (0x00ae, 0x00ae, So),
    (0x00b0, 0x00b0, So),
    (0x00b1, 0x00b1, Sm),
    (0x00b6, 0x00b6, Po),
    (0x00bb, 0x00bb, Pf),
    (0x00bf, 0x00bf, Po),
    (0x00d7, 0x00d7, Sm),
    (0x00f7, 0x00f7, Sm),
    (0x0300, 0x036f, Mn),
    (0x0483, 0x0489, Mn),
    (0x0591, 0x05bd, Mn),
    (0x05be, 0x05be, Pd),
    (0x0600, 0x0605, Cf),
    (0x0610, 0x061a, Mn),
    (0x064b, 0x065f, Mn),
    (0x06d6, 0x06dc, Mn),
    (0x0900, 0x0902, Mn),
    (0x0903, 0x0903, Mc),
    (0x093c, 0x093c, Mn),
    (0x093e, 0x0940, Mc),
    (0x0941, 0x0948, Mn),
    (0x094d, 0x094d, Mn),
    (0x0e31, 0x0e31, Mn),
    (0x0e34, 0x0e3a, Mn),
    (0x0e47, 0x0e4e, Mn),
    (0x2000, 0x200a, Zs),
    (0x200b, 0x200f, Cf),
    (0x2010, 0x2015, Pd),
    (0x2018, 0x2018, Pi),
    (0x2019, 0x2019, Pf),
    (0x201a, 0x201a, Ps),
    (0x201c, 0x201c, Pi),
    (0x201d, 0x201d, Pf),
    (0x201e, 0x201e, Ps),
    (0x2020, 0x2027, Po),
    (0x2028, 0x2028, Zl),
    (0x2029, 0x2029, Zp),
    (0x2030, 0x2038, Po),
    (0x2039, 0x2039, Pi),
    (0x203a, 0x203a, Pf),
    (0x2044, 0x2044, Sm),
    (0x20a0, 0x20bf, Sc),
    (0x2190, 0x2194, Sm),
    (0x2195, 0x21ff, So),
    (0x2200, 0x22ff, Sm),
    (0x2300, 0x23ff, So),
    (0x25a0, 0x25ff, So),
    (0x2600, 0x26ff, So),
    (0x3000, 0x3000, Zs),
    (0x3001, 0x3002, Po),
    (0x3008, 0x3008, Ps),
    (0x3009, 0x3009, Pe),
    (0xfe00, 0xfe0f, Mn),
    (0xfeff, 0xfeff, Cf),
    (0xff01, 0xff03, Po),
];

#[rustfmt::skip]
pub(crate) static DASH: &[(u32, u32)] = &[
    (0x002d, 0x002d),
    (0x058a, 0x058a),
    (0x05be, 0x05be),
    (0x1400, 0x1400),
    (0x2010, 0x2015),
    (0x2e17, 0x2e17),
    (0x301c, 0x301c),
    (0xfe58, 0xfe58),
    (0xfe63, 0xfe63),
    (0xff0d, 0xff0d),
];

#[rustfmt::skip]
pub(crate) static QUOTATION_MARK: &[(u32, u32)] = &[
    (0x0022, 0x0022),
    (0x0027, 0x0027),
    (0x00ab, 0x00ab),
    (0x00bb, 0x00bb),
    (0x2018, 0x201f),
    (0x2039, 0x203a),
    (0x300c, 0x300f),
    (0xff02, 0xff02),
    (0xff07, 0xff07),
];

use Script::*;

#[rustfmt::skip]
pub(crate) static SCRIPTS: &[(u32, u32, Script)] = &[
    (0x00c0, 0x024f, Latin),
    (0x0370, 0x03ff, Greek),
    (0x0400, 0x052f, Cyrillic),
    (0x0530, 0x058f, Armenian),
    (0x0590, 0x05ff, Hebrew),
    (0x0600, 0x06ff, Arabic),
    (0x0750, 0x077f, Arabic),
    (0x0900, 0x097f, Devanagari),
    (0x0980, 0x09ff, Bengali),
    (0x0b80, 0x0bff, Tamil),
    (0x0e00, 0x0e7f, Thai),
    (0x10a0, 0x10ff, Georgian),
    (0x1100, 0x11ff, Hangul),
    (0x1e00, 0x1eff, Latin),
    (0x1f00, 0x1fff, Greek),
    (0x2000, 0x206f, Common),
    (0x20a0, 0x20cf, Common),
    (0x2c60, 0x2c7f, Latin),
    (0x3000, 0x303f, Common),
    (0x3040, 0x309f, Hiragana),
    (0x30a0, 0x30ff, Katakana),
    (0x3400, 0x4dbf, Han),
    (0x4e00, 0x9fff, Han),
    (0xa720, 0xa7ff, Latin),
    (0xac00, 0xd7af, Hangul),
    (0xf900, 0xfaff, Han),
];
