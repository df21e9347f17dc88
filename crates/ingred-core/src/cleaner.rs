//! Character-level canonicalization of raw ingredient text
//!
//! Recipe lines mix full-width and half-width forms, decorative bullets and
//! stray whitespace. [`TextCleaner`] folds them onto a single representation:
//!
//! 1. full-width ASCII (U+FF01..=U+FF5E) is shifted to half-width
//! 2. whitespace and decorative symbols are dropped
//! 3. the result is lower-cased
//!
//! Every step maps into a set the earlier steps leave untouched, so
//! `clean(clean(x)) == clean(x)`.

/// Start of the full-width ASCII block (`！`)
const FULL_WIDTH_START: u32 = 0xFF01;

/// End of the full-width ASCII block (`～`)
const FULL_WIDTH_END: u32 = 0xFF5E;

/// Distance between a full-width form and its ASCII counterpart
const FULL_WIDTH_OFFSET: u32 = 0xFEE0;

/// Non-whitespace characters removed by [`remove_symbols`]
///
/// Unicode whitespace (including U+3000 and U+00A0) is removed as well.
pub const DEFAULT_SYMBOLS: &[char] = &[
    '\u{feff}', '\u{a0}', '\u{3000}', '◎', '☆', '◆', '＊', '◉', '〇', '※', '★', '○', '↑', '↓',
    '＝', '✣', '✤', '◇', '■', '▲', '●',
];

/// Map full-width Latin letters, digits and punctuation to half-width
///
/// Characters outside U+FF01..=U+FF5E pass through, so U+3000 survives this step.
pub fn full_to_half(text: &str) -> String {
    text.chars().map(half_width_char).collect()
}

#[inline]
fn half_width_char(c: char) -> char {
    let code = c as u32;
    if (FULL_WIDTH_START..=FULL_WIDTH_END).contains(&code) {
        char::from_u32(code - FULL_WIDTH_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

/// Remove whitespace and the default decorative symbols
pub fn remove_symbols(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !DEFAULT_SYMBOLS.contains(c))
        .collect()
}

/// Canonicalize text with the default symbol set
pub fn clean(text: &str) -> String {
    TextCleaner::default().clean(text)
}

/// Text canonicalizer, optionally removing additional symbols
#[derive(Debug, Clone, Default)]
pub struct TextCleaner {
    extra_symbols: Vec<char>,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also strip the given characters in the symbol step
    ///
    /// Symbols inside the full-width block are stored in their half-width form,
    /// since step 1 has already converted them when step 2 runs.
    pub fn with_extra_symbols(symbols: impl IntoIterator<Item = char>) -> Self {
        let mut extra_symbols: Vec<char> = symbols.into_iter().map(half_width_char).collect();
        extra_symbols.sort_unstable();
        extra_symbols.dedup();
        Self { extra_symbols }
    }

    /// Full-width to half-width, strip symbols, lower-case
    pub fn clean(&self, text: &str) -> String {
        let half = full_to_half(text);
        let stripped: String = half
            .chars()
            .filter(|c| !self.is_removable(*c))
            .collect();
        stripped.to_lowercase()
    }

    #[inline]
    fn is_removable(&self, c: char) -> bool {
        c.is_whitespace() || DEFAULT_SYMBOLS.contains(&c) || self.extra_symbols.contains(&c)
    }
}
