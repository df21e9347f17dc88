//! Approximate location of a snippet inside a longer context
//!
//! A direct substring hit is returned as-is. Otherwise the snippet is cut into
//! fixed-width windows, each window is searched for in the context, and the
//! hit is confirmed only when three consecutive located windows lie within one
//! snippet length of each other. All offsets are in characters.

use serde::Serialize;

/// Window width used when none is given
pub const DEFAULT_SPAN: usize = 20;

/// Minimum number of located windows that confirm a fuzzy hit
const MIN_ANCHORS: usize = 3;

/// Region of the context matched by a snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzyMatch {
    pub text: String,
    /// Start offset in characters
    pub start: usize,
    /// End offset in characters (exclusive)
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    /// Window number within the snippet
    window: usize,
    /// Character offset of the window in the context
    position: usize,
    len: usize,
}

/// Find `snippet` in `context`, tolerating local edits
///
/// Smaller `span` values are more precise but search more windows.
pub fn fuzzy_search(snippet: &str, context: &str, span: usize) -> Option<FuzzyMatch> {
    let snippet: Vec<char> = snippet.trim().chars().collect();
    if snippet.is_empty() {
        return None;
    }
    let context: Vec<char> = context.chars().collect();

    if let Some(start) = find_chars(&context, &snippet) {
        return Some(FuzzyMatch {
            text: snippet.iter().collect(),
            start,
            end: start + snippet.len(),
        });
    }

    let span = span.max(1);
    let anchors: Vec<Anchor> = snippet
        .chunks(span)
        .enumerate()
        .filter_map(|(window, chars)| {
            find_chars(&context, chars).map(|position| Anchor {
                window,
                position,
                len: chars.len(),
            })
        })
        .collect();

    let verified = verify_anchors(&anchors, snippet.len())?;

    let first = verified[0];
    let start = first
        .position
        .checked_sub(first.window * span)
        .unwrap_or(first.position);
    let end = verified
        .iter()
        .filter(|a| a.position > start && a.position - start < snippet.len())
        .map(|a| a.position + a.len)
        .max()?;

    Some(FuzzyMatch {
        text: context[start..end].iter().collect(),
        start,
        end,
    })
}

/// Drop leading anchors until three consecutive ones fit within one snippet length
fn verify_anchors(anchors: &[Anchor], snippet_len: usize) -> Option<&[Anchor]> {
    if anchors.len() < MIN_ANCHORS {
        return None;
    }
    (0..=anchors.len() - MIN_ANCHORS)
        .find(|&i| {
            let group = &anchors[i..i + MIN_ANCHORS];
            let lo = group.iter().map(|a| a.position).min().unwrap_or(0);
            let hi = group.iter().map(|a| a.position).max().unwrap_or(0);
            hi - lo <= snippet_len
        })
        .map(|i| &anchors[i..])
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_match() {
        let m = fuzzy_search(" 玉ねぎ ", "豚肉と玉ねぎの炒め物", DEFAULT_SPAN).unwrap();
        assert_eq!(m.text, "玉ねぎ");
        assert_eq!((m.start, m.end), (3, 6));
    }

    #[test]
    fn test_windowed_match_with_edit() {
        let context = "xx the quick brown fox jumps over the lazy dog yy";
        // One character changed in the middle window
        let snippet = "quick brown fox jumpZ over the lazy dog";
        let m = fuzzy_search(snippet, context, 8).unwrap();
        assert!(m.text.starts_with("quick brown"));
        assert!(m.text.ends_with("lazy dog"));
        assert_eq!(m.start, 7);
    }

    #[test]
    fn test_too_few_anchors() {
        let context = "abcdefgh";
        assert!(fuzzy_search("abcdXXXXefgh", context, 4).is_none());
    }

    #[test]
    fn test_no_match() {
        assert!(fuzzy_search("牛乳", "豚肉と玉ねぎ", DEFAULT_SPAN).is_none());
        assert!(fuzzy_search("", "豚肉", DEFAULT_SPAN).is_none());
    }

    #[test]
    fn test_scattered_anchors_are_rejected() {
        let filler = "-".repeat(100);
        let context = format!("aaaa{filler}bbbb{filler}cccc");
        assert!(fuzzy_search("aaaabbbbccccXXXX", &context, 4).is_none());
    }
}
