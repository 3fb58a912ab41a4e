use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// UTF-8 "ı" read back as Latin-1 shows up as "Ä±"; lower-cased it is "ä±".
const MOJIBAKE_DOTLESS_I: &str = "ä±";

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex"));

/// Canonicalize text for substring matching against the reference corpus.
///
/// Lower-cases, strips diacritics after compatibility decomposition, repairs the
/// dotless-i mojibake, turns punctuation into spaces and collapses whitespace.
/// `normalize(normalize(s)) == normalize(s)` holds for every input.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lower = text.to_lowercase().replace(MOJIBAKE_DOTLESS_I, "i");

    // Compatibility decomposition can surface upper-case letters (e.g. U+210C),
    // so lower-case once more after stripping marks.
    let stripped: String = lower
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let spaced = NON_WORD.replace_all(&stripped, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
