use regex::Regex;
use std::sync::LazyLock;

/// ICD-10 style code: a letter other than U, two digits, optional decimal part.
static ICD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[A-TV-Z]\d{2}(?:\.\d+)?\b").expect("valid regex"));

/// Doctor specialties and the lower-case substrings that identify them.
///
/// Scanned top to bottom and the first specialty with any matching keyword
/// wins, so broader keywords ("enfeksiyon") must not precede a specialty that
/// should take priority over them.
pub const BRANCH_KEYWORDS: &[(&str, &[&str])] = &[
    ("kalp ve damar cerrahisi", &["kalp ve damar", "kvc", "damar cerrah"]),
    (
        "enfeksiyon hastalıkları ve klinik mikrobiyoloji",
        &["enfeksiyon", "mikrobiyoloji"],
    ),
    ("iç hastalıkları", &["iç hastalık", "dahiliye"]),
    ("gastroenteroloji", &["gastroenteroloji", "gastr"]),
    ("romatoloji", &["romatolog", "romatoloji"]),
    ("nefroloji", &["nefroloji", "nefro"]),
    ("endokrinoloji", &["endokrin", "endokrinoloji"]),
    ("kulak burun boğaz", &["kbb", "kulak burun boğaz"]),
];

/// All diagnosis codes in the text, upper-cased, first occurrence order, no duplicates.
pub fn parse_icd_codes(text: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for m in ICD.find_iter(text) {
        let code = m.as_str().to_uppercase();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

pub fn parse_doctor_branch(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    BRANCH_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(*k)))
        .map(|(branch, _)| title_case(branch))
}

/// Capitalize each word with Turkish casing: "iç" becomes "İç", "ılık" becomes "Ilık".
fn title_case(line: &str) -> String {
    line.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some('i') => std::iter::once('İ').chain(chars).collect(),
                Some('ı') => std::iter::once('I').chain(chars).collect(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icd_codes_skip_u_prefix() {
        let codes = parse_icd_codes("Tanı: E11.9, ayrıca J45 ve U07 (ignored)");
        assert_eq!(codes, vec!["E11.9", "J45"]);
    }

    #[test]
    fn icd_codes_are_upper_cased_and_deduplicated() {
        let codes = parse_icd_codes("m05.8 romatoid artrit; M05.8 tekrar; I10 hipertansiyon");
        assert_eq!(codes, vec!["M05.8", "I10"]);
    }

    #[test]
    fn icd_codes_need_word_boundaries() {
        assert!(parse_icd_codes("SGKA123 ve E1234 ve 2E11").is_empty());
        assert!(parse_icd_codes("").is_empty());
    }

    #[test]
    fn branch_from_abbreviation() {
        assert_eq!(
            parse_doctor_branch("KBB polikliniği, Dr. Ayşe").as_deref(),
            Some("Kulak Burun Boğaz")
        );
    }

    #[test]
    fn branch_first_declared_match_wins() {
        // Both "dahiliye" and "nefroloji" appear; internal medicine is declared first.
        let text = "Dahiliye servisi, nefroloji konsültasyonu";
        assert_eq!(parse_doctor_branch(text).as_deref(), Some("İç Hastalıkları"));
    }

    #[test]
    fn branch_missing() {
        assert_eq!(parse_doctor_branch("Genel cerrahi polikliniği"), None);
        assert_eq!(parse_doctor_branch(""), None);
    }

    #[test]
    fn title_case_keeps_spacing() {
        assert_eq!(title_case("kalp ve damar cerrahisi"), "Kalp Ve Damar Cerrahisi");
    }

    #[test]
    fn title_case_uses_turkish_dotted_capital_i() {
        assert_eq!(title_case("iç hastalıkları"), "İç Hastalıkları");
        assert_eq!(title_case("ılık"), "Ilık");
        assert_eq!(parse_doctor_branch("Dahiliye polikliniği").as_deref(), Some("İç Hastalıkları"));
    }
}
