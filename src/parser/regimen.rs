//! Dose, frequency, duration and route/form extraction from free-text regimen fields.

use regex::Regex;
use std::sync::LazyLock;

/// "<n> x <amount> <unit>", e.g. "2 x 500 mg".
static DOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+\s*x\s*[0-9]+[.,]?[0-9]*\s*(?:mg|mcg|iu|ml|miligram|gram|g|adet))")
        .expect("valid regex")
});

/// "günde <pattern>", e.g. "günde 2x1".
static FREQUENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(günde\s*[0-9x.,\s]+)").expect("valid regex"));

/// "<n> gün" ("n days").
static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*gün").expect("valid regex"));

/// Route/form keywords checked in order, first hit wins.
///
/// Order matters: a keyword must come before any shorter keyword it contains
/// ("ağızdan katı" before "ağızdan").
pub const FORM_KEYWORDS: &[(&str, &str)] = &[
    ("ağızdan katı", "Ağızdan Katı"),
    ("agizdan kati", "Ağızdan Katı"),
    ("ağızdan kat", "Ağızdan Katı"),
    ("agizdan kat", "Ağızdan Katı"),
    ("ağızdan", "Ağızdan"),
    ("agizdan", "Ağızdan"),
    ("oral", "Oral"),
    ("iv", "IV"),
    ("intravenöz", "IV"),
    ("intravenoz", "IV"),
    ("enjektabl", "Enjektabl"),
    ("subkutan", "SC"),
    ("sc", "SC"),
    ("tablet", "Tablet"),
    ("kapsül", "Kapsül"),
    ("kapsul", "Kapsül"),
    ("katı", "Katı"),
    ("kati", "Katı"),
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegimenInfo {
    pub dose: Option<String>,
    pub frequency: Option<String>,
}

pub fn parse_regimen(text: Option<&str>) -> RegimenInfo {
    match text {
        Some(text) => RegimenInfo {
            dose: extract_dose(text),
            frequency: extract_frequency(text),
        },
        None => RegimenInfo::default(),
    }
}

pub fn extract_dose(text: &str) -> Option<String> {
    DOSE.captures(text).map(|c| collapse_spaces(&c[1]))
}

pub fn extract_frequency(text: &str) -> Option<String> {
    FREQUENCY
        .captures(text)
        .map(|c| collapse_spaces(&c[1]))
        .filter(|s| !s.is_empty())
}

pub fn extract_duration_days(text: &str) -> Option<u32> {
    DURATION.captures(text).and_then(|c| c[1].parse().ok())
}

pub fn extract_form(text: Option<&str>) -> Option<String> {
    let lower = text?.to_lowercase();
    FORM_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(*keyword))
        .map(|(_, label)| label.to_string())
}

pub fn collapse_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
