use super::regimen::{collapse_spaces, extract_dose, extract_duration_days, extract_form, extract_frequency};
use super::table::{build_from_grid, build_from_key_value, parse_grid, section_table_lines, starts_with_header_row};
use super::ParsedDrugLine;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DRUG_LINE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(mg|mcg|iu|ml|miligram|gram|günde|tablet|kapsül|kapsul|ampul|sgk)")
        .expect("valid regex")
});

/// Leading name text (Turkish letters, both dotted and dotless I) after an optional SGK code, up to a wide gap, " - ", " | " or end of line.
static LINE_DRUG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:sgk\w*\s+)?([a-zçğıİöşü0-9+\-/\s]+?)(?:\s{2,}|\s+-\s+|\s\|\s|$)")
        .expect("valid regex")
});

static LEADING_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?").expect("valid regex"));

/// A drug extraction strategy; `None` or an empty list hands over to the next one.
type Strategy = fn(&str) -> Option<Vec<ParsedDrugLine>>;

/// Strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("section table", from_section_table),
    ("line heuristics", from_line_heuristics),
];

pub fn parse_drug_lines(text: &str) -> Vec<ParsedDrugLine> {
    dedupe(first_non_empty(text, STRATEGIES).unwrap_or_default())
}

fn first_non_empty(text: &str, strategies: &[(&str, Strategy)]) -> Option<Vec<ParsedDrugLine>> {
    strategies.iter().find_map(|(name, strategy)| {
        let drugs = strategy(text).filter(|d| !d.is_empty())?;
        tracing::debug!("Drug lines from {}: {}", name, drugs.len());
        Some(drugs)
    })
}

/// Table under the "Rapor Etkin Madde Bilgileri" heading: key/value or grid layout.
pub fn from_section_table(text: &str) -> Option<Vec<ParsedDrugLine>> {
    let lines: Vec<&str> = text.lines().collect();
    let rows = parse_grid(&section_table_lines(&lines));
    let columns = rows.iter().map(Vec::len).max()?;

    if columns <= 2 && !starts_with_header_row(&rows) {
        build_from_key_value(&rows).map(|drug| vec![drug])
    } else {
        Some(build_from_grid(&rows))
    }
}

/// Free-text lines that look like prescriptions (units, frequency, SGK codes).
pub fn from_line_heuristics(text: &str) -> Option<Vec<ParsedDrugLine>> {
    let drugs = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && DRUG_LINE_HINT.is_match(line))
        .filter_map(parse_prescription_line)
        .collect();
    Some(drugs)
}

fn parse_prescription_line(line: &str) -> Option<ParsedDrugLine> {
    let raw_name = LINE_DRUG_NAME.captures(line)?.get(1)?.as_str().trim();
    if raw_name.chars().count() < 3 {
        return None;
    }
    let name = collapse_spaces(LEADING_ORDINAL.replace(raw_name, "").trim());
    if name.is_empty() {
        return None;
    }

    Some(ParsedDrugLine {
        raw_line: line.to_string(),
        drug_name: name.to_uppercase(),
        form: extract_form(Some(line)),
        dose: extract_dose(line),
        frequency: extract_frequency(line),
        duration_days: extract_duration_days(line),
    })
}

/// Keep the first drug per upper-cased name.
fn dedupe(drugs: Vec<ParsedDrugLine>) -> Vec<ParsedDrugLine> {
    let mut seen = HashSet::new();
    drugs
        .into_iter()
        .filter(|d| seen.insert(d.drug_name.to_uppercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(name: &str, raw: &str) -> ParsedDrugLine {
        ParsedDrugLine {
            raw_line: raw.to_string(),
            drug_name: name.to_string(),
            form: None,
            dose: None,
            frequency: None,
            duration_days: None,
        }
    }

    #[test]
    fn grid_table_under_heading() {
        let text = "\
Rapor No: 123
Rapor Etkin Madde Bilgileri
| Etkin Madde Kodu | Etkin Madde Adı | Form | Tedavi Şeması |
|---|---|---|---|
| SGKFX3 | ADALİMUMAB | Enjektabl | 1 x 40 mg, 15 günde 1 |
| SGKB21 | METOTREKSAT | Ağızdan katı | 1 x 15 mg, haftada 1 |

Doktor: Romatoloji uzmanı";
        let drugs = parse_drug_lines(text);
        let names: Vec<&str> = drugs.iter().map(|d| d.drug_name.as_str()).collect();
        assert_eq!(names, vec!["ADALİMUMAB", "METOTREKSAT"]);
        assert_eq!(drugs[1].form.as_deref(), Some("Ağızdan Katı"));
        assert_eq!(drugs[1].dose.as_deref(), Some("1 x 15 mg"));
    }

    #[test]
    fn key_value_table_under_heading() {
        let text = "\
| **Rapor Etkin Madde Bilgileri** | |
| --- | --- |
| Etkin Madde Adı | ETANERSEPT |
| Tedavi Şeması | 2 x 25 mg günde 1 |";
        let drugs = parse_drug_lines(text);
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].drug_name, "ETANERSEPT");
        assert_eq!(drugs[0].dose.as_deref(), Some("2 x 25 mg"));
        assert_eq!(drugs[0].frequency.as_deref(), Some("günde 1"));
    }

    #[test]
    fn falls_back_to_lines_without_heading() {
        let text = "\
Hasta bilgileri
SGKA1234 METFORMIN 1000 MG  90 gün  2 x 1000 mg günde 2x1
Parol tablet - 1 kutu
Kontrol muayenesi";
        let drugs = parse_drug_lines(text);
        assert_eq!(drugs.len(), 2);
        assert_eq!(drugs[0].drug_name, "METFORMIN 1000 MG");
        assert_eq!(drugs[0].dose.as_deref(), Some("2 x 1000 mg"));
        assert_eq!(drugs[0].frequency.as_deref(), Some("günde 2x1"));
        assert_eq!(drugs[0].duration_days, Some(90));
        assert_eq!(drugs[1].drug_name, "PAROL TABLET");
        assert_eq!(drugs[1].form.as_deref(), Some("Tablet"));
    }

    #[test]
    fn dotted_capital_i_stays_in_line_name() {
        let drugs = parse_drug_lines("METFORMİN 1000 mg  günde 2\nADALİMUMAB 40 mg - 15 günde 1");
        let names: Vec<&str> = drugs.iter().map(|d| d.drug_name.as_str()).collect();
        assert_eq!(names, vec!["METFORMİN 1000 MG", "ADALİMUMAB 40 MG"]);
        assert_eq!(drugs[0].frequency.as_deref(), Some("günde 2"));
    }

    #[test]
    fn two_column_table_with_header_row() {
        let text = "\
Rapor Etkin Madde Bilgileri
| İlaç Adı | Tedavi Şeması |
|---|---|
| PARACETAMOL | 2 x 500 mg, günde 2x |";
        let drugs = parse_drug_lines(text);
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].drug_name, "PARACETAMOL");
        assert_eq!(drugs[0].dose.as_deref(), Some("2 x 500 mg"));
        assert!(drugs[0].frequency.as_deref().unwrap().starts_with("günde 2x"));
        assert_eq!(drugs[0].raw_line, "PARACETAMOL | 2 x 500 mg, günde 2x");
    }

    #[test]
    fn heading_without_table_falls_back() {
        let text = "Rapor Etkin Madde Bilgileri\nbilgi yok\n\n1. Aspirin 100 mg  günde 1";
        let drugs = parse_drug_lines(text);
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].drug_name, "ASPIRIN 100 MG");
    }

    #[test]
    fn empty_grid_falls_back() {
        let text = "\
Rapor Etkin Madde Bilgileri
| Form | Tedavi Şeması | Adet |
| | | |
Zoledronik asit 5 mg  yılda 1";
        let drugs = parse_drug_lines(text);
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].drug_name, "ZOLEDRONIK ASIT 5 MG");
    }

    #[test]
    fn short_names_are_discarded() {
        assert!(parse_drug_lines("ab  10 mg").is_empty());
        assert!(parse_drug_lines("12  mg").is_empty());
    }

    #[test]
    fn total_on_arbitrary_input() {
        for text in ["", "\n\n", "|||", "| --- |", "Rapor Etkin Madde Bilgileri", "mg", "😀 mg 😀", "SGK"] {
            for d in parse_drug_lines(text) {
                assert!(!d.drug_name.is_empty());
            }
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let out = dedupe(vec![
            drug("METFORMIN", "first"),
            drug("ASPIRIN", "second"),
            drug("METFORMIN", "third"),
        ]);
        let raws: Vec<&str> = out.iter().map(|d| d.raw_line.as_str()).collect();
        assert_eq!(raws, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_lines_collapse_case_insensitively() {
        let drugs = parse_drug_lines("Parol 500 mg  günde 3\nPAROL 500 MG  günde 2");
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].frequency.as_deref(), Some("günde 3"));
    }

    #[test]
    fn strategies_run_in_order() {
        fn never(_: &str) -> Option<Vec<ParsedDrugLine>> {
            None
        }
        fn empty(_: &str) -> Option<Vec<ParsedDrugLine>> {
            Some(Vec::new())
        }
        fn one(_: &str) -> Option<Vec<ParsedDrugLine>> {
            Some(vec![drug("ONE", "one")])
        }
        fn two(_: &str) -> Option<Vec<ParsedDrugLine>> {
            Some(vec![drug("TWO", "two")])
        }
        let all: &[(&str, Strategy)] = &[("never", never), ("empty", empty), ("one", one), ("two", two)];
        assert_eq!(first_non_empty("", all).unwrap()[0].drug_name, "ONE");

        let nothing: &[(&str, Strategy)] = &[("never", never), ("empty", empty)];
        assert!(first_non_empty("", nothing).is_none());
    }
}
