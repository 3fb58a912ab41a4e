//! Markdown table handling for the "Rapor Etkin Madde Bilgileri" section.

use super::regimen::{collapse_spaces, extract_form, parse_regimen};
use super::ParsedDrugLine;
use crate::normalize::normalize;
use regex::Regex;
use std::sync::LazyLock;

const SECTION_HEADING: &str = "rapor etkin madde bilgileri";

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{2,}").expect("valid regex"));
static DIVIDER_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-{2,}:?$").expect("valid regex"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__+").expect("valid regex"));
static NON_KEY_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9ığüşöç\s]").expect("valid regex"));

// Label keywords per field, in order of preference. Short labels only match whole words.
const NAME_LABELS: &[&str] = &["adı", "adi", "ad", "ilaç", "ilac", "etkin madde"];
const CODE_LABELS: &[&str] = &["kodu", "kod"];
const FORM_LABELS: &[&str] = &["form"];
const REGIMEN_LABELS: &[&str] = &["tedavi", "şema", "sema"];

fn is_section_heading(line: &str) -> bool {
    normalize(line).contains(SECTION_HEADING)
}

fn mentions_report_info(text: &str) -> bool {
    let n = normalize(text);
    n.contains("rapor") && n.contains("bilgi")
}

/// Contiguous table rows that follow the section heading.
///
/// Blank and prose lines between the heading and the table are skipped; a
/// Markdown heading there means the section has no table. Collection stops at
/// the first blank line, non-row line, or a row that opens another report section.
pub fn section_table_lines<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let Some(idx) = lines.iter().position(|l| is_section_heading(l)) else {
        return Vec::new();
    };

    let mut collected = Vec::new();
    for line in &lines[idx + 1..] {
        let trimmed = line.trim();
        if collected.is_empty() {
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('|') {
                if MARKDOWN_HEADING.is_match(trimmed) {
                    break;
                }
                continue;
            }
            collected.push(*line);
            continue;
        }

        if trimmed.is_empty() || !trimmed.starts_with('|') || mentions_report_info(trimmed) {
            break;
        }
        collected.push(*line);
    }
    collected
}

/// Split table lines into cleaned cells, dropping empty and divider rows.
pub fn parse_grid(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            let inner = line.strip_prefix('|').unwrap_or(line);
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            let has_pipes = inner.contains('|');
            inner
                .split('|')
                .map(clean_cell)
                .filter(|cell| !cell.is_empty() || has_pipes)
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .filter(|row| !is_divider_row(row))
        .collect()
}

fn clean_cell(cell: &str) -> String {
    let without_bold = cell.replace("**", "");
    UNDERSCORE_RUN.replace_all(&without_bold, "").trim().to_string()
}

fn is_divider_row(row: &[String]) -> bool {
    row.iter().all(|cell| {
        let compact: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
        DIVIDER_CELL.is_match(&compact)
    })
}

/// Lower-cased label with punctuation folded to spaces, Turkish letters kept.
fn normalize_key(value: &str) -> String {
    let lower = value.to_lowercase().replace("i\u{307}", "i");
    collapse_spaces(&NON_KEY_CHAR.replace_all(&lower, " "))
}

fn label_matches(key: &str, label: &str) -> bool {
    if label.chars().count() <= 2 {
        key.split_whitespace().any(|word| word == label)
    } else {
        key.contains(label)
    }
}

/// Cell text that reads as a column label. Single-word labels must be whole words
/// so drug names like "COUMADIN" do not count.
fn is_field_label(value: &str) -> bool {
    let key = normalize_key(value);
    [NAME_LABELS, CODE_LABELS, FORM_LABELS, REGIMEN_LABELS]
        .iter()
        .flat_map(|labels| labels.iter())
        .any(|label| {
            if label.contains(' ') {
                key.contains(label)
            } else {
                key.split_whitespace().any(|word| word == *label)
            }
        })
}

/// Whether the first row is a column header ("İlaç Adı | Tedavi Şeması") rather than a label/value pair.
pub fn starts_with_header_row(rows: &[Vec<String>]) -> bool {
    match rows.first() {
        Some(first) if first.len() >= 2 => first.iter().all(|cell| is_field_label(cell)),
        _ => false,
    }
}

/// First key matching a label, trying labels in preference order.
fn find_column(keys: &[String], labels: &[&str], skip: Option<usize>) -> Option<usize> {
    labels.iter().find_map(|label| {
        keys.iter()
            .enumerate()
            .find(|(i, key)| Some(*i) != skip && label_matches(key, label))
            .map(|(i, _)| i)
    })
}

struct Columns {
    name: Option<usize>,
    code: Option<usize>,
    form: Option<usize>,
    regimen: Option<usize>,
}

impl Columns {
    fn locate(keys: &[String]) -> Self {
        let code = find_column(keys, CODE_LABELS, None);
        Columns {
            // "Etkin Madde Kodu" also reads as a name label; the code column is never the name.
            name: find_column(keys, NAME_LABELS, code),
            code,
            form: find_column(keys, FORM_LABELS, None),
            regimen: find_column(keys, REGIMEN_LABELS, None),
        }
    }
}

fn cell_value(row: &[String], idx: Option<usize>) -> Option<&str> {
    let value = row.get(idx?)?.trim();
    (!value.is_empty()).then_some(value)
}

fn normalize_drug_name(value: Option<&str>) -> Option<String> {
    let collapsed = collapse_spaces(value?);
    (!collapsed.is_empty()).then(|| collapsed.to_uppercase())
}

/// Name from a code cell such as "SGKFX3 METFORMİN", without the leading SGK code.
fn derive_drug_name(code: Option<&str>) -> Option<String> {
    let trimmed = code?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() > 1 && parts[0].to_lowercase().starts_with("sgk") {
        return Some(parts[1..].join(" "));
    }
    Some(trimmed.to_string())
}

fn build_drug(
    raw_line: String,
    name: Option<&str>,
    code: Option<&str>,
    form_text: Option<&str>,
    regimen: Option<&str>,
) -> Option<ParsedDrugLine> {
    let drug_name = match normalize_drug_name(name) {
        Some(n) => n,
        None => normalize_drug_name(derive_drug_name(code).as_deref())?,
    };
    let info = parse_regimen(regimen);
    Some(ParsedDrugLine {
        raw_line,
        drug_name,
        form: extract_form(form_text.or(regimen)),
        dose: info.dose,
        frequency: info.frequency,
        duration_days: None,
    })
}

/// One drug described by a two-column "label | value" table.
pub fn build_from_key_value(rows: &[Vec<String>]) -> Option<ParsedDrugLine> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for row in rows {
        if row.len() < 2 {
            continue;
        }
        let key = normalize_key(&row[0]);
        let value = row[1].trim();
        if key.is_empty() || value.is_empty() || mentions_report_info(&key) {
            continue;
        }
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key, value.to_string())),
        }
    }
    if entries.is_empty() {
        return None;
    }

    let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
    let values: Vec<String> = entries.iter().map(|(_, v)| v.clone()).collect();
    let cols = Columns::locate(&keys);

    // A name that is itself a column label means the rows were a header, not data.
    if cell_value(&values, cols.name).is_some_and(is_field_label) {
        return None;
    }

    let raw_line = entries
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(" | ");

    build_drug(
        raw_line,
        cell_value(&values, cols.name),
        cell_value(&values, cols.code),
        cell_value(&values, cols.form),
        cell_value(&values, cols.regimen),
    )
}

/// One drug per data row of a table with a header row.
pub fn build_from_grid(rows: &[Vec<String>]) -> Vec<ParsedDrugLine> {
    if rows.len() <= 1 {
        return Vec::new();
    }
    let header: Vec<String> = rows[0].iter().map(|c| normalize_key(c)).collect();
    let cols = Columns::locate(&header);

    rows[1..]
        .iter()
        .filter_map(|row| {
            build_drug(
                row.join(" | "),
                cell_value(row, cols.name),
                cell_value(row, cols.code),
                cell_value(row, cols.form),
                cell_value(row, cols.regimen),
            )
        })
        .collect()
}
