pub mod codes;
pub mod drugs;
pub mod regimen;
pub mod table;

use serde::{Deserialize, Serialize};

/// One prescribed drug found in a report.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDrugLine {
    pub raw_line: String,
    /// Upper-cased, never empty.
    pub drug_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

/// Structured fields pulled out of one report's OCR text.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReportMeta {
    pub icd_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_branch: Option<String>,
    pub drug_lines: Vec<ParsedDrugLine>,
}

impl ParsedReportMeta {
    pub fn drug_names(&self) -> impl Iterator<Item = &str> {
        self.drug_lines.iter().map(|d| d.drug_name.as_str())
    }
}

/// Parse OCR text into diagnosis codes, doctor branch and drug lines.
///
/// Never fails: anything that cannot be recognized is left empty.
pub fn parse_report(text: &str) -> ParsedReportMeta {
    ParsedReportMeta {
        icd_codes: codes::parse_icd_codes(text),
        doctor_branch: codes::parse_doctor_branch(text),
        drug_lines: drugs::parse_drug_lines(text),
    }
}
