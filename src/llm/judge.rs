use super::{ChatMessage, LlmClient, ResponseFormat};
use crate::sut::MatchExcerpt;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are a strict medical auditor working for the Turkish Social Security Institution (SGK). \
You check whether each medical report and its prescribed drugs fully comply with the SUT (Sağlık Uygulama Tebliği) \
reimbursement rules. All explanations and lists MUST be written in Turkish. Always return valid JSON only. \
Do not include markdown or commentary.";

const DECISION_SCHEMA_PROMPT: &str = r#"Return strict JSON with the shape:
{
  "report_id": "<string>",
  "items": [
    {
      "drug_name": "<string>",
      "payable": true | false,
      "reason": "<short rationale referencing SUT or missing info>",
      "missing_criteria": ["<string>", "..."]
    }
  ],
  "global_notes": "<optional summary>"
}
Rules:
1. Items array MUST contain one entry for EVERY drug listed under "Drugs to evaluate".
2. If SUT context is missing, infer from general SUT knowledge; if unsure, set payable=false and explain what documentation is missing.
3. "missing_criteria" must always be present. Use [] when drug is payable with no missing items.
4. All free-text fields ("reason", each value inside "missing_criteria", and "global_notes") MUST be written in Turkish.
5. Keep explanations concise and actionable for a pharmacist."#;

const UNKNOWN_DRUG: &str = "UNKNOWN_DRUG";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DrugDecision {
    pub drug_name: String,
    pub payable: bool,
    pub reason: String,
    pub missing_criteria: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReportDecision {
    pub report_id: String,
    pub items: Vec<DrugDecision>,
    pub global_notes: String,
}

/// Everything the judge sees for one report.
#[derive(Debug, Clone, Default)]
pub struct JudgeReportInput {
    pub report_id: String,
    pub ocr_text: String,
    /// Drug name and its reference excerpts, in report order.
    pub sut_matches_by_drug: Vec<(String, Vec<MatchExcerpt>)>,
    pub icd_codes: Vec<String>,
    pub doctor_branch: Option<String>,
}

impl JudgeReportInput {
    fn drug_names(&self) -> impl Iterator<Item = &str> {
        self.sut_matches_by_drug.iter().map(|(name, _)| name.as_str())
    }
}

/// Asks a reasoning model for per-drug payability decisions.
pub struct Judge {
    llm: LlmClient,
}

impl Judge {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    pub async fn judge_report(&self, input: &JudgeReportInput) -> Result<ReportDecision> {
        if !self.llm.has_api_key() {
            bail!("DEEPSEEK_API_KEY is missing in environment.");
        }

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_message(input)),
        ];
        let req = self
            .llm
            .build_request(messages, 0.1, Some(ResponseFormat::json_object()));
        let content = self.llm.chat(&req).await?;
        if content.trim().is_empty() {
            bail!("LLM returned empty response.");
        }

        let expected = input.sut_matches_by_drug.len();
        parse_decision(&content, &input.report_id, expected)
    }
}

fn build_context_by_drug(matches_by_drug: &[(String, Vec<MatchExcerpt>)]) -> String {
    matches_by_drug
        .iter()
        .map(|(drug, matches)| {
            let contexts = if matches.is_empty() {
                "- No SUT context found.".to_string()
            } else {
                matches
                    .iter()
                    .enumerate()
                    .map(|(i, m)| format!("- [{}] ({}) {}", i + 1, m.location, m.text))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!("Drug: {}\n{}", drug, contexts)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_message(input: &JudgeReportInput) -> String {
    let drugs: Vec<&str> = input.drug_names().collect();

    let icd_line = if input.icd_codes.is_empty() {
        "ICD Codes: N/A".to_string()
    } else {
        format!("ICD Codes: {}", input.icd_codes.join(", "))
    };
    let branch_line = match input.doctor_branch.as_deref() {
        Some(branch) if !branch.is_empty() => format!("Doctor Branch: {}", branch),
        _ => "Doctor Branch: N/A".to_string(),
    };
    let drugs_line = if drugs.is_empty() {
        "Drugs: N/A".to_string()
    } else {
        format!("Drugs: {}", drugs.join(", "))
    };

    let evaluation = if drugs.is_empty() {
        "- None detected in OCR (if this happens, explain why).".to_string()
    } else {
        input
            .sut_matches_by_drug
            .iter()
            .map(|(drug, matches)| format!("- {} (SUT matches: {})", drug, matches.len()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let meta = [icd_line, branch_line, drugs_line].join("\n");
    let context = build_context_by_drug(&input.sut_matches_by_drug);
    let parts: [&str; 14] = [
        "OCR TEXT:",
        &input.ocr_text,
        "",
        "Parsed Meta:",
        &meta,
        "",
        "Drugs to evaluate:",
        &evaluation,
        "",
        "SUT CONTEXT BY DRUG:",
        &context,
        "",
        "Respond with pure JSON matching the required schema described below.",
        DECISION_SCHEMA_PROMPT,
    ];
    parts.join("\n")
}

/// Lenient decode of the model's JSON; missing fields fall back to safe defaults.
pub fn parse_decision(content: &str, report_id: &str, expected_drugs: usize) -> Result<ReportDecision> {
    decode_decision(content, report_id, expected_drugs)
        .map_err(|e| anyhow!("Unable to parse LLM JSON: {}\nRaw content:\n{}", e, content))
}

fn decode_decision(content: &str, report_id: &str, expected_drugs: usize) -> Result<ReportDecision> {
    let parsed: Value = serde_json::from_str(content)?;

    let raw_items = parsed["items"]
        .as_array()
        .or_else(|| parsed["drugs"].as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let items: Vec<DrugDecision> = raw_items.iter().map(decode_item).collect();

    if items.is_empty() && expected_drugs > 0 {
        bail!(
            "LLM returned 0 items even though {} drugs were requested.",
            expected_drugs
        );
    }

    Ok(ReportDecision {
        report_id: non_empty_str(&parsed["report_id"]).unwrap_or(report_id).to_string(),
        items,
        global_notes: non_empty_str(&parsed["global_notes"]).unwrap_or_default().to_string(),
    })
}

fn decode_item(item: &Value) -> DrugDecision {
    let missing_criteria = item["missing_criteria"]
        .as_array()
        .map(|list| {
            list.iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    DrugDecision {
        drug_name: non_empty_str(&item["drug_name"]).unwrap_or(UNKNOWN_DRUG).to_string(),
        payable: truthy(&item["payable"]),
        reason: non_empty_str(&item["reason"]).unwrap_or_default().to_string(),
        missing_criteria,
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// Loose boolean: models sometimes answer `1` or `"true"` instead of `true`.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            !s.is_empty() && !matches!(s.as_str(), "false" | "0" | "no" | "hayır" | "hayir")
        }
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sut::LocationHint;

    fn sample_input() -> JudgeReportInput {
        JudgeReportInput {
            report_id: "rapor1.jpg".to_string(),
            ocr_text: "Tanı: E11.9".to_string(),
            sut_matches_by_drug: vec![
                (
                    "METFORMIN".to_string(),
                    vec![
                        MatchExcerpt { text: "metformin ilk basamak".to_string(), location: LocationHint::Percent(12) },
                        MatchExcerpt { text: "metformin rapor".to_string(), location: LocationHint::Unknown },
                    ],
                ),
                ("PAROL".to_string(), vec![]),
            ],
            icd_codes: vec!["E11.9".to_string(), "I10".to_string()],
            doctor_branch: Some("Endokrinoloji".to_string()),
        }
    }

    #[test]
    fn user_message_lists_meta_and_context() {
        let msg = build_user_message(&sample_input());
        assert!(msg.starts_with("OCR TEXT:\nTanı: E11.9\n\nParsed Meta:\n"));
        assert!(msg.contains("ICD Codes: E11.9, I10\nDoctor Branch: Endokrinoloji\nDrugs: METFORMIN, PAROL"));
        assert!(msg.contains("Drugs to evaluate:\n- METFORMIN (SUT matches: 2)\n- PAROL (SUT matches: 0)"));
        assert!(msg.contains(
            "Drug: METFORMIN\n- [1] (Approx. position 12% of SUT) metformin ilk basamak\n- [2] (Location unknown) metformin rapor\n\nDrug: PAROL\n- No SUT context found."
        ));
        assert!(msg.ends_with("actionable for a pharmacist."));
    }

    #[test]
    fn user_message_without_meta() {
        let msg = build_user_message(&JudgeReportInput {
            report_id: "x".to_string(),
            ocr_text: "okunamadı".to_string(),
            ..Default::default()
        });
        assert!(msg.contains("ICD Codes: N/A\nDoctor Branch: N/A\nDrugs: N/A"));
        assert!(msg.contains("- None detected in OCR (if this happens, explain why)."));
        assert!(msg.contains("SUT CONTEXT BY DRUG:\n\n\nRespond with pure JSON"));
    }

    #[test]
    fn parses_well_formed_decision() {
        let content = r#"{"report_id":"r1","items":[{"drug_name":"METFORMIN","payable":true,"reason":"Uygun","missing_criteria":[]}],"global_notes":"Tamam"}"#;
        let d = parse_decision(content, "fallback", 1).unwrap();
        assert_eq!(d.report_id, "r1");
        assert_eq!(d.global_notes, "Tamam");
        assert_eq!(
            d.items,
            vec![DrugDecision {
                drug_name: "METFORMIN".to_string(),
                payable: true,
                reason: "Uygun".to_string(),
                missing_criteria: vec![],
            }]
        );
    }

    #[test]
    fn fills_defaults_and_accepts_legacy_key() {
        let content = r#"{"drugs":[{"payable":"false","missing_criteria":"yok"},{"drug_name":"PAROL","payable":1,"missing_criteria":["HbA1c"]}]}"#;
        let d = parse_decision(content, "rapor2.png", 2).unwrap();
        assert_eq!(d.report_id, "rapor2.png");
        assert_eq!(d.global_notes, "");
        assert_eq!(d.items[0].drug_name, UNKNOWN_DRUG);
        assert!(!d.items[0].payable);
        assert_eq!(d.items[0].reason, "");
        assert!(d.items[0].missing_criteria.is_empty());
        assert!(d.items[1].payable);
        assert_eq!(d.items[1].missing_criteria, vec!["HbA1c"]);
    }

    #[test]
    fn zero_items_is_error_only_when_drugs_expected() {
        let err = parse_decision(r#"{"items":[]}"#, "r", 3).unwrap_err().to_string();
        assert!(err.contains("0 items even though 3 drugs"));
        assert!(err.contains("Raw content:\n{\"items\":[]}"));

        let d = parse_decision(r#"{"items":[]}"#, "r", 0).unwrap();
        assert!(d.items.is_empty());
    }

    #[test]
    fn invalid_json_carries_raw_content() {
        let err = parse_decision("Here you go: {", "r", 1).unwrap_err().to_string();
        assert!(err.starts_with("Unable to parse LLM JSON:"));
        assert!(err.ends_with("Raw content:\nHere you go: {"));
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let judge = Judge::new(LlmClient::new("http://localhost:1", "deepseek-chat", None));
        let err = judge.judge_report(&sample_input()).await.unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }
}
