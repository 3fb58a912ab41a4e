use crate::llm::judge::ReportDecision;
use crate::parser::{ParsedDrugLine, ParsedReportMeta};

/// Markdown section for one processed report image.
pub fn render_report_section(file: &str, parsed: &ParsedReportMeta, decision: &ReportDecision) -> String {
    let icds = if parsed.icd_codes.is_empty() {
        "N/A".to_string()
    } else {
        parsed.icd_codes.join(", ")
    };
    let branch = parsed.doctor_branch.as_deref().unwrap_or("N/A");

    let rows = if decision.items.is_empty() {
        "| No drugs parsed | - | - |".to_string()
    } else {
        decision
            .items
            .iter()
            .map(|item| {
                let mark = if item.payable { "✅" } else { "❌" };
                format!("| {} | {} | {} |", item.drug_name, mark, item.reason)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut out = format!(
        "## {}\n\n- ICD codes: {}\n- Doctor branch: {}\n\n| Drug | Payable | Reason |\n| --- | --- | --- |\n{}",
        file, icds, branch, rows
    );

    if !parsed.drug_lines.is_empty() {
        out.push_str("\n\nParsed drugs:\n");
        let lines: Vec<String> = parsed.drug_lines.iter().map(drug_summary).collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

fn drug_summary(drug: &ParsedDrugLine) -> String {
    format!(
        "- {} ({}, {}, {})",
        drug.drug_name,
        drug.form.as_deref().unwrap_or("form N/A"),
        drug.dose.as_deref().unwrap_or("dose N/A"),
        drug.frequency.as_deref().unwrap_or("freq N/A"),
    )
}

/// Whole report: sections separated by a blank line.
pub fn render_report(sections: &[String]) -> String {
    sections.join("\n\n")
}
