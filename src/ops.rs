use std::path::{Path, PathBuf};
use anyhow::Context;
use crate::config::Config;
use crate::llm::judge::{Judge, JudgeReportInput, ReportDecision};
use crate::llm::ocr::OcrClient;
use crate::llm::LlmClient;
use crate::parser;
use crate::render;
use crate::sut::SutIndex;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const DECISIONS_FILE: &str = "raw_decisions.json";
const REPORT_FILE: &str = "report.md";

/// The collaborators one audit run needs.
pub struct Auditor {
    sut: SutIndex,
    ocr: OcrClient,
    judge: Judge,
}

impl Auditor {
    pub fn new(config: &Config, sut: SutIndex) -> Self {
        let ocr = LlmClient::new(&config.ocr.base_url, &config.ocr.model, config.ocr.api_key.clone());
        let judge = LlmClient::new(&config.judge.base_url, &config.judge.model, config.judge.api_key.clone());
        Self {
            sut,
            ocr: OcrClient::new(ocr),
            judge: Judge::new(judge),
        }
    }

    /// OCR, parse, retrieve and judge a single image. Returns the decision and its Markdown section.
    async fn process_image(&self, path: &Path) -> anyhow::Result<(ReportDecision, String)> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        tracing::info!("  -> Running OCR...");
        let ocr_text = self.ocr.run(path).await?;
        tracing::debug!("OCR text for {}: {} chars", file, ocr_text.chars().count());

        let parsed = parser::parse_report(&ocr_text);
        tracing::info!(
            "  -> Parsed {} ICD code(s), {} drug(s)",
            parsed.icd_codes.len(),
            parsed.drug_lines.len()
        );

        let mut sut_matches_by_drug = Vec::with_capacity(parsed.drug_lines.len());
        for drug in parsed.drug_names() {
            let matches = self.sut.find_by_medicine_name(drug).await?;
            sut_matches_by_drug.push((drug.to_string(), matches));
        }

        tracing::info!("  -> Waiting for judgment...");
        let input = JudgeReportInput {
            report_id: file.clone(),
            ocr_text,
            sut_matches_by_drug,
            icd_codes: parsed.icd_codes.clone(),
            doctor_branch: parsed.doctor_branch.clone(),
        };
        let decision = self.judge.judge_report(&input).await?;

        let section = render::render_report_section(&file, &parsed, &decision);
        Ok((decision, section))
    }
}

/// Audit every report image in `input_dir` and write the results to `output_dir`.
pub async fn run_audit(auditor: &Auditor, input_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
    auditor
        .sut
        .ensure_loaded()
        .await
        .context("Failed to load SUT reference document")?;

    let images = list_image_files(input_dir)?;
    if images.is_empty() {
        println!("No image files found in {}", input_dir.display());
        return Ok(());
    }
    tracing::info!("Found {} image(s) in {}", images.len(), input_dir.display());

    let mut decisions = Vec::new();
    let mut sections = Vec::new();

    for path in &images {
        tracing::info!("Processing {}...", path.display());
        match auditor.process_image(path).await {
            Ok((decision, section)) => {
                tracing::info!("  -> {} decision(s) recorded", decision.items.len());
                decisions.push(decision);
                sections.push(section);
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {:#}", path.display(), e);
            }
        }
    }

    write_outputs(output_dir, &decisions, &sections)?;
    println!(
        "Done. {}/{} report(s) written to {} and {}",
        decisions.len(),
        images.len(),
        output_dir.join(REPORT_FILE).display(),
        output_dir.join(DECISIONS_FILE).display()
    );
    Ok(())
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_image_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", dir.display());
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Write `raw_decisions.json` (pretty JSON array) and `report.md`.
pub fn write_outputs(output_dir: &Path, decisions: &[ReportDecision], sections: &[String]) -> anyhow::Result<()> {
    if !output_dir.exists() {
        tracing::info!("Creating output directory: {:?}", output_dir);
        std::fs::create_dir_all(output_dir)?;
    }

    let json = serde_json::to_string_pretty(decisions)?;
    std::fs::write(output_dir.join(DECISIONS_FILE), json)
        .with_context(|| format!("Failed to write {}", DECISIONS_FILE))?;
    std::fs::write(output_dir.join(REPORT_FILE), render::render_report(sections))
        .with_context(|| format!("Failed to write {}", REPORT_FILE))?;
    Ok(())
}
