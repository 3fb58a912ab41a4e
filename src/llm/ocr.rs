use super::{ChatMessage, ContentPart, ImageUrl, LlmClient};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

const OCR_SYSTEM_PROMPT: &str = "Extract all text from the medical report image. \
Preserve rows/columns as markdown tables where possible. Return plain text/markdown only.";

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OPENAI_API_KEY missing")]
    MissingApiKey,
    #[error("unable to read image {}: {source}", .path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR request failed: {0}")]
    Request(String),
    #[error("Empty OCR response")]
    EmptyResponse,
}

/// Vision-model OCR over an OpenAI-compatible endpoint.
pub struct OcrClient {
    llm: LlmClient,
}

impl OcrClient {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    pub async fn run(&self, image_path: &Path) -> Result<String, OcrError> {
        if !self.llm.has_api_key() {
            return Err(OcrError::MissingApiKey);
        }
        let bytes = tokio::fs::read(image_path).await.map_err(|source| OcrError::ReadImage {
            path: image_path.to_path_buf(),
            source,
        })?;

        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: "Medical report image:".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url(image_path, &bytes),
                    },
                },
            ]),
        ];
        let req = self.llm.build_request(messages, 0.0, None);
        let text = self
            .llm
            .chat(&req)
            .await
            .map_err(|e| OcrError::Request(format!("{:#}", e)))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(OcrError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

fn image_data_url(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes))
}
