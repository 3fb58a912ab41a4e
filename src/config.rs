use std::path::PathBuf;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
const DEFAULT_SUT_PATH: &str = "data/SUT.pdf";
const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Endpoint settings for one OpenAI-compatible provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Vision model used for OCR.
    pub ocr: ProviderConfig,
    /// Reasoning model used for payability decisions.
    pub judge: ProviderConfig,
    pub sut_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Config {
    /// Get the application data directory (holds the log file)
    pub fn get_app_data_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("sutaudit");

        if !path.exists() {
            let _ = std::fs::create_dir_all(&path);
        }
        path
    }

    /// Build from process environment (call after `dotenv`).
    pub fn from_env() -> Config {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Config {
            ocr: ProviderConfig {
                base_url: or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                model: or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                api_key: get("OPENAI_API_KEY"),
            },
            judge: ProviderConfig {
                base_url: or("DEEPSEEK_BASE_URL", DEFAULT_DEEPSEEK_BASE_URL),
                model: or("DEEPSEEK_MODEL", DEFAULT_DEEPSEEK_MODEL),
                api_key: get("DEEPSEEK_API_KEY"),
            },
            sut_path: PathBuf::from(or("SUT_PATH", DEFAULT_SUT_PATH)),
            output_dir: PathBuf::from(or("SUTAUDIT_OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
        }
    }
}
