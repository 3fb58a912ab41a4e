use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Failure to bring the reference document into memory.
///
/// Cloneable so a memoized failure can be handed to every waiter of the corpus.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CorpusError {
    #[error("unable to read reference document {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("unable to extract text from reference document {}: {reason}", .path.display())]
    Extract { path: PathBuf, reason: String },
    #[error("reference document {} contains no text", .path.display())]
    Empty { path: PathBuf },
}

/// Anything that can produce the plain text of the reference document.
pub trait ReferenceSource: Send + Sync {
    /// Short description for logs (usually the path).
    fn describe(&self) -> String;

    fn load_text(&self) -> BoxFuture<'_, Result<String, CorpusError>>;
}

/// Reference document on disk. PDFs go through `pdf-extract`, anything else is read as text.
pub struct FileReference {
    path: PathBuf,
}

impl FileReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_pdf(&self) -> bool {
        self.path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("pdf"))
    }

    async fn read(&self) -> Result<String, CorpusError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| CorpusError::Read {
            path: self.path.clone(),
            source: Arc::new(e),
        })?;
        tracing::debug!("Read {} bytes from {:?}", bytes.len(), self.path);

        let text = if self.is_pdf() {
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || extract_pdf_text(&path, &bytes))
                .await
                .map_err(|e| CorpusError::Extract {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })??
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        if text.trim().is_empty() {
            return Err(CorpusError::Empty { path: self.path.clone() });
        }
        Ok(text)
    }
}

impl ReferenceSource for FileReference {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_text(&self) -> BoxFuture<'_, Result<String, CorpusError>> {
        self.read().boxed()
    }
}

/// pdf-extract panics on some malformed documents; turn that into an error.
fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String, CorpusError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(CorpusError::Extract {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(_) => Err(CorpusError::Extract {
            path: path.to_path_buf(),
            reason: "panic during PDF extraction".to_string(),
        }),
    }
}
