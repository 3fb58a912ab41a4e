use super::source::{CorpusError, ReferenceSource};
use crate::normalize::normalize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Normalized full text of the reference document, loaded at most once.
///
/// Concurrent callers that arrive before the first load completes wait on the
/// same initialization; the outcome (text or error) is memoized for the life
/// of the cache and never re-fetched.
pub struct ReferenceCorpus {
    source: Box<dyn ReferenceSource>,
    cell: OnceCell<Result<Arc<str>, CorpusError>>,
}

impl ReferenceCorpus {
    pub fn new(source: impl ReferenceSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cell: OnceCell::new(),
        }
    }

    /// Return the normalized corpus, loading it on first access.
    pub async fn get(&self) -> Result<Arc<str>, CorpusError> {
        self.cell
            .get_or_init(|| async {
                tracing::info!("Loading reference document from {}...", self.source.describe());
                match self.source.load_text().await {
                    Ok(raw) => {
                        let normalized = normalize(&raw);
                        tracing::info!(
                            "Reference document loaded ({} raw chars, {} normalized bytes)",
                            raw.chars().count(),
                            normalized.len()
                        );
                        Ok(Arc::from(normalized))
                    }
                    Err(e) => {
                        tracing::error!("Reference document load failed: {}", e);
                        Err(e)
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether a load has already completed (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        text: Option<&'static str>,
    }

    impl ReferenceSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn load_text(&self) -> BoxFuture<'_, Result<String, CorpusError>> {
            async move {
                self.loads.fetch_add(1, Ordering::SeqCst);
                // Keep the load in flight long enough for the other callers to pile up.
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.text.map(str::to_string).ok_or_else(|| CorpusError::Empty {
                    path: PathBuf::from("SUT.pdf"),
                })
            }
            .boxed()
        }
    }

    fn corpus(text: Option<&'static str>) -> (ReferenceCorpus, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let corpus = ReferenceCorpus::new(CountingSource {
            loads: loads.clone(),
            text,
        });
        (corpus, loads)
    }

    #[tokio::test]
    async fn normalizes_loaded_text() {
        let (corpus, _) = corpus(Some("Ağızdan KATI  form; İLAÇ"));
        assert_eq!(&*corpus.get().await.unwrap(), "agızdan kati form ilac");
    }

    #[tokio::test]
    async fn concurrent_loads_run_once() {
        let (corpus, loads) = corpus(Some("metformin"));
        assert!(!corpus.is_initialized());

        let (a, b, c) = tokio::join!(corpus.get(), corpus.get(), corpus.get());

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
        assert!(corpus.is_initialized());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_loads_across_tasks_run_once() {
        let (corpus, loads) = corpus(Some("metformin"));
        let corpus = Arc::new(corpus);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let corpus = corpus.clone();
                tokio::spawn(async move { corpus.get().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(&*handle.await.unwrap().unwrap(), "metformin");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_memoized_and_shared() {
        let (corpus, loads) = corpus(None);

        let (a, b) = tokio::join!(corpus.get(), corpus.get());
        assert!(matches!(a, Err(CorpusError::Empty { .. })));
        assert!(matches!(b, Err(CorpusError::Empty { .. })));

        assert!(corpus.get().await.is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
