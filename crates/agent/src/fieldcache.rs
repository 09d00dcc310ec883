use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use tickety_core::capability::FailureDetail;
use tickety_core::fields::FieldValueMap;
use tickety_tracker::client::TrackerClient;

#[async_trait]
pub trait FieldSource: Send + Sync {
    async fn fetch(&self) -> Result<FieldValueMap, FailureDetail>;
}

/// Field source backed by the tracker's field catalog endpoints.
pub struct TrackerFieldSource {
    tracker: Arc<dyn TrackerClient>,
}

impl TrackerFieldSource {
    pub fn new(tracker: Arc<dyn TrackerClient>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl FieldSource for TrackerFieldSource {
    async fn fetch(&self) -> Result<FieldValueMap, FailureDetail> {
        self.tracker.fetch_field_catalog().await.map_err(FailureDetail::from)
    }
}

/// Process-wide memoized snapshot of the tracker's enumerated field values.
///
/// Invariant: at most one live upstream fetch per process lifetime,
/// regardless of call concurrency. `OnceCell::get_or_try_init` provides the
/// single-flight guard; a failed first fetch leaves the cell empty so a
/// later invocation can retry, and a populated cell is never refreshed.
pub struct FieldValueCache {
    cell: OnceCell<FieldValueMap>,
    source: Arc<dyn FieldSource>,
}

impl FieldValueCache {
    pub fn new(source: Arc<dyn FieldSource>) -> Self {
        Self { cell: OnceCell::new(), source }
    }

    /// A cache whose snapshot is already present; no upstream fetch will
    /// ever run.
    pub fn preloaded(snapshot: FieldValueMap) -> Self {
        struct Unreachable;

        #[async_trait]
        impl FieldSource for Unreachable {
            async fn fetch(&self) -> Result<FieldValueMap, FailureDetail> {
                Err(FailureDetail::message("preloaded cache must not fetch"))
            }
        }

        let cell = OnceCell::new();
        cell.set(snapshot).ok();
        Self { cell, source: Arc::new(Unreachable) }
    }

    pub async fn get(&self) -> Result<&FieldValueMap, FailureDetail> {
        self.cell
            .get_or_try_init(|| async {
                let snapshot = self.source.fetch().await?;
                info!(
                    event_name = "fieldcache.populated",
                    issue_types = snapshot.issue_types.len(),
                    priorities = snapshot.priorities.len(),
                    components = snapshot.components.len(),
                    "field value snapshot populated"
                );
                Ok(snapshot)
            })
            .await
    }
}
