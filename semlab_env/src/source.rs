//! Reference data source abstraction.

use async_trait::async_trait;
use crate::error::EnvError;

/// Single-shot access to static reference files.
///
/// # Implementations
///
/// - **Production**: [`FsReferenceSource`](crate::FsReferenceSource), reads
///   from a directory with `tokio::fs`
/// - **Simulation**: in-memory payload or forced rejection
///
/// # Contract
///
/// Callers issue one request per widget. There is no retry, no timeout and
/// no abort path: an `Err` is final for that widget.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Fetches the document at `path` as UTF-8 text.
    async fn fetch(&self, path: &str) -> Result<String, EnvError>;
}
