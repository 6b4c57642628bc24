use quarry_core::RepositoryId;
use quarry_store::StoreError;

/// Fatal failures of a query request. There is no partial success:
/// either the whole pipeline completes and returns a page, or the
/// request fails with one of these.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unknown status filter: {0:?}")]
    UnknownStatus(String),

    #[error("unknown hosting filter: {0:?}")]
    UnknownHosting(String),

    #[error("unknown sort key: {0:?}")]
    UnknownSortKey(String),

    #[error("malformed cursor token: {0}")]
    MalformedCursor(String),

    #[error("cursor references repository {0}, which no longer exists")]
    CursorObjectMissing(RepositoryId),

    #[error("enrichment lookup failed: {0}")]
    Enrichment(String),
}
