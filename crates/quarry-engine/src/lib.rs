//! Read-oriented query engine for the repository registry.
//!
//! Callers build an immutable [`RepositoryCriteria`], hand it to a
//! [`RepositoryQueryEngine`], and get back one ordered page of
//! [`quarry_core::Repository`] entities, an opaque continuation cursor,
//! and (when mixed identifiers were supplied) a token-to-entity lookup
//! map. Filtering that the store can index is compiled into a single
//! SQL query; derived-flag filtering happens after rows hydrate.

pub mod collab;
pub mod compile;
pub mod criteria;
pub mod cursor;
pub mod engine;
mod error;
pub mod identifiers;
pub mod order;
pub mod policy;

pub use collab::{CommitLookup, ProjectLookup};
pub use compile::Predicate;
pub use criteria::{HostingFilter, RepositoryCriteria, RepositoryCriteriaBuilder, StatusFilter};
pub use cursor::Cursor;
pub use engine::{PageRequest, RepositoryPage, RepositoryQueryEngine};
pub use error::QueryError;
pub use identifiers::{classify, IdentifierPartition};
pub use order::{OrderEntry, OrderVector, SortKey};
pub use policy::{AllowAll, VisibilityPolicy};
