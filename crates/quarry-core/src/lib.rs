pub mod ids;
pub mod repository;
pub mod uri;

pub use ids::{CommitId, Phid, RepositoryId};
pub use repository::{CommitInfo, Repository, VcsKind};
