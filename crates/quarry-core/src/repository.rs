use serde::{Deserialize, Serialize};

use crate::ids::{CommitId, Phid, RepositoryId};
use crate::uri;

/// Version control system backing a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Svn,
    Mercurial,
}

impl VcsKind {
    pub const ALL: [VcsKind; 3] = [VcsKind::Git, VcsKind::Svn, VcsKind::Mercurial];
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Svn => write!(f, "svn"),
            Self::Mercurial => write!(f, "hg"),
        }
    }
}

impl std::str::FromStr for VcsKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(Self::Git),
            "svn" => Ok(Self::Svn),
            "hg" => Ok(Self::Mercurial),
            other => Err(format!("unknown vcs kind: {other}")),
        }
    }
}

/// A commit reference attached to repositories during enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub repository_id: RepositoryId,
    pub identifier: String,
    pub epoch: i64,
}

/// A tracked source-code repository loaded from the registry.
///
/// The `commit_count`, `most_recent_commit`, and `project_phids` fields
/// are derived data living in separate tables; the query engine attaches
/// them when the caller (or the active ordering) asks for them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub phid: Phid,
    pub callsign: Option<String>,
    pub name: String,
    pub vcs: VcsKind,
    pub uuid: Option<String>,
    pub remote_uris: Vec<String>,
    pub tracked: bool,
    pub hosted: bool,
    pub created_at: String,
    pub updated_at: String,
    pub commit_count: Option<u64>,
    pub most_recent_commit: Option<CommitInfo>,
    pub project_phids: Option<Vec<Phid>>,
}

impl Repository {
    /// Canonical forms of this repository's remote URIs under its own
    /// VCS kind. Pure function of (kind, raw URI).
    pub fn normalized_paths(&self) -> Vec<String> {
        self.remote_uris
            .iter()
            .map(|u| uri::normalized_path(self.vcs, u))
            .collect()
    }
}
