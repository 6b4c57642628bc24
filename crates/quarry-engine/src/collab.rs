//! Enrichment collaborator interfaces.
//!
//! The engine consumes these at their boundary only: each call is a
//! single batch for the whole entity set, never one call per entity.
//! Store-backed implementations are provided for the registry's own
//! tables; deployments with out-of-process services substitute their
//! own.

use std::collections::{BTreeSet, HashMap};

use quarry_core::{CommitId, CommitInfo, Phid};
use quarry_store::commits::CommitRepo;
use quarry_store::projects::ProjectRepo;

use crate::error::QueryError;

/// Batched lookup of commit records referenced by summary rows.
pub trait CommitLookup: Send + Sync {
    fn fetch_by_ids(&self, ids: &[CommitId]) -> Result<HashMap<CommitId, CommitInfo>, QueryError>;
}

/// Batched lookup of project handles associated with repositories.
pub trait ProjectLookup: Send + Sync {
    fn associated(&self, phids: &[Phid]) -> Result<HashMap<Phid, BTreeSet<Phid>>, QueryError>;
}

impl CommitLookup for CommitRepo {
    fn fetch_by_ids(&self, ids: &[CommitId]) -> Result<HashMap<CommitId, CommitInfo>, QueryError> {
        Ok(CommitRepo::fetch_by_ids(self, ids)?)
    }
}

impl ProjectLookup for ProjectRepo {
    fn associated(&self, phids: &[Phid]) -> Result<HashMap<Phid, BTreeSet<Phid>>, QueryError> {
        Ok(ProjectRepo::associated(self, phids)?)
    }
}
