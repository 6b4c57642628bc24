use std::collections::HashMap;

use tracing::instrument;

use quarry_core::{CommitId, CommitInfo, RepositoryId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Commit records plus upkeep of the per-repository summary projection
/// (commit count, most recent commit, its epoch).
pub struct CommitRepo {
    db: Database,
}

impl CommitRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a commit and fold it into the repository's summary row.
    #[instrument(skip(self), fields(repository_id = %repository_id, identifier))]
    pub fn record(
        &self,
        repository_id: RepositoryId,
        identifier: &str,
        epoch: i64,
    ) -> Result<CommitInfo, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO commits (repository_id, commit_identifier, epoch)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![repository_id.as_i64(), identifier, epoch],
            )?;
            let id = CommitId::from_raw(conn.last_insert_rowid());

            // The summary keeps the commit with the greatest epoch; ties
            // resolve to the most recently recorded commit.
            conn.execute(
                "INSERT INTO repository_summary (repository_id, size, last_commit_id, epoch)
                 VALUES (?1, 1, ?2, ?3)
                 ON CONFLICT(repository_id) DO UPDATE SET
                     size = size + 1,
                     last_commit_id = CASE
                         WHEN excluded.epoch >= COALESCE(epoch, -9223372036854775808)
                         THEN excluded.last_commit_id ELSE last_commit_id END,
                     epoch = CASE
                         WHEN excluded.epoch >= COALESCE(epoch, -9223372036854775808)
                         THEN excluded.epoch ELSE epoch END",
                rusqlite::params![repository_id.as_i64(), id.as_i64(), epoch],
            )?;

            Ok(CommitInfo {
                id,
                repository_id,
                identifier: identifier.to_string(),
                epoch,
            })
        })
    }

    /// Load commit records by id in one query.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn fetch_by_ids(&self, ids: &[CommitId]) -> Result<HashMap<CommitId, CommitInfo>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, repository_id, commit_identifier, epoch FROM commits WHERE id IN ({placeholders})"
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(ids.iter().map(|id| id.as_i64())))?;
            let mut out = HashMap::with_capacity(ids.len());
            while let Some(row) = rows.next()? {
                let commit = row_to_commit(row)?;
                out.insert(commit.id, commit);
            }
            Ok(out)
        })
    }
}

fn row_to_commit(row: &rusqlite::Row<'_>) -> Result<CommitInfo, StoreError> {
    Ok(CommitInfo {
        id: CommitId::from_raw(row_helpers::get(row, 0, "commits", "id")?),
        repository_id: RepositoryId::from_raw(row_helpers::get(
            row,
            1,
            "commits",
            "repository_id",
        )?),
        identifier: row_helpers::get(row, 2, "commits", "commit_identifier")?,
        epoch: row_helpers::get(row, 3, "commits", "epoch")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{NewRepository, RepositoryRepo};
    use quarry_core::VcsKind;

    fn setup() -> (Database, RepositoryId) {
        let db = Database::in_memory().unwrap();
        let repos = RepositoryRepo::new(db.clone());
        let repo = repos.create(&NewRepository::new("Example", VcsKind::Git)).unwrap();
        (db, repo.id)
    }

    fn summary(db: &Database, id: RepositoryId) -> (i64, Option<i64>, Option<i64>) {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT size, last_commit_id, epoch FROM repository_summary WHERE repository_id = ?1",
                [id.as_i64()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn record_creates_summary() {
        let (db, repo_id) = setup();
        let commits = CommitRepo::new(db.clone());
        let commit = commits.record(repo_id, "abc123", 100).unwrap();

        let (size, last, epoch) = summary(&db, repo_id);
        assert_eq!(size, 1);
        assert_eq!(last, Some(commit.id.as_i64()));
        assert_eq!(epoch, Some(100));
    }

    #[test]
    fn summary_tracks_newest_epoch() {
        let (db, repo_id) = setup();
        let commits = CommitRepo::new(db.clone());
        commits.record(repo_id, "first", 100).unwrap();
        let newest = commits.record(repo_id, "second", 300).unwrap();
        commits.record(repo_id, "backfill", 200).unwrap();

        let (size, last, epoch) = summary(&db, repo_id);
        assert_eq!(size, 3);
        assert_eq!(last, Some(newest.id.as_i64()));
        assert_eq!(epoch, Some(300));
    }

    #[test]
    fn fetch_by_ids_is_batched() {
        let (db, repo_id) = setup();
        let commits = CommitRepo::new(db);
        let a = commits.record(repo_id, "a", 1).unwrap();
        let b = commits.record(repo_id, "b", 2).unwrap();

        let map = commits.fetch_by_ids(&[a.id, b.id, CommitId::from_raw(999)]).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&a.id).unwrap().identifier, "a");
        assert_eq!(map.get(&b.id).unwrap().epoch, 2);
    }

    #[test]
    fn fetch_by_ids_empty_input() {
        let (db, _) = setup();
        let commits = CommitRepo::new(db);
        assert!(commits.fetch_by_ids(&[]).unwrap().is_empty());
    }
}
