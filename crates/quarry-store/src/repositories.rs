use chrono::Utc;
use tracing::instrument;

use quarry_core::{Phid, Repository, RepositoryId, VcsKind};

use crate::database::Database;
use crate::error::StoreError;

/// Fields supplied when registering a repository. Everything else
/// (id, phid, timestamps) is assigned by the store.
#[derive(Clone, Debug)]
pub struct NewRepository {
    pub name: String,
    pub callsign: Option<String>,
    pub vcs: VcsKind,
    pub uuid: Option<String>,
    pub remote_uris: Vec<String>,
    pub tracked: bool,
    pub hosted: bool,
}

impl NewRepository {
    pub fn new(name: impl Into<String>, vcs: VcsKind) -> Self {
        Self {
            name: name.into(),
            callsign: None,
            vcs,
            uuid: None,
            remote_uris: Vec::new(),
            tracked: true,
            hosted: false,
        }
    }
}

/// Write-side registry primitives. The query engine only reads; rows
/// are created and updated through this surface by the administrative
/// subsystem (and by tests).
pub struct RepositoryRepo {
    db: Database,
}

impl RepositoryRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a repository and mint its global handle.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub fn create(&self, input: &NewRepository) -> Result<Repository, StoreError> {
        let phid = Phid::generate();
        let now = Utc::now().to_rfc3339();
        let uris_json = serde_json::to_string(&input.remote_uris)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO repositories (phid, callsign, name, vcs, uuid, remote_uris, tracked, hosted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    phid.as_str(),
                    input.callsign,
                    input.name,
                    input.vcs.to_string(),
                    input.uuid,
                    uris_json,
                    input.tracked as i64,
                    input.hosted as i64,
                    now,
                    now,
                ],
            )?;
            let id = RepositoryId::from_raw(conn.last_insert_rowid());

            Ok(Repository {
                id,
                phid: phid.clone(),
                callsign: input.callsign.clone(),
                name: input.name.clone(),
                vcs: input.vcs,
                uuid: input.uuid.clone(),
                remote_uris: input.remote_uris.clone(),
                tracked: input.tracked,
                hosted: input.hosted,
                created_at: now.clone(),
                updated_at: now.clone(),
                commit_count: None,
                most_recent_commit: None,
                project_phids: None,
            })
        })
    }

    /// Flip the tracked flag.
    #[instrument(skip(self), fields(repository_id = %id))]
    pub fn set_tracked(&self, id: RepositoryId, tracked: bool) -> Result<(), StoreError> {
        self.update_flag(id, "tracked", tracked)
    }

    /// Flip the hosted flag.
    #[instrument(skip(self), fields(repository_id = %id))]
    pub fn set_hosted(&self, id: RepositoryId, hosted: bool) -> Result<(), StoreError> {
        self.update_flag(id, "hosted", hosted)
    }

    fn update_flag(&self, id: RepositoryId, column: &str, value: bool) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                &format!("UPDATE repositories SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                rusqlite::params![value as i64, now, id.as_i64()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("repository {id}")));
            }
            Ok(())
        })
    }

    /// Remove a repository and its derived rows.
    #[instrument(skip(self), fields(repository_id = %id))]
    pub fn delete(&self, id: RepositoryId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let phid: Option<String> = conn
                .query_row(
                    "SELECT phid FROM repositories WHERE id = ?1",
                    [id.as_i64()],
                    |row| row.get(0),
                )
                .ok();
            conn.execute(
                "DELETE FROM commits WHERE repository_id = ?1",
                [id.as_i64()],
            )?;
            conn.execute(
                "DELETE FROM repository_summary WHERE repository_id = ?1",
                [id.as_i64()],
            )?;
            if let Some(phid) = phid {
                conn.execute(
                    "DELETE FROM repository_projects WHERE repository_phid = ?1",
                    [phid],
                )?;
            }
            conn.execute("DELETE FROM repositories WHERE id = ?1", [id.as_i64()])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    #[test]
    fn create_assigns_id_and_handle() {
        let repo = RepositoryRepo::new(test_db());
        let mut input = NewRepository::new("Example", VcsKind::Git);
        input.callsign = Some("EX".to_string());
        let created = repo.create(&input).unwrap();
        assert!(created.id.as_i64() > 0);
        assert!(created.phid.as_str().starts_with("PHID-REPO-"));
        assert_eq!(created.callsign.as_deref(), Some("EX"));
        assert!(created.tracked);
    }

    #[test]
    fn duplicate_callsign_rejected() {
        let repo = RepositoryRepo::new(test_db());
        let mut input = NewRepository::new("One", VcsKind::Git);
        input.callsign = Some("X".to_string());
        repo.create(&input).unwrap();
        input.name = "Two".to_string();
        assert!(repo.create(&input).is_err());
    }

    #[test]
    fn set_tracked_updates_row() {
        let db = test_db();
        let repo = RepositoryRepo::new(db.clone());
        let created = repo.create(&NewRepository::new("Example", VcsKind::Git)).unwrap();
        repo.set_tracked(created.id, false).unwrap();

        let tracked: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT tracked FROM repositories WHERE id = ?1",
                    [created.id.as_i64()],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tracked, 0);
    }

    #[test]
    fn set_tracked_missing_repository_fails() {
        let repo = RepositoryRepo::new(test_db());
        let result = repo.set_tracked(RepositoryId::from_raw(999), false);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_row() {
        let db = test_db();
        let repo = RepositoryRepo::new(db.clone());
        let created = repo.create(&NewRepository::new("Example", VcsKind::Git)).unwrap();
        repo.delete(created.id).unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
