use std::collections::{BTreeSet, HashMap};

use tracing::instrument;

use quarry_core::Phid;

use crate::database::Database;
use crate::error::StoreError;

/// Repository-to-project association rows, keyed by global handle on
/// both sides.
pub struct ProjectRepo {
    db: Database,
}

impl ProjectRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Associate a repository with a project. Idempotent.
    #[instrument(skip(self), fields(repository = %repository_phid, project = %project_phid))]
    pub fn link(&self, repository_phid: &Phid, project_phid: &Phid) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO repository_projects (repository_phid, project_phid)
                 VALUES (?1, ?2)",
                rusqlite::params![repository_phid.as_str(), project_phid.as_str()],
            )?;
            Ok(())
        })
    }

    /// Load the associated project handles for a set of repositories in
    /// one query. Repositories without associations are absent from the
    /// returned map.
    #[instrument(skip(self, phids), fields(count = phids.len()))]
    pub fn associated(&self, phids: &[Phid]) -> Result<HashMap<Phid, BTreeSet<Phid>>, StoreError> {
        if phids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; phids.len()].join(", ");
        let sql = format!(
            "SELECT repository_phid, project_phid FROM repository_projects
             WHERE repository_phid IN ({placeholders})"
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows =
                stmt.query(rusqlite::params_from_iter(phids.iter().map(Phid::as_str)))?;
            let mut out: HashMap<Phid, BTreeSet<Phid>> = HashMap::new();
            while let Some(row) = rows.next()? {
                let repository: String = row.get(0)?;
                let project: String = row.get(1)?;
                out.entry(Phid::from_raw(repository))
                    .or_default()
                    .insert(Phid::from_raw(project));
            }
            Ok(out)
        })
    }
}
