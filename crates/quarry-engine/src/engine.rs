use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use quarry_core::{uri, CommitId, Phid, Repository, RepositoryId};
use quarry_store::{row_helpers, Database, StoreError};

use crate::collab::{CommitLookup, ProjectLookup};
use crate::compile::{
    CompiledQuery, Predicate, QueryCompiler, REPOSITORY_COLUMNS, SUMMARY_COLUMNS,
};
use crate::criteria::{HostingFilter, RepositoryCriteria, StatusFilter};
use crate::cursor::{boundary_predicate, paging_values, Cursor};
use crate::error::QueryError;
use crate::identifiers::IdentifierPartition;
use crate::order::{OrderVector, SortKey};
use crate::policy::{AllowAll, VisibilityPolicy};

/// Page-fetch parameters: where to resume and how many rows to return.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 100,
        }
    }
}

impl PageRequest {
    pub fn first(limit: u64) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }

    pub fn resume(cursor: Cursor, limit: u64) -> Self {
        Self {
            cursor: Some(cursor),
            limit,
        }
    }
}

/// One page of query results.
///
/// `identifier_map` is keyed by the original mixed-identifier tokens
/// and populated only from entities that survived post-load filtering;
/// unmatched tokens are simply absent.
#[derive(Clone, Debug)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    pub next_cursor: Option<Cursor>,
    pub identifier_map: HashMap<String, Repository>,
}

/// Executes repository queries as a strictly ordered pipeline:
/// compile, execute, hydrate, filter, reconcile, enrich. Stateless
/// across calls apart from the caller-supplied cursor token.
pub struct RepositoryQueryEngine {
    db: Database,
    commits: Arc<dyn CommitLookup>,
    projects: Arc<dyn ProjectLookup>,
    policy: Arc<dyn VisibilityPolicy>,
}

impl RepositoryQueryEngine {
    /// Engine with store-backed enrichment collaborators and a policy
    /// that admits every row.
    pub fn new(db: Database) -> Self {
        let commits = Arc::new(quarry_store::commits::CommitRepo::new(db.clone()));
        let projects = Arc::new(quarry_store::projects::ProjectRepo::new(db.clone()));
        Self {
            db,
            commits,
            projects,
            policy: Arc::new(AllowAll),
        }
    }

    pub fn with_commit_lookup(mut self, commits: Arc<dyn CommitLookup>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_project_lookup(mut self, projects: Arc<dyn ProjectLookup>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn VisibilityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Run the pipeline for one page.
    #[instrument(skip(self, criteria, request), fields(limit = request.limit))]
    pub fn execute(
        &self,
        criteria: &RepositoryCriteria,
        request: &PageRequest,
    ) -> Result<RepositoryPage, QueryError> {
        let order = &criteria.order;
        // Ordering correctness takes precedence over the caller's
        // enrichment flags: sorting on committed/size needs the summary
        // join and the corresponding attachment either way.
        let need_commits =
            criteria.need_most_recent_commits || order.contains(SortKey::Committed);
        let need_counts = criteria.need_commit_counts || order.contains(SortKey::Size);
        let join_summary = need_commits || need_counts;

        let boundary = match &request.cursor {
            Some(cursor) => Some(self.cursor_boundary(cursor, criteria)?),
            None => None,
        };

        let compiled = QueryCompiler::new(
            criteria,
            join_summary,
            boundary,
            self.policy.where_predicate(),
            request.limit.saturating_add(1),
        )
        .compile();

        let mut rows = self.load_rows(&compiled, join_summary)?;

        // One extra row was requested to detect whether more pages
        // exist. The cursor advances to the last *loaded* row so
        // post-load filtering can never skip entities across a page
        // boundary.
        let next_cursor = if (rows.len() as u64) > request.limit {
            rows.truncate(request.limit as usize);
            rows.last().map(|row| Cursor::after(row.repository.id))
        } else {
            None
        };

        let mut repositories = self.assemble(rows, need_counts, need_commits)?;
        self.filter_page(criteria, &mut repositories);
        let identifier_map = reconcile_identifiers(&criteria.identifiers, &repositories);
        if criteria.need_project_phids {
            self.attach_projects(&mut repositories)?;
        }

        debug!(
            count = repositories.len(),
            has_more = next_cursor.is_some(),
            "query page assembled"
        );

        Ok(RepositoryPage {
            repositories,
            next_cursor,
            identifier_map,
        })
    }

    /// Rebuild the keyset boundary for a cursor by reloading the row it
    /// references and re-deriving the ordering-column values from it.
    fn cursor_boundary(
        &self,
        cursor: &Cursor,
        criteria: &RepositoryCriteria,
    ) -> Result<Predicate, QueryError> {
        let order = &criteria.order;
        let object = self.load_cursor_object(cursor, order)?;
        let values = paging_values(&object, order.entries());
        Ok(boundary_predicate(order.entries(), &values))
    }

    fn load_cursor_object(
        &self,
        cursor: &Cursor,
        order: &OrderVector,
    ) -> Result<Repository, QueryError> {
        let join_summary = order.requires_summary();

        let mut sql = format!("SELECT {REPOSITORY_COLUMNS}");
        if join_summary {
            sql.push_str(&format!(", {SUMMARY_COLUMNS}"));
        }
        sql.push_str(" FROM repositories r");
        if join_summary {
            sql.push_str(" LEFT JOIN repository_summary s ON s.repository_id = r.id");
        }
        sql.push_str(" WHERE r.id = ?");

        let id = cursor.repository_id();
        let row = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([id.as_i64()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_loaded(row, join_summary)?)),
                None => Ok(None),
            }
        })?;

        let row = row.ok_or(QueryError::CursorObjectMissing(id))?;
        let mut repositories = self.assemble(
            vec![row],
            order.contains(SortKey::Size),
            order.contains(SortKey::Committed),
        )?;
        Ok(repositories.remove(0))
    }

    fn load_rows(
        &self,
        compiled: &CompiledQuery,
        join_summary: bool,
    ) -> Result<Vec<LoadedRow>, QueryError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&compiled.sql)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(compiled.binds.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_loaded(row, join_summary)?);
            }
            Ok(out)
        })?;
        Ok(rows)
    }

    /// Attach summary-derived enrichment. The commit fetch is one
    /// batched call for the whole page.
    fn assemble(
        &self,
        rows: Vec<LoadedRow>,
        need_counts: bool,
        need_commits: bool,
    ) -> Result<Vec<Repository>, QueryError> {
        let commit_map = if need_commits {
            let ids: Vec<CommitId> = rows
                .iter()
                .filter_map(|row| row.last_commit_id)
                .map(CommitId::from_raw)
                .collect();
            if ids.is_empty() {
                HashMap::new()
            } else {
                self.commits.fetch_by_ids(&ids)?
            }
        } else {
            HashMap::new()
        };

        let mut repositories = Vec::with_capacity(rows.len());
        for row in rows {
            let mut repository = row.repository;
            if need_counts {
                repository.commit_count = Some(row.size.unwrap_or(0).max(0) as u64);
            }
            if need_commits {
                repository.most_recent_commit = row
                    .last_commit_id
                    .and_then(|id| commit_map.get(&CommitId::from_raw(id)).cloned());
            }
            repositories.push(repository);
        }
        Ok(repositories)
    }

    /// Filters that cannot be pushed into the store because the flags
    /// are derived, plus the policy post-filter.
    fn filter_page(&self, criteria: &RepositoryCriteria, repositories: &mut Vec<Repository>) {
        repositories.retain(|r| self.policy.can_see(r));

        match criteria.status {
            StatusFilter::Open => repositories.retain(|r| r.tracked),
            StatusFilter::Closed => repositories.retain(|r| !r.tracked),
            StatusFilter::All => {}
        }

        match criteria.hosting {
            HostingFilter::Hosted => repositories.retain(|r| r.hosted),
            HostingFilter::Remote => repositories.retain(|r| !r.hosted),
            HostingFilter::All => {}
        }

        if !criteria.remote_uris.is_empty() {
            // The caller's intended VCS kind is unknown, so match
            // against the union of every scheme's normalization.
            let targets: std::collections::BTreeSet<String> = criteria
                .remote_uris
                .iter()
                .flat_map(|u| uri::all_normalized_paths(u))
                .collect();
            repositories
                .retain(|r| r.normalized_paths().iter().any(|p| targets.contains(p)));
        }
    }

    /// Cross-entity association enrichment: runs after filtering, over
    /// survivors only, as one batched lookup.
    fn attach_projects(&self, repositories: &mut [Repository]) -> Result<(), QueryError> {
        if repositories.is_empty() {
            return Ok(());
        }
        let phids: Vec<Phid> = repositories.iter().map(|r| r.phid.clone()).collect();
        let map = self.projects.associated(&phids)?;
        for repository in repositories.iter_mut() {
            let projects = map
                .get(&repository.phid)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            repository.project_phids = Some(projects);
        }
        Ok(())
    }
}

/// One raw result row: the hydrated entity plus the summary columns
/// that feed enrichment.
struct LoadedRow {
    repository: Repository,
    size: Option<i64>,
    last_commit_id: Option<i64>,
}

fn row_to_loaded(row: &rusqlite::Row<'_>, join_summary: bool) -> Result<LoadedRow, StoreError> {
    let vcs_raw: String = row_helpers::get(row, 4, "repositories", "vcs")?;
    let uris_raw: String = row_helpers::get(row, 6, "repositories", "remote_uris")?;

    let repository = Repository {
        id: RepositoryId::from_raw(row_helpers::get(row, 0, "repositories", "id")?),
        phid: Phid::from_raw(row_helpers::get::<String>(row, 1, "repositories", "phid")?),
        callsign: row_helpers::get_opt(row, 2, "repositories", "callsign")?,
        name: row_helpers::get(row, 3, "repositories", "name")?,
        vcs: row_helpers::parse_enum(&vcs_raw, "repositories", "vcs")?,
        uuid: row_helpers::get_opt(row, 5, "repositories", "uuid")?,
        remote_uris: row_helpers::parse_string_list(&uris_raw, "repositories", "remote_uris")?,
        tracked: row_helpers::get::<i64>(row, 7, "repositories", "tracked")? != 0,
        hosted: row_helpers::get::<i64>(row, 8, "repositories", "hosted")? != 0,
        created_at: row_helpers::get(row, 9, "repositories", "created_at")?,
        updated_at: row_helpers::get(row, 10, "repositories", "updated_at")?,
        commit_count: None,
        most_recent_commit: None,
        project_phids: None,
    };

    let (size, last_commit_id) = if join_summary {
        (
            row_helpers::get_opt(row, 11, "repository_summary", "size")?,
            row_helpers::get_opt(row, 13, "repository_summary", "last_commit_id")?,
        )
    } else {
        (None, None)
    };

    Ok(LoadedRow {
        repository,
        size,
        last_commit_id,
    })
}

/// Rebuild the identifier map from surviving entities. Each original
/// token maps through its own id-space; unmatched tokens stay absent.
fn reconcile_identifiers(
    partition: &IdentifierPartition,
    repositories: &[Repository],
) -> HashMap<String, Repository> {
    let mut map = HashMap::new();
    if partition.is_empty() {
        return map;
    }

    let by_id: HashMap<i64, &Repository> =
        repositories.iter().map(|r| (r.id.as_i64(), r)).collect();
    let by_callsign: HashMap<&str, &Repository> = repositories
        .iter()
        .filter_map(|r| r.callsign.as_deref().map(|c| (c, r)))
        .collect();
    let by_phid: HashMap<&str, &Repository> = repositories
        .iter()
        .map(|r| (r.phid.as_str(), r))
        .collect();

    for token in partition.numeric() {
        if let Ok(id) = token.parse::<i64>() {
            if let Some(repository) = by_id.get(&id) {
                map.insert(token.clone(), (*repository).clone());
            }
        }
    }
    for token in partition.callsigns() {
        if let Some(repository) = by_callsign.get(token.as_str()) {
            map.insert(token.clone(), (*repository).clone());
        }
    }
    for token in partition.phids() {
        if let Some(repository) = by_phid.get(token.as_str()) {
            map.insert(token.clone(), (*repository).clone());
        }
    }
    map
}
