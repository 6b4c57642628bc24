use serde::{Deserialize, Serialize};

use quarry_core::{Phid, RepositoryId, VcsKind};

use crate::error::QueryError;
use crate::identifiers::{classify, IdentifierPartition};
use crate::order::OrderVector;

/// Tracked-status filter. Applied after rows hydrate: the flag is
/// derived state, not an indexed column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Only tracked repositories.
    Open,
    /// Only untracked repositories.
    Closed,
    #[default]
    All,
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = QueryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(QueryError::UnknownStatus(other.to_string())),
        }
    }
}

/// Hosting filter: whether the canonical copy lives in this system or
/// is mirrored from elsewhere. Also derived, also post-load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingFilter {
    /// Only self-hosted repositories.
    Hosted,
    /// Only remote mirrors.
    Remote,
    #[default]
    All,
}

impl std::fmt::Display for HostingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hosted => write!(f, "hosted"),
            Self::Remote => write!(f, "remote"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for HostingFilter {
    type Err = QueryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted" => Ok(Self::Hosted),
            "remote" => Ok(Self::Remote),
            "all" => Ok(Self::All),
            other => Err(QueryError::UnknownHosting(other.to_string())),
        }
    }
}

/// Immutable description of one registry query. Built once through
/// [`RepositoryCriteriaBuilder`] and read-only from then on; absent
/// fields leave the corresponding dimension unconstrained.
#[derive(Clone, Debug, Default)]
pub struct RepositoryCriteria {
    pub(crate) ids: Vec<RepositoryId>,
    pub(crate) phids: Vec<Phid>,
    pub(crate) callsigns: Vec<String>,
    pub(crate) identifiers: IdentifierPartition,
    pub(crate) types: Vec<VcsKind>,
    pub(crate) uuids: Vec<String>,
    pub(crate) name_contains: Option<String>,
    pub(crate) remote_uris: Vec<String>,
    pub(crate) datasource_query: Option<String>,
    pub(crate) status: StatusFilter,
    pub(crate) hosting: HostingFilter,
    pub(crate) order: OrderVector,
    pub(crate) need_commit_counts: bool,
    pub(crate) need_most_recent_commits: bool,
    pub(crate) need_project_phids: bool,
}

impl RepositoryCriteria {
    pub fn builder() -> RepositoryCriteriaBuilder {
        RepositoryCriteriaBuilder::default()
    }

    pub fn order(&self) -> &OrderVector {
        &self.order
    }

    pub fn identifiers(&self) -> &IdentifierPartition {
        &self.identifiers
    }
}

#[derive(Clone, Debug, Default)]
pub struct RepositoryCriteriaBuilder {
    inner: RepositoryCriteria,
}

impl RepositoryCriteriaBuilder {
    pub fn ids(mut self, ids: impl IntoIterator<Item = RepositoryId>) -> Self {
        self.inner.ids = ids.into_iter().collect();
        self
    }

    pub fn phids(mut self, phids: impl IntoIterator<Item = Phid>) -> Self {
        self.inner.phids = phids.into_iter().collect();
        self
    }

    pub fn callsigns<I, S>(mut self, callsigns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.callsigns = callsigns.into_iter().map(Into::into).collect();
        self
    }

    /// Mixed identifier list (numeric ids, callsigns, global handles in
    /// any combination), classified here. When non-empty this
    /// **overrides** the explicit id/phid/callsign filters in the
    /// compiled WHERE clause; it does not union with them.
    pub fn identifiers<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.identifiers = classify(tokens);
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = VcsKind>) -> Self {
        self.inner.types = types.into_iter().collect();
        self
    }

    pub fn uuids<I, S>(mut self, uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.uuids = uuids.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive substring match on the display name.
    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.inner.name_contains = Some(needle.into());
        self
    }

    pub fn remote_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.remote_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Free-text typeahead query matched against names and callsigns.
    pub fn datasource_query(mut self, query: impl Into<String>) -> Self {
        self.inner.datasource_query = Some(query.into());
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.inner.status = status;
        self
    }

    pub fn hosting(mut self, hosting: HostingFilter) -> Self {
        self.inner.hosting = hosting;
        self
    }

    pub fn order(mut self, order: OrderVector) -> Self {
        self.inner.order = order;
        self
    }

    pub fn need_commit_counts(mut self, need: bool) -> Self {
        self.inner.need_commit_counts = need;
        self
    }

    pub fn need_most_recent_commits(mut self, need: bool) -> Self {
        self.inner.need_most_recent_commits = need;
        self
    }

    pub fn need_project_phids(mut self, need: bool) -> Self {
        self.inner.need_project_phids = need;
        self
    }

    pub fn build(self) -> RepositoryCriteria {
        self.inner
    }
}
