use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rusqlite::types::Value;

use quarry_core::{Repository, RepositoryId};

use crate::compile::Predicate;
use crate::error::QueryError;
use crate::order::{OrderEntry, SortKey};

// Defensive decode bound for untrusted cursor token input.
const MAX_TOKEN_LEN: usize = 64;

/// Opaque pagination token.
///
/// Wraps the id of the last row of the previous page; the values of the
/// ordering columns are re-derived from that row at execution time, so
/// the token itself stays small and carries no server-side state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor(RepositoryId);

impl Cursor {
    /// Cursor pointing just past the given repository.
    pub fn after(id: RepositoryId) -> Self {
        Self(id)
    }

    pub fn repository_id(&self) -> RepositoryId {
        self.0
    }

    /// The wire form handed to callers.
    pub fn token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_i64().to_string())
    }

    /// Parse a wire token. Tokens are caller-supplied; anything that
    /// does not decode to a numeric id is rejected.
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(QueryError::MalformedCursor("empty token".to_string()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(QueryError::MalformedCursor(format!(
                "token exceeds {MAX_TOKEN_LEN} characters"
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| QueryError::MalformedCursor(e.to_string()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| QueryError::MalformedCursor(e.to_string()))?;
        let id: i64 = text
            .parse()
            .map_err(|_| QueryError::MalformedCursor(format!("not a row id: {text:?}")))?;
        Ok(Self(RepositoryId::from_raw(id)))
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.token())
    }
}

/// Value of one ordering column for the cursor row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PagingValue {
    Int(Option<i64>),
    Text(Option<String>),
}

impl PagingValue {
    fn is_none(&self) -> bool {
        matches!(self, Self::Int(None) | Self::Text(None))
    }

    fn bind(&self) -> Option<Value> {
        match self {
            Self::Int(Some(v)) => Some(Value::Integer(*v)),
            Self::Text(Some(v)) => Some(Value::Text(v.clone())),
            _ => None,
        }
    }
}

/// Re-derive the ordering-column values for a loaded cursor row, by key:
/// `committed` from the attached most-recent commit, `size` from the
/// attached commit count (zero counts as null), the rest from the row's
/// own fields.
pub(crate) fn paging_values(repository: &Repository, entries: &[OrderEntry]) -> Vec<PagingValue> {
    entries
        .iter()
        .map(|entry| match entry.key {
            SortKey::Id => PagingValue::Int(Some(repository.id.as_i64())),
            SortKey::Name => PagingValue::Text(Some(repository.name.clone())),
            SortKey::Callsign => PagingValue::Text(repository.callsign.clone()),
            SortKey::Committed => {
                PagingValue::Int(repository.most_recent_commit.as_ref().map(|c| c.epoch))
            }
            SortKey::Size => PagingValue::Int(
                repository
                    .commit_count
                    .filter(|count| *count > 0)
                    .map(|count| count as i64),
            ),
        })
        .collect()
}

/// Build the keyset boundary predicate: rows strictly after the cursor
/// row in the lexicographic order defined by `entries`, respecting each
/// key's direction and nulls-last policy.
///
/// Expands to an OR of prefix-equality branches:
/// `(k1 after v1) OR (k1 = v1 AND k2 after v2) OR ...`. For a
/// nulls-last key, "after" a non-null value also admits null rows; a
/// branch for a null value is skipped outright (nothing sorts strictly
/// after null within that column, later columns disambiguate).
pub(crate) fn boundary_predicate(entries: &[OrderEntry], values: &[PagingValue]) -> Predicate {
    debug_assert_eq!(entries.len(), values.len());

    let mut branches: Vec<String> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let value = &values[i];
        if value.is_none() {
            continue;
        }

        let mut terms: Vec<String> = Vec::new();
        for (j, prior) in entries[..i].iter().enumerate() {
            let column = prior.key.column();
            match values[j].bind() {
                Some(bind) => {
                    terms.push(format!("{column} = ?"));
                    binds.push(bind);
                }
                None => terms.push(format!("{column} IS NULL")),
            }
        }

        let column = entry.key.column();
        let op = if entry.descending { "<" } else { ">" };
        // bind() is Some here; checked above.
        if let Some(bind) = value.bind() {
            binds.push(bind);
        }
        if entry.key.nullable() {
            terms.push(format!("({column} {op} ? OR {column} IS NULL)"));
        } else {
            terms.push(format!("{column} {op} ?"));
        }

        branches.push(format!("({})", terms.join(" AND ")));
    }

    if branches.is_empty() {
        // Possible only for a vector of all-null values, which the id
        // terminator precludes.
        return Predicate::new("0", Vec::new());
    }

    Predicate::new(format!("({})", branches.join(" OR ")), binds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderVector;
    use quarry_core::{CommitId, CommitInfo, Phid};

    fn repository(id: i64, name: &str) -> Repository {
        Repository {
            id: RepositoryId::from_raw(id),
            phid: Phid::generate(),
            callsign: None,
            name: name.to_string(),
            vcs: quarry_core::VcsKind::Git,
            uuid: None,
            remote_uris: Vec::new(),
            tracked: true,
            hosted: false,
            created_at: String::new(),
            updated_at: String::new(),
            commit_count: None,
            most_recent_commit: None,
            project_phids: None,
        }
    }

    #[test]
    fn token_roundtrip() {
        let cursor = Cursor::after(RepositoryId::from_raw(42));
        let parsed = Cursor::parse(&cursor.token()).unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn malformed_tokens_rejected() {
        for token in ["", "   ", "!!!", "this is not base64"] {
            let err = Cursor::parse(token).unwrap_err();
            assert!(matches!(err, QueryError::MalformedCursor(_)), "token: {token:?}");
        }
        // Valid base64, but not a row id.
        let err = Cursor::parse(&URL_SAFE_NO_PAD.encode("abc")).unwrap_err();
        assert!(matches!(err, QueryError::MalformedCursor(_)));
    }

    #[test]
    fn oversized_token_rejected() {
        let token = "A".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            Cursor::parse(&token),
            Err(QueryError::MalformedCursor(_))
        ));
    }

    #[test]
    fn paging_values_for_missing_enrichment_are_null() {
        let repo = repository(5, "Example");
        let vector = OrderVector::single(SortKey::Committed);
        let values = paging_values(&repo, vector.entries());
        assert_eq!(values, vec![PagingValue::Int(None), PagingValue::Int(Some(5))]);
    }

    #[test]
    fn zero_commit_count_pages_as_null() {
        let mut repo = repository(5, "Example");
        repo.commit_count = Some(0);
        let vector = OrderVector::single(SortKey::Size);
        let values = paging_values(&repo, vector.entries());
        assert_eq!(values[0], PagingValue::Int(None));
    }

    #[test]
    fn committed_value_comes_from_attached_commit() {
        let mut repo = repository(5, "Example");
        repo.most_recent_commit = Some(CommitInfo {
            id: CommitId::from_raw(9),
            repository_id: repo.id,
            identifier: "abc".to_string(),
            epoch: 1234,
        });
        let vector = OrderVector::single(SortKey::Committed);
        let values = paging_values(&repo, vector.entries());
        assert_eq!(values[0], PagingValue::Int(Some(1234)));
    }

    #[test]
    fn boundary_for_ascending_name_vector() {
        let vector = OrderVector::parse(["name"]).unwrap();
        let values = vec![
            PagingValue::Text(Some("Alpha".to_string())),
            PagingValue::Int(Some(1)),
        ];
        let predicate = boundary_predicate(vector.entries(), &values);
        assert_eq!(
            predicate.sql,
            "((r.name > ?) OR (r.name = ? AND r.id < ?))"
        );
        assert_eq!(predicate.binds.len(), 3);
    }

    #[test]
    fn boundary_skips_branch_for_null_value() {
        let vector = OrderVector::single(SortKey::Committed);
        let values = vec![PagingValue::Int(None), PagingValue::Int(Some(7))];
        let predicate = boundary_predicate(vector.entries(), &values);
        // No strict branch on the null committed column; rows after the
        // cursor must also have a null epoch and a smaller id.
        assert_eq!(predicate.sql, "((s.epoch IS NULL AND r.id < ?))");
        assert_eq!(predicate.binds, vec![Value::Integer(7)]);
    }

    #[test]
    fn boundary_admits_nulls_after_non_null_value() {
        let vector = OrderVector::single(SortKey::Committed);
        let values = vec![PagingValue::Int(Some(100)), PagingValue::Int(Some(7))];
        let predicate = boundary_predicate(vector.entries(), &values);
        assert_eq!(
            predicate.sql,
            "(((s.epoch < ? OR s.epoch IS NULL)) OR (s.epoch = ? AND r.id < ?))"
        );
    }
}
