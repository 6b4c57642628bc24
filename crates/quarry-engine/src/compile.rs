use rusqlite::types::Value;

use quarry_store::row_helpers::escape_like;

use crate::criteria::RepositoryCriteria;
use crate::identifiers::IdentifierPartition;
use crate::order::OrderVector;

/// Columns selected for the primary entity, in hydration order.
pub(crate) const REPOSITORY_COLUMNS: &str = "r.id, r.phid, r.callsign, r.name, r.vcs, r.uuid, \
     r.remote_uris, r.tracked, r.hosted, r.created_at, r.updated_at";

/// Columns selected from the summary projection when it is joined.
pub(crate) const SUMMARY_COLUMNS: &str = "s.size, s.epoch, s.last_commit_id";

/// A SQL fragment plus its positional bind values.
#[derive(Clone, Debug)]
pub struct Predicate {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}

/// A fully assembled SELECT statement ready to execute.
#[derive(Clone, Debug)]
pub(crate) struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Compiles one criteria object into a single SELECT over the
/// repository table, optionally joined against the per-repository
/// summary projection.
pub(crate) struct QueryCompiler<'a> {
    criteria: &'a RepositoryCriteria,
    join_summary: bool,
    boundary: Option<Predicate>,
    policy: Option<Predicate>,
    limit: u64,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(
        criteria: &'a RepositoryCriteria,
        join_summary: bool,
        boundary: Option<Predicate>,
        policy: Option<Predicate>,
        limit: u64,
    ) -> Self {
        Self {
            criteria,
            join_summary,
            boundary,
            policy,
            limit,
        }
    }

    pub fn compile(self) -> CompiledQuery {
        let mut sql = format!("SELECT {REPOSITORY_COLUMNS}");
        if self.join_summary {
            sql.push_str(&format!(", {SUMMARY_COLUMNS}"));
        }
        sql.push_str(" FROM repositories r");
        if self.join_summary {
            sql.push_str(" LEFT JOIN repository_summary s ON s.repository_id = r.id");
        }

        let mut binds: Vec<Value> = Vec::new();
        let parts = self.where_parts();
        if !parts.is_empty() {
            let clauses: Vec<&str> = parts.iter().map(|p| p.sql.as_str()).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
            for part in parts {
                binds.extend(part.binds);
            }
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&order_clause(&self.criteria.order));

        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(self.limit as i64));

        CompiledQuery { sql, binds }
    }

    fn where_parts(&self) -> Vec<Predicate> {
        let c = self.criteria;
        let mut parts: Vec<Predicate> = Vec::new();

        // Positive identity predicates. A non-empty mixed-identifier
        // partition replaces all three wholesale (OR-combined), by
        // contract.
        if !c.identifiers.is_empty() {
            parts.push(identifier_override(&c.identifiers));
        } else {
            if !c.ids.is_empty() {
                parts.push(in_clause(
                    "r.id",
                    c.ids.iter().map(|id| Value::Integer(id.as_i64())).collect(),
                ));
            }
            if !c.phids.is_empty() {
                parts.push(in_clause(
                    "r.phid",
                    c.phids
                        .iter()
                        .map(|p| Value::Text(p.as_str().to_string()))
                        .collect(),
                ));
            }
            if !c.callsigns.is_empty() {
                parts.push(in_clause(
                    "r.callsign",
                    c.callsigns.iter().map(|s| Value::Text(s.clone())).collect(),
                ));
            }
        }

        if !c.types.is_empty() {
            parts.push(in_clause(
                "r.vcs",
                c.types
                    .iter()
                    .map(|t| Value::Text(t.to_string()))
                    .collect(),
            ));
        }

        if !c.uuids.is_empty() {
            parts.push(in_clause(
                "r.uuid",
                c.uuids.iter().map(|u| Value::Text(u.clone())).collect(),
            ));
        }

        if let Some(needle) = c.name_contains.as_deref() {
            parts.push(Predicate::new(
                "r.name LIKE ? ESCAPE '\\'",
                vec![Value::Text(format!("%{}%", escape_like(needle)))],
            ));
        }

        if let Some(query) = c.datasource_query.as_deref() {
            let query = query.trim();
            if !query.is_empty() {
                // A leading "r" is the repository reference prefix:
                // "rXYZ" should also find the callsign "XYZ". The full
                // string still matches names.
                let callsign = query.strip_prefix('r').unwrap_or(query);
                parts.push(Predicate::new(
                    "(r.name LIKE ? ESCAPE '\\' OR r.callsign LIKE ? ESCAPE '\\')",
                    vec![
                        Value::Text(format!("%{}%", escape_like(query))),
                        Value::Text(format!("%{}%", escape_like(callsign))),
                    ],
                ));
            }
        }

        // Viewer-visibility and cursor-boundary predicates compose
        // here; they survive the identifier override above.
        if let Some(policy) = &self.policy {
            parts.push(policy.clone());
        }
        if let Some(boundary) = &self.boundary {
            parts.push(boundary.clone());
        }

        parts
    }
}

fn order_clause(order: &OrderVector) -> String {
    let terms: Vec<String> = order
        .entries()
        .iter()
        .map(|entry| {
            let direction = if entry.descending { "DESC" } else { "ASC" };
            let nulls = if entry.key.nullable() {
                " NULLS LAST"
            } else {
                ""
            };
            format!("{} {direction}{nulls}", entry.key.column())
        })
        .collect();
    terms.join(", ")
}

fn in_clause(column: &str, values: Vec<Value>) -> Predicate {
    let placeholders = vec!["?"; values.len()].join(", ");
    Predicate::new(format!("{column} IN ({placeholders})"), values)
}

fn identifier_override(partition: &IdentifierPartition) -> Predicate {
    let mut clauses: Vec<Predicate> = Vec::new();

    let numeric_ids = partition.numeric_ids();
    if !numeric_ids.is_empty() {
        clauses.push(in_clause(
            "r.id",
            numeric_ids.into_iter().map(Value::Integer).collect(),
        ));
    }
    if !partition.callsigns().is_empty() {
        clauses.push(in_clause(
            "r.callsign",
            partition
                .callsigns()
                .iter()
                .map(|s| Value::Text(s.clone()))
                .collect(),
        ));
    }
    if !partition.phids().is_empty() {
        clauses.push(in_clause(
            "r.phid",
            partition
                .phids()
                .iter()
                .map(|s| Value::Text(s.clone()))
                .collect(),
        ));
    }

    if clauses.is_empty() {
        // Every numeric token overflowed and no other sets are present:
        // nothing can match.
        return Predicate::new("0", Vec::new());
    }

    let sql = clauses
        .iter()
        .map(|p| p.sql.as_str())
        .collect::<Vec<_>>()
        .join(" OR ");
    let binds = clauses.into_iter().flat_map(|p| p.binds).collect();
    Predicate::new(format!("({sql})"), binds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::RepositoryCriteria;
    use crate::order::{OrderVector, SortKey};
    use quarry_core::RepositoryId;

    fn compile(criteria: &RepositoryCriteria) -> CompiledQuery {
        QueryCompiler::new(criteria, false, None, None, 101).compile()
    }

    #[test]
    fn bare_criteria_compile_to_ordered_select() {
        let criteria = RepositoryCriteria::builder().build();
        let compiled = compile(&criteria);
        assert_eq!(
            compiled.sql,
            format!("SELECT {REPOSITORY_COLUMNS} FROM repositories r ORDER BY r.id DESC LIMIT ?")
        );
        assert_eq!(compiled.binds.len(), 1);
    }

    #[test]
    fn summary_join_adds_columns_and_join() {
        let criteria = RepositoryCriteria::builder()
            .order(OrderVector::single(SortKey::Committed))
            .build();
        let compiled = QueryCompiler::new(&criteria, true, None, None, 101).compile();
        assert!(compiled.sql.contains("LEFT JOIN repository_summary s"));
        assert!(compiled.sql.contains("s.size, s.epoch, s.last_commit_id"));
        assert!(compiled
            .sql
            .contains("ORDER BY s.epoch DESC NULLS LAST, r.id DESC"));
    }

    #[test]
    fn identifier_partition_overrides_explicit_filters() {
        let criteria = RepositoryCriteria::builder()
            .ids([RepositoryId::from_raw(7)])
            .callsigns(["EXPLICIT"])
            .identifiers(["42", "XYZ"])
            .build();
        let compiled = compile(&criteria);
        assert!(compiled.sql.contains("(r.id IN (?) OR r.callsign IN (?))"));
        // The explicit predicates are gone entirely: one bind per
        // partition member plus the limit.
        assert_eq!(compiled.binds.len(), 3);
    }

    #[test]
    fn name_contains_is_escaped() {
        let criteria = RepositoryCriteria::builder().name_contains("100%").build();
        let compiled = compile(&criteria);
        assert!(compiled.sql.contains("r.name LIKE ? ESCAPE '\\'"));
        assert_eq!(compiled.binds[0], Value::Text("%100\\%%".to_string()));
    }

    #[test]
    fn datasource_query_strips_reference_prefix_for_callsigns() {
        let criteria = RepositoryCriteria::builder()
            .datasource_query("rXYZ")
            .build();
        let compiled = compile(&criteria);
        assert!(compiled
            .sql
            .contains("(r.name LIKE ? ESCAPE '\\' OR r.callsign LIKE ? ESCAPE '\\')"));
        assert_eq!(compiled.binds[0], Value::Text("%rXYZ%".to_string()));
        assert_eq!(compiled.binds[1], Value::Text("%XYZ%".to_string()));
    }

    #[test]
    fn boundary_and_policy_survive_identifier_override() {
        let criteria = RepositoryCriteria::builder().identifiers(["42"]).build();
        let boundary = Predicate::new("(r.id < ?)", vec![Value::Integer(10)]);
        let policy = Predicate::new("r.tracked = 1", Vec::new());
        let compiled =
            QueryCompiler::new(&criteria, false, Some(boundary), Some(policy), 11).compile();
        assert!(compiled.sql.contains("r.id IN (?)"));
        assert!(compiled.sql.contains("r.tracked = 1"));
        assert!(compiled.sql.contains("(r.id < ?)"));
    }

    #[test]
    fn overflowed_numeric_identifiers_match_nothing() {
        let criteria = RepositoryCriteria::builder()
            .identifiers(["99999999999999999999999999"])
            .build();
        let compiled = compile(&criteria);
        assert!(compiled.sql.contains("WHERE 0"));
    }
}
