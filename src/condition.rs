//! Structured filters and fetch options passed to a `Finder`.
//!
//! `Conditions` is a conjunction of simple clauses on named fields. It is the
//! only query shape the relationship engine produces, so finders can either
//! evaluate it directly ([`Conditions::matches`]) or render it with sea-query
//! ([`Conditions::select`], [`Conditions::delete`]).

use crate::value::{key_of, key_of_opt, Value};
use sea_query::{
    Asterisk, Condition, DeleteStatement, DynIden, Expr, ExprTrait, Query, SelectStatement,
};

/// One predicate on a named field
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `field = value`
    Eq(String, Value),
    /// `field IN (values)`
    In(String, Vec<Value>),
    /// `field IS NULL`
    IsNull(String),
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Eq(f, _) | Clause::In(f, _) | Clause::IsNull(f) => f,
        }
    }
}

/// Conjunction of clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    clauses: Vec<Clause>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    pub fn is_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.clauses
            .push(Clause::In(field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn is_null(mut self, field: impl Into<String>) -> Self {
        self.clauses.push(Clause::IsNull(field.into()));
        self
    }

    /// Append every clause of `other`.
    pub fn and(mut self, other: &Conditions) -> Self {
        self.clauses.extend(other.clauses.iter().cloned());
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Values constraining `field`, from its first `Eq` or `In` clause.
    pub fn values_for(&self, field: &str) -> Option<Vec<Value>> {
        self.clauses.iter().find_map(|clause| match clause {
            Clause::Eq(f, v) if f == field => Some(vec![v.clone()]),
            Clause::In(f, vs) if f == field => Some(vs.clone()),
            _ => None,
        })
    }

    /// Evaluate against a record whose fields are read through `lookup`.
    ///
    /// `NULL` never equals anything, matching SQL semantics.
    pub fn matches<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.clauses.iter().all(|clause| {
            let actual = lookup(clause.field());
            match clause {
                Clause::Eq(_, expected) => match key_of_opt(actual.as_ref()) {
                    Some(k) => key_of(expected).as_deref() == Some(k.as_str()),
                    None => false,
                },
                Clause::In(_, expected) => match key_of_opt(actual.as_ref()) {
                    Some(k) => expected.iter().any(|v| key_of(v).as_deref() == Some(k.as_str())),
                    None => false,
                },
                Clause::IsNull(_) => key_of_opt(actual.as_ref()).is_none(),
            }
        })
    }

    /// Render as a sea-query `Condition`.
    pub fn to_condition(&self) -> Condition {
        self.clauses
            .iter()
            .fold(Condition::all(), |condition, clause| match clause {
                Clause::Eq(f, v) => condition.add(Expr::col(iden(f)).eq(v.clone())),
                Clause::In(f, vs) => condition.add(Expr::col(iden(f)).is_in(vs.iter().cloned())),
                Clause::IsNull(f) => condition.add(Expr::col(iden(f)).is_null()),
            })
    }

    /// `SELECT` statement fetching matching rows of `table`.
    pub fn select(&self, table: &str, fields: &Fields) -> SelectStatement {
        let mut query = Query::select();
        match fields {
            Fields::All => {
                query.column(Asterisk);
            }
            Fields::Only(names) => {
                query.columns(names.iter().map(|name| iden(name)));
            }
        }
        query.from(iden(table)).cond_where(self.to_condition());
        query
    }

    /// `DELETE` statement removing matching rows of `table`.
    pub fn delete(&self, table: &str) -> DeleteStatement {
        let mut query = Query::delete();
        query.from_table(iden(table)).cond_where(self.to_condition());
        query
    }
}

fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

/// Shape of the records a finder returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnMode {
    /// Hydrated entity handles
    #[default]
    Entities,
    /// Plain associative rows, no hydration
    Rows,
}

/// Field selection for a fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fields {
    #[default]
    All,
    Only(Vec<String>),
}

impl Fields {
    pub fn is_all(&self) -> bool {
        matches!(self, Fields::All)
    }

    /// Ensure `field` is part of a restricted selection.
    pub fn including(self, field: &str) -> Self {
        match self {
            Fields::All => Fields::All,
            Fields::Only(mut names) => {
                if !names.iter().any(|n| n == field) {
                    names.push(field.to_string());
                }
                Fields::Only(names)
            }
        }
    }
}

/// Options forwarded to `Finder::find_all`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub returning: ReturnMode,
    pub fields: Fields,
}

impl FetchOptions {
    pub fn rows() -> Self {
        Self {
            returning: ReturnMode::Rows,
            fields: Fields::All,
        }
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_matches_in_clause() {
        let conditions = Conditions::new().is_in("gallery_id", [1, 2]);
        let hit = record(&[("gallery_id", Value::BigInt(Some(2)))]);
        let miss = record(&[("gallery_id", Value::Int(Some(3)))]);
        assert!(conditions.matches(|f| hit.get(f).cloned()));
        assert!(!conditions.matches(|f| miss.get(f).cloned()));
    }

    #[test]
    fn test_matches_null_semantics() {
        let orphan = record(&[("gallery_id", Value::Int(None))]);
        assert!(!Conditions::new().eq("gallery_id", 1).matches(|f| orphan.get(f).cloned()));
        assert!(Conditions::new().is_null("gallery_id").matches(|f| orphan.get(f).cloned()));
        assert!(Conditions::new().is_null("missing").matches(|f| orphan.get(f).cloned()));
    }

    #[test]
    fn test_and_keeps_clause_order() {
        let user = Conditions::new().eq("title", "Las Vegas");
        let conditions = Conditions::new().is_in("gallery_id", [1]).and(&user);
        assert_eq!(conditions.clauses().len(), 2);
        assert_eq!(conditions.clauses()[0].field(), "gallery_id");
        assert_eq!(conditions.values_for("title"), Some(vec![Value::from("Las Vegas")]));
    }

    #[test]
    fn test_select_renders_in_clause() {
        let (sql, values) = Conditions::new()
            .is_in("gallery_id", [1, 2])
            .select("image", &Fields::All)
            .build(PostgresQueryBuilder);
        assert!(sql.starts_with("SELECT * FROM \"image\""), "unexpected SQL: {sql}");
        assert!(sql.contains("\"gallery_id\" IN ($1, $2)"), "unexpected SQL: {sql}");
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_select_restricted_fields() {
        let fields = Fields::Only(vec!["title".to_string()]).including("gallery_id");
        let (sql, _) = Conditions::new()
            .eq("gallery_id", 1)
            .select("image", &fields)
            .build(PostgresQueryBuilder);
        assert!(sql.contains("\"title\", \"gallery_id\""), "unexpected SQL: {sql}");
    }

    #[test]
    fn test_delete_renders_key_set() {
        let (sql, values) = Conditions::new()
            .is_in("id", [5])
            .delete("image_tag")
            .build(PostgresQueryBuilder);
        assert!(sql.starts_with("DELETE FROM \"image_tag\""), "unexpected SQL: {sql}");
        assert!(sql.contains("\"id\" IN ($1)"), "unexpected SQL: {sql}");
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn test_fields_including_is_idempotent() {
        let fields = Fields::Only(vec!["id".to_string()]).including("id");
        assert_eq!(fields, Fields::Only(vec!["id".to_string()]));
        assert!(Fields::All.including("id").is_all());
    }
}
