//! Read-only queries
//!
//! Every column named in a projection or filter is checked against the
//! current schema before any SQL is built, and values come back decoded
//! according to their column's declared storage type. Nothing here changes
//! the schema.

use crate::schema::{quote_ident, Column};
use crate::session::Session;
use juntdb_core::{Error, Identity, Record, Result, Value, IDENTITY_FIELD};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, ToSql};
use std::sync::Arc;

// ============================================================================
// Projection, rows, filters
// ============================================================================

/// Which columns a query returns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    /// Every column in declaration order, identity first
    #[default]
    All,
    /// The named columns, in the order given
    Only(Vec<String>),
}

impl Columns {
    /// Projection onto `names`
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Columns::Only(names.into_iter().map(Into::into).collect())
    }
}

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value of a column, by case-insensitive name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// Column names, positionally matching [`Row::values`]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in projection order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// The row's identity, if the projection includes `date`
    pub fn identity(&self) -> Option<Identity> {
        match self.get(IDENTITY_FIELD)? {
            Value::Int(i) => Identity::from_u64(u64::try_from(*i).ok()?).ok(),
            _ => None,
        }
    }

    /// Name-keyed form of the row
    pub fn into_record(self) -> Record {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

/// Result of a range scan
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Rows, when zero or several columns were projected
    Rows(Vec<Row>),
    /// Bare values, when exactly one column was projected
    Values(Vec<Value>),
}

impl Selection {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Selection::Rows(rows) => rows.len(),
            Selection::Values(values) => values.len(),
        }
    }

    /// True if nothing matched
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Conjunction of per-column membership tests
///
/// ```
/// use juntdb_engine::Filter;
///
/// // (score IN (5, 10)) AND (dead IN (0))
/// let filter = Filter::new().any_of("score", [5, 10]).any_of("dead", [0]);
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Vec<Value>)>,
}

impl Filter {
    /// Filter that matches nothing yet; add clauses with [`Filter::any_of`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column` to hold one of `allowed`
    ///
    /// A repeated column replaces its earlier clause.
    pub fn any_of<I, V>(mut self, column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = column.into();
        let allowed: Vec<Value> = allowed.into_iter().map(Into::into).collect();
        match self
            .clauses
            .iter_mut()
            .find(|(c, _)| c.eq_ignore_ascii_case(&column))
        {
            Some(clause) => clause.1 = allowed,
            None => self.clauses.push((column, allowed)),
        }
        self
    }

    /// Number of column clauses
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True if there are no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

// ============================================================================
// Query operations
// ============================================================================

impl Session {
    /// Current columns in declaration order
    pub fn columns(&self) -> Result<Vec<Column>> {
        self.schema().columns(&self.conn)
    }

    /// Number of rows
    pub fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table());
        let n: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(Error::storage)?;
        Ok(n as u64)
    }

    /// Values of `columns` in the row with `identity`
    pub fn get_columns(&self, identity: Identity, columns: &[&str]) -> Result<Vec<Value>> {
        if columns.is_empty() {
            return Err(Error::invalid_input("no columns requested"));
        }
        let projection = self.project(&Columns::only(columns.iter().copied()))?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            select_list(&projection),
            self.table(),
            quote_ident(IDENTITY_FIELD)
        );
        let mut rows = self.fetch(&sql, &projection, &[&identity.as_i64()])?;
        match rows.pop() {
            Some(row) => Ok(row.into_values()),
            None => Err(Error::NotFound {
                identity: identity.to_string(),
            }),
        }
    }

    /// Value of one column in the row with `identity`
    pub fn fetch_one(&self, identity: Identity, column: &str) -> Result<Value> {
        let mut values = self.get_columns(identity, &[column])?;
        Ok(values.pop().unwrap_or(Value::Null))
    }

    /// Rows with `lo <= date <= hi`, ascending
    ///
    /// Projecting exactly one column yields [`Selection::Values`].
    pub fn range(&self, lo: Identity, hi: Identity, columns: &Columns) -> Result<Selection> {
        let projection = self.project(columns)?;
        let date = quote_ident(IDENTITY_FIELD);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} BETWEEN ?1 AND ?2 ORDER BY {} ASC",
            select_list(&projection),
            self.table(),
            date,
            date
        );
        let rows = self.fetch(&sql, &projection, &[&lo.as_i64(), &hi.as_i64()])?;
        Ok(match columns {
            Columns::Only(names) if names.len() == 1 => {
                Selection::Values(rows.into_iter().flat_map(Row::into_values).collect())
            }
            _ => Selection::Rows(rows),
        })
    }

    /// Rows where every filtered column holds one of its allowed values,
    /// ascending by identity
    ///
    /// An empty filter is rejected; a clause with no allowed values matches
    /// nothing.
    pub fn match_rows(&self, filter: &Filter, columns: &Columns) -> Result<Vec<Row>> {
        let projection = self.project(columns)?;
        self.run_match(filter, &projection)
    }

    /// Identities of the rows [`Session::match_rows`] would return
    pub fn match_identities(&self, filter: &Filter) -> Result<Vec<Identity>> {
        let projection = self.project(&Columns::only([IDENTITY_FIELD]))?;
        self.run_match(filter, &projection)?
            .iter()
            .map(row_identity)
            .collect()
    }

    /// The `n` most recent rows, newest first
    ///
    /// A projection always starts with `date`.
    pub fn last_n(&self, n: usize, columns: &Columns) -> Result<Vec<Row>> {
        let columns = match columns {
            Columns::All => Columns::All,
            Columns::Only(names) if names.is_empty() => {
                return Err(Error::invalid_input("column projection is empty"));
            }
            Columns::Only(names) => {
                let mut with_date = vec![IDENTITY_FIELD.to_string()];
                with_date.extend(
                    names
                        .iter()
                        .filter(|n| !n.eq_ignore_ascii_case(IDENTITY_FIELD))
                        .cloned(),
                );
                Columns::Only(with_date)
            }
        };
        let projection = self.project(&columns)?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} DESC LIMIT ?1",
            select_list(&projection),
            self.table(),
            quote_ident(IDENTITY_FIELD)
        );
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        self.fetch(&sql, &projection, &[&limit])
    }

    /// [`Session::last_n`] with each row as a name-keyed record
    pub fn last_n_maps(&self, n: usize, columns: &Columns) -> Result<Vec<Record>> {
        Ok(self
            .last_n(n, columns)?
            .into_iter()
            .map(Row::into_record)
            .collect())
    }

    /// Identities of the `n` most recent rows, newest first
    pub fn last_n_identities(&self, n: usize) -> Result<Vec<Identity>> {
        self.last_n(n, &Columns::only([IDENTITY_FIELD]))?
            .iter()
            .map(row_identity)
            .collect()
    }

    /// Identities between two bounds given in either order, ascending
    pub fn dates_in(&self, a: Identity, b: Identity) -> Result<Vec<Identity>> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match self.range(lo, hi, &Columns::only([IDENTITY_FIELD]))? {
            Selection::Values(values) => values.iter().map(value_identity).collect(),
            Selection::Rows(rows) => rows.iter().map(row_identity).collect(),
        }
    }

    // ------------------------------------------------------------------------

    fn table(&self) -> String {
        quote_ident(&self.shared.config.table)
    }

    /// Resolve a projection against the live schema
    fn project(&self, columns: &Columns) -> Result<Vec<Column>> {
        let schema = self.columns()?;
        match columns {
            Columns::All => Ok(schema),
            Columns::Only(names) if names.is_empty() => {
                Err(Error::invalid_input("column projection is empty"))
            }
            Columns::Only(names) => names.iter().map(|name| find(&schema, name)).collect(),
        }
    }

    fn run_match(&self, filter: &Filter, projection: &[Column]) -> Result<Vec<Row>> {
        if filter.is_empty() {
            return Err(Error::invalid_input("match filter has no columns"));
        }
        let schema = self.columns()?;
        let registry = &self.shared.registry;

        let mut clauses = Vec::with_capacity(filter.len());
        let mut params: Vec<SqlValue> = Vec::new();
        for (name, allowed) in &filter.clauses {
            let column = find(&schema, name)?;
            let quoted = quote_ident(&column.name);
            if allowed.is_empty() {
                clauses.push("0".to_string());
                continue;
            }
            let mut alternatives = Vec::new();
            let mut placeholders = Vec::new();
            for value in allowed {
                if value.is_null() {
                    alternatives.push(format!("{} IS NULL", quoted));
                } else {
                    params.push(registry.encode(value)?);
                    placeholders.push(format!("?{}", params.len()));
                }
            }
            if !placeholders.is_empty() {
                alternatives.push(format!("{} IN ({})", quoted, placeholders.join(", ")));
            }
            clauses.push(format!("({})", alternatives.join(" OR ")));
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} ASC",
            select_list(projection),
            self.table(),
            clauses.join(" AND "),
            quote_ident(IDENTITY_FIELD)
        );
        let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        self.fetch(&sql, projection, &bound)
    }

    fn fetch(&self, sql: &str, projection: &[Column], params: &[&dyn ToSql]) -> Result<Vec<Row>> {
        let width = projection.len();
        let mut stmt = self.conn.prepare(sql).map_err(Error::storage)?;
        let raw_rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(Error::storage)?;

        let names: Arc<[String]> = projection.iter().map(|c| c.name.clone()).collect();
        let registry = &self.shared.registry;
        let mut rows = Vec::new();
        for raw in raw_rows {
            let raw = raw.map_err(Error::storage)?;
            let values = raw
                .into_iter()
                .zip(projection)
                .map(|(value, column)| registry.decode(&column.name, value, column.kind))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row {
                columns: Arc::clone(&names),
                values,
            });
        }
        Ok(rows)
    }
}

fn find(schema: &[Column], name: &str) -> Result<Column> {
    schema
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| Error::UnknownColumn {
            column: name.to_string(),
        })
}

fn select_list(projection: &[Column]) -> String {
    projection
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_identity(value: &Value) -> Result<Identity> {
    match value {
        Value::Int(i) if *i >= 0 => Identity::from_u64(*i as u64)
            .map_err(|e| Error::decode(IDENTITY_FIELD, e)),
        other => Err(Error::decode(
            IDENTITY_FIELD,
            format!("identity holds a {} value", other.kind()),
        )),
    }
}

fn row_identity(row: &Row) -> Result<Identity> {
    match row.get(IDENTITY_FIELD) {
        Some(value) => value_identity(value),
        None => Err(Error::decode(IDENTITY_FIELD, "identity not projected")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        Row {
            columns: pairs.iter().map(|(k, _)| k.to_string()).collect(),
            values: pairs.iter().map(|(_, v)| v.clone()).collect(),
        }
    }

    #[test]
    fn test_row_access() {
        let r = row(&[
            ("date", Value::Int(20240101120000000)),
            ("Score", Value::Int(7)),
        ]);
        assert_eq!(r.get("score"), Some(&Value::Int(7)));
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.identity().unwrap().to_string(), "20240101120000000");

        let record = r.into_record();
        assert_eq!(record.get("SCORE"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_filter_replaces_repeated_column() {
        let f = Filter::new().any_of("score", [1]).any_of("SCORE", [2, 3]);
        assert_eq!(f.len(), 1);
        assert_eq!(f.clauses[0].1, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_columns_only() {
        assert_eq!(
            Columns::only(["a", "b"]),
            Columns::Only(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(Columns::default(), Columns::All);
    }

    #[test]
    fn test_value_identity() {
        assert!(value_identity(&Value::Int(-1)).is_err());
        assert!(value_identity(&Value::Text("x".into())).is_err());
        assert_eq!(
            value_identity(&Value::Int(20240101120000000)).unwrap().as_i64(),
            20240101120000000
        );
    }
}
