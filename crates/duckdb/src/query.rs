//! A small SELECT builder that keeps values out of the SQL text.

use duckdb::types::Value;
use stac_map::DatetimeBounds;

/// The datetime columns used for temporal filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalColumns {
    /// The column holding the start of each row's interval.
    pub start: String,

    /// The column holding the end of each row's interval.
    pub end: String,
}

/// A parameterized `SELECT` statement.
///
/// Identifiers and the source href are quoted into the SQL text; every other
/// value is bound as a `?` parameter.
///
/// # Examples
///
/// ```
/// use stac_map_duckdb::Query;
///
/// let query = Query::new("read_parquet('items.parquet')")
///     .select(["id"])
///     .filter("id = ?", ["an-id".to_string()])
///     .limit(1);
/// let (sql, params) = query.build();
/// assert_eq!(sql, "SELECT id FROM read_parquet('items.parquet') WHERE id = ? LIMIT 1");
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    from: String,
    columns: Vec<String>,
    wheres: Vec<String>,
    params: Vec<Value>,
    limit: Option<u64>,
}

impl Query {
    /// Creates a query over a table expression.
    pub fn new(from: impl ToString) -> Query {
        Query {
            from: from.to_string(),
            columns: Vec::new(),
            wheres: Vec::new(),
            params: Vec::new(),
            limit: None,
        }
    }

    /// Adds select expressions.
    pub fn select<I, S>(mut self, columns: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.columns
            .extend(columns.into_iter().map(|column| column.to_string()));
        self
    }

    /// Adds a `WHERE` clause, joined with `AND`, and its parameters.
    pub fn filter<I, V>(mut self, clause: impl ToString, params: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(clause.to_string());
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Keeps rows whose interval overlaps `bounds`.
    ///
    /// Open ends of `bounds` add no clause.
    pub fn filter_datetime(mut self, columns: &TemporalColumns, bounds: &DatetimeBounds) -> Query {
        if let Some(start) = bounds.start {
            self = self.filter(
                format!("{}::TIMESTAMPTZ >= ?::TIMESTAMPTZ", quote_identifier(&columns.end)),
                [start.to_rfc3339()],
            );
        }
        if let Some(end) = bounds.end {
            self = self.filter(
                format!("{}::TIMESTAMPTZ <= ?::TIMESTAMPTZ", quote_identifier(&columns.start)),
                [end.to_rfc3339()],
            );
        }
        self
    }

    /// Sets the `LIMIT`.
    pub fn limit(mut self, limit: impl Into<Option<u64>>) -> Query {
        self.limit = limit.into();
        self
    }

    /// Returns the SQL text and its parameters.
    pub fn build(&self) -> (String, &[Value]) {
        let mut sql = format!(
            "SELECT {} FROM {}",
            if self.columns.is_empty() {
                "*".to_string()
            } else {
                self.columns.join(", ")
            },
            self.from
        );
        if !self.wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.wheres.join(" AND ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, &self.params)
    }
}

/// Quotes an identifier, doubling any embedded double quotes.
///
/// # Examples
///
/// ```
/// assert_eq!(stac_map_duckdb::quote_identifier("eo:cloud_cover"), "\"eo:cloud_cover\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes a string literal, doubling any embedded single quotes.
///
/// Used for table function arguments, which can't be bound as parameters.
///
/// # Examples
///
/// ```
/// assert_eq!(stac_map_duckdb::quote_literal("it's.parquet"), "'it''s.parquet'");
/// ```
pub fn quote_literal(literal: &str) -> String {
    format!("'{}'", literal.replace('\'', "''"))
}
