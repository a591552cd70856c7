use pg_escape::quote_identifier;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema used when a table name is given without one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Errors that can occur while parsing a [`TableName`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableNameError {
    #[error("table name cannot be empty")]
    Empty,
    #[error("table name `{0}` has an empty schema or table part")]
    EmptyPart(String),
}

/// A fully qualified Postgres table name consisting of a schema and table name.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// The schema name containing the table
    pub schema: String,
    /// The name of the table within the schema
    pub name: String,
}

impl TableName {
    pub fn new(schema: String, name: String) -> TableName {
        Self { schema, name }
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

impl FromStr for TableName {
    type Err = TableNameError;

    /// Parses `schema.table` or a bare `table`, which lands in the `public` schema.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TableNameError::Empty);
        }

        let (schema, name) = match s.split_once('.') {
            Some((schema, name)) => (schema.trim(), name.trim()),
            None => (DEFAULT_SCHEMA, s),
        };

        if schema.is_empty() || name.is_empty() {
            return Err(TableNameError::EmptyPart(s.to_string()));
        }

        Ok(TableName::new(schema.to_string(), name.to_string()))
    }
}
