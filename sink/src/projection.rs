//! Column/value projections derived from messages by handlers.

use serde_json::Value;

use crate::bail;
use crate::conversions::{Cell, epoch_to_timestamp, parse_iso_timestamp, value_to_cell};
use crate::envelope::Message;
use crate::error::{ErrorKind, SinkResult};

/// Upper bound on the indices probed for indexed field families such as `MediaUrl{i}`.
pub const INDEXED_FIELD_BOUND: usize = 10;

/// An ordered list of columns and the values inserted into them.
///
/// Columns and values always have the same length, a projection with mismatched arity cannot
/// be constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    columns: Vec<String>,
    values: Vec<Cell>,
}

impl Projection {
    /// Creates a projection from parallel column and value lists.
    ///
    /// Returns [`ErrorKind::ArityMismatch`] when the lists differ in length.
    pub fn from_parts(columns: Vec<String>, values: Vec<Cell>) -> SinkResult<Self> {
        if columns.len() != values.len() {
            bail!(
                ErrorKind::ArityMismatch,
                "Projection has a different number of columns and values",
                format!("{} columns, {} values", columns.len(), values.len())
            );
        }

        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Cell>) {
        (self.columns, self.values)
    }
}

/// Builds a [`Projection`] by reading fields from a message.
///
/// Required fields fail the projection when they are absent or null, optional fields are left
/// out of the projection entirely instead of being inserted as null.
#[derive(Debug)]
pub struct ProjectionBuilder<'a> {
    message: &'a Message,
    columns: Vec<String>,
    values: Vec<Cell>,
}

impl<'a> ProjectionBuilder<'a> {
    pub fn new(message: &'a Message) -> Self {
        Self {
            message,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Adds `column` from the field `key`, failing with [`ErrorKind::MissingField`] when absent.
    pub fn require(self, column: &str, key: &str) -> SinkResult<Self> {
        let value = self.required_field(key)?;
        let cell = value_to_cell(value);

        Ok(self.push(column, cell))
    }

    /// Adds `column` from the field `key` when it is present and not null.
    pub fn optional(self, column: &str, key: &str) -> Self {
        match self.present_field(key) {
            Some(value) => {
                let cell = value_to_cell(value);
                self.push(column, cell)
            }
            None => self,
        }
    }

    /// Adds `column` from the field `key` when it is present, not null and not an empty string.
    pub fn non_empty(self, column: &str, key: &str) -> Self {
        match self.present_field(key) {
            Some(Value::String(value)) if value.is_empty() => self,
            _ => self.optional(column, key),
        }
    }

    /// Adds `column` from an ISO-8601 timestamp in the field `key`.
    pub fn require_timestamp(self, column: &str, key: &str) -> SinkResult<Self> {
        let timestamp = match self.required_field(key)? {
            Value::String(value) => parse_iso_timestamp(value)?,
            other => bail!(
                ErrorKind::InvalidField,
                "Timestamp field is not a string",
                format!("field `{key}` holds `{other}`")
            ),
        };

        Ok(self.push(column, Cell::TimestampTz(timestamp)))
    }

    /// Adds `column` from a Unix epoch in seconds in the field `key`.
    pub fn require_epoch(self, column: &str, key: &str) -> SinkResult<Self> {
        let timestamp = epoch_to_timestamp(self.required_field(key)?)?;

        Ok(self.push(column, Cell::TimestampTz(timestamp)))
    }

    /// Adds `column` as JSON from the field `key`, using `default` when it is absent.
    ///
    /// The value is bound as a document for `json` and `jsonb` columns and rendered as JSON
    /// text for textual ones.
    pub fn json_or(self, column: &str, key: &str, default: Value) -> Self {
        let value = self.present_field(key).cloned().unwrap_or(default);

        self.push(column, Cell::Json(value))
    }

    /// Adds the present members of indexed field families.
    ///
    /// For each index below [`INDEXED_FIELD_BOUND`] and each `(column_prefix, key_prefix)` pair,
    /// the field `{key_prefix}{index}` is projected into `{column_prefix}{index}` when present
    /// and not empty. Columns are ordered by index first.
    pub fn optional_indexed(mut self, families: &[(&str, &str)]) -> Self {
        for index in 0..INDEXED_FIELD_BOUND {
            for (column_prefix, key_prefix) in families {
                let column = format!("{column_prefix}{index}");
                let key = format!("{key_prefix}{index}");
                self = self.non_empty(&column, &key);
            }
        }

        self
    }

    /// Adds an explicit value.
    pub fn value(self, column: &str, cell: impl Into<Cell>) -> Self {
        self.push(column, cell.into())
    }

    pub fn build(self) -> Projection {
        Projection {
            columns: self.columns,
            values: self.values,
        }
    }

    fn present_field(&self, key: &str) -> Option<&'a Value> {
        match self.message.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn required_field(&self, key: &str) -> SinkResult<&'a Value> {
        match self.present_field(key) {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::MissingField,
                "Required message field is missing",
                format!("field `{key}` is absent or null")
            ),
        }
    }

    fn push(mut self, column: &str, cell: Cell) -> Self {
        self.columns.push(column.to_owned());
        self.values.push(cell);
        self
    }
}
