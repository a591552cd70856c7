use pg_escape::quote_identifier;

use crate::TableName;

/// Builds a parameterized insert of one row into `table`.
///
/// Every column is quoted and receives a positional placeholder in the same order, so the
/// values must be bound in the order of `columns`. An empty column list inserts a row of
/// column defaults.
pub fn build_insert_query<S: AsRef<str>>(table: &TableName, columns: &[S]) -> String {
    if columns.is_empty() {
        return format!("insert into {} default values", table.as_quoted_identifier());
    }

    let quoted_columns = columns
        .iter()
        .map(|column| quote_identifier(column.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|index| format!("${index}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "insert into {} ({quoted_columns}) values ({placeholders})",
        table.as_quoted_identifier()
    )
}
