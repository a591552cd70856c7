use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// A single value bound to an insert parameter.
///
/// Cells are encoded according to the type Postgres infers for the target column, so a
/// textual value extracted from a message can land in an integer or timestamp column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    String(String),
    I64(i64),
    F64(f64),
    TimestampTz(DateTime<Utc>),
    Json(Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::String(value) => f.write_str(value),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::TimestampTz(value) => f.write_str(&value.to_rfc3339()),
            Cell::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::TimestampTz(value)
    }
}

type BoxedError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn unsupported(cell: &Cell, ty: &Type) -> BoxedError {
    format!("cannot encode {cell:?} as a value of type {ty}").into()
}

fn encode_integer(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::INT8 => value.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        _ if is_text(ty) => value.to_string().to_sql(ty, out),
        _ => Err(unsupported(&Cell::I64(value), ty)),
    }
}

fn encode_float(value: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => value.to_sql(ty, out),
        _ if is_text(ty) => value.to_string().to_sql(ty, out),
        _ => Err(unsupported(&Cell::F64(value), ty)),
    }
}

fn encode_timestamp(
    value: &DateTime<Utc>,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::TIMESTAMPTZ => value.to_sql(ty, out),
        Type::TIMESTAMP => value.naive_utc().to_sql(ty, out),
        Type::DATE => value.date_naive().to_sql(ty, out),
        _ if is_text(ty) => value.to_rfc3339().to_sql(ty, out),
        _ => Err(unsupported(&Cell::TimestampTz(*value), ty)),
    }
}

fn encode_string(value: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => encode_integer(value.trim().parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => encode_float(value.trim().parse()?, ty, out),
        Type::BOOL => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => true.to_sql(ty, out),
            "false" | "f" | "0" => false.to_sql(ty, out),
            other => Err(format!("`{other}` is not a boolean").into()),
        },
        Type::TIMESTAMPTZ | Type::TIMESTAMP | Type::DATE => {
            let timestamp = DateTime::parse_from_rfc3339(value.trim())?.with_timezone(&Utc);
            encode_timestamp(&timestamp, ty, out)
        }
        Type::JSON | Type::JSONB => serde_json::from_str::<Value>(value)?.to_sql(ty, out),
        _ if is_text(ty) => value.to_sql(ty, out),
        _ => Err(unsupported(&Cell::String(value.to_owned()), ty)),
    }
}

impl ToSql for Cell {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(value) => match *ty {
                Type::BOOL => value.to_sql(ty, out),
                _ if is_text(ty) => value.to_string().to_sql(ty, out),
                _ => Err(unsupported(self, ty)),
            },
            Cell::String(value) => encode_string(value, ty, out),
            Cell::I64(value) => encode_integer(*value, ty, out),
            Cell::F64(value) => encode_float(*value, ty, out),
            Cell::TimestampTz(value) => encode_timestamp(value, ty, out),
            Cell::Json(value) => match *ty {
                Type::JSON | Type::JSONB => value.to_sql(ty, out),
                _ if is_text(ty) => value.to_string().to_sql(ty, out),
                _ => Err(unsupported(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
