use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

/// One row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow(BTreeMap<String, SqlValue>);

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.0.get(column) {
            Some(SqlValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool(&self, column: &str) -> Option<bool> {
        match self.0.get(column) {
            Some(SqlValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// Decodes by Postgres type name; anything unrecognised is read as text.
pub(crate) fn decode_pg_row(row: &PgRow) -> SqlRow {
    let mut out = SqlRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let is_null = row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true);
        let value = if is_null {
            Ok(SqlValue::Null)
        } else {
            match column.type_info().name() {
                "BOOL" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
                "INT2" => row.try_get::<i16, _>(idx).map(|v| SqlValue::Int(v.into())),
                "INT4" => row.try_get::<i32, _>(idx).map(|v| SqlValue::Int(v.into())),
                "INT8" => row.try_get::<i64, _>(idx).map(SqlValue::Int),
                "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| SqlValue::Float(v.into())),
                "FLOAT8" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
                _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
            }
        };
        let value = value.unwrap_or_else(|err| {
            debug!(column = column.name(), error = %err, "Undecodable column, reading as NULL");
            SqlValue::Null
        });
        out.0.insert(column.name().to_string(), value);
    }
    out
}
