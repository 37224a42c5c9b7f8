//! Row materialization.
//!
//! Every value placed in a result row must be a JSON scalar: string, number,
//! boolean or null. Column types are first classified into a [`TypeCategory`],
//! then decoded with the dialect's driver types. Anything that is not naturally one of
//! the four scalar kinds is rendered as a string.

use crate::models::Row as ResultRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name (as reported by the driver) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.trim().to_lowercase();
    let base = lower.trim_end_matches(" unsigned");

    match base {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "int" | "bigint"
        | "tinyint" | "mediumint" | "serial" | "bigserial" | "smallserial" | "year" => {
            TypeCategory::Integer
        }
        "float4" | "float8" | "real" | "double precision" | "double" | "float" => {
            TypeCategory::Float
        }
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" | "name"
        | "citext" | "tinytext" | "mediumtext" | "longtext" | "enum" | "set" => {
            TypeCategory::Text
        }
        "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
            TypeCategory::Binary
        }
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "datetime" => {
            TypeCategory::Temporal
        }
        _ => TypeCategory::Unknown,
    }
}

/// Raw DECIMAL/NUMERIC text, kept exact rather than going through a float.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Render binary data: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Turn a float into a JSON number, or a string when it is not finite.
fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Force a value into scalar form. Arrays and objects become their JSON text.
pub fn to_scalar(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(_) | JsonValue::Object(_) => JsonValue::String(value.to_string()),
        scalar => scalar,
    }
}

/// Try each listed type in order and map the first one that decodes.
macro_rules! first_decoded {
    ($row:expr, $idx:expr, [$($ty:ty),+ $(,)?], $map:expr) => {
        None$(.or_else(|| $row.try_get::<$ty, _>($idx).ok().map($map)))+
    };
}

/// Implement [`RowToJson`] for a driver row type.
///
/// `integers` lists the integer types to try, in order. `raw` is the fallback
/// used when no typed decoder accepts the column.
macro_rules! impl_row_to_json {
    ($row:ty, integers: [$($int:ty),+ $(,)?], raw: $raw:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> ResultRow {
                self.columns()
                    .iter()
                    .map(|col| {
                        let idx = col.ordinal();
                        let null = self.try_get_raw(idx).map_or(true, |v| v.is_null());
                        let value = if null {
                            JsonValue::Null
                        } else {
                            let decoded: Option<JsonValue> =
                                match categorize_type(col.type_info().name()) {
                                    TypeCategory::Integer => first_decoded!(
                                        self, idx, [$($int),+], |v| JsonValue::Number(v.into())
                                    ),
                                    TypeCategory::Float => first_decoded!(
                                        self, idx, [f64, f32], |v| float_value(f64::from(v))
                                    ),
                                    TypeCategory::Decimal => first_decoded!(
                                        self, idx, [RawDecimal], |v: RawDecimal| JsonValue::String(v.0)
                                    ),
                                    TypeCategory::Boolean => {
                                        first_decoded!(self, idx, [bool], JsonValue::Bool)
                                    }
                                    TypeCategory::Json => first_decoded!(
                                        self, idx, [JsonValue], |v: JsonValue| JsonValue::String(v.to_string())
                                    ),
                                    TypeCategory::Uuid => first_decoded!(
                                        self, idx, [Uuid], |v: Uuid| JsonValue::String(v.to_string())
                                    ),
                                    TypeCategory::Temporal => first_decoded!(
                                        self, idx, [DateTime<Utc>], |v: DateTime<Utc>| JsonValue::String(v.to_rfc3339())
                                    )
                                    .or_else(|| first_decoded!(
                                        self, idx, [NaiveDateTime, NaiveDate, NaiveTime],
                                        |v| JsonValue::String(v.to_string())
                                    )),
                                    TypeCategory::Binary => first_decoded!(
                                        self, idx, [Vec<u8>], |v: Vec<u8>| decode_binary_value(&v)
                                    ),
                                    TypeCategory::Text | TypeCategory::Unknown => {
                                        first_decoded!(self, idx, [String], JsonValue::String)
                                    }
                                };
                            decoded.unwrap_or_else(|| $raw(self, idx))
                        };
                        (col.name().to_string(), to_scalar(value))
                    })
                    .collect()
            }
        }
    };
}

/// Convert a driver row into a column name → scalar mapping.
pub trait RowToJson {
    fn to_json_map(&self) -> ResultRow;
}

impl_row_to_json!(MySqlRow, integers: [i64, u64, i32, u32, i16, u16, i8, u8], raw: mysql_raw);
impl_row_to_json!(PgRow, integers: [i64, i32, i16], raw: postgres_raw);

/// MySQL sends every value as bytes in the text protocol.
fn mysql_raw(row: &MySqlRow, idx: usize) -> JsonValue {
    match row.try_get_unchecked::<Vec<u8>, _>(idx) {
        Ok(bytes) => decode_binary_value(&bytes),
        Err(e) => {
            debug!(column = idx, error = %e, "Undecodable MySQL column");
            JsonValue::Null
        }
    }
}

fn postgres_raw(row: &PgRow, idx: usize) -> JsonValue {
    match row.try_get_unchecked::<String, _>(idx) {
        Ok(text) => JsonValue::String(text),
        Err(e) => {
            debug!(column = idx, error = %e, "Undecodable PostgreSQL column");
            JsonValue::Null
        }
    }
}
