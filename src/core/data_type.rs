//! Canonical column data types
//!
//! Every importer maps its own type vocabulary onto [`DataType`]. Names that have an
//! exact canonical counterpart resolve to [`TypeMatch::Exact`]; everything else goes
//! through a nearest-match fallback table and resolves to [`TypeMatch::Coerced`], so an
//! unknown type never aborts an import.

use serde::{Deserialize, Serialize};

/// Default length for `VARCHAR` without an explicit length
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Default precision/scale for `DECIMAL` without arguments
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
pub const DEFAULT_DECIMAL_SCALE: u32 = 0;

/// Column data type
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataType {
    Integer,
    BigInt,
    SmallInt,
    Varchar { length: u32 },
    Char { length: u32 },
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    Decimal { precision: u32, scale: u32 },
    Float,
    Double,
    Json,
    Jsonb,
    Uuid,
    Binary,
}

/// Outcome of resolving a source type name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeMatch {
    /// The name is a canonical type or a lossless alias of one
    Exact(DataType),
    /// The name had no canonical counterpart; this is the nearest supported type
    Coerced(DataType),
}

impl TypeMatch {
    pub fn data_type(&self) -> &DataType {
        match self {
            TypeMatch::Exact(t) | TypeMatch::Coerced(t) => t,
        }
    }

    pub fn into_data_type(self) -> DataType {
        match self {
            TypeMatch::Exact(t) | TypeMatch::Coerced(t) => t,
        }
    }

    pub fn is_coerced(&self) -> bool {
        matches!(self, TypeMatch::Coerced(_))
    }
}

impl DataType {
    pub fn varchar(length: u32) -> Self {
        DataType::Varchar { length }
    }

    pub fn decimal(precision: u32, scale: u32) -> Self {
        DataType::Decimal { precision, scale }
    }

    /// Whether the type belongs to the integer family (valid target for auto-increment)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::BigInt | DataType::SmallInt
        )
    }

    /// Resolve an SQL type name (already joined for multi-word names, e.g.
    /// `DOUBLE PRECISION`) with its numeric arguments.
    pub fn resolve_sql(name: &str, args: &[u32]) -> TypeMatch {
        let upper = name.trim().to_uppercase();
        let first = args.first().copied();
        let second = args.get(1).copied();

        match upper.as_str() {
            "INT" | "INTEGER" | "INT4" => TypeMatch::Exact(DataType::Integer),
            "BIGINT" | "INT8" => TypeMatch::Exact(DataType::BigInt),
            "SMALLINT" | "INT2" => TypeMatch::Exact(DataType::SmallInt),
            "VARCHAR" | "CHARACTER VARYING" | "CHAR VARYING" => TypeMatch::Exact(DataType::Varchar {
                length: first.unwrap_or(DEFAULT_VARCHAR_LENGTH),
            }),
            "CHAR" | "CHARACTER" => TypeMatch::Exact(DataType::Char {
                length: first.unwrap_or(1),
            }),
            "TEXT" => TypeMatch::Exact(DataType::Text),
            "BOOLEAN" | "BOOL" => TypeMatch::Exact(DataType::Boolean),
            "DATE" => TypeMatch::Exact(DataType::Date),
            "TIME" | "TIME WITHOUT TIME ZONE" => TypeMatch::Exact(DataType::Time),
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => TypeMatch::Exact(DataType::Timestamp),
            "DECIMAL" | "NUMERIC" | "DEC" => TypeMatch::Exact(DataType::Decimal {
                precision: first.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                scale: second.unwrap_or(DEFAULT_DECIMAL_SCALE),
            }),
            "FLOAT" | "REAL" | "FLOAT4" => TypeMatch::Exact(DataType::Float),
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => TypeMatch::Exact(DataType::Double),
            "JSON" => TypeMatch::Exact(DataType::Json),
            "JSONB" => TypeMatch::Exact(DataType::Jsonb),
            "UUID" => TypeMatch::Exact(DataType::Uuid),
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => TypeMatch::Exact(DataType::Binary),
            _ => TypeMatch::Coerced(Self::nearest_sql(&upper, first)),
        }
    }

    /// Nearest-match fallback table for names without a canonical counterpart
    fn nearest_sql(upper: &str, first: Option<u32>) -> DataType {
        match upper {
            "TINYINT" if first == Some(1) => DataType::Boolean,
            "TINYINT" | "INT1" => DataType::SmallInt,
            "MEDIUMINT" | "INT3" => DataType::Integer,
            "NVARCHAR" | "NATIONAL CHARACTER VARYING" | "VARCHAR2" | "NVARCHAR2" => {
                DataType::Varchar {
                    length: first.unwrap_or(DEFAULT_VARCHAR_LENGTH),
                }
            }
            "NCHAR" | "NATIONAL CHARACTER" => DataType::Char {
                length: first.unwrap_or(1),
            },
            "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "CLOB" | "CITEXT" | "STRING" => DataType::Text,
            "DATETIME" | "DATETIME2" | "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "SMALLDATETIME" => {
                DataType::Timestamp
            }
            "TIMETZ" | "TIME WITH TIME ZONE" => DataType::Time,
            "MONEY" | "SMALLMONEY" => DataType::Decimal {
                precision: 19,
                scale: 4,
            },
            "NUMBER" => DataType::Decimal {
                precision: first.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                scale: DEFAULT_DECIMAL_SCALE,
            },
            "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "IMAGE" => DataType::Binary,
            "BIT" if first.is_none_or(|n| n == 1) => DataType::Boolean,
            "UNIQUEIDENTIFIER" => DataType::Uuid,
            "YEAR" => DataType::SmallInt,
            _ => DataType::Text,
        }
    }

    /// Base integer type for the `SERIAL` family, if `name` is one of them
    pub fn serial_base(name: &str) -> Option<DataType> {
        match name.trim().to_uppercase().as_str() {
            "SERIAL" | "SERIAL4" => Some(DataType::Integer),
            "BIGSERIAL" | "SERIAL8" => Some(DataType::BigInt),
            "SMALLSERIAL" | "SERIAL2" => Some(DataType::SmallInt),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Varchar { length } => write!(f, "VARCHAR({})", length),
            DataType::Char { length } => write!(f, "CHAR({})", length),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE PRECISION"),
            DataType::Json => write!(f, "JSON"),
            DataType::Jsonb => write!(f, "JSONB"),
            DataType::Uuid => write!(f, "UUID"),
            DataType::Binary => write!(f, "BLOB"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_aliases() {
        assert_eq!(
            DataType::resolve_sql("int", &[]),
            TypeMatch::Exact(DataType::Integer)
        );
        assert_eq!(
            DataType::resolve_sql("character varying", &[40]),
            TypeMatch::Exact(DataType::varchar(40))
        );
        assert_eq!(
            DataType::resolve_sql("NUMERIC", &[12, 2]),
            TypeMatch::Exact(DataType::decimal(12, 2))
        );
        assert_eq!(
            DataType::resolve_sql("double precision", &[]),
            TypeMatch::Exact(DataType::Double)
        );
    }

    #[test]
    fn test_defaults_without_arguments() {
        assert_eq!(
            DataType::resolve_sql("VARCHAR", &[]).into_data_type(),
            DataType::varchar(DEFAULT_VARCHAR_LENGTH)
        );
        assert_eq!(
            DataType::resolve_sql("DECIMAL", &[8]).into_data_type(),
            DataType::decimal(8, 0)
        );
        assert_eq!(
            DataType::resolve_sql("CHAR", &[]).into_data_type(),
            DataType::Char { length: 1 }
        );
    }

    #[test]
    fn test_coercion_fallbacks() {
        let m = DataType::resolve_sql("TINYINT", &[1]);
        assert!(m.is_coerced());
        assert_eq!(m.data_type(), &DataType::Boolean);

        assert_eq!(
            DataType::resolve_sql("LONGTEXT", &[]),
            TypeMatch::Coerced(DataType::Text)
        );
        assert_eq!(
            DataType::resolve_sql("DATETIME", &[]),
            TypeMatch::Coerced(DataType::Timestamp)
        );
        assert_eq!(
            DataType::resolve_sql("GEOMETRY", &[]),
            TypeMatch::Coerced(DataType::Text)
        );
    }

    #[test]
    fn test_serial_family() {
        assert_eq!(DataType::serial_base("serial"), Some(DataType::Integer));
        assert_eq!(DataType::serial_base("BIGSERIAL"), Some(DataType::BigInt));
        assert_eq!(DataType::serial_base("smallserial"), Some(DataType::SmallInt));
        assert_eq!(DataType::serial_base("integer"), None);
    }

    #[test]
    fn test_display_reparses_exactly() {
        let all = [
            DataType::Integer,
            DataType::BigInt,
            DataType::SmallInt,
            DataType::varchar(80),
            DataType::Char { length: 3 },
            DataType::Text,
            DataType::Boolean,
            DataType::Date,
            DataType::Time,
            DataType::Timestamp,
            DataType::decimal(10, 2),
            DataType::Float,
            DataType::Double,
            DataType::Json,
            DataType::Jsonb,
            DataType::Uuid,
            DataType::Binary,
        ];
        for data_type in all {
            let rendered = data_type.to_string();
            let (name, args) = match rendered.split_once('(') {
                Some((name, rest)) => {
                    let args: Vec<u32> = rest
                        .trim_end_matches(')')
                        .split(',')
                        .map(|a| a.trim().parse().unwrap())
                        .collect();
                    (name.to_string(), args)
                }
                None => (rendered.clone(), Vec::new()),
            };
            assert_eq!(
                DataType::resolve_sql(&name, &args),
                TypeMatch::Exact(data_type),
                "{} should resolve exactly",
                rendered
            );
        }
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(DataType::varchar(20)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "varchar", "length": 20}));
        let back: DataType = serde_json::from_value(json).unwrap();
        assert_eq!(back, DataType::varchar(20));
    }
}
