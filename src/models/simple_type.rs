//! EDM primitive (simple) types and host-language type mapping

use serde::{Deserialize, Serialize};
use std::fmt;

use super::name::EDM_NAMESPACE;

/// The fixed set of EDM simple types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdmSimpleType {
    Binary,
    Boolean,
    Byte,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    Time,
}

impl EdmSimpleType {
    pub const ALL: [EdmSimpleType; 15] = [
        EdmSimpleType::Binary,
        EdmSimpleType::Boolean,
        EdmSimpleType::Byte,
        EdmSimpleType::DateTime,
        EdmSimpleType::DateTimeOffset,
        EdmSimpleType::Decimal,
        EdmSimpleType::Double,
        EdmSimpleType::Guid,
        EdmSimpleType::Int16,
        EdmSimpleType::Int32,
        EdmSimpleType::Int64,
        EdmSimpleType::SByte,
        EdmSimpleType::Single,
        EdmSimpleType::String,
        EdmSimpleType::Time,
    ];

    /// Unqualified name within the `Edm` namespace
    pub fn name(&self) -> &'static str {
        match self {
            EdmSimpleType::Binary => "Binary",
            EdmSimpleType::Boolean => "Boolean",
            EdmSimpleType::Byte => "Byte",
            EdmSimpleType::DateTime => "DateTime",
            EdmSimpleType::DateTimeOffset => "DateTimeOffset",
            EdmSimpleType::Decimal => "Decimal",
            EdmSimpleType::Double => "Double",
            EdmSimpleType::Guid => "Guid",
            EdmSimpleType::Int16 => "Int16",
            EdmSimpleType::Int32 => "Int32",
            EdmSimpleType::Int64 => "Int64",
            EdmSimpleType::SByte => "SByte",
            EdmSimpleType::Single => "Single",
            EdmSimpleType::String => "String",
            EdmSimpleType::Time => "Time",
        }
    }

    /// Look up a simple type by its unqualified name (`"Int32"`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Map a host-language type name to a simple type
    ///
    /// Accepts Java names as reported by persistence metamodels
    /// (`java.lang.Long`, `int`, `java.math.BigDecimal`, `byte[]`, ...) and
    /// Rust names used by annotated sources (`i64`, `String`, `Vec<u8>`, ...).
    pub fn from_native(type_name: &str) -> Option<Self> {
        let trimmed = type_name.trim();
        let simple = trimmed
            .strip_prefix("Option<")
            .and_then(|inner| inner.strip_suffix('>'))
            .unwrap_or(trimmed);

        let mapped = match simple {
            "java.lang.String" | "String" | "&str" | "str" | "char" | "java.lang.Character"
            | "Character" | "char[]" | "java.lang.Character[]" | "java.sql.Clob"
            | "java.lang.Enum" => EdmSimpleType::String,
            "boolean" | "java.lang.Boolean" | "Boolean" | "bool" => EdmSimpleType::Boolean,
            "byte" | "java.lang.Byte" | "i8" => EdmSimpleType::SByte,
            "u8" => EdmSimpleType::Byte,
            "short" | "java.lang.Short" | "Short" | "i16" | "u16" => EdmSimpleType::Int16,
            "int" | "java.lang.Integer" | "Integer" | "i32" | "u32" => EdmSimpleType::Int32,
            "long" | "java.lang.Long" | "Long" | "i64" | "u64" | "isize" | "usize" => {
                EdmSimpleType::Int64
            }
            "float" | "java.lang.Float" | "Float" | "f32" => EdmSimpleType::Single,
            "double" | "java.lang.Double" | "Double" | "f64" => EdmSimpleType::Double,
            "java.math.BigDecimal" | "java.math.BigInteger" | "BigDecimal" | "Decimal"
            | "rust_decimal::Decimal" | "i128" | "u128" => EdmSimpleType::Decimal,
            "java.util.Date" | "java.util.Calendar" | "java.sql.Date" | "java.sql.Timestamp"
            | "java.time.LocalDate" | "java.time.LocalDateTime" | "NaiveDate"
            | "NaiveDateTime" | "chrono::NaiveDate" | "chrono::NaiveDateTime" => {
                EdmSimpleType::DateTime
            }
            "java.time.OffsetDateTime" | "java.time.ZonedDateTime" | "java.time.Instant"
            | "DateTime<Utc>" | "chrono::DateTime<chrono::Utc>" | "DateTime<FixedOffset>" => {
                EdmSimpleType::DateTimeOffset
            }
            "java.sql.Time" | "java.time.LocalTime" | "NaiveTime" | "chrono::NaiveTime" => {
                EdmSimpleType::Time
            }
            "java.util.UUID" | "UUID" | "Uuid" | "uuid::Uuid" => EdmSimpleType::Guid,
            "byte[]" | "java.lang.Byte[]" | "java.sql.Blob" | "Vec<u8>" | "&[u8]" | "Bytes" => {
                EdmSimpleType::Binary
            }
            _ => return None,
        };
        Some(mapped)
    }

    /// Whether `maxLength`/`fixedLength`/`unicode` facets apply
    pub fn supports_length(&self) -> bool {
        matches!(self, EdmSimpleType::String | EdmSimpleType::Binary)
    }

    /// Whether `precision` applies
    pub fn supports_precision(&self) -> bool {
        matches!(
            self,
            EdmSimpleType::Decimal
                | EdmSimpleType::DateTime
                | EdmSimpleType::DateTimeOffset
                | EdmSimpleType::Time
        )
    }

    /// Whether `scale` applies
    pub fn supports_scale(&self) -> bool {
        matches!(self, EdmSimpleType::Decimal)
    }
}

impl fmt::Display for EdmSimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", EDM_NAMESPACE, self.name())
    }
}
