//! Source table and column metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one concrete source table.
///
/// Equality and hashing ignore ASCII case on both parts, matching the
/// default case-insensitive collation of SQL Server catalogs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Case-insensitive comparison of the unqualified name.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Case-insensitive comparison of the schema.
    pub fn in_schema(&self, schema: &str) -> bool {
        self.schema.eq_ignore_ascii_case(schema)
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.in_schema(&other.schema) && self.has_name(&other.name)
    }
}

impl Eq for TableRef {}

impl Hash for TableRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.to_ascii_lowercase().hash(state);
        self.name.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "int", "varchar", "datetime2").
    pub data_type: String,

    /// Maximum length for string/binary types (-1 for max).
    pub max_length: i32,

    /// Numeric precision.
    pub precision: i32,

    /// Numeric scale.
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Column default expression as stored by the source (e.g. `((0))`).
    pub default: Option<String>,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl Column {
    /// Column with just a name and type; handy for fakes and tests.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: 0,
            precision: 0,
            scale: 0,
            is_nullable: true,
            default: None,
            ordinal_pos: 0,
        }
    }
}
