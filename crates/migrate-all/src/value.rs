//! Row values moved from the source catalog to the target writer.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Column type carried by a NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// One value read from a SQL Server row.
///
/// Variants follow the PostgreSQL column the value lands in, so `tinyint`
/// arrives as `I16` and `money` as `Decimal`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlNullType),

    /// bit
    Bool(bool),

    /// smallint, tinyint
    I16(i16),

    /// int
    I32(i32),

    /// bigint
    I64(i64),

    /// real
    F32(f32),

    /// float
    F64(f64),

    /// char, varchar, nchar, nvarchar, text, ntext
    String(String),

    /// binary, varbinary, image
    Bytes(Vec<u8>),

    /// uniqueidentifier
    Uuid(Uuid),

    /// decimal, numeric, money, smallmoney
    Decimal(Decimal),

    /// decimal, numeric wider than 28 digits, as exact text
    NumericText(String),

    /// datetime, datetime2, smalldatetime
    DateTime(NaiveDateTime),

    /// datetimeoffset
    DateTimeOffset(DateTime<FixedOffset>),

    Date(NaiveDate),

    Time(NaiveTime),
}

/// Rows read in one round trip, in the column order requested from the source.
#[derive(Debug, Default)]
pub struct Batch {
    pub rows: Vec<Vec<SqlValue>>,
}

impl Batch {
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_len() {
        let batch = Batch::new(vec![
            vec![SqlValue::I32(1), SqlValue::String("a".to_string())],
            vec![SqlValue::I32(2), SqlValue::Null(SqlNullType::String)],
        ]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(Batch::default().is_empty());
    }
}
