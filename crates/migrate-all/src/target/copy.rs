//! PostgreSQL COPY text format encoding.
//!
//! Used for the rows streamed into `COPY ... FROM STDIN` and for the staged
//! export files, so both carry byte-identical data.

use crate::value::SqlValue;
use bytes::{BufMut, BytesMut};

/// Append one row as a tab-separated, newline-terminated COPY text line.
pub fn encode_row(buf: &mut BytesMut, row: &[SqlValue]) {
    for (j, value) in row.iter().enumerate() {
        if j > 0 {
            buf.put_u8(b'\t');
        }
        let text = sql_value_to_copy_text(value);
        buf.extend_from_slice(text.as_bytes());
    }
    buf.put_u8(b'\n');
}

/// Convert SqlValue to text format for COPY.
pub fn sql_value_to_copy_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Null(_) => "\\N".to_string(),
        SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
        SqlValue::I16(n) => n.to_string(),
        SqlValue::I32(n) => n.to_string(),
        SqlValue::I64(n) => n.to_string(),
        SqlValue::F32(n) => n.to_string(),
        SqlValue::F64(n) => n.to_string(),
        SqlValue::String(s) => escape_copy_text(s),
        SqlValue::Bytes(b) => format!("\\\\x{}", hex::encode(b)),
        SqlValue::Uuid(u) => u.to_string(),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::NumericText(s) => s.clone(),
        SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        // Target column is timestamp without time zone: keep the local wall-clock time
        SqlValue::DateTimeOffset(dt) => dt.naive_local().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        SqlValue::Date(d) => d.to_string(),
        SqlValue::Time(t) => t.format("%H:%M:%S%.6f").to_string(),
    }
}

/// Escape backslash, tab, newline and carriage return for COPY text format.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}
