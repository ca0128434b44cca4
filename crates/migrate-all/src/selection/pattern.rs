//! Table reference parsing.

use crate::error::{MigrateError, Result};
use crate::identifier::validate_identifier;
use crate::source::TableRef;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A user-supplied table reference whose schema may be omitted.
///
/// Accepts `[schema].[table]`, `schema.table` and `table`. Bracketed parts
/// may contain dots and commas, and escape `]` as `]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePattern {
    /// Schema, or `None` for an unqualified name.
    pub schema: Option<String>,

    /// Table name.
    pub name: String,
}

impl TablePattern {
    /// Qualified pattern.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Unqualified pattern matching the name in any schema.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Parse one table reference.
    pub fn parse(input: &str) -> Result<Self> {
        let parts = split_parts(input.trim())
            .map_err(|msg| MigrateError::Config(format!("invalid table reference '{}': {}", input, msg)))?;

        let mut parts = parts.into_iter();
        let pattern = match (parts.next(), parts.next()) {
            (Some(name), None) => Self::unqualified(name),
            (Some(schema), Some(name)) => Self::qualified(schema, name),
            _ => {
                return Err(MigrateError::Config(format!(
                    "invalid table reference '{}': empty",
                    input
                )))
            }
        };

        if let Some(schema) = &pattern.schema {
            validate_identifier(schema)?;
        }
        validate_identifier(&pattern.name)?;
        Ok(pattern)
    }

    pub fn is_qualified(&self) -> bool {
        self.schema.is_some()
    }

    /// Case-insensitive match. Unqualified patterns ignore the schema.
    pub fn matches(&self, table: &TableRef) -> bool {
        table.has_name(&self.name)
            && self
                .schema
                .as_deref()
                .map_or(true, |schema| table.in_schema(schema))
    }

    /// The concrete table this pattern names, if it is qualified.
    pub fn to_table_ref(&self) -> Option<TableRef> {
        self.schema
            .as_ref()
            .map(|schema| TableRef::new(schema.clone(), self.name.clone()))
    }
}

impl FromStr for TablePattern {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TablePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Split a reference into at most two dot-separated parts.
fn split_parts(input: &str) -> std::result::Result<Vec<String>, &'static str> {
    let mut parts = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        let mut part = String::new();

        if chars.peek() == Some(&'[') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == ']' {
                    if chars.peek() == Some(&']') {
                        chars.next();
                        part.push(']');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    part.push(c);
                }
            }
            if !closed {
                return Err("unterminated '['");
            }
            // Only whitespace may separate the closing bracket from the dot
            while chars.peek().map_or(false, |c| c.is_whitespace()) {
                chars.next();
            }
            match chars.peek() {
                None | Some('.') => {}
                Some(_) => return Err("unexpected character after ']'"),
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if c == '[' || c == ']' {
                    return Err("unbalanced bracket");
                }
                part.push(c);
                chars.next();
            }
            part = part.trim().to_string();
        }

        if part.trim().is_empty() {
            return Err("empty name part");
        }
        parts.push(part);

        match chars.next() {
            None => break,
            Some('.') => {
                while chars.peek().map_or(false, |c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(_) => return Err("unexpected character"),
        }
    }

    if parts.len() > 2 {
        return Err("expected [schema.]table");
    }
    Ok(parts)
}

/// Split a comma-separated list, ignoring commas inside brackets.
///
/// Items are trimmed; empty items are skipped.
pub fn split_list(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_bracket = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' if !in_bracket => {
                in_bracket = true;
                current.push(c);
            }
            ']' if in_bracket => {
                current.push(c);
                if chars.peek() == Some(&']') {
                    current.push(']');
                    chars.next();
                } else {
                    in_bracket = false;
                }
            }
            ',' if !in_bracket => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            TablePattern::parse("dbo.MasUser").unwrap(),
            TablePattern::qualified("dbo", "MasUser")
        );
        assert_eq!(
            TablePattern::parse("[dbo].[Mas User]").unwrap(),
            TablePattern::qualified("dbo", "Mas User")
        );
        assert_eq!(
            TablePattern::parse("  MasDepartment ").unwrap(),
            TablePattern::unqualified("MasDepartment")
        );
    }

    #[test]
    fn test_parse_bracket_escapes() {
        let p = TablePattern::parse("[sales.eu].[odd]]name]").unwrap();
        assert_eq!(p.schema.as_deref(), Some("sales.eu"));
        assert_eq!(p.name, "odd]name");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["a.b.c", "dbo.", ".Orders", "[dbo.Orders", "dbo]x", "[a]b", ""] {
            assert!(TablePattern::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_matches_case_insensitive() {
        let t = TableRef::new("dbo", "MasUser");
        assert!(TablePattern::parse("DBO.masuser").unwrap().matches(&t));
        assert!(TablePattern::parse("MASUSER").unwrap().matches(&t));
        assert!(!TablePattern::parse("sales.MasUser").unwrap().matches(&t));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c ,"), vec!["a", "b", "c"]);
        assert_eq!(split_list("[x,y].[t],dbo.u"), vec!["[x,y].[t]", "dbo.u"]);
        assert!(split_list("  ").is_empty());
    }
}
