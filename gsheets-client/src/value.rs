use serde::Serialize;
use std::fmt;

/// A single cell written with user-entered semantics. Numbers and booleans are sent as JSON
/// numbers and booleans so the sheet stores them typed rather than as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        CellValue::Unsigned(value)
    }
}

impl From<u16> for CellValue {
    fn from(value: u16) -> Self {
        CellValue::Unsigned(value.into())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(value) => f.write_str(value),
            CellValue::Unsigned(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_untagged() {
        let cells = vec![
            CellValue::from("2024-01-01 00:00:00"),
            CellValue::from(12500000_u64),
            CellValue::from(1.25),
            CellValue::from(false),
        ];
        assert_eq!(
            serde_json::to_string(&cells).unwrap(),
            r#"["2024-01-01 00:00:00",12500000,1.25,false]"#
        );
    }
}
