//! Rows and field values.

use std::collections::BTreeMap;
use std::fmt;

use super::schema::{DataType, Schema};
use crate::error::{Result, StorageError};

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Text(_) => DataType::Text,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    /// Parse a literal typed by the column it lands in
    pub fn parse(literal: &str, data_type: DataType) -> Result<Self> {
        match data_type {
            DataType::Integer => literal
                .trim()
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|_| StorageError::schema(format!("'{}' is not an integer", literal))),
            DataType::Text => Ok(Value::Text(literal.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// A row as a map from column name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a row from literals listed in schema order
    pub fn from_literals<S: AsRef<str>>(schema: &Schema, literals: &[S]) -> Result<Self> {
        if literals.len() != schema.len() {
            return Err(StorageError::schema(format!(
                "expected {} values, got {}",
                schema.len(),
                literals.len()
            )));
        }

        let mut row = Row::new();
        for (column, literal) in schema.columns().iter().zip(literals) {
            row.set(
                column.name.clone(),
                Value::parse(literal.as_ref(), column.data_type)?,
            );
        }
        Ok(row)
    }

    /// Key of this row: the value of the schema's first column
    pub fn key(&self, schema: &Schema) -> Result<i32> {
        let column = schema.key_column()?;
        self.get(&column.name)
            .and_then(Value::as_integer)
            .ok_or_else(|| StorageError::schema(format!("row has no integer '{}'", column.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new([("id", DataType::Integer), ("name", DataType::Text)]).unwrap()
    }

    #[test]
    fn test_from_literals() -> Result<()> {
        let row = Row::from_literals(&schema(), &["7", "bob"])?;
        assert_eq!(row, Row::new().with("id", 7).with("name", "bob"));
        assert_eq!(row.key(&schema())?, 7);
        Ok(())
    }

    #[test]
    fn test_from_literals_checks_arity_and_types() {
        assert!(Row::from_literals(&schema(), &["1"]).is_err());
        assert!(Row::from_literals(&schema(), &["x", "bob"]).is_err());
    }
}
