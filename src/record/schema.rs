//! Column schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StorageError};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 4-byte signed integer, stored inline
    Integer,
    /// UTF-8 string, stored in the variable region
    Text,
}

impl DataType {
    /// Parse a type name as written in `create table`.
    ///
    /// `int`/`integer` are integers; any other name is text.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => DataType::Integer,
            _ => DataType::Text,
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(self, DataType::Text)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Text => write!(f, "text"),
        }
    }
}

/// One named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// 1-based position in the table definition
    pub ordinal: u32,
}

/// Ordered list of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from `(name, type)` pairs in declaration order
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let columns: Vec<Column> = columns
            .into_iter()
            .enumerate()
            .map(|(i, (name, data_type))| Column {
                name: name.into(),
                data_type,
                ordinal: i as u32 + 1,
            })
            .collect();

        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    /// Reject empty, blank or repeated column names
    pub fn validate(&self) -> Result<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(StorageError::schema(format!("column {} has no name", i + 1)));
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(StorageError::schema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The first column, which holds each row's key
    pub fn key_column(&self) -> Result<&Column> {
        match self.columns.first() {
            Some(column) if column.data_type == DataType::Integer => Ok(column),
            Some(column) => Err(StorageError::schema(format!(
                "key column '{}' must be an integer",
                column.name
            ))),
            None => Err(StorageError::schema("schema has no columns")),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_declaration() -> Result<()> {
        let schema = Schema::new([("id", DataType::Integer), ("name", DataType::Text)])?;
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.columns()[1].ordinal, 2);
        assert_eq!(schema.key_column()?.name, "id");
        Ok(())
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = Schema::new([("a", DataType::Integer), ("a", DataType::Text)]);
        assert!(matches!(result, Err(StorageError::Schema(_))));
    }

    #[test]
    fn test_text_key_rejected() -> Result<()> {
        let schema = Schema::new([("name", DataType::Text)])?;
        assert!(schema.key_column().is_err());
        Ok(())
    }

    #[test]
    fn test_json_form() -> Result<()> {
        let schema = Schema::new([("id", DataType::Integer), ("bio", DataType::Text)])?;
        let json = schema.to_json()?;
        assert_eq!(
            json,
            r#"[{"name":"id","type":"integer","ordinal":1},{"name":"bio","type":"text","ordinal":2}]"#
        );
        assert_eq!(Schema::from_json(&json)?, schema);
        Ok(())
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(DataType::parse("INT"), DataType::Integer);
        assert_eq!(DataType::parse("integer"), DataType::Integer);
        assert_eq!(DataType::parse("varchar"), DataType::Text);
    }
}
