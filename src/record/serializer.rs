//! Row encoding.
//!
//! Layout of an encoded row:
//! ```text
//! fixed region     one entry per column, in schema order
//!   Integer        4 bytes, big-endian i32
//!   Text           2-byte offset + 2-byte length into the variable region
//! variable region  text bytes, in the order the columns were declared
//! ```
//! Offsets are measured from the start of the record.

use super::row::{Row, Value};
use super::schema::{DataType, Schema};
use crate::error::{Result, StorageError};

const FIXED_FIELD_SIZE: usize = 4;

/// Encode `row` under `schema`
pub fn encode(row: &Row, schema: &Schema) -> Result<Vec<u8>> {
    let fixed_len = schema.len() * FIXED_FIELD_SIZE;
    let mut fixed = Vec::with_capacity(fixed_len);
    let mut variable = Vec::new();

    for column in schema.columns() {
        let value = row
            .get(&column.name)
            .ok_or_else(|| StorageError::schema(format!("missing value for '{}'", column.name)))?;

        match (column.data_type, value) {
            (DataType::Integer, Value::Integer(v)) => fixed.extend_from_slice(&v.to_be_bytes()),
            (DataType::Text, Value::Text(s)) => {
                let offset = fixed_len + variable.len();
                let (offset, len) = match (u16::try_from(offset), u16::try_from(s.len())) {
                    (Ok(offset), Ok(len)) => (offset, len),
                    _ => {
                        return Err(StorageError::schema(format!(
                            "text in '{}' does not fit a record",
                            column.name
                        )))
                    }
                };
                fixed.extend_from_slice(&offset.to_be_bytes());
                fixed.extend_from_slice(&len.to_be_bytes());
                variable.extend_from_slice(s.as_bytes());
            }
            (expected, value) => {
                return Err(StorageError::schema(format!(
                    "column '{}' is {}, got {}",
                    column.name,
                    expected,
                    value.data_type()
                )))
            }
        }
    }

    if fixed_len + variable.len() > u16::MAX as usize {
        return Err(StorageError::schema("encoded row exceeds 65535 bytes"));
    }

    fixed.extend_from_slice(&variable);
    Ok(fixed)
}

/// Decode a record produced by [`encode`] under the same schema
pub fn decode(bytes: &[u8], schema: &Schema) -> Result<Row> {
    let fixed_len = schema.len() * FIXED_FIELD_SIZE;
    if bytes.len() < fixed_len {
        return Err(StorageError::corruption(format!(
            "record of {} bytes is shorter than its {} fixed bytes",
            bytes.len(),
            fixed_len
        )));
    }

    let mut row = Row::new();
    for (i, column) in schema.columns().iter().enumerate() {
        let at = i * FIXED_FIELD_SIZE;
        let field = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];

        let value = match column.data_type {
            DataType::Integer => Value::Integer(i32::from_be_bytes(field)),
            DataType::Text => {
                let offset = u16::from_be_bytes([field[0], field[1]]) as usize;
                let len = u16::from_be_bytes([field[2], field[3]]) as usize;
                let text = bytes.get(offset..offset + len).ok_or_else(|| {
                    StorageError::corruption(format!(
                        "text field '{}' points outside the record",
                        column.name
                    ))
                })?;
                let text = std::str::from_utf8(text).map_err(|_| {
                    StorageError::corruption(format!("text field '{}' is not UTF-8", column.name))
                })?;
                Value::Text(text.to_string())
            }
        };
        row.set(column.name.clone(), value);
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new([
            ("id", DataType::Integer),
            ("name", DataType::Text),
            ("age", DataType::Integer),
            ("email", DataType::Text),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout() -> Result<()> {
        let row = Row::new()
            .with("id", 1)
            .with("name", "ab")
            .with("age", -2)
            .with("email", "xyz");
        let bytes = encode(&row, &schema())?;

        assert_eq!(bytes.len(), 16 + 2 + 3);
        assert_eq!(&bytes[0..4], &1i32.to_be_bytes());
        // name: offset 16, length 2
        assert_eq!(&bytes[4..8], &[0, 16, 0, 2]);
        assert_eq!(&bytes[8..12], &(-2i32).to_be_bytes());
        // email: offset 18, length 3
        assert_eq!(&bytes[12..16], &[0, 18, 0, 3]);
        assert_eq!(&bytes[16..], b"abxyz");

        assert_eq!(decode(&bytes, &schema())?, row);
        Ok(())
    }

    #[test]
    fn test_empty_and_unicode_text() -> Result<()> {
        let row = Row::new()
            .with("id", i32::MIN)
            .with("name", "")
            .with("age", i32::MAX)
            .with("email", "héllo wörld");
        let bytes = encode(&row, &schema())?;
        assert_eq!(decode(&bytes, &schema())?, row);
        Ok(())
    }

    #[test]
    fn test_missing_or_mistyped_value() {
        let missing = Row::new().with("id", 1);
        assert!(matches!(
            encode(&missing, &schema()),
            Err(StorageError::Schema(_))
        ));

        let mistyped = Row::new()
            .with("id", "one")
            .with("name", "a")
            .with("age", 3)
            .with("email", "b");
        assert!(matches!(
            encode(&mistyped, &schema()),
            Err(StorageError::Schema(_))
        ));
    }

    #[test]
    fn test_truncated_record() {
        assert!(matches!(
            decode(&[0, 0, 0], &schema()),
            Err(StorageError::Corruption(_))
        ));

        let mut bytes = vec![0u8; 16];
        // name claims 5 bytes past the end
        bytes[4..8].copy_from_slice(&[0, 16, 0, 5]);
        assert!(decode(&bytes, &schema()).is_err());
    }
}
