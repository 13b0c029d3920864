//! Plain-text result tables.

use crate::record::{Row, Schema};

/// Render rows as an ASCII table followed by a row count.
///
/// ```text
/// +----+-------+
/// | id | name  |
/// +----+-------+
/// | 1  | alice |
/// +----+-------+
/// 1 row(s)
/// ```
pub fn format_rows(schema: &Schema, rows: &[Row]) -> String {
    let headers: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|name| row.get(name).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };
    let mut out = Vec::with_capacity(rows.len() + 5);
    out.push(separator.clone());
    out.push(render_line(&headers, &widths));
    out.push(separator.clone());
    if !cells.is_empty() {
        for row in &cells {
            out.push(render_line(row, &widths));
        }
        out.push(separator);
    }
    out.push(format!("{} row(s)", rows.len()));
    out.join("\n")
}

fn render_line<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (value, width) in values.iter().zip(widths) {
        let value = value.as_ref();
        let pad = width - value.chars().count();
        line.push(' ');
        line.push_str(value);
        line.push_str(&" ".repeat(pad + 1));
        line.push('|');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    #[test]
    fn test_format_rows() {
        let schema = Schema::new([("id", DataType::Integer), ("name", DataType::Text)]).unwrap();
        let rows = vec![
            Row::new().with("id", 1).with("name", "alice"),
            Row::new().with("id", 22).with("name", "bo"),
        ];

        let expected = "\
+----+-------+
| id | name  |
+----+-------+
| 1  | alice |
| 22 | bo    |
+----+-------+
2 row(s)";
        assert_eq!(format_rows(&schema, &rows), expected);
    }

    #[test]
    fn test_format_no_rows() {
        let schema = Schema::new([("id", DataType::Integer)]).unwrap();
        assert_eq!(format_rows(&schema, &[]), "+----+\n| id |\n+----+\n0 row(s)");
    }
}
