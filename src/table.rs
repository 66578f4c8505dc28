use jiff::civil::Date;
use serde_json::Value;

/// A single cell value.  `Null` is the one missing-data marker used
/// throughout the pipeline, for dates included.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(Date),
    List(Vec<Datum>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int(x) => Some(*x),
            Datum::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(x) => Some(*x as f64),
            Datum::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Datum::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Render the value for display or for joining list elements.
    /// `Null` renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            Datum::Null => String::new(),
            Datum::Bool(b) => b.to_string(),
            Datum::Int(x) => x.to_string(),
            Datum::Float(x) => x.to_string(),
            Datum::Str(s) => s.clone(),
            Datum::Date(d) => d.to_string(),
            Datum::List(items) => items
                .iter()
                .map(|e| e.render())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn from_json(value: &Value) -> Datum {
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(x) => Datum::Int(x),
                None => Datum::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Datum::Str(s.clone()),
            Value::Array(items) => Datum::List(items.iter().map(Datum::from_json).collect()),
            // Nested objects are flattened away before this is reached;
            // an object appearing as a list element degrades to its text form.
            Value::Object(_) => Datum::Str(value.to_string()),
        }
    }
}

/// The dominant value type of a column, used when mapping a column to a
/// storage type and in the profiling report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Str,
    Date,
    List,
    Null,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Str => "str",
            ColumnType::Date => "date",
            ColumnType::List => "list",
            ColumnType::Null => "null",
        }
    }
}

/// Flatten one JSON record into dotted-path column/value pairs, e.g.
/// `_embedded.show.webChannel.id`.  Arrays are kept whole as `List` values,
/// only objects are descended into.
pub fn flatten_record(record: &Value) -> Vec<(String, Datum)> {
    let mut fields = Vec::new();
    flatten_into("", record, &mut fields);
    fields
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Datum)>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, v, out);
            }
        }
        _ => out.push((prefix.to_string(), Datum::from_json(value))),
    }
}

/// An in-memory column-named, row-major table.  The column set is the union
/// of the columns seen so far; rows missing a column hold `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Datum>>,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (row, column name), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Datum> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Append one flattened record, growing the column set as needed.
    /// Earlier rows are back-filled with `Null` for newly seen columns.
    pub fn push_record(&mut self, fields: Vec<(String, Datum)>) {
        let mut row = vec![Datum::Null; self.columns.len()];
        for (name, value) in fields {
            match self.column_index(&name) {
                Some(idx) => row[idx] = value,
                None => {
                    self.columns.push(name);
                    for earlier in &mut self.rows {
                        earlier.push(Datum::Null);
                    }
                    row.push(value);
                }
            }
        }
        self.rows.push(row);
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    /// Count of `Null` values in a column.
    pub fn null_count(&self, idx: usize) -> usize {
        self.rows.iter().filter(|r| r[idx].is_null()).count()
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut has = (false, false, false, false, false, false);
        for row in &self.rows {
            match &row[idx] {
                Datum::Null => {}
                Datum::Bool(_) => has.0 = true,
                Datum::Int(_) => has.1 = true,
                Datum::Float(_) => has.2 = true,
                Datum::Str(_) => has.3 = true,
                Datum::Date(_) => has.4 = true,
                Datum::List(_) => has.5 = true,
            }
        }
        if has.5 {
            ColumnType::List
        } else if has.3 {
            ColumnType::Str
        } else if has.2 {
            ColumnType::Float
        } else if has.1 {
            ColumnType::Int
        } else if has.4 {
            ColumnType::Date
        } else if has.0 {
            ColumnType::Bool
        } else {
            ColumnType::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_nested_object() {
        let record = json!({
            "id": 1,
            "rating": {"average": null},
            "_embedded": {"show": {"id": 42, "genres": ["Drama", "Comedy"]}}
        });
        let fields = flatten_record(&record);
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"id"));
        assert!(names.contains(&"rating.average"));
        assert!(names.contains(&"_embedded.show.id"));
        let genres = fields
            .iter()
            .find(|(n, _)| n == "_embedded.show.genres")
            .unwrap();
        assert_eq!(
            genres.1,
            Datum::List(vec![
                Datum::Str("Drama".to_string()),
                Datum::Str("Comedy".to_string())
            ])
        );
    }

    #[test]
    fn push_record_backfills_missing_columns() {
        let mut table = Table::new();
        table.push_record(vec![("a".to_string(), Datum::Int(1))]);
        table.push_record(vec![
            ("a".to_string(), Datum::Int(2)),
            ("b".to_string(), Datum::Str("x".to_string())),
        ]);
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[0], vec![Datum::Int(1), Datum::Null]);
        assert_eq!(table.get(1, "b"), Some(&Datum::Str("x".to_string())));
    }

    #[test]
    fn column_type_prefers_widest_value() {
        let mut table = Table::new();
        table.push_record(vec![("x".to_string(), Datum::Int(1))]);
        table.push_record(vec![("x".to_string(), Datum::Float(2.5))]);
        assert_eq!(table.column_type(0), ColumnType::Float);
    }
}
