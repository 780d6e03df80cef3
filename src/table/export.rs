//! Row-oriented export

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::table::{column_name, Table};
use crate::value::Value;

impl Table {
    /// Row-major copy of the cells
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.nrows())
            .map(|r| self.data().iter().map(|c| c.get(r)).collect())
            .collect()
    }

    /// One `(column name, value)` list per row
    pub fn to_records(&self) -> Vec<Vec<(String, Value)>> {
        let names = self.column_names();
        (0..self.nrows())
            .map(|r| {
                names
                    .iter()
                    .zip(self.data())
                    .map(|(n, c)| (n.clone(), c.get(r)))
                    .collect()
            })
            .collect()
    }

    /// JSON array with one object per row. Nulls become `null` and
    /// timestamps ISO-8601 strings.
    pub fn to_json_records(&self) -> Result<JsonValue> {
        let names = self.column_names();
        let mut rows = Vec::with_capacity(self.nrows());
        for r in 0..self.nrows() {
            let mut obj = Map::with_capacity(names.len());
            for (name, column) in names.iter().zip(self.data()) {
                obj.insert(name.clone(), serde_json::to_value(column.get(r))?);
            }
            rows.push(JsonValue::Object(obj));
        }
        Ok(JsonValue::Array(rows))
    }

    /// Display names of the columns; hierarchical keys render as tuples
    pub fn column_names(&self) -> Vec<String> {
        self.columns().keys().iter().map(|k| column_name(k)).collect()
    }
}
