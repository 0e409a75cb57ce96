//! Core data model types.
//!
//! Every format handler produces an in-memory [`DataSet`] described by a [`Schema`] (a list of
//! typed [`Field`]s). The schema is either supplied by the caller or derived from the file.

use serde::Deserialize;

use crate::error::{LoadError, LoadResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    #[serde(alias = "type")]
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of tabular data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

/// In-memory tabular dataset: the result of every load.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Schema::default(), Vec::new())
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.field_names().collect()
    }

    /// Values of a single column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Keep only `columns`, in the listed order.
    pub fn project(self, columns: &[String]) -> LoadResult<Self> {
        let mut idxs = Vec::with_capacity(columns.len());
        for name in columns {
            let idx = self.schema.index_of(name).ok_or_else(|| {
                LoadError::schema(format!(
                    "missing projected column '{name}'. columns={:?}",
                    self.column_names()
                ))
            })?;
            idxs.push(idx);
        }

        let schema = Schema::new(idxs.iter().map(|&i| self.schema.fields[i].clone()).collect());
        let rows = self
            .rows
            .into_iter()
            .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Self::new(schema, rows))
    }

    /// Concatenate datasets in order into a new dataset.
    ///
    /// All parts must have the same column names in the same order. Column types must match,
    /// except that `Int64` and `Float64` unify to `Float64`.
    pub fn concat(parts: Vec<DataSet>) -> LoadResult<Self> {
        let mut iter = parts.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| LoadError::schema("cannot concatenate zero datasets"))?;

        let rest: Vec<DataSet> = iter.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let mut schema = first.schema.clone();
        for (part_idx, part) in rest.iter().enumerate() {
            let left: Vec<&str> = schema.field_names().collect();
            let right = part.column_names();
            if left != right {
                return Err(LoadError::schema(format!(
                    "part {} has columns {right:?}, expected {left:?}",
                    part_idx + 2
                )));
            }
            for (field, other) in schema.fields.iter_mut().zip(part.schema.fields.iter()) {
                field.data_type = unify(&field.name, field.data_type, other.data_type)?;
            }
        }

        let total = first.row_count() + rest.iter().map(|p| p.row_count()).sum::<usize>();
        let mut rows = Vec::with_capacity(total);
        for part in std::iter::once(first).chain(rest) {
            for row in part.rows {
                rows.push(widen_row(&schema, row));
            }
        }

        Ok(Self::new(schema, rows))
    }
}

fn unify(column: &str, a: DataType, b: DataType) -> LoadResult<DataType> {
    match (a, b) {
        (a, b) if a == b => Ok(a),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            Ok(DataType::Float64)
        }
        _ => Err(LoadError::schema(format!(
            "column '{column}' has incompatible types {a:?} and {b:?}"
        ))),
    }
}

fn widen_row(schema: &Schema, row: Vec<Value>) -> Vec<Value> {
    row.into_iter()
        .zip(schema.fields.iter())
        .map(|(v, f)| match (v, f.data_type) {
            (Value::Int64(i), DataType::Float64) => Value::Float64(i as f64),
            (v, _) => v,
        })
        .collect()
}
