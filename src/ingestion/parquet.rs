//! Parquet handler.

use std::collections::HashMap;
use std::path::Path;

use parquet::basic::{ConvertedType, Type as PhysicalType};
use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field as ParquetField;

use crate::error::{LoadError, LoadResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::{finish, FormatHandler, FormatOptions};

/// Handler for `.parquet`, `.pqt` and `.pq` files.
#[derive(Debug, Clone, Default)]
pub struct ParquetHandler {
    defaults: FormatOptions,
}

impl ParquetHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: FormatOptions) -> Self {
        Self { defaults }
    }
}

impl FormatHandler for ParquetHandler {
    fn name(&self) -> &str {
        "parquet"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".parquet", ".pqt", ".pq"]
    }

    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet> {
        let opts = options.or(&self.defaults);
        let ds = ingest_parquet_from_path(path, opts.schema.as_ref())?;
        finish(ds, &opts)
    }
}

/// Ingest a Parquet file into an in-memory `DataSet`.
///
/// Notes:
/// - With a schema, validates that all schema fields exist as Parquet leaf columns (by column
///   path string).
/// - Without a schema, every top-level primitive column becomes a field; its type follows the
///   physical type (booleans, integers, floats) and anything else is read as text.
/// - Uses the Parquet record API (`RowIter`).
pub fn ingest_parquet_from_path(path: impl AsRef<Path>, schema: Option<&Schema>) -> LoadResult<DataSet> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;

    let available = parquet_leaf_columns(&reader);
    let (schema, derived) = match schema {
        Some(schema) => {
            for field in &schema.fields {
                if !available.iter().any(|(name, ..)| name == &field.name) {
                    return Err(LoadError::schema(format!(
                        "missing required column '{}'",
                        field.name
                    )));
                }
            }
            (schema.clone(), false)
        }
        None => {
            let fields = available
                .iter()
                .filter(|(name, ..)| !name.contains('.'))
                .map(|(name, physical, converted)| {
                    Field::new(name.clone(), data_type_for(*physical, *converted))
                })
                .collect();
            (Schema::new(fields), true)
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.into_iter().enumerate() {
        let row_num = idx0 + 1;
        let row = row_res?;

        // Build a name->Field map for lookup.
        let mut map: HashMap<&str, &ParquetField> = HashMap::new();
        for (name, field) in row.get_column_iter() {
            map.insert(name.as_str(), field);
        }

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            let v = map.get(f.name.as_str()).ok_or_else(|| {
                LoadError::schema(format!("row {row_num} missing required column '{}'", f.name))
            })?;
            out_row.push(convert_parquet_field(row_num, &f.name, f.data_type, v, derived)?);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

fn parquet_leaf_columns<R: ChunkReader + 'static>(
    reader: &SerializedFileReader<R>,
) -> Vec<(String, PhysicalType, ConvertedType)> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| (c.path().string(), c.physical_type(), c.converted_type()))
        .collect()
}

/// Dates, timestamps and decimals stored as integers are read as their rendered text.
fn data_type_for(physical: PhysicalType, converted: ConvertedType) -> DataType {
    match (physical, converted) {
        (PhysicalType::BOOLEAN, _) => DataType::Bool,
        (
            PhysicalType::INT32 | PhysicalType::INT64,
            ConvertedType::NONE
            | ConvertedType::INT_8
            | ConvertedType::INT_16
            | ConvertedType::INT_32
            | ConvertedType::INT_64
            | ConvertedType::UINT_8
            | ConvertedType::UINT_16
            | ConvertedType::UINT_32
            | ConvertedType::UINT_64,
        ) => DataType::Int64,
        (PhysicalType::FLOAT | PhysicalType::DOUBLE, _) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn convert_parquet_field(
    row: usize,
    column: &str,
    data_type: DataType,
    f: &ParquetField,
    text_fallback: bool,
) -> LoadResult<Value> {
    if matches!(f, ParquetField::Null) {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| LoadError::ParseError {
        row,
        column: column.to_string(),
        raw: f.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => match f {
            ParquetField::Str(s) => Ok(Value::Utf8(s.clone())),
            _ if text_fallback => Ok(Value::Utf8(f.to_string())),
            _ => Err(mismatch("expected string")),
        },
        DataType::Bool => match f {
            ParquetField::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("expected bool")),
        },
        DataType::Int64 => match f {
            ParquetField::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Short(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Int(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::Long(v) => Ok(Value::Int64(*v)),
            ParquetField::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            ParquetField::ULong(v) => i64::try_from(*v)
                .map(Value::Int64)
                .map_err(|_| mismatch("u64 out of range for i64")),
            _ => Err(mismatch("expected integer")),
        },
        DataType::Float64 => match f {
            ParquetField::Float(v) => Ok(Value::Float64(f64::from(*v))),
            ParquetField::Double(v) => Ok(Value::Float64(*v)),
            _ => Err(mismatch("expected number")),
        },
    }
}
