//! Tabular file I/O shared by the source reader, checkpoint writer, merge
//! stage and edge aggregation.
//!
//! Format is picked from the file extension: `.parquet` or `.csv`. Every
//! write goes to a temp file in the destination directory and is renamed into
//! place, so readers never observe a half-written table.

use std::fs::{self, File};
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use fedigraph_common::{HarvestError, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

/// ZSTD level for every Parquet file written.
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(HarvestError::Source(format!(
                "unsupported table format (expected .csv or .parquet): {}",
                path.display()
            ))),
        }
    }
}

/// Read a whole table into memory.
pub fn read_table(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path),
        TableFormat::Parquet => read_parquet(path),
    }
}

/// CSV columns are all read as nullable UTF-8: ids are opaque strings even
/// when they look numeric.
fn read_csv(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut file = File::open(path)?;
    let format = arrow::csv::reader::Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, Some(1))?;
    file.rewind()?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = arrow::csv::ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

pub fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

/// Write `batches` to `path` atomically. Parent directories are created.
pub fn write_table(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    match format {
        TableFormat::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(tmp.as_file());
            if batches.is_empty() {
                writer.write(&RecordBatch::new_empty(schema))?;
            }
            for batch in batches {
                writer.write(batch)?;
            }
        }
        TableFormat::Parquet => {
            let mut writer =
                ArrowWriter::try_new(tmp.as_file().try_clone()?, schema, Some(writer_properties()?))?;
            for batch in batches {
                writer.write(batch)?;
            }
            writer.close()?;
        }
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| HarvestError::Io(e.error))?;
    Ok(())
}

fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(ZSTD_LEVEL)?))
        .build())
}

/// Named column cast to UTF-8. Missing columns are a source error.
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let column: &ArrayRef = batch.column_by_name(name).ok_or_else(|| {
        HarvestError::Source(format!("missing column '{name}'"))
    })?;
    let cast = arrow::compute::cast(column, &DataType::Utf8)?;
    cast.as_string_opt::<i32>()
        .cloned()
        .ok_or_else(|| HarvestError::Source(format!("column '{name}' is not text")))
}

/// Value at `row`, or `None` for nulls and blank strings.
pub fn non_empty(array: &StringArray, row: usize) -> Option<&str> {
    if array.is_null(row) {
        return None;
    }
    let value = array.value(row).trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::UInt64Array;

    fn sample() -> (SchemaRef, RecordBatch) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("count", DataType::UInt64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["a", "b"])),
                Arc::new(UInt64Array::from(vec![1, 2])),
            ],
        )
        .unwrap();
        (schema, batch)
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(TableFormat::from_path(Path::new("x/a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(
            TableFormat::from_path(Path::new("a.parquet")).unwrap(),
            TableFormat::Parquet
        );
        assert!(TableFormat::from_path(Path::new("a.json")).is_err());
    }

    #[test]
    fn csv_numeric_columns_come_back_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let (schema, batch) = sample();
        write_table(&path, schema, &[batch]).unwrap();

        let (read_schema, batches) = read_table(&path).unwrap();
        assert_eq!(read_schema.field(1).data_type(), &DataType::Utf8);
        let counts = string_column(&batches[0], "count").unwrap();
        assert_eq!(counts.value(1), "2");
    }

    #[test]
    fn parquet_cast_to_string_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/t.parquet");
        let (schema, batch) = sample();
        write_table(&path, schema, &[batch]).unwrap();

        let (_, batches) = read_table(&path).unwrap();
        let counts = string_column(&batches[0], "count").unwrap();
        assert_eq!(counts.value(0), "1");
    }

    #[test]
    fn empty_csv_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let (schema, _) = sample();
        write_table(&path, schema, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "id,count");
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let (schema, batch) = sample();
        write_table(&dir.path().join("t.parquet"), schema, &[batch]).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["t.parquet".to_string()]);
    }

    #[test]
    fn missing_column_is_reported() {
        let (_, batch) = sample();
        let err = string_column(&batch, "host").unwrap_err();
        assert!(err.to_string().contains("missing column 'host'"));
    }

    #[test]
    fn blank_values_are_treated_as_absent() {
        let array = StringArray::from(vec![Some("x"), Some("  "), None]);
        assert_eq!(non_empty(&array, 0), Some("x"));
        assert_eq!(non_empty(&array, 1), None);
        assert_eq!(non_empty(&array, 2), None);
    }
}
