//! Canonical Arrow schema for harvested records.
//!
//! Single source of truth for the column order of checkpoint artifacts and
//! the merged dataset.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use fedigraph_common::{HarvestError, HarvestRecord, Result};

#[cfg(test)]
use crate::table::string_column;

/// Column names in output order.
pub const RECORD_COLUMNS: [&str; 6] = ["id", "username", "handle", "server", "parent_id", "host"];

pub fn record_schema() -> Schema {
    Schema::new(
        RECORD_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    )
}

pub fn record_schema_ref() -> SchemaRef {
    Arc::new(record_schema())
}

pub fn records_to_batch(records: &[HarvestRecord]) -> std::result::Result<RecordBatch, ArrowError> {
    let mut b_id = StringBuilder::new();
    let mut b_username = StringBuilder::new();
    let mut b_handle = StringBuilder::new();
    let mut b_server = StringBuilder::new();
    let mut b_parent = StringBuilder::new();
    let mut b_host = StringBuilder::new();

    for r in records {
        b_id.append_value(&r.id);
        b_username.append_value(&r.username);
        b_handle.append_value(&r.handle);
        b_server.append_value(r.server());
        b_parent.append_value(&r.parent_id);
        b_host.append_value(&r.host);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(b_id.finish()),
        Arc::new(b_username.finish()),
        Arc::new(b_handle.finish()),
        Arc::new(b_server.finish()),
        Arc::new(b_parent.finish()),
        Arc::new(b_host.finish()),
    ];
    RecordBatch::try_new(record_schema_ref(), columns)
}

/// Decode a batch laid out with [`record_schema`]. `server` is derived, so it is not read back.
#[cfg(test)]
pub(crate) fn batch_to_records(batch: &RecordBatch) -> Result<Vec<HarvestRecord>> {
    let id = string_column(batch, "id")?;
    let username = string_column(batch, "username")?;
    let handle = string_column(batch, "handle")?;
    let parent = string_column(batch, "parent_id")?;
    let host = string_column(batch, "host")?;

    Ok((0..batch.num_rows())
        .map(|i| HarvestRecord {
            id: id.value(i).to_string(),
            username: username.value(i).to_string(),
            handle: handle.value(i).to_string(),
            parent_id: parent.value(i).to_string(),
            host: host.value(i).to_string(),
        })
        .collect())
}

/// Names and types must match the canonical schema, in order.
pub fn check_record_schema(schema: &Schema, path: &str) -> Result<()> {
    let expected = record_schema();
    let matches = schema.fields().len() == expected.fields().len()
        && schema
            .fields()
            .iter()
            .zip(expected.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
    if matches {
        Ok(())
    } else {
        let found: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        Err(HarvestError::InvalidArtifact {
            path: path.to_string(),
            message: format!("unexpected columns {found:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, handle: &str) -> HarvestRecord {
        HarvestRecord {
            id: id.to_string(),
            username: format!("user{id}"),
            handle: handle.to_string(),
            parent_id: "555".to_string(),
            host: "mas.to".to_string(),
        }
    }

    #[test]
    fn schema_field_names_are_stable() {
        let schema = record_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, RECORD_COLUMNS.to_vec());
    }

    #[test]
    fn batch_carries_derived_server_column() {
        let batch =
            records_to_batch(&[record("1", "a@fosstodon.org"), record("2", "b")]).unwrap();
        let server = string_column(&batch, "server").unwrap();
        assert_eq!(server.value(0), "fosstodon.org");
        assert_eq!(server.value(1), "mastodon.social");
    }

    #[test]
    fn decoded_records_match_input() {
        let records = vec![record("1", "a@fosstodon.org"), record("2", "b")];
        let batch = records_to_batch(&records).unwrap();
        assert_eq!(batch_to_records(&batch).unwrap(), records);
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let schema = Schema::new(vec![Field::new("id", DataType::Utf8, false)]);
        assert!(check_record_schema(&schema, "x.parquet").is_err());
        assert!(check_record_schema(&record_schema(), "x.parquet").is_ok());
    }
}
