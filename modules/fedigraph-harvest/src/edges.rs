//! Reshare edges: how often each account reshared each author's posts,
//! computed from a merged rebloggers dataset.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use fedigraph_common::Result;
use tracing::info;

use crate::table::{non_empty, read_table, string_column, write_table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSummary {
    /// Input rows that contributed to an edge.
    pub rows: usize,
    /// Distinct (author, reblogger) pairs written.
    pub edges: usize,
}

pub fn edge_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("author_id", DataType::Utf8, false),
        Field::new("reblogger_id", DataType::Utf8, false),
        Field::new("reblogged_count", DataType::UInt64, false),
    ]))
}

/// Count rows per (`parent_id`, `id`) in `input` and write them to `output`,
/// ordered by author then reblogger.
pub fn aggregate_edges(input: &Path, output: &Path) -> Result<EdgeSummary> {
    let (_, batches) = read_table(input)?;

    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut rows = 0usize;
    for batch in &batches {
        let authors = string_column(batch, "parent_id")?;
        let rebloggers = string_column(batch, "id")?;
        for row in 0..batch.num_rows() {
            if let (Some(author), Some(reblogger)) =
                (non_empty(&authors, row), non_empty(&rebloggers, row))
            {
                *counts
                    .entry((author.to_string(), reblogger.to_string()))
                    .or_insert(0) += 1;
                rows += 1;
            }
        }
    }

    let mut b_author = StringBuilder::new();
    let mut b_reblogger = StringBuilder::new();
    let mut b_count = UInt64Builder::new();
    for ((author, reblogger), count) in &counts {
        b_author.append_value(author);
        b_reblogger.append_value(reblogger);
        b_count.append_value(*count);
    }
    let schema = edge_schema();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(b_author.finish()),
        Arc::new(b_reblogger.finish()),
        Arc::new(b_count.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_table(output, schema, &[batch])?;

    info!(rows, edges = counts.len(), output = %output.display(), "Reshare edges written");
    Ok(EdgeSummary {
        rows,
        edges: counts.len(),
    })
}
