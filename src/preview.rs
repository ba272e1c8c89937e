//! `preview` command: streams records through a single reused row slot.
//!
//! The header is indexed once into shared [`ColumnNames`]; each record is
//! decoded into the row, displayed, and the row disposed so the next record
//! lands in the same slot and the same pooled buffer.

use std::{io::Write, sync::Arc};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::{debug, info};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{
    cli::PreviewArgs,
    convert::{CellConverter, TypeDescriber},
    data::Value,
    io_utils,
    lookup::LookupStrategy,
    names::ColumnNames,
    owner::{ReadOptions, RowOwner},
    pool::{RecyclingPool, SharedPool},
    range::DynamicRowRange,
    table,
};

/// Labels and typed values of one displayed row, serialized as a JSON object.
struct TypedRecord<'a> {
    labels: &'a [String],
    values: Vec<Option<Value>>,
}

impl Serialize for TypedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.labels.len()))?;
        for (label, value) in self.labels.iter().zip(&self.values) {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader(&args.input, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;

    let recycling = Arc::new(RecyclingPool::new());
    let pool: SharedPool = recycling.clone();
    let strategy = if args.binary_search {
        LookupStrategy::BinarySearch
    } else {
        LookupStrategy::Adaptive
    };
    let names = ColumnNames::create_with(&headers, &pool, strategy)
        .with_context(|| format!("Indexing header of {:?}", args.input))?;
    debug!(
        "Header of {} column(s) indexed with {}",
        names.len(),
        names.lookup_kind()
    );

    let describer = args
        .types
        .iter()
        .fold(TypeDescriber::default(), |describer, (name, kind)| {
            describer.with_column(name.clone(), CellConverter::Parse(*kind))
        });
    let options = ReadOptions {
        capture_names: !args.no_names,
        ..ReadOptions::default()
    };
    let mut owner = RowOwner::new(pool, describer, options);

    let width = headers.len();
    let start = args.range.map_or(0, |r| r.start);
    let end = args.range.and_then(|r| r.end).unwrap_or(width);
    if start > width || end > width {
        return Err(anyhow!(
            "Range {start}:{end} exceeds the {width} column(s) of {:?}",
            args.input
        ));
    }

    let mut labels: Option<Vec<String>> = None;
    let mut selected: Vec<usize> = Vec::new();
    let mut table_rows = Vec::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut displayed = 0usize;

    for (idx, record) in reader.byte_records().enumerate() {
        if idx >= args.rows {
            break;
        }
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let id = owner.next_row(width, Some(&names))?;
        {
            let row = owner.row_mut(id)?;
            for (ordinal, field) in record.iter().enumerate() {
                let text = io_utils::decode_field(field, encoding)
                    .with_context(|| format!("Decoding row {} column {ordinal}", idx + 2))?;
                row.set_value(ordinal, &text)?;
            }
        }

        let range = owner.row(id)?.range(start..end)?;
        if labels.is_none() {
            let (ordinals, header) = select_columns(&owner, &range, &args.columns)?;
            debug!("Displaying column(s): {}", header.iter().join(", "));
            selected = ordinals;
            labels = Some(header);
        }
        let values = selected
            .iter()
            .map(|ordinal| range.cell(*ordinal)?.convert(&owner))
            .collect::<crate::Result<Vec<_>>>()
            .with_context(|| format!("Converting row {}", idx + 2))?;

        if args.json {
            let record = TypedRecord {
                labels: labels.as_deref().unwrap_or_default(),
                values,
            };
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        } else {
            table_rows.push(
                values
                    .iter()
                    .map(|value| value.as_ref().map(Value::as_display).unwrap_or_default())
                    .collect::<Vec<_>>(),
            );
        }
        owner.dispose_row(id)?;
        displayed += 1;
    }

    let labels = match labels {
        Some(labels) => labels,
        None => headers[start..end].to_vec(),
    };
    if !args.json {
        table::print_table(&labels, &table_rows);
    }
    info!(
        "Displayed {displayed} row(s) from {:?} using {} pooled block(s)",
        args.input,
        recycling.rented()
    );
    Ok(())
}

/// Resolves `--columns` within the range, or takes every column of it.
fn select_columns(
    owner: &RowOwner,
    range: &DynamicRowRange,
    columns: &[String],
) -> Result<(Vec<usize>, Vec<String>)> {
    let identifiers = range.columns(owner)?;
    if columns.is_empty() {
        let labels = identifiers.iter().map(|c| c.label()).collect();
        return Ok(((0..range.len()).collect(), labels));
    }
    let mut ordinals = Vec::with_capacity(columns.len());
    let mut labels = Vec::with_capacity(columns.len());
    for column in columns {
        let ordinal = range
            .ordinal_of(owner, column.trim())
            .with_context(|| format!("Selecting column '{column}'"))?;
        ordinals.push(ordinal);
        labels.push(identifiers[ordinal].label());
    }
    Ok((ordinals, labels))
}
