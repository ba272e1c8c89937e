pub mod cell;
pub mod cli;
pub mod convert;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod lookup;
pub mod names;
pub mod ordered_names;
pub mod owner;
mod packed;
pub mod pool;
pub mod preview;
pub mod range;
pub mod row;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result as CliResult, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

pub use cell::{DynamicCell, RowCells};
pub use convert::{CellConverter, ReadContext, RowConverter, TypeDescriber, TypedRow};
pub use data::{ColumnType, Value};
pub use error::{DynamicError, Result};
pub use lookup::{LookupKind, LookupStrategy, NameLookup};
pub use names::ColumnNames;
pub use owner::{OwnerContext, ReadOptions, RowDisposal, RowOwner, UserContext};
pub use pool::{HeapPool, MemoryPool, RecyclingPool, SharedPool, heap_pool};
pub use range::DynamicRowRange;
pub use row::{ColumnIdentifier, DynamicRow, RowId, RowView};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_dynamic", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> CliResult<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Lookup(args) => handle_lookup(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}

fn handle_lookup(args: &cli::LookupArgs) -> CliResult<()> {
    let names = match &args.input {
        Some(path) => {
            let delimiter = io_utils::resolve_input_delimiter(path, args.delimiter);
            info!(
                "Reading header of '{}' with delimiter '{}'",
                path.display(),
                printable_delimiter(delimiter)
            );
            let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
            let mut reader = io_utils::open_csv_reader(path, delimiter)?;
            io_utils::reader_headers(&mut reader, encoding)?
        }
        None => args.names.iter().map(|n| n.trim().to_string()).collect(),
    };
    if names.is_empty() {
        return Err(anyhow!("No column names to index"));
    }

    let strategy = if args.binary_search {
        LookupStrategy::BinarySearch
    } else {
        LookupStrategy::Adaptive
    };
    let pool = heap_pool();
    let lookup = NameLookup::create_with(&names, &pool, strategy)
        .with_context(|| format!("Indexing {} column name(s)", names.len()))?;
    info!(
        "Indexed {} name(s) with {} in {} byte(s)",
        lookup.len(),
        lookup.kind(),
        lookup.encoded_len()
    );

    let headers = vec!["name".to_string(), "ordinal".to_string()];
    let targets: Vec<&String> = if args.find.is_empty() {
        names.iter().collect()
    } else {
        args.find.iter().collect()
    };
    debug!("Resolving {} name(s)", targets.len());
    let rows = targets
        .into_iter()
        .map(|name| {
            let ordinal = lookup
                .try_lookup(name)
                .map_or_else(|| "(not found)".to_string(), |o| o.to_string());
            vec![name.clone(), ordinal]
        })
        .collect::<Vec<_>>();
    println!("backend: {}", lookup.kind());
    table::print_table(&headers, &rows);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
