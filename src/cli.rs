use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::ColumnType;

#[derive(Debug, Parser)]
#[command(author, version, about = "Read CSV files through packed, reusable dynamic rows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a column-name lookup and resolve names against it
    Lookup(LookupArgs),
    /// Preview rows of a CSV file, optionally narrowed to a column range or typed
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// CSV file whose header row supplies the names ('-' reads stdin)
    #[arg(short = 'i', long = "input", required_unless_present = "names")]
    pub input: Option<PathBuf>,
    /// Comma-separated names to index instead of a header row
    #[arg(long = "names", value_delimiter = ',', conflicts_with = "input")]
    pub names: Vec<String>,
    /// Names to resolve against the lookup
    #[arg(short = 'f', long = "find", value_delimiter = ',')]
    pub find: Vec<String>,
    /// Skip the trie and always build the binary-search table
    #[arg(long = "binary-search")]
    pub binary_search: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input CSV file to preview ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Restrict output to a column range such as `1:3`, `2:` or `:4` (end exclusive)
    #[arg(long = "range", value_parser = parse_column_range)]
    pub range: Option<ColumnRange>,
    /// Columns to display, resolved by name within the selected range
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Typed conversions as `name:type` (e.g. `qty:integer,price:decimal`)
    #[arg(
        long = "type",
        value_delimiter = ',',
        value_parser = parse_column_type,
        conflicts_with = "no_names"
    )]
    pub types: Vec<(String, ColumnType)>,
    /// Emit one JSON object per row instead of a table
    #[arg(long)]
    pub json: bool,
    /// Do not attach header names to rows; columns are addressed by position only
    #[arg(long = "no-names")]
    pub no_names: bool,
    /// Build the binary-search lookup for header names instead of the trie
    #[arg(long = "binary-search")]
    pub binary_search: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Half-open column bounds; a missing end means "to the last column".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub start: usize,
    pub end: Option<usize>,
}

pub fn parse_column_range(value: &str) -> Result<ColumnRange, String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("Range '{value}' must look like start:end"))?;
    let bound = |text: &str| -> Result<Option<usize>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<usize>()
            .map(Some)
            .map_err(|_| format!("Range bound '{text}' is not a column position"))
    };
    let start = bound(start)?.unwrap_or(0);
    let end = bound(end)?;
    if end.is_some_and(|end| end < start) {
        return Err(format!("Range '{value}' ends before it starts"));
    }
    Ok(ColumnRange { start, end })
}

pub fn parse_column_type(value: &str) -> Result<(String, ColumnType), String> {
    let (name, kind) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("Type override '{value}' must look like name:type"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Type override '{value}' is missing a column name"));
    }
    let kind = kind.parse::<ColumnType>().map_err(|err| err.to_string())?;
    Ok((name.to_string(), kind))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
