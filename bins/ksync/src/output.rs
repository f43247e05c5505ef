//! Text and JSON printing.

use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a list of records, one per line as text or as a JSON array.
pub fn print_all<T: Serialize + Display>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
    }
    Ok(())
}

/// Print a single streamed record. JSON output is one object per line.
pub fn print_one<T: Serialize + Display>(item: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(item)?),
        OutputFormat::Text => println!("{}", item),
    }
    Ok(())
}
