use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use usbfs_host::{EntryKind, Listing};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a flat record. `fields` is the human-readable view of `record`.
pub fn print_record<T: Serialize>(record: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_uppercase(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            for (_, value) in fields {
                println!("{value}");
            }
        }
    }
}

pub fn print_listing(listing: &Listing, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(listing),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "KIND"]);
            for entry in &listing.entries {
                table.add_row(vec![entry.name.clone(), kind_name(entry.kind).to_string()]);
            }
            println!("{}", listing.path);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", listing.path);
            for entry in &listing.entries {
                let suffix = if entry.kind == EntryKind::Dir { "/" } else { "" };
                println!("  {}{suffix}", entry.name);
            }
        }
        OutputFormat::Raw => {
            for entry in &listing.entries {
                println!("{}", entry.name);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Dir => "dir",
    }
}
