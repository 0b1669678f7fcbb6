//! Output formatting for CLI commands.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::Serialize;
use serde_json::Value;

use crate::upstream::types::{IndexDefinition, IndexStats, SearchResults};

/// Output mode for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

fn output_json<T: Serialize>(item: &T) {
    match serde_json::to_string_pretty(item) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
    }
}

fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("{}", "No results found.".dimmed());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

pub fn print_indexes(indexes: &[IndexDefinition], mode: OutputMode) {
    if mode == OutputMode::Json {
        return output_json(&indexes);
    }
    let rows = indexes
        .iter()
        .map(|index| {
            let kinds = index
                .fields
                .iter()
                .filter(|f| f.searchable)
                .map(|f| f.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                index.name.clone(),
                index.fields.len().to_string(),
                kinds,
            ]
        })
        .collect();
    print_table(&["Index", "Fields", "Searchable"], rows);
}

pub fn print_hits(results: &SearchResults, mode: OutputMode) {
    if mode == OutputMode::Json {
        return output_json(&results);
    }
    println!(
        "{} {} hits",
        "Found".green().bold(),
        results.total_count.to_string().bold()
    );
    let rows = results
        .hits
        .iter()
        .map(|hit| {
            let preview = hit
                .document
                .iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => {
                        let short: String = s.chars().take(60).collect();
                        Some(format!("{}: {}", k, short))
                    }
                    Value::Number(n) => Some(format!("{}: {}", k, n)),
                    _ => None,
                })
                .take(3)
                .collect::<Vec<_>>()
                .join(" | ");
            vec![format!("{:.3}", hit.score), preview]
        })
        .collect();
    print_table(&["Score", "Document"], rows);
}

pub fn print_stats(name: &str, stats: &IndexStats, mode: OutputMode) {
    if mode == OutputMode::Json {
        return output_json(&stats);
    }
    println!("{}", name.bold());
    println!("  documents: {}", stats.document_count);
    println!("  storage:   {} bytes", stats.storage_bytes);
}
