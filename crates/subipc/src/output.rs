use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use subipc_serial::{to_json, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

#[derive(Serialize)]
struct MessageOutput<'a> {
    seq: usize,
    kind: &'a str,
    message: serde_json::Value,
    timestamp: String,
}

pub fn print_message(seq: usize, value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                seq,
                kind: value.kind(),
                message: json_view(value),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "KIND", "MESSAGE"])
                .add_row(vec![seq.to_string(), value.kind().to_string(), preview(value)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("#{seq} kind={} message={}", value.kind(), preview(value));
        }
    }
}

/// JSON form of a received message.
///
/// Values the JSON model cannot hold (cycles, non-finite numbers) fall back
/// to their debug rendering as a string.
fn json_view(value: &Value) -> serde_json::Value {
    to_json(value).unwrap_or_else(|_| serde_json::Value::String(format!("{value:?}")))
}

fn preview(value: &Value) -> String {
    match to_json(value) {
        Ok(json) => json.to_string(),
        Err(_) => format!("{value:?}"),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
