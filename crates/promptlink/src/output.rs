use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

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

/// One command and the device's answer.
#[derive(Debug, Serialize)]
pub struct ResponseRecord<'a> {
    pub port: &'a str,
    pub command: &'a str,
    pub response: &'a str,
    pub elapsed_ms: u64,
    pub timestamp: String,
}

impl<'a> ResponseRecord<'a> {
    pub fn new(port: &'a str, command: &'a str, response: &'a str, elapsed_ms: u64) -> Self {
        Self {
            port,
            command,
            response,
            elapsed_ms,
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_response(record: &ResponseRecord<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "COMMAND", "RESPONSE", "MS"])
                .add_row(vec![
                    record.port.to_string(),
                    record.command.to_string(),
                    printable(record.response),
                    record.elapsed_ms.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} -> {} ({} ms)",
                record.port,
                record.command,
                printable(record.response),
                record.elapsed_ms
            );
        }
        OutputFormat::Raw => {
            print_raw(record.response.as_bytes());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeRecord<'a> {
    pub port: &'a str,
    pub synchronized: bool,
    pub elapsed_ms: u64,
}

pub fn print_probe(record: &ProbeRecord<'_>, format: OutputFormat) {
    let status = if record.synchronized { "ready" } else { "no prompt" };
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["PORT", "STATUS", "MS"])
                .add_row(vec![
                    record.port.to_string(),
                    status.to_string(),
                    record.elapsed_ms.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}: {status} ({} ms)", record.port, record.elapsed_ms),
        OutputFormat::Raw => println!("{}", record.synchronized),
    }
}

pub fn print_ports(ports: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "ports": ports })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["PORT"]);
            for port in ports {
                table.add_row(vec![port.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                println!("{port}");
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

/// Device responses carry CR/LF between lines; show them inline.
pub fn printable(response: &str) -> String {
    response.escape_debug().to_string()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
