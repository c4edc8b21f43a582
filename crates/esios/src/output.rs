//! Table/CSV/JSON rendering of a `WideFrame`. Deliberately thin: this is
//! presentation, not a dataframe library (spec.md §1 explicitly keeps
//! formatting out of the core).

use std::io::Write;

use clap::ValueEnum;
use esios_types::{EsiosError, WideFrame};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

pub fn render(frame: &WideFrame, format: OutputFormat) -> Result<String, EsiosError> {
    match format {
        OutputFormat::Table => Ok(render_table(frame)),
        OutputFormat::Csv => render_csv(frame),
        OutputFormat::Json => render_json(frame),
    }
}

fn render_table(frame: &WideFrame) -> String {
    let columns: Vec<&str> = frame.columns().collect();
    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|c| (*c).to_string()));

    let mut rows = vec![header.clone()];
    for (row, ts) in frame.index().iter().enumerate() {
        let mut line = vec![ts.to_rfc3339()];
        for column in &columns {
            line.push(match frame.get(row, column) {
                Some(value) => format!("{value}"),
                None => String::new(),
            });
        }
        rows.push(line);
    }

    let widths: Vec<usize> = (0..header.len())
        .map(|i| rows.iter().map(|r| r[i].width()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &rows {
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&format!("{cell:<width$}  "));
        }
        out.push('\n');
    }
    out
}

fn render_csv(frame: &WideFrame) -> Result<String, EsiosError> {
    let columns: Vec<&str> = frame.columns().collect();
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|c| (*c).to_string()));
    writer
        .write_record(&header)
        .map_err(|err| EsiosError::Config(format!("csv write failed: {err}")))?;

    for (row, ts) in frame.index().iter().enumerate() {
        let mut line = vec![ts.to_rfc3339()];
        for column in &columns {
            line.push(frame.get(row, column).map(|v| v.to_string()).unwrap_or_default());
        }
        writer
            .write_record(&line)
            .map_err(|err| EsiosError::Config(format!("csv write failed: {err}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| EsiosError::Config(format!("csv flush failed: {err}")))?;
    String::from_utf8(bytes).map_err(|err| EsiosError::Config(format!("csv output was not UTF-8: {err}")))
}

fn render_json(frame: &WideFrame) -> Result<String, EsiosError> {
    let columns: Vec<&str> = frame.columns().collect();
    let mut rows = Vec::with_capacity(frame.index().len());

    for (row, ts) in frame.index().iter().enumerate() {
        let mut obj = serde_json::Map::new();
        obj.insert("timestamp".to_string(), serde_json::Value::String(ts.to_rfc3339()));
        for column in &columns {
            let value = match frame.get(row, column) {
                Some(v) => serde_json::json!(v),
                None => serde_json::Value::Null,
            };
            obj.insert((*column).to_string(), value);
        }
        rows.push(serde_json::Value::Object(obj));
    }

    serde_json::to_string_pretty(&rows).map_err(|err| EsiosError::Config(format!("json serialize failed: {err}")))
}

#[allow(clippy::print_stdout)]
pub fn write_output(rendered: &str, output_path: Option<&std::path::Path>) -> Result<(), EsiosError> {
    match output_path {
        Some(path) => esios_fs::write_atomic(path, rendered.as_bytes()).map_err(EsiosError::from),
        None => {
            print!("{rendered}");
            std::io::stdout().flush().map_err(EsiosError::from)
        }
    }
}
