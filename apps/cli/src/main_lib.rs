use std::fmt::Write as _;

use navquote_engine::{PriceRecord, QueryRequest, RecordStatus};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    let log_format = std::env::var("NAVQUOTE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // logs go to stderr so stdout stays machine-readable
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub fn build_requests(identifiers: &[String], date: Option<&str>) -> Vec<QueryRequest> {
    identifiers
        .iter()
        .map(|identifier| {
            let request = QueryRequest::new(identifier.as_str());
            match date {
                Some(date) => request.with_date_hint(date),
                None => request,
            }
        })
        .collect()
}

pub fn render_json(records: &[PriceRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

pub fn render_table(records: &[PriceRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<12} {:>12} {:<10} {:<7} NAME",
        "ID", "SYMBOL", "PRICE", "DATE", "STATUS"
    );

    for record in records {
        let price = record
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let date = record
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = match record.status {
            RecordStatus::Success => "ok",
            RecordStatus::Failure => "failed",
        };
        let _ = writeln!(
            out,
            "{:<12} {:<12} {:>12} {:<10} {:<7} {}",
            record.id, record.symbol, price, date, status, record.name
        );
    }
    out
}
