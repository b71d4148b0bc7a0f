use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::service::PriceQuote;

/// Quotes read from a price file, plus rows that could not be used
#[derive(Debug, Default)]
pub struct PriceFile {
    pub quotes: Vec<PriceQuote>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based line number in the file, header included
    pub line: usize,
    pub reason: String,
}

/// Parse a `symbol,price` CSV file
pub fn parse_price_csv<P: AsRef<Path>>(file_path: P) -> Result<PriceFile> {
    let path = file_path.as_ref();
    info!("Parsing price file: {:?}", path);

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read price file {:?}", path))?;
    parse_price_text(&contents)
}

/// Parse price CSV content. Comma and semicolon delimiters are accepted;
/// header names are matched case-insensitively.
pub fn parse_price_text(contents: &str) -> Result<PriceFile> {
    let first_line = contents.lines().next().unwrap_or_default();
    let delimiter = if first_line.contains(';') && !first_line.contains(',') {
        b';'
    } else {
        b','
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let (symbol_idx, price_idx) = find_columns(&headers)?;

    let mut file = PriceFile::default();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.with_context(|| format!("Failed to read CSV record on line {}", line))?;

        match parse_row(&record, symbol_idx, price_idx) {
            Ok(Some(quote)) => file.quotes.push(quote),
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping row {}: {}", line, e);
                file.skipped.push(SkippedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Parsed {} quotes ({} rows skipped)",
        file.quotes.len(),
        file.skipped.len()
    );
    Ok(file)
}

fn find_columns(headers: &csv::StringRecord) -> Result<(usize, usize)> {
    let mut symbol_idx = None;
    let mut price_idx = None;

    for (idx, header) in headers.iter().enumerate() {
        match header.to_lowercase().as_str() {
            "symbol" | "ticker" => symbol_idx = symbol_idx.or(Some(idx)),
            "price" | "close" | "last" => price_idx = price_idx.or(Some(idx)),
            _ => {}
        }
    }

    Ok((
        symbol_idx.ok_or_else(|| anyhow!("Symbol column not found (expected 'symbol' or 'ticker')"))?,
        price_idx.ok_or_else(|| anyhow!("Price column not found (expected 'price', 'close' or 'last')"))?,
    ))
}

fn parse_row(
    record: &csv::StringRecord,
    symbol_idx: usize,
    price_idx: usize,
) -> Result<Option<PriceQuote>> {
    // Blank lines
    if record.iter().all(|field| field.is_empty()) {
        return Ok(None);
    }

    let symbol = record
        .get(symbol_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing symbol"))?;
    let raw_price = record
        .get(price_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing price for {}", symbol))?;
    let price = Decimal::from_str(raw_price)
        .map_err(|e| anyhow!("invalid price '{}' for {}: {}", raw_price, symbol, e))?;

    Ok(Some(PriceQuote {
        symbol: symbol.to_uppercase(),
        price,
    }))
}
