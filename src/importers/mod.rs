// Import module - bulk price files

pub mod price_csv;

pub use price_csv::{parse_price_csv, parse_price_text, PriceFile, SkippedRow};
