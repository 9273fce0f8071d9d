pub mod normalizer;
pub mod price_table;

// Re-exports for convenient access (e.g. `use crate::market_data::PriceTable`).
pub use normalizer::{normalize_preferred, ticker_frames, CanonicalSeries, CLOSE_PREFERENCE};
pub use price_table::{OhlcvRecord, PriceTable, TableColumns, TickerFrame};
