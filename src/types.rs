// =============================================================================
// Shared types used across the dashboard engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A column family in a provider price table.
///
/// The string form is the column name the provider uses, which is also the
/// key used inside [`crate::market_data::PriceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    #[serde(rename = "Adj Close")]
    AdjClose,
    Volume,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::AdjClose => "Adj Close",
            Self::Volume => "Volume",
        }
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_field_names_match_provider_columns() {
        assert_eq!(PriceField::AdjClose.to_string(), "Adj Close");
        assert_eq!(PriceField::Close.as_str(), "Close");
        assert_eq!(PriceField::Volume.to_string(), "Volume");
    }

    #[test]
    fn price_field_serde_uses_column_name() {
        let json = serde_json::to_string(&PriceField::AdjClose).unwrap();
        assert_eq!(json, "\"Adj Close\"");
    }
}
