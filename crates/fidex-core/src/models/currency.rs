//! Currency codes recognised by the amount extractors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of currencies the extractor classifies amounts into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// Russian rouble.
    Rub,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
    /// Kazakhstani tenge.
    Kzt,
    /// Kyrgyzstani som.
    Kgs,
    /// Amount without a recognisable currency.
    #[default]
    Unknown,
}

impl CurrencyCode {
    /// ISO-style code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Kzt => "KZT",
            Self::Kgs => "KGS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Symbol used when formatting amounts.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Rub => "₽",
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Kzt => "₸",
            Self::Kgs => "сом",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(CurrencyCode::default(), CurrencyCode::Unknown);
        assert_eq!(CurrencyCode::default().symbol(), "");
    }

    #[test]
    fn test_serializes_as_code() {
        assert_eq!(serde_json::to_string(&CurrencyCode::Kzt).unwrap(), "\"KZT\"");
        assert_eq!(serde_json::from_str::<CurrencyCode>("\"UNKNOWN\"").unwrap(), CurrencyCode::Unknown);
    }
}
