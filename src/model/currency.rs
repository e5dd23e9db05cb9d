//! The display currencies a user can choose between.

use crate::error::BudgetError;
use serde::{Deserialize, Serialize};

/// One of the supported display currencies. Every variant has a symbol; adding a currency means
/// adding a variant here and a symbol in `symbol`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Php,
    Eur,
    Usd,
    Gbp,
    Cad,
    Chf,
    Jpy,
    Aud,
}

serde_plain::derive_display_from_serialize!(Currency);

impl Currency {
    /// All supported currencies, in the order they are offered to the user.
    pub const ALL: [Currency; 8] = [
        Currency::Php,
        Currency::Eur,
        Currency::Usd,
        Currency::Gbp,
        Currency::Cad,
        Currency::Chf,
        Currency::Jpy,
        Currency::Aud,
    ];

    /// Used when neither a stored preference nor a profile currency is available.
    pub const DEFAULT_DISPLAY: Currency = Currency::Eur;

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Php => "PHP",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Chf => "CHF",
            Currency::Jpy => "JPY",
            Currency::Aud => "AUD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Php => "₱",
            Currency::Eur => "€",
            Currency::Usd => "$",
            Currency::Gbp => "£",
            Currency::Cad => "C$",
            Currency::Chf => "CHF",
            Currency::Jpy => "¥",
            Currency::Aud => "A$",
        }
    }

    /// Looks up a supported currency by code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Option<Currency> {
        let code = code.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }
}

impl std::str::FromStr for Currency {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(s).ok_or_else(|| BudgetError::UnsupportedCurrency(s.to_string()))
    }
}

/// Returns the symbol for any currency code. Codes outside the supported set render as the code
/// itself.
pub fn symbol_for(code: &str) -> &str {
    match Currency::from_code(code) {
        Some(c) => c.symbol(),
        None => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Currency::from_str("eur").unwrap(), Currency::Eur);
        assert_eq!(Currency::from_str(" PhP ").unwrap(), Currency::Php);
    }

    #[test]
    fn test_parse_unsupported() {
        let err = Currency::from_str("XXX").unwrap_err();
        assert_eq!(err, BudgetError::UnsupportedCurrency("XXX".into()));
    }

    #[test]
    fn test_display_matches_code() {
        for c in Currency::ALL {
            assert_eq!(c.to_string(), c.as_str());
        }
    }

    #[test]
    fn test_serde_uses_upper_case_codes() {
        let json = serde_json::to_string(&Currency::Gbp).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: Currency = serde_json::from_str("\"JPY\"").unwrap();
        assert_eq!(back, Currency::Jpy);
    }

    #[test]
    fn test_symbol_for_unknown_code() {
        assert_eq!(symbol_for("EUR"), "€");
        assert_eq!(symbol_for("XXX"), "XXX");
    }
}
