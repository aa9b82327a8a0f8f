//! Supported currencies

pub const USD: &str = "USD";
pub const EUR: &str = "EUR";
pub const CAD: &str = "CAD";

pub const SUPPORTED_CURRENCIES: &[&str] = &[USD, EUR, CAD];

/// Normalize currency code to uppercase
pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_uppercase()
}

/// Whether the (normalized) currency code is one the ledger accepts
pub fn is_supported_currency(currency: &str) -> bool {
    let normalized = normalize_currency(currency);
    SUPPORTED_CURRENCIES.contains(&normalized.as_str())
}
