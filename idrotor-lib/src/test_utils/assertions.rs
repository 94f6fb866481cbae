//! Assertion helpers for identifier verification.

use crate::identifier::is_canonical;
use crate::interception::NativeDispatchTable;

/// Assert that `value` has the canonical identifier shape.
///
/// # Panics
/// Panics if the value is malformed.
pub fn assert_canonical(value: &str) {
    assert!(
        is_canonical(value),
        "expected canonical identifier, got {:?}",
        value
    );
}

/// Assert that calling `symbol` through `table` yields `expected`.
///
/// # Panics
/// Panics if the symbol is unknown, returns nil, or returns another value.
pub fn assert_intercepted(table: &NativeDispatchTable, symbol: &str, expected: &str) {
    let value = table
        .call(symbol)
        .unwrap_or_else(|| panic!("{} is not registered", symbol))
        .canonical_string()
        .unwrap_or_else(|| panic!("{} returned nil", symbol));
    assert_canonical(&value);
    assert_eq!(value, expected, "{} returned the wrong identifier", symbol);
}
