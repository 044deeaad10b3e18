//! Shared strategies.

use proptest::prelude::*;

/// Strings that can never be standard padded base64.
pub fn arb_invalid_base64() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9+/]{0,16}[!#$%&*,.:;?@_~-][A-Za-z0-9+/]{0,16}",
        "([A-Za-z0-9+/]{4}){0,8}[A-Za-z0-9+/]",
        "([A-Za-z0-9+/]{4}){0,8}[A-Za-z0-9+/]{3}",
    ]
}

/// A bit position inside a payload of `len` bytes.
pub fn arb_bit_flip(len: usize) -> impl Strategy<Value = (usize, u8)> {
    (0..len, 0u8..8)
}

/// Names that pass client-name validation.
pub fn arb_client_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,23}"
}

/// Arbitrary printable signature header values.
pub fn arb_signature_header() -> impl Strategy<Value = String> {
    "[ -~]{1,128}"
}

/// Creation TTLs in seconds.
pub fn arb_creation_ttl() -> impl Strategy<Value = u64> {
    prop_oneof![1u64..10, 10u64..100_000, Just(2_764_800u64)]
}
