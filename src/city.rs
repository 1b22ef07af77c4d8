// src/city.rs
//! City matching between alert headers and reverse-geocoded place names.

/// The whole header is the city name; only surrounding whitespace is dropped.
pub fn extract_city(header: &str) -> &str {
    header.trim()
}

/// Trimmed, case-insensitive equality. Case folding is a no-op for Hebrew but
/// applies uniformly.
pub fn matches(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// True when the alert header names `city`.
pub fn header_matches(header: &str, city: &str) -> bool {
    matches(extract_city(header), city)
}
