//! City-name canonicalization for matching across inconsistent sources.
//!
//! Rules, in order:
//!   1. lowercase + trim
//!   2. drop a trailing "market" / "mkt" token
//!   3. expand ft/st/mt abbreviations at word boundaries
//!   4. keep only `[a-z0-9]`
//!
//! The rule pass is repeated until the output stops changing, so
//! `normalize(normalize(x)) == normalize(x)` holds even for inputs such as
//! "s t" whose single-pass output ("st") would itself match a rule.

use regex::Regex;
use std::sync::LazyLock;

static TRAILING_MARKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\p{P}]*\b(?:market|mkt)\b\.?\s*$").expect("valid regex"));

static ABBREVIATIONS: LazyLock<[(Regex, &'static str); 3]> = LazyLock::new(|| {
    [
        (Regex::new(r"\bft\b\.?").expect("valid regex"), "fort"),
        (Regex::new(r"\bst\b\.?").expect("valid regex"), "saint"),
        (Regex::new(r"\bmt\b\.?").expect("valid regex"), "mount"),
    ]
});

/// Canonical matching key for a city name. Total and pure.
pub fn normalize(raw: &str) -> String {
    let mut current = apply_rules(raw);
    loop {
        let next = apply_rules(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// True when two raw names denote the same place.
pub fn same_place(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn apply_rules(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let without_market = TRAILING_MARKET.replace(&lowered, "");

    let mut expanded = without_market.into_owned();
    for (pattern, replacement) in ABBREVIATIONS.iter() {
        expanded = pattern.replace_all(&expanded, *replacement).into_owned();
    }

    expanded
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}
