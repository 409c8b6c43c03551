//! Fingerprints for commercial bot-protection challenge pages, matched
//! against HTML returned from a browser fetch.

use std::sync::LazyLock;

use regex::RegexSet;

/// One pattern per vendor fingerprint; index-aligned with `REASONS` below.
const PATTERNS: &[&str] = &[
    r"datadome",
    r"cf-browser-verification|cf-challenge",
    r"perimeterx|_px-captcha",
    r"distil_r_captcha|distil_identify",
    r"access denied[\s\S]{0,200}akamai|akamai[\s\S]{0,200}access denied",
];

const REASONS: &[&str] = &[
    "DataDome bot protection",
    "Cloudflare bot protection",
    "PerimeterX bot protection",
    "Distil bot protection",
    "Akamai bot protection",
];

static PATTERN_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(PATTERNS).expect("bot-detection patterns must compile")
});

/// A recognized bot-protection vendor, used as the `BlockedDomain` reason.
pub fn detect(html: &str) -> Option<&'static str> {
    let lowered = html.to_ascii_lowercase();
    let matched = PATTERN_SET.matches(&lowered);
    matched.iter().next().map(|idx| REASONS[idx])
}
