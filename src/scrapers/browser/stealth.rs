//! Stealth init script and consent-button selectors for the browser
//! fallback fetch.

/// Injected before any page script runs: hides the most common automation
/// markers real sites probe for.
pub const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
"#;

/// Common consent/cookie-banner button selectors, tried in order. The first
/// one that matches an element is clicked.
pub const CONSENT_SELECTORS: &[&str] = &[
    "button#onetrust-accept-btn-handler",
    "button[aria-label='Accept all']",
    "button[aria-label='Accept All']",
    "#accept-cookie-consent",
    "button.fc-cta-consent",
    "button[mode='primary']",
    ".cookie-consent button.accept",
];
