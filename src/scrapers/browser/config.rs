//! Browser engine configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub timeout: Duration,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub locale: String,
    pub timezone: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(45),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            viewport: (1920, 1080),
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
        }
    }
}
