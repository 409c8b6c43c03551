//! Lightweight direct HTTP client: desktop user agent, redirect-following,
//! no retry. The first tier of the two-tier fetch strategy.

use std::time::Duration;

use reqwest::{Client, StatusCode};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// A fetched payload plus the metadata the extractor and fetcher need.
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Direct HTTP client with a realistic desktop user agent.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    /// GET `url`, following redirects, accepting any status below 500.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            final_url,
            body,
        })
    }
}
