// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Not a browser. Used for listing-page discovery when Chromium is not
//! available. Retries 5xx with exponential backoff and honours 429
//! `retry-after`.

use anyhow::Result;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for discovery.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with a desktop Chrome user-agent.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries: 2,
        }
    }

    /// Override the retry count (tests use 0 to keep failures fast).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET with retry on 5xx and transport errors, backoff on 429.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let resp = self
                .client
                .get(url)
                .header("accept-language", "sv-FI,sv;q=0.9,fi;q=0.8,en;q=0.7")
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}
