// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Target discovery: find open draw identifiers on the listing pages.
//!
//! Identifiers are collected twice over, from anchor query parameters and
//! from a raw-text pattern scan, then ranked newest first by their
//! trailing numeric suffix.

use super::http_client::HttpClient;
use crate::config::SiteConfig;
use crate::error::AcquisitionError;
use crate::events::{DrawEvent, EventBus};
use crate::renderer::{RenderContext, Renderer};
use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;

/// Trailing run of ASCII digits, parsed. `a_100522` → `100522`.
pub fn numeric_suffix(identifier: &str) -> Option<u64> {
    let digits_start = identifier
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    identifier[digits_start..].parse().ok()
}

/// Deduplicate and order newest first.
///
/// Identifiers without a numeric suffix sort last; ties fall back to
/// reverse lexical order so the result is deterministic.
pub fn rank_identifiers<I>(identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut out: Vec<String> = identifiers
        .into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();
    out.sort_by(|a, b| {
        numeric_suffix(b)
            .cmp(&numeric_suffix(a))
            .then_with(|| b.cmp(a))
    });
    out
}

/// Collect identifiers from one listing page's HTML.
pub fn scan_identifiers(html: &str, page_url: &str, query_param: &str, pattern: &Regex) -> Vec<String> {
    let mut found = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        let base = url::Url::parse(page_url).ok();
        let document = Html::parse_document(html);
        for el in document.select(&selector) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let resolved = match &base {
                Some(b) => b.join(href).ok(),
                None => url::Url::parse(href).ok(),
            };
            if let Some(u) = resolved {
                found.extend(
                    u.query_pairs()
                        .filter(|(k, _)| k == query_param)
                        .map(|(_, v)| v.into_owned()),
                );
            }
        }
    }

    // Raw-text scan survives markup changes (identifiers in JSON, onclick, ...).
    found.extend(
        pattern
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    );

    found
}

/// Discovery over the configured listing pages.
#[derive(Debug, Clone)]
pub struct DrawDiscovery {
    site: SiteConfig,
    timeout_ms: u64,
    pattern: Regex,
}

impl DrawDiscovery {
    pub fn new(site: SiteConfig, timeout_ms: u64) -> Result<Self> {
        let pattern = Regex::new(&site.identifier_pattern)
            .with_context(|| format!("invalid identifier pattern {:?}", site.identifier_pattern))?;
        Ok(Self {
            site,
            timeout_ms,
            pattern,
        })
    }

    /// Browser-driven discovery. Unreachable pages are skipped; an empty
    /// result is not an error here.
    pub async fn discover(&self, ctx: &mut dyn RenderContext) -> Vec<String> {
        let mut all = Vec::new();
        for url in &self.site.listing_urls {
            if let Err(e) = ctx.navigate(url, self.timeout_ms).await {
                tracing::warn!("listing page {url} failed: {e}");
                continue;
            }
            match ctx.get_html().await {
                Ok(html) => all.extend(self.scan(&html, url)),
                Err(e) => tracing::warn!("listing page {url} has no HTML: {e}"),
            }
        }
        let ranked = rank_identifiers(all);
        tracing::info!("discovered {} draw identifiers", ranked.len());
        ranked
    }

    /// Same as [`DrawDiscovery::discover`] over plain HTTP.
    pub async fn discover_http(&self, client: &HttpClient) -> Vec<String> {
        let mut all = Vec::new();
        for url in &self.site.listing_urls {
            match client.get(url).await {
                Ok(resp) if resp.is_success() => all.extend(self.scan(&resp.body, &resp.final_url)),
                Ok(resp) => tracing::warn!("listing page {url} returned {}", resp.status),
                Err(e) => tracing::warn!("listing page {url} failed: {e}"),
            }
        }
        rank_identifiers(all)
    }

    /// Newest identifier, or [`AcquisitionError::DiscoveryEmpty`].
    pub async fn newest(&self, ctx: &mut dyn RenderContext) -> Result<String, AcquisitionError> {
        self.discover(ctx)
            .await
            .into_iter()
            .next()
            .ok_or(AcquisitionError::DiscoveryEmpty)
    }

    fn scan(&self, html: &str, page_url: &str) -> Vec<String> {
        scan_identifiers(html, page_url, &self.site.draw_query_param, &self.pattern)
    }
}

/// Discovery for the `find` operation: browser first, plain HTTP when the
/// browser is unavailable or finds nothing.
pub struct IdentifierFinder {
    renderer: Arc<dyn Renderer>,
    discovery: DrawDiscovery,
    http: HttpClient,
    events: Arc<EventBus>,
}

impl IdentifierFinder {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        discovery: DrawDiscovery,
        http: HttpClient,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            renderer,
            discovery,
            http,
            events,
        }
    }

    /// Identifiers, newest first. Empty when nothing was found anywhere.
    pub async fn find(&self) -> Vec<String> {
        let mut found = match self.renderer.new_context().await {
            Ok(mut ctx) => {
                let ids = self.discovery.discover(ctx.as_mut()).await;
                if let Err(e) = ctx.close().await {
                    tracing::debug!("context close failed: {e}");
                }
                ids
            }
            Err(e) => {
                tracing::info!("browser unavailable for discovery ({e}); using HTTP");
                Vec::new()
            }
        };

        if found.is_empty() {
            found = self.discovery.discover_http(&self.http).await;
        }

        self.events.emit(DrawEvent::DiscoveryCompleted {
            identifiers: found.len(),
            newest: found.first().cloned(),
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fixture::{Fixture, FixtureRenderer};
    use crate::renderer::Renderer;
    use serde_json::json;

    #[test]
    fn test_rank_newest_first() {
        let ids = ["a_100516", "a_100522", "a_99999"].map(String::from);
        assert_eq!(
            rank_identifiers(ids),
            vec!["a_100522", "a_100516", "a_99999"]
        );
    }

    #[test]
    fn test_rank_dedups_and_puts_unnumbered_last() {
        let ids = ["special", "a_2", "a_10", "a_2", ""].map(String::from);
        assert_eq!(rank_identifiers(ids), vec!["a_10", "a_2", "special"]);
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("a_100522"), Some(100522));
        assert_eq!(numeric_suffix("100"), Some(100));
        assert_eq!(numeric_suffix("abc"), None);
        assert_eq!(numeric_suffix(""), None);
    }

    #[test]
    fn test_scan_links_and_text() {
        let pattern = Regex::new(r"kohde=([A-Za-z0-9_\-]+)").unwrap();
        let html = r#"<html><body>
            <a href="/sv/vedonlyonti/vakio?kohde=a_100516">Vakio</a>
            <a href="https://other.test/x?foo=1">other</a>
            <div data-link="?kohde=a_100522"></div>
        </body></html>"#;
        let found = scan_identifiers(html, "https://x.test/sv/vedonlyonti/vakio", "kohde", &pattern);
        let ranked = rank_identifiers(found);
        assert_eq!(ranked, vec!["a_100522", "a_100516"]);
    }

    #[tokio::test]
    async fn test_discover_skips_failed_pages() {
        let site = SiteConfig::for_base("https://x.test", vec!["sv".into(), "fi".into()]);
        let fixture = Fixture::from_json(
            &json!({"pages": [
                {"urlContains": "/sv/", "fail": true},
                {"urlContains": "/fi/", "html": "<a href='?kohde=a_7'>x</a> kohde=a_9"}
            ]})
            .to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();

        let discovery = DrawDiscovery::new(site, 1_000).unwrap();
        assert_eq!(discovery.discover(ctx.as_mut()).await, vec!["a_9", "a_7"]);
        assert_eq!(discovery.newest(ctx.as_mut()).await.unwrap(), "a_9");
    }

    #[tokio::test]
    async fn test_newest_on_empty_listing() {
        let site = SiteConfig::for_base("https://x.test", vec!["fi".into()]);
        let fixture =
            Fixture::from_json(&json!({"pages": [{"html": "<p>nothing</p>"}]}).to_string()).unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();

        let discovery = DrawDiscovery::new(site, 1_000).unwrap();
        assert_eq!(
            discovery.newest(ctx.as_mut()).await,
            Err(AcquisitionError::DiscoveryEmpty)
        );
    }

    #[tokio::test]
    async fn test_finder_falls_back_to_http() {
        use crate::renderer::NoopRenderer;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fi/vedonlyonti/vakio"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/fi/vedonlyonti/vakio?kohde=a_100516">x</a>
                   <a href="/fi/vedonlyonti/vakio?kohde=a_100522">y</a>"#,
            ))
            .mount(&server)
            .await;

        let site = SiteConfig::for_base(&server.uri(), vec!["fi".into()]);
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let finder = IdentifierFinder::new(
            Arc::new(NoopRenderer),
            DrawDiscovery::new(site, 1_000).unwrap(),
            HttpClient::new(5_000).with_max_retries(0),
            events,
        );

        assert_eq!(finder.find().await, vec!["a_100522", "a_100516"]);
        match rx.try_recv().unwrap() {
            DrawEvent::DiscoveryCompleted { identifiers, newest } => {
                assert_eq!(identifiers, 2);
                assert_eq!(newest.as_deref(), Some("a_100522"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
