// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration resolved from the environment.
//!
//! Every knob has a default; unparseable values fall back to the default
//! rather than aborting startup.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 10_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_ATTEMPT_BUDGET_MS: u64 = 45_000;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SETTLE_MS: u64 = 1_200;
const DEFAULT_MAX_SESSIONS: usize = 2;
const DEFAULT_JOB_ATTEMPTS: u32 = 2;
const DEFAULT_SWEEP_SECS: u64 = 300;
const DEFAULT_STATE_RETENTION_SECS: u64 = 24 * 60 * 60;
const DEFAULT_BASE_URL: &str = "https://www.veikkaus.fi";
const DEFAULT_LOCALES: &str = "sv,fi";

/// Site-specific URLs and probes.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
    /// Visited first for cookies/consent.
    pub home_url: String,
    /// Pages listing open draws, scanned by discovery.
    pub listing_urls: Vec<String>,
    /// Locale variants tried in order for a draw page.
    pub locales: Vec<String>,
    /// `{base}`, `{locale}` and `{draw}` are substituted.
    pub draw_url_template: String,
    /// Query parameter carrying the draw identifier in links.
    pub draw_query_param: String,
    /// Raw-text pattern whose first capture group is an identifier.
    pub identifier_pattern: String,
    /// Same-origin REST paths guessed for the draw (`{draw}` substituted).
    pub rest_probe_paths: Vec<String>,
    /// Global in-page objects inspected for embedded state.
    pub global_state_keys: Vec<String>,
}

impl SiteConfig {
    /// Build the site layout for a base URL and locale list.
    pub fn for_base(base_url: &str, locales: Vec<String>) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        let listing_urls = locales
            .iter()
            .map(|l| format!("{base}/{l}/vedonlyonti/vakio"))
            .collect();
        Self {
            home_url: format!("{base}/"),
            listing_urls,
            locales,
            draw_url_template: "{base}/{locale}/vedonlyonti/vakio?kohde={draw}".to_string(),
            draw_query_param: "kohde".to_string(),
            identifier_pattern: r"kohde=([A-Za-z0-9_\-]+)".to_string(),
            rest_probe_paths: vec![
                "/api/sport-open-games/v1/games/SPORT/draws/{draw}".to_string(),
                "/api/sport-popularity/v1/games/SPORT/draws/{draw}/popularity".to_string(),
                "/api/v1/sport-games/draws/SPORT/{draw}".to_string(),
                "/api/sport-games/v1/draws/{draw}".to_string(),
            ],
            global_state_keys: vec![
                "__NEXT_DATA__".to_string(),
                "__INITIAL_STATE__".to_string(),
                "__PRELOADED_STATE__".to_string(),
                "__APOLLO_STATE__".to_string(),
                "__NUXT__".to_string(),
                "__DATA__".to_string(),
            ],
            base_url: base,
        }
    }

    /// URL of a draw page in the given locale.
    pub fn draw_url(&self, locale: &str, draw_id: &str) -> String {
        self.draw_url_template
            .replace("{base}", &self.base_url)
            .replace("{locale}", locale)
            .replace("{draw}", &url_encode(draw_id))
    }

    /// REST probe paths with the identifier substituted.
    pub fn rest_probes(&self, draw_id: &str) -> Vec<String> {
        self.rest_probe_paths
            .iter()
            .map(|p| p.replace("{draw}", &url_encode(draw_id)))
            .collect()
    }
}

fn url_encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: u16,
    pub bind_host: String,
    /// Freshness window for cached draws.
    pub cache_ttl: Duration,
    /// Wall-clock budget for one acquisition attempt.
    pub attempt_budget: Duration,
    pub nav_timeout_ms: u64,
    pub discovery_timeout_ms: u64,
    /// Pause after navigation so late XHRs can land.
    pub settle: Duration,
    /// Concurrent browser sessions across all jobs.
    pub max_sessions: usize,
    /// Attempts per job (caller-side retry), 1..=3.
    pub job_attempts: u32,
    /// Periodic auto refresh; `None` disables it.
    pub auto_refresh: Option<Duration>,
    pub sweep_every: Duration,
    /// Idle explicit-identifier job states older than this are pruned.
    pub state_retention: Duration,
    pub aliases_file: Option<PathBuf>,
    pub chromium_path: Option<PathBuf>,
    pub site: SiteConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let locales: Vec<String> = read_env_string("VAKIO_LOCALES")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALES.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let base_url = read_env_string("VAKIO_BASE_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let auto_refresh_secs = read_env_u64("VAKIO_AUTO_REFRESH_SECS", 0);

        Self {
            port: read_env_u16("PORT", DEFAULT_PORT),
            bind_host: read_env_string("VAKIO_BIND")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            cache_ttl: Duration::from_secs(read_env_u64(
                "VAKIO_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            attempt_budget: Duration::from_millis(
                read_env_u64("VAKIO_ATTEMPT_BUDGET_MS", DEFAULT_ATTEMPT_BUDGET_MS).max(1_000),
            ),
            nav_timeout_ms: read_env_u64("VAKIO_NAV_TIMEOUT_MS", DEFAULT_NAV_TIMEOUT_MS),
            discovery_timeout_ms: read_env_u64(
                "VAKIO_DISCOVERY_TIMEOUT_MS",
                DEFAULT_DISCOVERY_TIMEOUT_MS,
            ),
            settle: Duration::from_millis(read_env_u64("VAKIO_SETTLE_MS", DEFAULT_SETTLE_MS)),
            max_sessions: read_env_usize("VAKIO_MAX_SESSIONS", DEFAULT_MAX_SESSIONS).max(1),
            job_attempts: read_env_u32("VAKIO_JOB_ATTEMPTS", DEFAULT_JOB_ATTEMPTS).clamp(1, 3),
            auto_refresh: (auto_refresh_secs > 0).then(|| Duration::from_secs(auto_refresh_secs)),
            sweep_every: Duration::from_secs(
                read_env_u64("VAKIO_SWEEP_SECS", DEFAULT_SWEEP_SECS).max(5),
            ),
            state_retention: Duration::from_secs(read_env_u64(
                "VAKIO_STATE_RETENTION_SECS",
                DEFAULT_STATE_RETENTION_SECS,
            )),
            aliases_file: read_env_string("VAKIO_ALIASES_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            chromium_path: read_env_string("VAKIO_CHROMIUM_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            site: SiteConfig::for_base(&base_url, locales),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_host: "0.0.0.0".to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            attempt_budget: Duration::from_millis(DEFAULT_ATTEMPT_BUDGET_MS),
            nav_timeout_ms: DEFAULT_NAV_TIMEOUT_MS,
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            max_sessions: DEFAULT_MAX_SESSIONS,
            job_attempts: DEFAULT_JOB_ATTEMPTS,
            auto_refresh: None,
            sweep_every: Duration::from_secs(DEFAULT_SWEEP_SECS),
            state_retention: Duration::from_secs(DEFAULT_STATE_RETENTION_SECS),
            aliases_file: None,
            chromium_path: None,
            site: SiteConfig::for_base(
                DEFAULT_BASE_URL,
                DEFAULT_LOCALES.split(',').map(String::from).collect(),
            ),
        }
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_u16(name: &str, default_value: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_urls() {
        let site = SiteConfig::for_base("https://example.test/", vec!["sv".into(), "fi".into()]);
        assert_eq!(site.home_url, "https://example.test/");
        assert_eq!(
            site.listing_urls,
            vec![
                "https://example.test/sv/vedonlyonti/vakio".to_string(),
                "https://example.test/fi/vedonlyonti/vakio".to_string(),
            ]
        );
        assert_eq!(
            site.draw_url("fi", "a_100522"),
            "https://example.test/fi/vedonlyonti/vakio?kohde=a_100522"
        );
        assert!(site.rest_probes("a 1").iter().all(|p| p.contains("a+1")));
    }

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.port, 10_000);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(1800));
        assert_eq!(cfg.site.locales, vec!["sv".to_string(), "fi".to_string()]);
        assert!(cfg.auto_refresh.is_none());
    }

    #[test]
    fn test_env_fallbacks_on_garbage() {
        assert_eq!(read_env_u64("VAKIO_TEST_UNSET_VARIABLE_XYZ", 7), 7);
        std::env::set_var("VAKIO_TEST_GARBAGE_U64", "not-a-number");
        assert_eq!(read_env_u64("VAKIO_TEST_GARBAGE_U64", 9), 9);
    }
}
