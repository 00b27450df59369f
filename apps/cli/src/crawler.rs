//! Declarative settings for the job-listing crawler tier.
//!
//! Nothing here runs a crawl: this is the configuration the external
//! crawling framework consumes. The proxy tier is rate-limited to a single
//! in-flight request, so concurrency is a resource policy, not a lock.

// Accessors exist for the consuming framework; the CLI only serializes.
#![allow(dead_code)]

use serde::Serialize;

/// Fixed fallback user agent, used when every provider in the chain fails.
pub const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (iPad; CPU OS 12_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

/// Environment variable holding the scraping-proxy API key.
pub const PROXY_API_KEY_VAR: &str = "SCRAPEOPS_API_KEY";

/// A user-agent source, tried in chain order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UserAgentProvider {
    /// Rotate through a pool of real-world user agents.
    RandomPool,
    /// Generate a synthetic user agent when the pool is unavailable.
    Generated,
    /// Always return the fixed fallback string.
    Fixed,
}

/// One downloader middleware slot. `priority: None` disables the
/// middleware; lower priorities run closer to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiddlewareEntry {
    pub name: &'static str,
    pub priority: Option<u32>,
}

/// Crawler configuration: throttling, proxy rotation, user-agent rotation,
/// and the middleware ordering that swaps the framework's default retry
/// for a proxy-aware one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlSettings {
    bot_name: String,
    concurrent_requests: usize,
    robotstxt_obey: bool,
    proxy_enabled: bool,
    proxy_api_key: Option<String>,
    rotating_proxies: Vec<String>,
    user_agent_chain: Vec<UserAgentProvider>,
    fallback_user_agent: String,
    middlewares: Vec<MiddlewareEntry>,
    extensions: Vec<MiddlewareEntry>,
}

impl CrawlSettings {
    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Maximum in-flight requests. The proxy tier allows one.
    pub fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }

    pub fn robotstxt_obey(&self) -> bool {
        self.robotstxt_obey
    }

    /// Whether requests are routed through the managed proxy service.
    pub fn proxy_enabled(&self) -> bool {
        self.proxy_enabled
    }

    /// API key for the managed proxy service, when configured.
    pub fn proxy_api_key(&self) -> Option<&str> {
        self.proxy_api_key.as_deref()
    }

    /// Injects the proxy API key read from the environment.
    pub fn with_proxy_api_key(mut self, key: Option<String>) -> Self {
        self.proxy_api_key = key;
        self
    }

    /// Static proxy endpoint list for rotation.
    pub fn rotating_proxies(&self) -> &[String] {
        &self.rotating_proxies
    }

    /// Proxy for the `n`th request, rotating round-robin.
    pub fn proxy_for(&self, n: usize) -> Option<&str> {
        if self.rotating_proxies.is_empty() {
            return None;
        }
        Some(self.rotating_proxies[n % self.rotating_proxies.len()].as_str())
    }

    /// Provider chain, first match wins; ends with the fixed fallback.
    pub fn user_agent_chain(&self) -> &[UserAgentProvider] {
        &self.user_agent_chain
    }

    pub fn fallback_user_agent(&self) -> &str {
        &self.fallback_user_agent
    }

    /// Middleware slots in declaration order.
    pub fn middlewares(&self) -> &[MiddlewareEntry] {
        &self.middlewares
    }

    /// Framework extension slots (crawl monitoring).
    pub fn extensions(&self) -> &[MiddlewareEntry] {
        &self.extensions
    }

    /// Returns enabled middleware names, ordered by priority.
    pub fn enabled_middlewares(&self) -> Vec<&'static str> {
        let mut enabled: Vec<(u32, &'static str)> = self
            .middlewares
            .iter()
            .filter_map(|m| m.priority.map(|p| (p, m.name)))
            .collect();
        enabled.sort_by_key(|(p, _)| *p);
        enabled.into_iter().map(|(_, name)| name).collect()
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            bot_name: "indeed".to_string(),
            // Max concurrency on the proxy tier's free plan is 1 thread.
            concurrent_requests: 1,
            robotstxt_obey: false,
            proxy_enabled: true,
            // Injected from the environment via `with_proxy_api_key`.
            proxy_api_key: None,
            rotating_proxies: vec![
                "proxy1.com:8000".to_string(),
                "proxy2.com:8031".to_string(),
                "proxy3.com:8032".to_string(),
            ],
            user_agent_chain: vec![
                UserAgentProvider::RandomPool,
                UserAgentProvider::Generated,
                UserAgentProvider::Fixed,
            ],
            fallback_user_agent: FALLBACK_USER_AGENT.to_string(),
            middlewares: vec![
                // Proxy-aware retry replaces the framework default.
                MiddlewareEntry {
                    name: "proxy_retry",
                    priority: Some(550),
                },
                MiddlewareEntry {
                    name: "default_retry",
                    priority: None,
                },
                MiddlewareEntry {
                    name: "proxy",
                    priority: Some(725),
                },
                MiddlewareEntry {
                    name: "default_user_agent",
                    priority: None,
                },
                MiddlewareEntry {
                    name: "random_user_agent",
                    priority: Some(400),
                },
                MiddlewareEntry {
                    name: "retry_user_agent",
                    priority: Some(401),
                },
            ],
            extensions: vec![MiddlewareEntry {
                name: "monitor",
                priority: Some(500),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_concurrency() {
        assert_eq!(CrawlSettings::default().concurrent_requests(), 1);
    }

    #[test]
    fn test_robots_not_obeyed() {
        assert!(!CrawlSettings::default().robotstxt_obey());
    }

    #[test]
    fn test_proxy_rotation_cycles() {
        let settings = CrawlSettings::default();
        assert_eq!(settings.proxy_for(0), Some("proxy1.com:8000"));
        assert_eq!(settings.proxy_for(1), Some("proxy2.com:8031"));
        assert_eq!(settings.proxy_for(3), Some("proxy1.com:8000"));
    }

    #[test]
    fn test_user_agent_chain_ends_with_fixed_fallback() {
        let settings = CrawlSettings::default();
        assert_eq!(
            settings.user_agent_chain().last(),
            Some(&UserAgentProvider::Fixed)
        );
        assert_eq!(settings.fallback_user_agent(), FALLBACK_USER_AGENT);
    }

    #[test]
    fn test_default_retry_is_disabled_and_replaced() {
        let settings = CrawlSettings::default();
        let default_retry = settings
            .middlewares()
            .iter()
            .find(|m| m.name == "default_retry")
            .unwrap();
        assert_eq!(default_retry.priority, None);

        let replacement = settings
            .middlewares()
            .iter()
            .find(|m| m.name == "proxy_retry")
            .unwrap();
        assert_eq!(replacement.priority, Some(550));
    }

    #[test]
    fn test_proxy_enabled_with_monitor_extension() {
        let settings = CrawlSettings::default();
        assert!(settings.proxy_enabled());
        let monitor = settings
            .extensions()
            .iter()
            .find(|e| e.name == "monitor")
            .unwrap();
        assert_eq!(monitor.priority, Some(500));
    }

    #[test]
    fn test_proxy_api_key_defaults_unset_and_injects() {
        let settings = CrawlSettings::default();
        assert_eq!(settings.proxy_api_key(), None);

        let settings = settings.with_proxy_api_key(Some("ops-key".to_string()));
        assert_eq!(settings.proxy_api_key(), Some("ops-key"));
    }

    #[test]
    fn test_enabled_middlewares_ordered_by_priority() {
        let settings = CrawlSettings::default();
        assert_eq!(
            settings.enabled_middlewares(),
            vec!["random_user_agent", "retry_user_agent", "proxy_retry", "proxy"]
        );
    }
}
