//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGRID_*)
//! 2. TOML config file (if OFFGRID_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable: the engine receives it once at startup.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classify::{RuleConfig, default_rules};

mod validation;

pub use validation::ConfigError;

/// A button shown on push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Identifier reported back on click.
    pub action: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Application path to open when clicked; `None` only dismisses.
    #[serde(default)]
    pub target: Option<String>,
}

/// Fixed metadata attached to every push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub title: String,
    /// Body used when the push message carries no text.
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "RISAQ".into(),
            default_body: "Nouvelle notification de RISAQ".into(),
            icon: "/icons/Icon-192.png".into(),
            badge: "/icons/badge-72.png".into(),
            vibrate: vec![100, 50, 100],
            actions: vec![
                NotificationAction {
                    action: "explore".into(),
                    title: "Ouvrir".into(),
                    icon: Some("/icons/checkmark.png".into()),
                    target: Some("/".into()),
                },
                NotificationAction {
                    action: "close".into(),
                    title: "Fermer".into(),
                    icon: Some("/icons/xmark.png".into()),
                    target: None,
                },
            ],
        }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGRID_*)
/// 2. TOML config file (if OFFGRID_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite file backing the Durable Store.
    ///
    /// Set via OFFGRID_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Tag of the current store generation.
    ///
    /// Bump on every deployment; activation deletes all other generations.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Application origin. Relative paths resolve against it and requests to
    /// any other origin are passed through untouched.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept per network response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network budget in milliseconds, raced by every strategy that waits on the network.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget in milliseconds for the whole install step.
    #[serde(default = "default_install_timeout_ms")]
    pub install_timeout_ms: u64,

    /// Activate immediately after install instead of waiting for the next start.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Paths pre-populated at install time. Missing entries are tolerated.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Route of the Offline Fallback Document.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Ordered pattern-rule table.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,

    /// Sync tag that triggers mutation replay.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Store key prefix of queued mutations.
    #[serde(default = "default_mutation_queue_prefix")]
    pub mutation_queue_prefix: String,

    /// Periodic sync tag that triggers the content refresh.
    #[serde(default = "default_periodic_sync_tag")]
    pub periodic_sync_tag: String,

    /// Resource refreshed on periodic wake-ups.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Share-target route accepting form POSTs.
    #[serde(default = "default_share_path")]
    pub share_path: String,

    /// Where the client is sent after a share is stored.
    #[serde(default = "default_share_redirect")]
    pub share_redirect: String,

    /// Well-known route whose store entry holds the Shared Payload.
    #[serde(default = "default_shared_payload_path")]
    pub shared_payload_path: String,

    #[serde(default)]
    pub notification: NotificationConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgrid-cache.sqlite")
}

fn default_generation() -> String {
    "offgrid-cache-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "offgrid/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_install_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/flutter.js",
        "/flutter_bootstrap.js",
        "/favicon.png",
        "/icons/Icon-192.png",
        "/icons/Icon-512.png",
        "/assets/fonts/Inter-Regular.ttf",
        "/assets/fonts/Inter-Bold.ttf",
        "/assets/fonts/NotoNaskhArabic-Regular.ttf",
        "/assets/fonts/NotoNaskhArabic-Bold.ttf",
        "/assets/images/app_logo.png",
        "/assets/corpus/quran_combined.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_path() -> String {
    "/offline.html".into()
}

fn default_sync_tag() -> String {
    "sync-routines".into()
}

fn default_mutation_queue_prefix() -> String {
    "mutation-queue/".into()
}

fn default_periodic_sync_tag() -> String {
    "update-routines".into()
}

fn default_refresh_path() -> String {
    "/api/routines/sync".into()
}

fn default_share_path() -> String {
    "/share".into()
}

fn default_share_redirect() -> String {
    "/routines/new?shared=true".into()
}

fn default_shared_payload_path() -> String {
    "/shared-data".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            generation: default_generation(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            install_timeout_ms: default_install_timeout_ms(),
            skip_waiting: true,
            static_assets: default_static_assets(),
            offline_path: default_offline_path(),
            rules: default_rules(),
            sync_tag: default_sync_tag(),
            mutation_queue_prefix: default_mutation_queue_prefix(),
            periodic_sync_tag: default_periodic_sync_tag(),
            refresh_path: default_refresh_path(),
            share_path: default_share_path(),
            share_redirect: default_share_redirect(),
            shared_payload_path: default_shared_payload_path(),
            notification: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Network budget as Duration for use with tokio/reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFGRID_`
    /// 2. TOML file from `OFFGRID_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGRID_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGRID_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Look up the notification action with the given identifier.
    pub fn notification_action(&self, action: &str) -> Option<&NotificationAction> {
        self.notification.actions.iter().find(|a| a.action == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Strategy;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./offgrid-cache.sqlite"));
        assert_eq!(config.generation, "offgrid-cache-v1");
        assert_eq!(config.user_agent, "offgrid/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 8_000);
        assert!(config.skip_waiting);
        assert_eq!(config.static_assets.len(), 14);
        assert_eq!(config.offline_path, "/offline.html");
        assert_eq!(config.rules.len(), 7);
        assert_eq!(config.share_redirect, "/routines/new?shared=true");
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(8_000));
        assert_eq!(config.install_timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:8080/");

        let bad = AppConfig { origin: "ftp://files.example.com".into(), ..Default::default() };
        assert!(matches!(bad.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_notification_action_lookup() {
        let config = AppConfig::default();
        assert_eq!(config.notification_action("explore").and_then(|a| a.target.as_deref()), Some("/"));
        assert!(config.notification_action("close").unwrap().target.is_none());
        assert!(config.notification_action("snooze").is_none());
    }

    #[test]
    fn test_toml_rules_layer() {
        let toml = r#"
            generation = "offgrid-cache-v2"

            [[rules]]
            pattern = "^/api/"
            strategy = "network_first"

            [[rules]]
            pattern = "\\.json$"
            strategy = "stale_while_revalidate"
        "#;

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.generation, "offgrid-cache-v2");
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(config.offline_path, "/offline.html");
    }
}
