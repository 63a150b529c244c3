//! Process settings loaded via OrthoConfig.
//!
//! Values come from CLI arguments, `TENANT_SCOPE_*` environment variables, or
//! a configuration file. Accessors clamp raw values into the ranges the
//! services accept, so callers never see a zero TTL or an empty page.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::FeatureFlags;

const DEFAULT_ONBOARDING_CHANNEL: &str = "onboarding_answers";
const MAX_PAGE_SIZE_CEILING: u32 = 1000;

/// Settings shared by every process that hosts the scope and onboarding core.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TENANT_SCOPE")]
pub struct ScopeSettings {
    /// PostgreSQL connection URL. In-memory adapters are used when absent.
    pub database_url: Option<String>,
    /// Secret handed to the credential verifier.
    pub credential_secret: Option<String>,
    /// Expected credential audience.
    pub credential_audience: Option<String>,
    /// Scope state cache lifetime in seconds.
    #[ortho_config(default = 60)]
    pub scope_cache_ttl_secs: u64,
    /// Session snapshot cache lifetime in seconds.
    #[ortho_config(default = 30)]
    pub session_cache_ttl_secs: u64,
    /// Scope changes allowed per user inside one window.
    #[ortho_config(default = 10)]
    pub rate_limit_max_events: u32,
    /// Rate limit window in seconds.
    #[ortho_config(default = 60)]
    pub rate_limit_window_secs: u64,
    /// Salt mixed into client IP hashes.
    pub client_ip_salt: Option<String>,
    /// Feature flag entries, e.g. `beta_nav,!legacy_export`. Environment
    /// values arrive split on commas.
    pub feature_flags: Option<Vec<String>>,
    /// LISTEN/NOTIFY channel carrying onboarding completions.
    pub onboarding_channel: Option<String>,
    /// Longest wait for one notification before the worker loops.
    #[ortho_config(default = 5000)]
    pub listener_poll_timeout_ms: u64,
    /// Snapshots fetched per batch during exports.
    #[ortho_config(default = 500)]
    pub export_batch_size: u32,
    /// Upper bound for snapshot page sizes.
    #[ortho_config(default = 200)]
    pub max_page_size: u32,
}

impl ScopeSettings {
    /// Scope cache TTL, at least one second.
    pub fn scope_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scope_cache_ttl_secs.max(1))
    }

    /// Session cache TTL, at least one second.
    pub fn session_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cache_ttl_secs.max(1))
    }

    /// Scope changes allowed per window, at least one.
    pub fn rate_limit_max_events(&self) -> usize {
        usize::try_from(self.rate_limit_max_events.max(1)).unwrap_or(usize::MAX)
    }

    /// Rate limit window, at least one second.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs.max(1))
    }

    /// Salt for client IP hashes; empty when unset.
    pub fn client_ip_salt(&self) -> &str {
        self.client_ip_salt.as_deref().unwrap_or_default()
    }

    /// Parsed feature flags.
    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags::from_entries(self.feature_flags.as_deref().unwrap_or_default())
    }

    /// Notification channel name, falling back to `onboarding_answers`.
    pub fn onboarding_channel(&self) -> &str {
        self.onboarding_channel
            .as_deref()
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .unwrap_or(DEFAULT_ONBOARDING_CHANNEL)
    }

    /// Listener poll timeout, at least one millisecond.
    pub fn listener_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_poll_timeout_ms.max(1))
    }

    /// Export batch size, at least one.
    pub fn export_batch_size(&self) -> u32 {
        self.export_batch_size.max(1)
    }

    /// Maximum snapshot page size, within `1..=1000`.
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size.clamp(1, MAX_PAGE_SIZE_CEILING)
    }
}
