use rocket::Config as RocketConfig;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Runtime settings for the portal. Loaded once at launch and managed as
/// Rocket state so guards and routes read the same values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the booking API, without trailing slash.
    pub api_base_url: String,
    /// Service key forwarded upstream as a bearer token, when set.
    pub api_key: Option<String>,
    pub jwt_secret: String,
    pub request_timeout_secs: u64,
    pub slot_hold_secs: u64,
    pub review_window_days: i64,
    pub reschedule_lead_hours: i64,
    /// Offset applied when formatting dates for display.
    pub display_utc_offset_minutes: i32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            api_base_url: "http://localhost:5000/api".to_string(),
            api_key: None,
            jwt_secret: "default-secret".to_string(),
            request_timeout_secs: 10,
            slot_hold_secs: 120,
            review_window_days: 7,
            reschedule_lead_hours: 3,
            display_utc_offset_minutes: 0,
        }
    }
}

impl PortalConfig {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Serialized::defaults(PortalConfig::default()))
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
            .merge(Env::prefixed("PORTAL_"))
    }

    /// Reads the layered configuration, falling back to defaults for any key
    /// that is missing or malformed.
    pub fn load() -> Self {
        let figment = Self::figment();
        let defaults = PortalConfig::default();

        PortalConfig {
            api_base_url: figment
                .extract_inner::<String>("api_base_url")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            api_key: figment.extract_inner("api_key").ok(),
            jwt_secret: figment
                .extract_inner("jwt_secret")
                .unwrap_or(defaults.jwt_secret),
            request_timeout_secs: figment
                .extract_inner("request_timeout_secs")
                .unwrap_or(defaults.request_timeout_secs),
            slot_hold_secs: figment
                .extract_inner("slot_hold_secs")
                .unwrap_or(defaults.slot_hold_secs),
            review_window_days: figment
                .extract_inner("review_window_days")
                .unwrap_or(defaults.review_window_days),
            reschedule_lead_hours: figment
                .extract_inner("reschedule_lead_hours")
                .unwrap_or(defaults.reschedule_lead_hours),
            display_utc_offset_minutes: figment
                .extract_inner("display_utc_offset_minutes")
                .unwrap_or(defaults.display_utc_offset_minutes),
        }
    }

    pub fn is_development() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "development"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn slot_hold(&self) -> Duration {
        Duration::from_secs(self.slot_hold_secs)
    }

    pub fn review_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.review_window_days)
    }

    pub fn reschedule_lead(&self) -> chrono::Duration {
        chrono::Duration::hours(self.reschedule_lead_hours)
    }
}
