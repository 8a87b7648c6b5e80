use std::env;

use chrono::NaiveTime;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub scheduling: SchedulingConfig,
}

/// Tuning values for the scheduling core. System-global; every field has a
/// hard-coded fallback so a bare environment still boots.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub slot_duration_minutes: u32,
    pub min_slot_duration_minutes: u32,
    pub lunch_break_start: NaiveTime,
    pub lunch_break_end: NaiveTime,
    pub min_lead_time_minutes: i64,
    pub overview_window_days: i64,
    pub week_ahead_days: i64,
    pub recent_sessions_limit: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: 45,
            min_slot_duration_minutes: 60,
            lunch_break_start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            lunch_break_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            min_lead_time_minutes: 5,
            overview_window_days: 30,
            week_ahead_days: 7,
            recent_sessions_limit: 4,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            slot_duration_minutes: env_number("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes),
            min_slot_duration_minutes: env_number(
                "MIN_SLOT_DURATION_MINUTES",
                defaults.min_slot_duration_minutes,
            ),
            lunch_break_start: env_time("LUNCH_BREAK_START", defaults.lunch_break_start),
            lunch_break_end: env_time("LUNCH_BREAK_END", defaults.lunch_break_end),
            min_lead_time_minutes: env_number("MIN_LEAD_TIME_MINUTES", defaults.min_lead_time_minutes),
            overview_window_days: env_number("OVERVIEW_WINDOW_DAYS", defaults.overview_window_days),
            week_ahead_days: env_number("WEEK_AHEAD_DAYS", defaults.week_ahead_days),
            recent_sessions_limit: env_number("RECENT_SESSIONS_LIMIT", defaults.recent_sessions_limit),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn env_number<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has a non-numeric value, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_time(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").unwrap_or_else(|_| {
            warn!("{} is not a valid HH:MM time, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_defaults_match_documented_values() {
        let config = SchedulingConfig::default();

        assert_eq!(config.slot_duration_minutes, 45);
        assert_eq!(config.min_slot_duration_minutes, 60);
        assert_eq!(config.lunch_break_start, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(config.lunch_break_end, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(config.min_lead_time_minutes, 5);
        assert_eq!(config.overview_window_days, 30);
        assert_eq!(config.week_ahead_days, 7);
        assert_eq!(config.recent_sessions_limit, 4);
    }
}
