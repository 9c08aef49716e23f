use anyhow::{anyhow, Context};
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::services::EngineSettings;
use crate::workers::WorkerIntervals;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    pub time_zone: Tz,
    pub bind_addr: SocketAddr,
    pub geofence_grace_minutes: i64,
    pub geofence_interval: Duration,
    pub overtime_interval: Duration,
    pub break_alert_interval: Duration,
    pub end_of_day_interval: Duration,
    pub end_of_day_cutoff: NaiveTime,
    pub config_cache_ttl: Duration,
    pub evidence_dir: PathBuf,
    pub notification_webhook_url: Option<Url>,
    pub notification_timeout: Duration,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} value {:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> anyhow::Result<Duration> {
    let secs: u64 = parse_or(lookup, key, default)?;
    if secs == 0 {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(Duration::from_secs(secs))
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/presence".to_string());

        let jwt_secret = lookup("JWT_SECRET")
            .unwrap_or_else(|| "your-secret-key-change-this-in-production".to_string());

        let jwt_expiration_hours = parse_or(&lookup, "JWT_EXPIRATION_HOURS", 12)?;

        let time_zone_name = lookup("APP_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let bind_addr = parse_or(
            &lookup,
            "BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 3000)),
        )?;

        let geofence_grace_minutes: i64 = parse_or(&lookup, "GEOFENCE_GRACE_MINUTES", 5)?;
        if geofence_grace_minutes < 0 {
            return Err(anyhow!("GEOFENCE_GRACE_MINUTES must not be negative"));
        }

        let end_of_day_cutoff = match lookup("END_OF_DAY_CUTOFF") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .with_context(|| format!("Invalid END_OF_DAY_CUTOFF value {:?}", raw))?,
            None => EngineSettings::default().end_of_day_cutoff,
        };

        let notification_webhook_url = match lookup("NOTIFICATION_WEBHOOK_URL") {
            Some(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim())
                    .with_context(|| format!("Invalid NOTIFICATION_WEBHOOK_URL value {:?}", raw))?,
            ),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_expiration_hours,
            time_zone,
            bind_addr,
            geofence_grace_minutes,
            geofence_interval: secs_or(&lookup, "GEOFENCE_INTERVAL_SECS", 60)?,
            overtime_interval: secs_or(&lookup, "OVERTIME_INTERVAL_SECS", 120)?,
            break_alert_interval: secs_or(&lookup, "BREAK_ALERT_INTERVAL_SECS", 60)?,
            end_of_day_interval: secs_or(&lookup, "END_OF_DAY_INTERVAL_SECS", 300)?,
            end_of_day_cutoff,
            config_cache_ttl: secs_or(&lookup, "CONFIG_CACHE_TTL_SECS", 300)?,
            evidence_dir: lookup("EVIDENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./evidence")),
            notification_webhook_url,
            notification_timeout: secs_or(&lookup, "NOTIFICATION_TIMEOUT_SECS", 5)?,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            geofence_grace: chrono::Duration::minutes(self.geofence_grace_minutes),
            end_of_day_cutoff: self.end_of_day_cutoff,
        }
    }

    pub fn worker_intervals(&self) -> WorkerIntervals {
        WorkerIntervals {
            geofence: self.geofence_interval,
            overtime: self.overtime_interval,
            break_alerts: self.break_alert_interval,
            end_of_day: self.end_of_day_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/presence");
        assert_eq!(config.time_zone, chrono_tz::UTC);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.geofence_interval, Duration::from_secs(60));
        assert_eq!(config.end_of_day_interval, Duration::from_secs(300));
        assert_eq!(
            config.end_of_day_cutoff,
            NaiveTime::from_hms_opt(23, 55, 0).unwrap()
        );
        assert!(config.notification_webhook_url.is_none());
        assert_eq!(config.engine_settings().geofence_grace, chrono::Duration::minutes(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("APP_TIMEZONE", "Asia/Riyadh"),
            ("GEOFENCE_GRACE_MINUTES", "10"),
            ("OVERTIME_INTERVAL_SECS", "30"),
            ("END_OF_DAY_CUTOFF", "22:30"),
            ("NOTIFICATION_WEBHOOK_URL", "https://hooks.example.com/presence"),
        ])
        .unwrap();
        assert_eq!(config.time_zone, chrono_tz::Asia::Riyadh);
        assert_eq!(config.geofence_grace_minutes, 10);
        assert_eq!(config.worker_intervals().overtime, Duration::from_secs(30));
        assert_eq!(
            config.end_of_day_cutoff,
            NaiveTime::from_hms_opt(22, 30, 0).unwrap()
        );
        assert_eq!(
            config.notification_webhook_url.unwrap().host_str(),
            Some("hooks.example.com")
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config_from(&[("APP_TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(config_from(&[("END_OF_DAY_CUTOFF", "25:00")]).is_err());
        assert!(config_from(&[("GEOFENCE_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("GEOFENCE_GRACE_MINUTES", "-1")]).is_err());
        assert!(config_from(&[("NOTIFICATION_WEBHOOK_URL", "not a url")]).is_err());
    }
}
