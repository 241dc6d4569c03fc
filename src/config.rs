use std::env;

use crate::error::AppError;
use crate::models::robot::DEFAULT_MIN_BATTERY_PERCENT;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub telemetry_queue_size: usize,
    pub min_battery_percent: u8,
    pub max_commit_retries: u32,
    pub robot_speed_mps: f64,
    pub max_leg_meters: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            telemetry_queue_size: 4096,
            min_battery_percent: DEFAULT_MIN_BATTERY_PERCENT,
            max_commit_retries: 3,
            robot_speed_mps: 1.5,
            max_leg_meters: 5_000.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let min_battery_percent = parse_or_default("MIN_BATTERY_PERCENT", defaults.min_battery_percent)?;
        if min_battery_percent > 100 {
            return Err(AppError::Internal(format!(
                "invalid MIN_BATTERY_PERCENT: {min_battery_percent} exceeds 100"
            )));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            telemetry_queue_size: parse_or_default(
                "TELEMETRY_QUEUE_SIZE",
                defaults.telemetry_queue_size,
            )?,
            min_battery_percent,
            max_commit_retries: parse_or_default("MAX_COMMIT_RETRIES", defaults.max_commit_retries)?,
            robot_speed_mps: parse_or_default("ROBOT_SPEED_MPS", defaults.robot_speed_mps)?,
            max_leg_meters: parse_or_default("MAX_LEG_METERS", defaults.max_leg_meters)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
