use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Tunables of the matching core.
#[derive(Debug, Clone)]
pub struct MatchingSettings {
    pub pickup_radius_km: f64,
    pub dest_radius_km: f64,
    pub max_carpool_size: i32,
    /// Lifetime of both bookings and carpools, and the sweep interval.
    pub booking_timeout: Duration,
    pub per_km_rate: f64,
    pub subsidy_rate: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            pickup_radius_km: 5.0,
            dest_radius_km: 12.0,
            max_carpool_size: 4,
            booking_timeout: Duration::from_secs(40),
            per_km_rate: 5.0,
            subsidy_rate: 0.0001,
        }
    }
}

impl MatchingSettings {
    pub fn carpool_timeout(&self) -> Duration {
        self.booking_timeout
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        let settings = Self {
            pickup_radius_km: parse_or("PICKUP_RADIUS_KM", defaults.pickup_radius_km),
            dest_radius_km: parse_or("DEST_RADIUS_KM", defaults.dest_radius_km),
            max_carpool_size: parse_or("MAX_CARPOOL_SIZE", defaults.max_carpool_size),
            booking_timeout: Duration::from_secs(parse_or(
                "BOOKING_TIMEOUT_SECS",
                defaults.booking_timeout.as_secs(),
            )),
            per_km_rate: parse_or("PER_KM_RATE", defaults.per_km_rate),
            subsidy_rate: parse_or("SUBSIDY_RATE", defaults.subsidy_rate),
        };

        assert!(settings.max_carpool_size >= 1, "MAX_CARPOOL_SIZE must be at least 1");
        assert!(
            !settings.booking_timeout.is_zero(),
            "BOOKING_TIMEOUT_SECS must be positive"
        );
        assert!(
            settings.per_km_rate > 0.0 && settings.subsidy_rate > 0.0,
            "PER_KM_RATE and SUBSIDY_RATE must be positive"
        );
        settings
    }
}

#[derive(Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub seed_dev_riders: bool,
    pub matching: MatchingSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let store_backend = parse_or("STORE_BACKEND", StoreBackend::Postgres);
        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        Self {
            store_backend,
            database_url,
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", 3000),
            seed_dev_riders: parse_or("SEED_DEV_RIDERS", false),
            matching: MatchingSettings::from_env(),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{} is invalid: {}", key, e)),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matching_settings() {
        let settings = MatchingSettings::default();
        assert_eq!(settings.pickup_radius_km, 5.0);
        assert_eq!(settings.dest_radius_km, 12.0);
        assert_eq!(settings.max_carpool_size, 4);
        assert_eq!(settings.carpool_timeout(), settings.booking_timeout);
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
