use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub datastore_url: String,
    pub datastore_api_key: String,
    pub booking_horizon_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            datastore_url: env::var("CLINIC_DATASTORE_URL")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_DATASTORE_URL not set, using empty value");
                    String::new()
                }),
            datastore_api_key: env::var("CLINIC_DATASTORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_DATASTORE_API_KEY not set, using empty value");
                    String::new()
                }),
            booking_horizon_days: env::var("BOOKING_HORIZON_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(14),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.datastore_url.is_empty() && !self.datastore_api_key.is_empty()
    }
}
