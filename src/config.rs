use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "production" or "sandbox". Sentinel (test) transactions are routine in
    /// sandbox and a loud warning in production.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Delay before the single receipt re-fetch, absorbing store
    /// eventual-consistency right after a transaction completes.
    #[serde(default = "default_receipt_retry_delay_ms")]
    pub receipt_retry_delay_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_receipt_retry_delay_ms() -> u64 {
    1_500
}

impl StoreConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl BillingConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from billing.yml (optional) with environment variable overrides
        let config = config::Config::builder()
            .add_source(config::File::with_name("billing").required(false))
            .add_source(
                config::Environment::with_prefix("INSPECTRA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
