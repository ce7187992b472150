/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Payout partner REST base URL.
    pub provider_base_url: String,
    /// Payout partner API key.
    pub provider_api_key: String,
    /// Shared secret for verifying partner callback signatures.
    pub provider_webhook_secret: String,
    /// Operator alert webhook endpoint (worker delivers; API only records).
    pub alert_webhook_url: String,
    /// Signing secret for outgoing operator alerts.
    pub alert_webhook_secret: String,
    /// Partner name stamped on staged gift-card fulfillments.
    pub gift_card_provider: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `PROVIDER_BASE_URL`       | `http://localhost:9400`    |
    /// | `PROVIDER_API_KEY`        | `dev-key`                  |
    /// | `PROVIDER_WEBHOOK_SECRET` | `dev-callback-secret`      |
    /// | `ALERT_WEBHOOK_URL`       | `http://localhost:9500/alerts` |
    /// | `ALERT_WEBHOOK_SECRET`    | `dev-alert-secret`         |
    /// | `GIFT_CARD_PROVIDER`      | `tango`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            provider_base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9400".into()),
            provider_api_key: std::env::var("PROVIDER_API_KEY")
                .unwrap_or_else(|_| "dev-key".into()),
            provider_webhook_secret: std::env::var("PROVIDER_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "dev-callback-secret".into()),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL")
                .unwrap_or_else(|_| "http://localhost:9500/alerts".into()),
            alert_webhook_secret: std::env::var("ALERT_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "dev-alert-secret".into()),
            gift_card_provider: std::env::var("GIFT_CARD_PROVIDER")
                .unwrap_or_else(|_| "tango".into()),
        }
    }
}
