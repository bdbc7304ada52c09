pub mod config {
    use serde::Deserialize;

    /// Name of the optional configuration file, looked up without extension.
    pub const CONFIG_FILE: &str = "taskboard";

    /// Longest accepted token lifetime: ten years.
    pub const MAX_TOKEN_TTL_HOURS: i64 = 87_600;

    #[derive(Deserialize, Clone)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        #[serde(default = "default_token_ttl_hours")]
        pub token_ttl_hours: i64,
    }

    impl Config {
        /// Loads configuration from `taskboard.toml` (if present), overridden by
        /// environment variables such as `DB_URL` and `JWT_SECRET`.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false))
                .add_source(config::Environment::default())
                .build()?;

            Self::from_settings(settings)
        }

        /// Deserializes an already assembled set of configuration sources.
        pub fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
            let config: Config = settings.try_deserialize()?;
            if config.jwt_secret.trim().is_empty() {
                anyhow::bail!("jwt_secret must not be empty");
            }
            if !(1..=MAX_TOKEN_TTL_HOURS).contains(&config.token_ttl_hours) {
                anyhow::bail!("token_ttl_hours must be between 1 and {}", MAX_TOKEN_TTL_HOURS);
            }
            Ok(config)
        }

        pub fn token_ttl(&self) -> chrono::Duration {
            chrono::Duration::hours(self.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS))
        }
    }

    impl std::fmt::Debug for Config {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Config")
                .field("db_url", &"<redacted>")
                .field("port", &self.port)
                .field("jwt_secret", &"<redacted>")
                .field("token_ttl_hours", &self.token_ttl_hours)
                .finish()
        }
    }

    fn default_port() -> u16 {
        5001
    }

    fn default_token_ttl_hours() -> i64 {
        24
    }

}
pub mod auth;
pub mod client;
pub mod entities;
pub mod task;
pub mod user;
pub mod web;
