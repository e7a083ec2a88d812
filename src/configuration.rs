use config::ConfigError;

use crate::error::AppError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing settings shared by access and refresh tokens
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Credential hashing settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    /// bcrypt cost factor
    pub hash_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self { hash_cost: 10 }
    }
}

const MIN_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Reject settings that would make issued tokens unsafe or unusable.
    pub fn validate(&self) -> Result<(), AppError> {
        Ok(self.check()?)
    }

    fn check(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError::{InvalidValue, MissingRequired};

        if self.jwt.secret.is_empty() {
            return Err(MissingRequired("jwt.secret".to_string()));
        }
        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(InvalidValue(format!(
                "jwt.secret must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_expiry <= 0 {
            return Err(InvalidValue("jwt.access_token_expiry must be positive".to_string()));
        }
        if self.jwt.refresh_token_expiry <= self.jwt.access_token_expiry {
            return Err(InvalidValue(
                "jwt.refresh_token_expiry must exceed jwt.access_token_expiry".to_string(),
            ));
        }
        if !(4..=31).contains(&self.password.hash_cost) {
            return Err(InvalidValue("password.hash_cost must be between 4 and 31".to_string()));
        }
        Ok(())
    }
}

/// Loads `configuration.{yaml,toml,json}` from the working directory, then applies
/// `APP__SECTION__KEY` environment overrides (e.g. `APP__JWT__SECRET`).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
