use std::path::PathBuf;
use std::time::Duration;

use eyre::{eyre, Result};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use ghlink_moka::MokaConfig;
use ghlink_redis::RedisConfig;
use humantime::parse_duration;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub server: Server,
    pub github: GitHubConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
pub struct Server {
    pub address: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Base URL of this service, used to build the OAuth callback URI.
    pub app_url: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
}

#[derive(Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub provider: Option<StoreProvider>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    Redis(RedisConfig),
    Moka(MokaConfig),
}

#[derive(Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_base_url() -> String {
    "https://github.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or(eyre!("Config directory not found"))?;

        let mut figment = Figment::new()
            .merge(Toml::file(config_dir.join("ghlink.toml")))
            .merge(Json::file(config_dir.join("ghlink.json")))
            .merge(Yaml::file(config_dir.join("ghlink.yaml")));

        if let Some(path) = path {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .ok_or_else(|| eyre!("Invalid file extension"))?;

            match extension {
                "toml" => figment = figment.merge(Toml::file(path)),
                "json" => figment = figment.merge(Json::file(path)),
                "yaml" | "yml" => figment = figment.merge(Yaml::file(path)),
                _ => {
                    return Err(eyre!(
                        "Unsupported config file format. Supported formats are: toml, json, yaml"
                    ))
                }
            }
        }

        figment = figment.merge(Env::prefixed("GHLINK_"));

        let config: Config = figment.extract()?;

        Ok(config)
    }
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(s) => parse_duration(&s).map_err(Error::custom),
        Value::Number(n) if n.is_u64() => Ok(Duration::from_secs(n.as_u64().unwrap())),
        Value::Number(n) if n.is_f64() => Ok(Duration::from_secs_f64(n.as_f64().unwrap())),
        _ => Err(Error::custom("expected a string or number for duration")),
    }
}
