use std::net::SocketAddr;

use anyhow::{anyhow, Context};

pub const DEFAULT_JWT_SECRET: &str = "your-secret-key";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub agora: Option<AgoraConfig>,
    pub bind_addr: SocketAddr,
}

/// Application id and certificate of the audio/video/messaging provider.
#[derive(Clone)]
pub struct AgoraConfig {
    pub app_id: String,
    pub app_certificate: String,
}

impl std::fmt::Debug for AgoraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgoraConfig")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"..")
            .finish()
    }
}

impl Config {
    /// Reads the process environment, honouring a `.env` file.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL")
            .ok_or(anyhow!("Please define the DATABASE_URL environment variable"))?;

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS={raw} is not a number"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let agora = match (var("AGORA_APP_ID"), var("AGORA_APP_CERT")) {
            (Some(app_id), Some(app_certificate)) => Some(AgoraConfig { app_id, app_certificate }),
            _ => None,
        };

        let bind_addr = var("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("BIND_ADDR={bind_addr} is not a socket address"))?;

        Ok(Config {
            database_url,
            database_max_connections,
            jwt_secret: var("JWT_SECRET").unwrap_or(DEFAULT_JWT_SECRET.to_owned()),
            agora,
            bind_addr,
        })
    }
}
