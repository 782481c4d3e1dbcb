use std::time::Duration;

use crate::error::Result;
pub use clap::Parser;
use mcat_app::state::AppConfig;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 4000,
        env = "MCAT_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MCAT_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "MCAT_DATABASE_URL",
        default_value = "sqlite://mcat.db",
        help = "Database URL e.g. sqlite://movies.db, the file is created if missing"
    )]
    pub database_url: String,

    #[arg(
        long,
        env = "MCAT_DEFAULT_PAGE_SIZE",
        default_value_t = 20,
        value_parser = clap::value_parser!(u32).range(1..100),
        help = "Page size used for listings when the request does not specify one"
    )]
    pub default_page_size: u32,

    #[arg(
        long,
        env = "MCAT_CONNECT_TIMEOUT",
        default_value = "5s",
        help = "How long to wait for the database on startup, in human friendly format (e.g. 5s, 1m)",
        value_parser = humantime::parse_duration
    )]
    pub connect_timeout: Duration,

    #[arg(long, env = "MCAT_CORS", help = "Enable permissive CORS")]
    pub cors: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    /// URL under which the server is reachable, as derived from listen address and port.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&format!("http://{}:{}/", self.listen_address, self.port))?;
        Ok(url)
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: config.default_page_size,
        }
    }
}
