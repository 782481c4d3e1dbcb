pub mod rest;

use std::time::Duration;

use anyhow::{Result, anyhow};
use mcat_server::config::{Parser, ServerConfig};
use rand::Rng as _;
use reqwest::Url;
use tempfile::TempDir;
use tracing::debug;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

/// Keeps the test's database directory alive until dropped.
pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let database_url = format!("sqlite://{}/mcat.db", tmp_data_dir.path().display());
    let port = random_port()?.to_string();
    let args = &[
        "mcat-e2e-tests",
        "--port",
        &port,
        "--database-url",
        &database_url,
        "--connect-timeout",
        "2s",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Config for a fresh server, with the database already created so that
/// tests can seed it directly.
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let (args, guard) = test_config(test_name)?;
    let pool = mcat_dal::new_pool(&args.database_url).await?;
    mcat_dal::init_schema(&pool).await?;
    pool.close().await;
    Ok((args, guard))
}

/// Starts the server in background and waits until it answers health checks.
pub async fn spawn_server(args: ServerConfig) -> Result<()> {
    let health_url = args.base_url()?.join("health")?;
    tokio::spawn(async move {
        if let Err(e) = mcat_server::run::run(args).await {
            tracing::error!("Server failed: {e}");
        }
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        match client.get(health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Server is up");
                return Ok(());
            }
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    Err(anyhow!("Server did not start"))
}

/// Prepares config, spawns the server and returns a client with the movie API URL.
pub async fn launch_env(test_name: &str) -> Result<(reqwest::Client, Url, ConfigGuard)> {
    let (args, guard) = prepare_env(test_name).await?;
    let api_url = args.base_url()?.join("api/movie")?;
    spawn_server(args).await?;
    Ok((reqwest::Client::new(), api_url, guard))
}

pub fn extend_url(url: &Url, segment: impl ToString) -> Url {
    let mut url = url.clone();
    url.path_segments_mut()
        .map(|mut segments| {
            segments.pop_if_empty().push(&segment.to_string());
        })
        .ok();
    url
}
