//! Ploker server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve on localhost:8080 with the page assets in ./static
//! ploker-daemon --static-dir ./static
//!
//! # Public deployment, accepting sockets only from the site itself
//! ploker-daemon --host 0.0.0.0 --port 80 --allowed-origin poker.example.org
//! ```
//!
//! Log output is controlled through `RUST_LOG` (default `info`).

use clap::Parser;
use ploker_core::{SessionManager, SyncConfig};
use ploker_http::{HttpConfig, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Real-time planning poker server
#[derive(Parser, Debug)]
#[command(name = "ploker-daemon")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Origin host allowed to open sockets (repeatable, `*.` prefix allowed)
    #[arg(long = "allowed-origin")]
    allowed_origins: Vec<String>,

    /// Directory with static assets, including session.html
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Seconds between keepalive pings
    #[arg(long, default_value_t = 10)]
    ping_interval_secs: u64,

    /// Close connections whose session has been idle this many seconds
    #[arg(long, default_value_t = 20 * 60)]
    idle_timeout_secs: u64,

    /// Per-write timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    io_timeout_ms: u64,

    /// Hard ceiling on a single connection's lifetime, in seconds
    #[arg(long, default_value_t = 30 * 60)]
    max_connection_secs: u64,
}

impl Args {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            max_connection_lifetime: Duration::from_secs(self.max_connection_secs),
            ..SyncConfig::default()
        }
    }

    fn http_config(&self) -> HttpConfig {
        HttpConfig {
            allowed_origins: self.allowed_origins.clone(),
            static_dir: self.static_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    if args.allowed_origins.is_empty() {
        log::warn!("No --allowed-origin given, accepting sockets from any origin");
    }
    if args.static_dir.is_none() {
        log::info!("No --static-dir given, only the socket and stats routes are served");
    }

    let manager = Arc::new(SessionManager::new());
    let state = Arc::new(SharedState::new(
        manager,
        args.sync_config(),
        args.http_config(),
    ));

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        log::error!("Failed to bind HTTP server to {}: {}", addr, e);
        e
    })?;

    ploker_http::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    Ok(())
}
