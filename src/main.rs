//! dispatchd: the request-dispatch layer served over hyper.
//!
//! ```text
//!   client ──▶ net (listener → hyper http1 → HyperTransport)
//!                 │
//!                 ▼ spawn_blocking
//!              Server::dispatch ──▶ router ──▶ [worker pool] ──▶ handler
//!                 │                                               │
//!                 ◀──────────── Transport / SocketSink ◀──────────┘
//! ```
//!
//! Registers a few demo endpoints: `/` (hello), `/echo` (parameters),
//! `/slow` (offloaded to a worker), `/events` (event stream ticking once a
//! second) and, when `--user`/`--password` are given, a Digest-protected
//! `/private`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use clap::Parser;

use request_dispatch::config::validation::validate_config;
use request_dispatch::config::{load_config, ConfigError, DispatchConfig};
use request_dispatch::handler::EventSource;
use request_dispatch::lifecycle::{wait_for_ctrl_c, Shutdown};
use request_dispatch::net::{serve, Listener};
use request_dispatch::observability::{logging, metrics};
use request_dispatch::{Credentials, Server};

#[derive(Debug, Parser)]
#[command(name = "dispatchd", version, about = "HTTP request-dispatch server")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `workers.count`.
    #[arg(long)]
    workers: Option<usize>,

    /// Username guarding `/private`.
    #[arg(long, requires = "password")]
    user: Option<String>,

    #[arg(long, requires = "user")]
    password: Option<String>,
}

fn load(cli: &Cli) -> Result<DispatchConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DispatchConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers.count = workers;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn register_demo(server: &Server, cli: &Cli) -> Arc<EventSource> {
    server.on_fn("/", Method::GET, |request| {
        request.reply(200, "text/plain", "request-dispatch is running\n")
    });

    server.on_fn("/echo", Method::POST, |request| {
        let body = request
            .params()
            .iter()
            .map(|param| format!("{}={}\n", param.name, param.value))
            .collect::<String>();
        request.reply(200, "text/plain", body)
    });

    server.on_fn("/slow", Method::GET, |request| {
        std::thread::sleep(Duration::from_secs(2));
        let worker = request.context().worker_index();
        request.reply(200, "text/plain", format!("done on worker {worker:?}\n"))
    });

    let events = Arc::new(EventSource::new());
    events.on_open(|client| {
        tracing::info!(connection_id = %client.id(), last_id = client.last_id(), "Event client joined");
    });
    server.on_handler("/events", Method::GET, events.clone());

    if let (Some(user), Some(password)) = (&cli.user, &cli.password) {
        server
            .on_fn("/private", Method::GET, |request| {
                request.reply(200, "text/plain", "welcome\n")
            })
            .set_authentication(
                Credentials::digest(user.clone(), password.clone()).with_realm("dispatchd"),
            );
    }

    events
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dispatchd starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(address) => metrics::install_exporter(address)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Arc::new(Server::new(&config));
    server.start()?;
    let events = register_demo(&server, &cli);

    let shutdown = Shutdown::new();
    let ticker = {
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            let mut id = 0u32;
            loop {
                tokio::select! {
                    _ = stop.recv() => break,
                    _ = interval.tick() => {
                        id = id.wrapping_add(1);
                        let events = Arc::clone(&events);
                        let message = format!("tick {id}");
                        let _ = tokio::task::spawn_blocking(move || {
                            events.send(&message, Some("tick"), id, 0)
                        })
                        .await;
                    }
                }
            }
        })
    };

    let listener = Listener::bind(&config.listener).await?;
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));
    serve(Arc::clone(&server), listener, &shutdown).await;

    let _ = ticker.await;
    server.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
