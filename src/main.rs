//! herakles-rdt-exporter - version 0.1.0
//!
//! Intel RDT core-group telemetry exporter with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod monitor;
mod startup_checks;
mod state;
mod tick_stats;

use axum::{routing::get, Router};
use clap::Parser;
use prometheus::{Gauge, Registry};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_groups, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{groups_handler, health_handler, metrics_handler, root_handler};
use metrics::RdtMetrics;
use monitor::{resolve_hostname, run_tick, spawn_tick_loop, start_monitor, stop_monitor};
use state::{AppState, SharedState};
use tick_stats::TickStats;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Config generation needs neither logging nor a valid config
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        setup_logging(&args);
        let config = load_validated_config(&args)?;

        return match command {
            Commands::Groups { verbose } => command_groups(*verbose, &config),

            Commands::Test {
                iterations,
                verbose,
                format,
            } => command_test(*iterations, *verbose, format.clone(), &config),

            Commands::CheckRequirements => {
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements(
                    config.backend_kind()?,
                    &config.resctrl_root(),
                ) {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready for production!");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }

            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&args);

    info!("Starting herakles-rdt-exporter");

    let backend = config.backend_kind()?;
    if let Err(e) = startup_checks::validate_requirements(backend, &config.resctrl_root()) {
        error!("❌ Startup validation failed: {}", e);
        error!("   Monitoring will most likely fail to start!");
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Start monitoring before serving anything
    let host = resolve_hostname(&config);
    info!("Reporting as host '{}'", host);
    let monitor = start_monitor(&config, &host).map_err(|e| {
        error!("❌ Failed to start monitoring: {}", e);
        e
    })?;

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    let metrics = RdtMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "herakles_rdt_exporter_scrape_duration_seconds",
        "Time spent serving /metrics request",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;

    metrics.groups.set(monitor.table().len() as f64);
    debug!("All metrics registered successfully");

    let state: SharedState = Arc::new(AppState {
        registry,
        metrics,
        scrape_duration,
        monitor: Mutex::new(monitor),
        config: Arc::new(config.clone()),
        tick_stats: Arc::new(TickStats::new()),
        start_time: Instant::now(),
    });

    // First tick right away so /metrics is populated before the first interval
    let first_state = state.clone();
    match tokio::task::spawn_blocking(move || run_tick(&first_state)).await {
        Ok(Ok(series)) => info!("Initial tick dispatched {} series", series),
        Ok(Err(e)) => error!("Initial tick failed: {}", e),
        Err(e) => error!("Initial tick task failed: {}", e),
    }

    let ticker = spawn_tick_loop(state.clone(), state.config.interval());

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/groups", get(groups_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-rdt-exporter listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    let result = tokio::select! {
        result = server => result.map_err(|e| {
            error!("Server error: {}", e);
            e
        }),
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
            Ok(())
        }
    };

    ticker.abort();
    let stop_state = state.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || stop_monitor(&stop_state)).await {
        error!("Monitoring shutdown task failed: {}", e);
    }

    result?;
    info!("herakles-rdt-exporter stopped gracefully");
    Ok(())
}
