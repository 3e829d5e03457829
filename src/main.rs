use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::net::TcpListener;
use webmerge::config::Config;
use webmerge::modules::ModuleRegistry;
use webmerge::reload::ReloadManager;
use webmerge::server::{build_pipeline, serve, AppState};

/// How often the reload flag set by SIGHUP is checked
const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Webmerge - composite JS/CSS resource server
#[derive(Parser, Debug)]
#[command(name = "webmerge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rule file, overriding rules.path from the configuration
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Document root, overriding site.root from the configuration
    #[arg(long)]
    root: Option<PathBuf>,

    /// Test configuration and rules, then exit
    #[arg(long)]
    test: bool,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).map_err(|e| anyhow!(e))?,
        None => Config::default(),
    };
    if let Some(rules) = &args.rules {
        config.rules.path = Some(rules.clone());
    }
    if let Some(root) = &args.root {
        config.site.root = root.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow!(e))
        .context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {:#}", e);
        std::process::exit(1);
    });

    webmerge::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow!("Failed to initialize logging subsystem: {}", e))?;

    let registry = ModuleRegistry::builtin();
    let pipeline = Arc::new(build_pipeline(&config, &registry).context("Failed to load rules")?);

    tracing::info!(
        config_file = ?args.config,
        root = %config.site.root.display(),
        context_path = %config.context_path(),
        rules = ?config.rules.path,
        mappings = pipeline.rules().len(),
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration OK");
        return Ok(());
    }

    let reload = ReloadManager::new(config.rules.path.clone()).with_optional(config.rules.optional);
    #[cfg(unix)]
    reload
        .register_signal_handler()
        .map_err(|e| anyhow!(e))?;

    let reload_pipeline = pipeline.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RELOAD_POLL_INTERVAL);
        loop {
            interval.tick().await;
            if !reload.is_reload_requested() {
                continue;
            }
            reload.clear_reload_request();
            match reload.reload_rules(&registry) {
                Ok(rules) => reload_pipeline.replace_rules(rules),
                Err(e) => tracing::error!(error = %e, "Rule reload failed, keeping current rules"),
            }
        }
    });

    let listener = TcpListener::bind(config.server.listen_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_address()))?;
    let state = Arc::new(AppState::new(pipeline, &config));

    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
