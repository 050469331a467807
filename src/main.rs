use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// CAS impersonation proxy — transparent identity substitution for one login flow
#[derive(Parser)]
#[command(name = "cas-impersonate-proxy", version, about)]
struct Cli {
    /// Path to configuration file (.hcl)
    #[arg(short, long, default_value = "proxy.hcl")]
    config: String,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the proxy
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "proxy.hcl")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> cas_impersonate_proxy::Result<()> {
    let cli = Cli::parse();

    // Handle validate subcommand
    if let Some(Commands::Validate { config: config_path }) = &cli.command {
        return validate_config(config_path).await;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("CAS impersonation proxy v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!(config = cli.config, "Loading configuration");
        cas_impersonate_proxy::config::ProxyConfig::from_file(&cli.config).await?
    } else {
        tracing::warn!("Config file not found, using defaults");
        cas_impersonate_proxy::config::ProxyConfig::default()
    };

    // Override listen address if provided
    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }

    cas_impersonate_proxy::ProxyServer::new(config)?.run().await
}

/// Parse and validate a configuration file, then exit
async fn validate_config(path: &str) -> cas_impersonate_proxy::Result<()> {
    let config = cas_impersonate_proxy::config::ProxyConfig::from_file(path).await?;
    config.validate()?;
    println!("Configuration {} is valid", path);
    println!("  listen:                {}", config.listen);
    println!("  cas_base_url:          {}", config.cas_base_url);
    println!("  impersonate_cookie:    {}", config.impersonate_cookie);
    println!("  authorize_url:         {}", config.authorize_url);
    println!("  authorize_fail_policy: {:?}", config.authorize_fail_policy);
    println!("  ticket_store backend:  {}", config.ticket_store.backend);
    Ok(())
}
