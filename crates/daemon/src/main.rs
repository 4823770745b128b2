//! ldap-template entry point.
//!
//! Builds the configuration from an optional TOML file plus flags and
//! `AUTOSIG_*` environment variables, sets up logging, starts the HTTP
//! server and shuts it down gracefully on SIGINT/SIGTERM.

mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use ldap_template_core::config::AppConfig;
use ldap_template_core::directory::LdapDirectoryClient;
use ldap_template_core::{PersonLookup, TemplateResolver};
use ldap_template_web::{AppState, WebServer};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Render directory person records through server-side templates.
#[derive(Parser, Debug)]
#[command(name = "ldap-template", version, about)]
struct Args {
    /// Optional TOML configuration file. Flags override its values.
    #[arg(short, long, env = "AUTOSIG_CONFIG")]
    config: Option<PathBuf>,

    /// URL of the ldap server (e.g.: ldap://localhost:389).
    #[arg(long, env = "AUTOSIG_LDAP_URL")]
    ldap_url: Option<String>,

    /// Username for LDAP bind (e.g.: cn=ldapsearch,cn=Users,dc=example,dc=com).
    #[arg(long, env = "AUTOSIG_LDAP_USER")]
    ldap_user: Option<String>,

    /// Password for the LDAP user.
    #[arg(long, env = "AUTOSIG_LDAP_PASSWORD", hide_env_values = true)]
    ldap_password: Option<String>,

    /// Person search base DN (e.g.: cn=Users,dc=example,dc=com).
    #[arg(long, env = "AUTOSIG_LDAP_SEARCH_DN")]
    ldap_search_dn: Option<String>,

    /// HTTP listen address (default :8000).
    #[arg(long, env = "AUTOSIG_HTTP_LISTEN")]
    http_listen: Option<String>,

    /// Directory holding `<name>.<text|html>.tmpl` files (default templates/).
    #[arg(long, env = "AUTOSIG_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AUTOSIG_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Overlay the flags that were given onto `config`.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(ref url) = self.ldap_url {
            config.directory.url = url.clone();
        }
        if let Some(ref user) = self.ldap_user {
            config.directory.bind_dn = user.clone();
        }
        if let Some(ref password) = self.ldap_password {
            config.directory.password = Some(password.clone());
        }
        if let Some(ref dn) = self.ldap_search_dn {
            config.directory.search_base_dn = dn.clone();
        }
        if let Some(ref listen) = self.http_listen {
            config.web.listen = listen.clone();
        }
        if let Some(ref dir) = self.template_dir {
            config.templates.dir = dir.clone();
        }
        if let Some(ref level) = self.log_level {
            config.daemon.log_level = level.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Log level used until the configuration says otherwise.
const DEFAULT_LOG_LEVEL: &str = "info";

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. The returned handle swaps the filter once
/// the configuration file has been read.
fn init_tracing(level: &str) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(level_filter(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();
    handle
}

/// Build the effective configuration: file, then flags, then secrets.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            AppConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables in config")?;
    config
        .validate()
        .context("configuration validation failed")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes first so that configuration loading is visible.
    let log_handle = init_tracing(args.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL));

    let config = load_config(&args)?;
    if args.log_level.is_none() {
        if let Err(e) = log_handle.reload(level_filter(&config.daemon.log_level)) {
            warn!(error = %e, "cannot apply configured log level");
        }
    }

    let listen = config.web.socket_addr()?;

    info!("========================================");
    info!("  ldap-template v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("LDAP server   : {}", config.directory.url);
    info!("Search base   : {}", config.directory.search_base_dn);
    info!("Bind user     : {}", config.directory.bind_dn);
    info!("Template dir  : {}", config.templates.dir.display());
    info!("HTTP listen   : {}", listen);
    info!("Log level     : {}", config.daemon.log_level);
    info!("========================================");

    let directory = LdapDirectoryClient::from_config(&config.directory);
    let state = AppState {
        lookup: PersonLookup::new(Arc::new(directory), config.directory.search_base_dn.clone()),
        templates: TemplateResolver::new(config.templates.dir.clone())
            .context("failed to initialize template resolver")?,
    };

    WebServer::new(state)
        .start(listen, signals::shutdown_signal())
        .await
        .context("http server failed")?;

    info!("ldap-template stopped.");
    Ok(())
}
