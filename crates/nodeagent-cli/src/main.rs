//! Node Agent CLI - RTML gateway between intelligent agents and a telescope

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use nodeagent_cli::{router, AppState, HttpDelivery, HttpTeaEndpoint};
use nodeagent_core::{NodeAgent, NodeAgentConfig, DEFAULT_CONFIG_PATH};
use nodeagent_store::Stores;
use nodeagent_tea::{
    AsyncResponseHandler, Binding, BindingPersistor, LocalRegistry, NameRegistry, TeaConnector,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "nodeagent")]
#[command(about = "eSTAR node agent - RTML gateway for a telescope embedded agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the node agent
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Check configuration and store files
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    nodeagent_cli::init_tracing(std::io::stdout);

    match cli.command {
        Some(Commands::Start { config }) => start(&config).await,
        Some(Commands::Check { config }) => check(&config),
        None => {
            println!("eSTAR node agent v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<NodeAgentConfig> {
    let config = NodeAgentConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!("Config {} is valid", path.display());
    println!("  agent name:        {}", config.agent.name);
    println!("  tea connected:     {}", config.agent.tea_connected);
    if config.agent.tea_connected {
        println!("  tea handler:       {}", config.connector_config().handler_url());
        println!(
            "  tea endpoint:      {}",
            config.tea.endpoint_url.as_deref().unwrap_or("(not set)")
        );
        if let Some(predictor) = &config.tea.availability_predictor_name {
            println!("  tea predictor:     {}", predictor);
        }
    }
    println!("  callback name:     {}", config.callback.binding_name);
    println!("  listen:            {}:{}", config.server.address, config.server.port);

    let stores = Stores::load(&config.stores)?;
    println!("  credentials:       {} users", stores.credentials.len());
    println!("  user aliases:      {}", stores.users.len());
    println!("  project aliases:   {}", stores.projects.len());

    if config.agent.tea_connected && config.tea.endpoint_url.is_none() {
        bail!("tea.endpoint_url is required when isteaconnected = true");
    }
    Ok(())
}

async fn start(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let stores = Stores::load(&config.stores)?;
    let call_timeout = Duration::from_millis(config.tea.call_timeout_ms);

    let registry = Arc::new(LocalRegistry::new());
    let connector_config = config.connector_config();
    if config.agent.tea_connected {
        let url = config
            .tea
            .endpoint_url
            .as_deref()
            .context("tea.endpoint_url is required when isteaconnected = true")?;
        let endpoint = HttpTeaEndpoint::new(url, call_timeout)
            .with_context(|| format!("invalid tea.endpoint_url {}", url))?;
        registry
            .rebind(&connector_config.handler_url(), Binding::Endpoint(Arc::new(endpoint)))
            .await?;
        info!(handler = %connector_config.handler_url(), endpoint = %url, "TEA request handler bound");
    } else {
        warn!("isteaconnected = false; documents will be refused");
    }

    let connector = Arc::new(TeaConnector::new(registry.clone(), connector_config));
    let agent = Arc::new(NodeAgent::new(config.clone(), stores, connector));

    let delivery = Arc::new(HttpDelivery::new(call_timeout)?);
    let relay: Arc<dyn AsyncResponseHandler> = Arc::new(agent.build_relay(delivery));
    let mut persistor = BindingPersistor::new(
        registry.clone(),
        Binding::ResponseHandler(relay),
        config.persistor_config(),
    )
    .spawn();

    let app = router(AppState::new(
        agent,
        registry,
        config.callback.binding_name.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(%addr, "node agent listening");

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    let served = tokio::select! {
        joined = &mut server => Some(joined),
        exit = persistor.join() => {
            if exit.is_abnormal() {
                error!(exit = ?exit, "callback binding loop terminated");
                if config.callback.required {
                    server.abort();
                    bail!("callback binding loop terminated: {:?}", exit);
                }
                warn!("continuing without asynchronous callbacks");
            }
            None
        }
    };
    let joined = match served {
        Some(joined) => joined,
        None => server.await,
    };
    joined
        .context("server task failed")?
        .context("node agent server failure")?;

    let exit = persistor.shutdown().await;
    info!(exit = ?exit, "callback binding loop stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
