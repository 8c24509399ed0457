//! sienna-daemon: the Sienna platform daemon.
//!
//! Single OS process running a Tokio async runtime. Clients talk JSON-RPC
//! over a Unix socket; a background event source polls the chain provider
//! for contract logs and feeds the projector through an in-process bus.

mod commands;
mod config;
mod cursor;
mod rpc;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use sienna_auth::SessionIssuer;
use sienna_chain::{ChainHandle, ContractEventSource, EventBus, SourceConfig};
use sienna_crypto::token::TokenSigner;
use sienna_ledger::FeeSplit;
use sienna_projector::Projector;
use sienna_types::WalletAddress;

use crate::config::DaemonConfig;
use crate::cursor::SettingsCursor;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection, serialized behind a mutex. Correctness never
    /// depends on this lock; the store's constraints and conditional
    /// updates carry the guarantees.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Chain provider, if one is configured.
    pub chain: ChainHandle,
    /// Bus carrying decoded contract events.
    pub bus: EventBus,
    /// Session token issuer.
    pub sessions: SessionIssuer,
    /// Fee split applied to recorded payments.
    pub split: FeeSplit,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sienna=info".parse()?),
        )
        .init();

    info!("Sienna daemon starting");

    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database (runs pending migrations)
    let db_path = data_dir.join("sienna.db");
    let conn = sienna_db::open(&db_path)?;
    let db = Arc::new(Mutex::new(conn));

    // 3. Token signer
    let signer = if config.auth.token_secret_hex.is_empty() {
        warn!("no token secret configured; sessions will not survive restart");
        TokenSigner::generate()
    } else {
        TokenSigner::from_hex(&config.auth.token_secret_hex)?
    };

    // 4. Fee split
    let split = FeeSplit::new(config.ledger.fee_rate_pct)
        .map_err(|e| anyhow::anyhow!("invalid fee rate: {e}"))?;

    // 5. Chain provider (optional; chain-dependent methods fail closed
    //    without one)
    let rpc_url = (!config.chain.rpc_url.is_empty()).then_some(config.chain.rpc_url.as_str());
    let chain = ChainHandle::from_rpc_url(rpc_url)?;
    if !chain.is_configured() {
        warn!("no chain provider configured; payments and subscriptions are read-only");
    }

    // 6. Event bus and shutdown channel
    let bus = EventBus::new(1024);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 7. Build daemon state
    let state = Arc::new(DaemonState {
        db: db.clone(),
        config,
        chain,
        bus: bus.clone(),
        sessions: SessionIssuer::new(signer),
        split,
        shutdown_tx: shutdown_tx.clone(),
    });

    // 8. Projector consumes the bus; subscribe before anything publishes.
    let projector_events = bus.subscribe();
    {
        let projector = Projector::new(split, state.config.subscriptions.period_secs);
        let db = db.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            projector.run(db, projector_events, shutdown).await;
        });
    }

    // 9. Event source: backfill from the persisted cursor, then poll live.
    if state.chain.is_configured() {
        match event_source(&state, bus.clone(), db.clone()) {
            Ok(Some(source)) => {
                let start_block = state.config.chain.start_block;
                let shutdown = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = source.backfill(start_block).await {
                        warn!("backfill failed: {e}");
                    }
                    source.run(shutdown).await;
                });
            }
            Ok(None) => {
                warn!("chain provider configured but no contract addresses; event source disabled");
            }
            Err(e) => return Err(e),
        }
    }

    // 10. Periodic lapse sweep
    {
        let db = db.clone();
        let interval_secs = state.config.subscriptions.sweep_interval_secs;
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = ticker.tick() => {}
                }
                let mut conn = db.lock().await;
                match sienna_subs::expire_lapsed(&mut conn, sienna_types::unix_now()) {
                    Ok(0) => {}
                    Ok(swept) => info!(swept, "lapsed subscriptions swept"),
                    Err(e) => warn!("lapse sweep failed: {e}"),
                }
            }
        });
    }

    // 11. Run the RPC server until shutdown
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown: stop the background tasks, drop the socket.
    let _ = shutdown_tx.send(());
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

/// Build the contract event source, or `None` when no contracts are
/// configured.
fn event_source(
    state: &Arc<DaemonState>,
    bus: EventBus,
    db: Arc<Mutex<rusqlite::Connection>>,
) -> anyhow::Result<Option<ContractEventSource>> {
    let chain_cfg = &state.config.chain;
    if chain_cfg.contract_addresses.is_empty() {
        return Ok(None);
    }

    let contracts = chain_cfg
        .contract_addresses
        .iter()
        .map(|raw| WalletAddress::parse(raw))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("bad contract address in config: {e}"))?;

    let client = state
        .chain
        .client()
        .map_err(|e| anyhow::anyhow!("chain handle: {e}"))?
        .clone();
    let source = ContractEventSource::new(
        client,
        bus,
        Arc::new(SettingsCursor::new(db)),
        SourceConfig {
            contracts,
            poll_interval: Duration::from_millis(chain_cfg.poll_interval_ms),
            max_backoff: Duration::from_millis(chain_cfg.max_backoff_ms),
            start_block: chain_cfg.start_block,
        },
    )?;
    Ok(Some(source))
}
