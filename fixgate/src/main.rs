//! Gateway process entry point: loads a `GatewayConfig`, builds one
//! [`SessionAgent`] per configured session and drives them (plus the
//! cluster node, when clustered) through the cooperative host loop
//! described in §5.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fixgate::{
    AllowAllCredentials, BackoffIdleStrategy, ClusterableStreams, EngineContext, GatewayConfig,
    SessionAgent, SessionConfig, SessionRole, SoloPublication, TcpAcceptor, TcpConnection,
    TracingErrorHandler,
};
use fixgate_cluster::InMemoryTransport;
use fixgate_core::{FixString, Instant};
use fixgate_session::{InMemoryStorage, Session, SessionIds, SessionKey};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fixgate", about = "FIX session gateway")]
struct Cli {
    /// Path to a TOML gateway configuration file.
    #[arg(long, short)]
    config: PathBuf,

    /// Where to persist the session-id registry; in-memory if omitted.
    #[arg(long)]
    registry: Option<PathBuf>,
}

fn fix_string(s: &str) -> FixString {
    FixString::from_ascii(s.as_bytes().to_vec()).expect("config value is ASCII")
}

/// Establishes the initial socket for one configured session. This is
/// the one place in the process allowed to block: it runs during
/// startup, before the session becomes an `Agent` driven by the
/// non-suspending host loop (§5 applies to the steady-state loop, not
/// to one-shot bootstrap).
fn establish_connection(config: &SessionConfig) -> Result<TcpConnection> {
    match config.role {
        SessionRole::Initiator => {
            let addr = config.connect.as_deref().context("initiator session is missing `connect`")?;
            info!(addr, "dialing counterparty");
            Ok(TcpConnection::connect(addr)?)
        }
        SessionRole::Acceptor => {
            let addr = config.listen.as_deref().context("acceptor session is missing `listen`")?;
            info!(addr, "waiting for counterparty to connect");
            let acceptor = TcpAcceptor::bind(addr)?;
            loop {
                if let Some(conn) = acceptor.poll_accept()? {
                    return Ok(conn);
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config).context("loading gateway config")?;

    if config.is_clustered() {
        warn!(
            peers = config.peer_ids.len(),
            "clustered configuration supplied, but this binary has no cross-process cluster \
             transport wired in; running solo. The replicated path is exercised by \
             fixgate-cluster's own test suite (InMemoryFabric)."
        );
    }

    let mut registry = match &cli.registry {
        Some(path) => SessionIds::open(path).context("opening session-id registry")?,
        None => SessionIds::in_memory(),
    };

    let error_handler = Arc::new(TracingErrorHandler);
    let credentials = Arc::new(AllowAllCredentials);

    let mut engine: EngineContext<InMemoryTransport> = EngineContext::new(error_handler.clone());
    engine.attach_streams(ClusterableStreams::Solo(SoloPublication::default()));
    let publication = engine.publication_handle().expect("streams were just attached");

    let mut agents: Vec<Box<dyn fixgate::Agent>> = Vec::new();

    for session_config in &config.sessions {
        let key = SessionKey::new(
            fix_string(&session_config.begin_string),
            fix_string(&session_config.sender_comp_id),
            fix_string(&session_config.target_comp_id),
        );
        let session_id = registry.lookup_or_allocate(&key).context("allocating session id")?;
        let settings = session_config.to_session_settings();
        let session = Session::new(
            session_config.role.to_session_role(),
            key.clone(),
            session_id,
            settings,
            InMemoryStorage::new(),
        );
        let connection = establish_connection(session_config)?;
        let name = key.to_string();
        info!(session = %name, session_id, "session established");

        let agent = SessionAgent::new(
            name,
            session,
            connection,
            publication.clone(),
            credentials.clone(),
            engine.counters().clone(),
            error_handler.clone(),
        );
        agents.push(Box::new(agent));
    }

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown_requested.clone())
        .context("registering SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown_requested.clone())
        .context("registering SIGTERM handler")?;

    let completion = engine.completion().clone();

    info!(sessions = agents.len(), "gateway starting host loop");
    let mut idle = BackoffIdleStrategy::new();
    loop {
        let now = Instant::now();
        let wall_now = chrono::Utc::now();
        let mut work = 0;
        for agent in &mut agents {
            work += agent.do_work(now, wall_now);
        }
        idle.idle(work);

        if shutdown_requested.load(Ordering::Relaxed) {
            let position = publication.borrow().current_position();
            if completion.borrow().get().is_none() {
                info!(position, "shutdown requested, draining agents to final position");
                completion.borrow_mut().set(position);
            }
            if work == 0 && completion.borrow().is_reached(position) {
                info!("host loop drained, closing sessions in reverse order");
                break;
            }
        }
    }

    for agent in agents.into_iter().rev() {
        drop(agent);
    }

    Ok(())
}
