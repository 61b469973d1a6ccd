use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tally_core::constants::{MINING_REWARD, REWARD_SENDER};
use tally_core::{block_hash, mine, resolve, Block, Ledger, PeerChain, PeerFetch, PeerSet, Transaction};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

mod constants;
use constants::{NODE_ID_BYTES, PEER_FETCH_TIMEOUT};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
}

#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<Ledger>>,
    peers: Arc<Mutex<PeerSet>>,
    /// Raised when a chain replacement lands, so an in-flight nonce search
    /// abandons its now-stale tip.
    mining_cancel: Arc<AtomicBool>,
    node_id: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
struct TxIn {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
struct TxQueued {
    message: String,
    index: u64,
}

#[derive(Serialize)]
struct MinedBlock {
    message: &'static str,
    index: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

#[derive(Deserialize)]
struct RegisterIn {
    nodes: Vec<String>,
}

#[derive(Serialize)]
struct RegisterOut {
    message: &'static str,
    total_nodes: Vec<String>,
}

#[derive(Serialize)]
struct ResolveOut {
    replaced: bool,
    length: usize,
    chain: Vec<Block>,
}

/// Blocking HTTP implementation of the core's peer-fetch capability.
struct HttpPeerFetch {
    client: reqwest::blocking::Client,
}

impl HttpPeerFetch {
    fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PEER_FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl PeerFetch for HttpPeerFetch {
    fn fetch_chain(&self, peer: &str) -> Result<PeerChain> {
        let url = format!("http://{peer}/chain");
        let response = self.client.get(&url).send()?.error_for_status()?;
        Ok(response.json()?)
    }
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(tx): Json<TxIn>,
) -> (StatusCode, Json<TxQueued>) {
    let index = state
        .ledger
        .lock()
        .expect("ledger mutex poisoned")
        .new_transaction(tx.sender, tx.recipient, tx.amount);
    (
        StatusCode::CREATED,
        Json(TxQueued {
            message: format!("transaction will be added to block {index}"),
            index,
        }),
    )
}

async fn full_chain(State(state): State<AppState>) -> Json<PeerChain> {
    let guard = state.ledger.lock().expect("ledger mutex poisoned");
    Json(PeerChain {
        length: guard.len(),
        chain: guard.chain().to_vec(),
    })
}

async fn mine_block(
    State(state): State<AppState>,
) -> Result<Json<MinedBlock>, (StatusCode, String)> {
    let (last_proof, tip_hash) = {
        let guard = state.ledger.lock().expect("ledger mutex poisoned");
        (guard.last_block().proof, block_hash(guard.last_block()))
    };

    // The search runs on a blocking worker; the ledger stays unlocked and
    // responsive while it grinds.
    let cancel = state.mining_cancel.clone();
    cancel.store(false, Ordering::Relaxed);
    let proof =
        tokio::task::spawn_blocking(move || mine::proof_of_work_parallel(last_proof, &cancel))
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let Some(proof) = proof else {
        return Err((
            StatusCode::CONFLICT,
            "mining abandoned: chain replaced".to_string(),
        ));
    };

    let mut guard = state.ledger.lock().expect("ledger mutex poisoned");
    // The tip may have moved while the search ran (a competing mine or a
    // consensus swap). A proof searched against a stale tip is discarded.
    if block_hash(guard.last_block()) != tip_hash {
        warn!("discarding stale proof: tip moved while mining");
        return Err((
            StatusCode::CONFLICT,
            "mining abandoned: chain replaced".to_string(),
        ));
    }
    guard.new_transaction(
        REWARD_SENDER.to_string(),
        state.node_id.clone(),
        MINING_REWARD,
    );
    let block = guard.new_block(proof, None);
    Ok(Json(MinedBlock {
        message: "new block forged",
        index: block.index,
        transactions: block.transactions.clone(),
        proof: block.proof,
        previous_hash: block.previous_hash.clone(),
    }))
}

async fn register_nodes(
    State(state): State<AppState>,
    Json(body): Json<RegisterIn>,
) -> Result<(StatusCode, Json<RegisterOut>), (StatusCode, String)> {
    if body.nodes.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "please supply a list of nodes".to_string(),
        ));
    }
    let mut peers = state.peers.lock().expect("peer mutex poisoned");
    for node in &body.nodes {
        peers.register(node);
    }
    Ok((
        StatusCode::CREATED,
        Json(RegisterOut {
            message: "new nodes have been added",
            total_nodes: peers.iter().map(str::to_string).collect(),
        }),
    ))
}

async fn resolve_chain(
    State(state): State<AppState>,
) -> Result<Json<ResolveOut>, (StatusCode, String)> {
    let ledger = state.ledger.clone();
    let peers = state.peers.lock().expect("peer mutex poisoned").clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<resolve::ResolutionOutcome> {
        let fetch = HttpPeerFetch::new()?;
        Ok(resolve::resolve_conflicts(&ledger, &peers, &fetch))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if outcome.replaced {
        // Any search still grinding against the displaced tip is stale now.
        state.mining_cancel.store(true, Ordering::Relaxed);
    }

    let guard = state.ledger.lock().expect("ledger mutex poisoned");
    Ok(Json(ResolveOut {
        replaced: outcome.replaced,
        length: guard.len(),
        chain: guard.chain().to_vec(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let node_id = hex::encode(rand::random::<[u8; NODE_ID_BYTES]>());
    info!(%node_id, "node identity generated");

    let state = AppState {
        ledger: Arc::new(Mutex::new(Ledger::new())),
        peers: Arc::new(Mutex::new(PeerSet::new())),
        mining_cancel: Arc::new(AtomicBool::new(false)),
        node_id,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/mine", get(mine_block))
        .route("/chain", get(full_chain))
        .route("/transactions/new", post(submit_transaction))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_chain))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("tally-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
