use crate::ledger::Ledger;
use crate::Block;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Registered peer locations, deduplicated `host:port` strings.
#[derive(Clone, Debug, Default)]
pub struct PeerSet {
    peers: HashSet<String>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer given either a full URL (`http://host:port/...`) or a
    /// bare `host:port`; only the network location is kept. Returns `false`
    /// for blank input or an address already present.
    pub fn register(&mut self, address: &str) -> bool {
        let trimmed = address.trim();
        let rest = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed,
        };
        let netloc = rest.split('/').next().unwrap_or("");
        if netloc.is_empty() {
            return false;
        }
        self.peers.insert(netloc.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.peers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// The shape a peer reports for its full chain, as served by `GET /chain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerChain {
    pub length: usize,
    pub chain: Vec<Block>,
}

/// Capability for pulling a peer's chain. Implemented by the transport
/// layer; defined here so the resolver does not depend on any HTTP client.
pub trait PeerFetch {
    fn fetch_chain(&self, peer: &str) -> Result<PeerChain>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub replaced: bool,
    /// Length of the authoritative chain after resolution.
    pub length: usize,
}

/// Longest-valid-chain resolution. Fetches every registered peer's chain,
/// skipping unreachable or malformed responses, and keeps the longest
/// candidate that is strictly longer than the local chain and valid. The
/// ledger lock is held only for the initial length snapshot and the final
/// swap; `replace_chain` re-checks length and validity under the lock, so a
/// chain that grew locally during the fan-out is never displaced by a
/// now-equal candidate.
///
/// Length comparison is by raw block count, not accumulated work. Inherited
/// behavior; changing it would change which chains win on the network.
pub fn resolve_conflicts(
    ledger: &Mutex<Ledger>,
    peers: &PeerSet,
    fetch: &dyn PeerFetch,
) -> ResolutionOutcome {
    let mut max_length = ledger.lock().expect("ledger mutex poisoned").len();
    let mut winner: Option<Vec<Block>> = None;

    for peer in peers.iter() {
        let reported = match fetch.fetch_chain(peer) {
            Ok(reported) => reported,
            Err(err) => {
                warn!(peer, error = %err, "skipping unreachable peer");
                continue;
            }
        };
        if reported.length != reported.chain.len() {
            debug!(
                peer,
                reported = reported.length,
                actual = reported.chain.len(),
                "peer misreported its chain length"
            );
        }
        let length = reported.chain.len();
        if length > max_length && Ledger::is_chain_valid(&reported.chain) {
            debug!(peer, length, "longer valid candidate");
            max_length = length;
            winner = Some(reported.chain);
        }
    }

    let mut guard = ledger.lock().expect("ledger mutex poisoned");
    let replaced = match winner {
        Some(chain) => guard.replace_chain(chain),
        None => false,
    };
    if replaced {
        info!(length = guard.len(), "adopted longer peer chain");
    }
    ResolutionOutcome {
        replaced,
        length: guard.len(),
    }
}
