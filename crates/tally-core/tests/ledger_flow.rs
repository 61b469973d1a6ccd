use std::collections::HashMap;
use std::sync::Mutex;
use tally_core::constants::{MINING_REWARD, REWARD_SENDER};
use tally_core::{block_hash, pow, Ledger, PeerChain, PeerFetch, PeerSet};

struct MapFetch {
    chains: HashMap<String, PeerChain>,
}

impl PeerFetch for MapFetch {
    fn fetch_chain(&self, peer: &str) -> anyhow::Result<PeerChain> {
        self.chains
            .get(peer)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

/// The full single-node flow a transport would drive: queue a transaction,
/// search a proof against the tip, credit the reward, seal the block.
#[test]
fn submit_then_mine() {
    let mut ledger = Ledger::new();
    let genesis_hash = block_hash(ledger.last_block());

    let index = ledger.new_transaction("A".to_string(), "B".to_string(), 5);
    assert_eq!(index, 2);

    let proof = pow::proof_of_work(ledger.last_block().proof);
    ledger.new_transaction(
        REWARD_SENDER.to_string(),
        "node-identifier".to_string(),
        MINING_REWARD,
    );
    let block = ledger.new_block(proof, None);

    assert_eq!(block.index, 2);
    assert_eq!(block.previous_hash, genesis_hash);
    assert_eq!(block.transactions.len(), 2);
    assert_eq!(block.transactions[0].sender, "A");
    assert_eq!(block.transactions[0].recipient, "B");
    assert_eq!(block.transactions[0].amount, 5);
    assert_eq!(block.transactions[1].sender, REWARD_SENDER);
    assert_eq!(block.transactions[1].amount, MINING_REWARD);

    assert!(ledger.pending().is_empty());
    assert!(Ledger::is_chain_valid(ledger.chain()));
}

/// Two nodes diverge, then the shorter one converges onto the longer chain
/// at its next resolution.
#[test]
fn divergence_then_convergence() {
    let mine = |ledger: &mut Ledger, rounds: usize| {
        for _ in 0..rounds {
            let proof = pow::proof_of_work(ledger.last_block().proof);
            ledger.new_block(proof, None);
        }
    };

    let mut ahead = Ledger::new();
    mine(&mut ahead, 3);

    let behind = Mutex::new(Ledger::new());
    mine(&mut behind.lock().unwrap(), 1);

    let mut peers = PeerSet::new();
    assert!(peers.register("http://10.0.0.2:8080"));
    let fetch = MapFetch {
        chains: HashMap::from([(
            "10.0.0.2:8080".to_string(),
            PeerChain {
                length: ahead.len(),
                chain: ahead.chain().to_vec(),
            },
        )]),
    };

    let outcome = tally_core::resolve::resolve_conflicts(&behind, &peers, &fetch);
    assert!(outcome.replaced);
    assert_eq!(outcome.length, 4);

    let behind = behind.into_inner().unwrap();
    assert_eq!(
        block_hash(behind.last_block()),
        block_hash(ahead.last_block())
    );
    assert!(Ledger::is_chain_valid(behind.chain()));
}

/// Chain serialization round-trips through the wire shape served to peers.
#[test]
fn peer_chain_wire_round_trip() {
    let mut ledger = Ledger::new();
    ledger.new_transaction("A".to_string(), "B".to_string(), 5);
    let proof = pow::proof_of_work(ledger.last_block().proof);
    ledger.new_block(proof, None);

    let wire = PeerChain {
        length: ledger.len(),
        chain: ledger.chain().to_vec(),
    };
    let json = serde_json::to_string(&wire).unwrap();
    let parsed: PeerChain = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.length, 2);
    assert!(Ledger::is_chain_valid(&parsed.chain));
    assert_eq!(
        block_hash(parsed.chain.last().unwrap()),
        block_hash(ledger.last_block())
    );
}
