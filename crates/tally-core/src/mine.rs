use crate::pow::valid_proof;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Searches the nonce space in parallel until some worker finds a proof
/// passing `valid_proof` against `last_proof`. Rayon splits the range across
/// threads; whichever worker reports first wins, and validity is a pure
/// function of the integer, so the race has no wrong answer.
///
/// Workers poll the shared `cancel` flag each candidate. A set flag wakes the
/// search immediately, so the candidate that comes back is re-checked with
/// `valid_proof` before it is accepted; `None` means the attempt was
/// abandoned, not solved.
pub fn proof_of_work_parallel(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let found = (0u64..u64::MAX)
        .into_par_iter()
        .find_any(|&candidate| {
            cancel.load(Ordering::Relaxed) || valid_proof(last_proof, candidate)
        })?;

    if !valid_proof(last_proof, found) {
        return None;
    }
    info!(last_proof, proof = found, "proof of work found");
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_search_finds_valid_proof() {
        let cancel = AtomicBool::new(false);
        let proof = proof_of_work_parallel(0, &cancel).expect("search not cancelled");
        assert!(valid_proof(0, proof));
    }

    #[test]
    fn parallel_search_honours_cancellation() {
        let cancel = AtomicBool::new(true);
        assert_eq!(proof_of_work_parallel(0, &cancel), None);
    }

    #[test]
    fn parallel_and_sequential_agree_on_validity() {
        let cancel = AtomicBool::new(false);
        let parallel = proof_of_work_parallel(42, &cancel).unwrap();
        let sequential = crate::pow::proof_of_work(42);
        assert!(valid_proof(42, parallel));
        assert!(valid_proof(42, sequential));
        // The parallel search may land on any valid nonce, never below the
        // sequential minimum.
        assert!(parallel >= sequential);
    }
}
