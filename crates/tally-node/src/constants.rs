use std::time::Duration;

/// Bound on each peer chain fetch during resolution; a silent peer is
/// skipped, not waited on.
pub(crate) const PEER_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) const NODE_ID_BYTES: usize = 16;
