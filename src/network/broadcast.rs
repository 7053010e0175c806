// Best-effort fan-out: one thread per peer, every outcome collected, no early
// abort when a peer fails. Each peer call is bounded by the client's own timeout.

use crate::error::{LedgerError, Result};
use std::thread;

/// Runs `send` against every peer concurrently and returns the outcomes in
/// the same order as `peers`.
pub fn fan_out<T, F>(peers: &[String], send: F) -> Vec<(String, Result<T>)>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    if peers.is_empty() {
        return vec![];
    }

    let send = &send;
    thread::scope(|scope| {
        let handles: Vec<_> = peers
            .iter()
            .map(|peer| (peer, scope.spawn(move || send(peer.as_str()))))
            .collect();

        handles
            .into_iter()
            .map(|(peer, handle)| {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(LedgerError::Network(format!("Task for peer {peer} panicked")))
                });
                (peer.clone(), outcome)
            })
            .collect()
    })
}
