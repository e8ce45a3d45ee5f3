//! Internal helper for running the async core from the crate's synchronous public API.

use std::future::Future;

/// Block the current thread on the given future, driving it on a fresh single-threaded
/// Tokio runtime. The public API of this crate is synchronous; every `Handler`-accepting
/// entry point spins up one of these runtimes and tears it down before returning.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start internal tokio runtime")
        .block_on(future)
}
