use thiserror::Error;

/// Failures surfaced to callers of the runtime.
///
/// ABI-level mishaps (unknown connection ids, absent memory export,
/// out-of-range reads) are not represented here: the guest cannot be
/// trusted to handle host-side error signaling, so those calls are
/// swallowed as no-ops at the host boundary instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The module bytes were invalid or a required import could not be
    /// satisfied. Fatal; not retried by this layer.
    #[error("failed to instantiate guest module: {0}")]
    Instantiation(wasmtime::Error),

    /// The guest exports no `_request` entry point, so it cannot serve.
    #[error("guest module does not export `_request`")]
    NoHandler,

    /// The guest trapped inside an entry point before committing a
    /// response.
    #[error("guest request handler failed: {0}")]
    Guest(wasmtime::Error),

    /// The runtime was dropped before the guest committed a response.
    #[error("connection dropped before a response was committed")]
    ConnectionDropped,
}
