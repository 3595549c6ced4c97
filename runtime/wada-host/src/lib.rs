//! Host runtime bridging WebAssembly guest modules to an externally-managed
//! HTTP request/response lifecycle.
//!
//! The host owns the instantiated module, its linear memory, and a table of
//! in-flight connections; the guest owns request-handling logic and emits
//! headers and body bytes by calling back into the host through a small
//! pointer+length ABI. The HTTP transport itself stays behind the
//! [`ResponseContext`] trait.

mod abi;
mod conn;
mod context;
mod error;
mod imports;
mod memory;
mod runtime;

pub use context::ResponseContext;
pub use error::RuntimeError;
pub use runtime::{PendingResponse, WadaRuntime};
