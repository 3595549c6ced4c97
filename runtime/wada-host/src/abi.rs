//! Host-side handlers for the `wada` connection ABI.
//!
//! Every handler swallows host-side bookkeeping mismatches (unknown or
//! already-closed ids, absent memory export, out-of-range reads) as
//! no-ops. The guest must never be trapped over a host-side lookup
//! failure; each swallow is traced so a misbehaving guest stays
//! diagnosable.

use wasmtime::Caller;

use crate::context::ResponseContext;
use crate::memory::{ensure_memory, read_guest_bytes};
use crate::runtime::HostState;

/// Set or append one response header from two ranges in guest memory.
///
/// Both ranges are decoded as UTF-8 with malformed sequences replaced,
/// never rejected. Headers alone do not commit the response.
pub(crate) fn conn_header<C: ResponseContext>(
    mut caller: Caller<'_, HostState<C>>,
    conn_id: u32,
    name_ptr: u32,
    name_len: u32,
    value_ptr: u32,
    value_len: u32,
    append: u32,
) {
    if !caller.data().connections.contains(conn_id) {
        tracing::trace!(conn_id, "conn_header on unknown connection");
        return;
    }
    let Some(name) = read_guest_bytes(&mut caller, name_ptr, name_len) else {
        tracing::trace!(conn_id, name_ptr, name_len, "conn_header name range unavailable");
        return;
    };
    let Some(value) = read_guest_bytes(&mut caller, value_ptr, value_len) else {
        tracing::trace!(conn_id, value_ptr, value_len, "conn_header value range unavailable");
        return;
    };
    let name = String::from_utf8_lossy(&name);
    let value = String::from_utf8_lossy(&value);
    let Some(conn) = caller.data_mut().connections.get_mut(conn_id) else {
        return;
    };
    conn.ctx_mut().header(&name, &value, append != 0);
}

/// Append one range of guest memory to the connection's body stream.
///
/// The first successful write commits the response before the bytes reach
/// the sink, so the external caller observes the response while the body
/// is still streaming. Chunks concatenate in call order.
pub(crate) fn conn_body_write<C: ResponseContext>(
    mut caller: Caller<'_, HostState<C>>,
    conn_id: u32,
    body_ptr: u32,
    body_len: u32,
) {
    if !caller.data().connections.contains(conn_id) {
        tracing::trace!(conn_id, "conn_body_write on unknown connection");
        return;
    }
    let Some(chunk) = read_guest_bytes(&mut caller, body_ptr, body_len) else {
        tracing::trace!(conn_id, body_ptr, body_len, "conn_body_write range unavailable");
        return;
    };
    let Some(conn) = caller.data_mut().connections.get_mut(conn_id) else {
        return;
    };
    conn.commit();
    conn.ctx_mut().body_write(&chunk);
}

/// Close the connection's body stream and retire its id.
///
/// Commits with an empty body if nothing was written first. Closing an
/// already-closed or never-opened id is a no-op, as is closing when the
/// guest exports no memory (memory absence disables the whole ABI).
pub(crate) fn conn_body_close<C: ResponseContext>(
    mut caller: Caller<'_, HostState<C>>,
    conn_id: u32,
) {
    if ensure_memory(&mut caller).is_none() {
        tracing::trace!(conn_id, "conn_body_close without memory export");
        return;
    }
    let Some(mut conn) = caller.data_mut().connections.remove(conn_id) else {
        tracing::trace!(conn_id, "conn_body_close on unknown connection");
        return;
    };
    conn.commit();
    conn.ctx_mut().body_close();
}
