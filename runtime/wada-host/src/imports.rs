//! The fixed import table offered to guest modules.

use anyhow::Result;
use wasmtime::{Caller, Func, Linker, Store};

use crate::abi;
use crate::context::ResponseContext;
use crate::runtime::HostState;

/// Define the `wasi_snapshot_preview1` compatibility surface.
///
/// `fd_write` reports success while performing no I/O and never touching
/// guest memory (a real implementation would store the written count at
/// `nwritten_ptr`). It exists only so toolchains that unconditionally
/// wire in a minimal WASI capability set can instantiate.
pub(crate) fn define_wasi_stub<C: ResponseContext>(
    linker: &mut Linker<HostState<C>>,
    store: &mut Store<HostState<C>>,
) -> Result<()> {
    let fd_write = Func::wrap(
        &mut *store,
        |_fd: i32, _iovs_ptr: i32, _iovs_len: i32, _nwritten_ptr: i32| -> i32 { 0 },
    );
    linker.define(&mut *store, "wasi_snapshot_preview1", "fd_write", fd_write)?;
    Ok(())
}

/// Define the three `wada` connection ABI functions.
pub(crate) fn define_conn_host<C: ResponseContext>(
    linker: &mut Linker<HostState<C>>,
    store: &mut Store<HostState<C>>,
) -> Result<()> {
    let header = Func::wrap(
        &mut *store,
        |caller: Caller<'_, HostState<C>>,
         conn_id: u32,
         name_ptr: u32,
         name_len: u32,
         value_ptr: u32,
         value_len: u32,
         append: u32| {
            abi::conn_header(caller, conn_id, name_ptr, name_len, value_ptr, value_len, append);
        },
    );
    let body_write = Func::wrap(
        &mut *store,
        |caller: Caller<'_, HostState<C>>, conn_id: u32, body_ptr: u32, body_len: u32| {
            abi::conn_body_write(caller, conn_id, body_ptr, body_len);
        },
    );
    let body_close = Func::wrap(
        &mut *store,
        |caller: Caller<'_, HostState<C>>, conn_id: u32| {
            abi::conn_body_close(caller, conn_id);
        },
    );
    linker.define(&mut *store, "wada", "conn_header", header)?;
    linker.define(&mut *store, "wada", "conn_body_write", body_write)?;
    linker.define(&mut *store, "wada", "conn_body_close", body_close)?;
    Ok(())
}
