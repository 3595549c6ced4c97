use std::env;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::task::{self, Poll};

use anyhow::Result;
use tokio::sync::oneshot;
use wasmtime::{
    Cache, Config, Engine, Linker, Memory, Module, OptLevel, Store, TypedFunc,
};

use crate::conn::{Connection, ConnectionTable};
use crate::context::ResponseContext;
use crate::error::RuntimeError;
use crate::imports::{define_conn_host, define_wasi_stub};

/// Per-store host state reachable from ABI handlers.
pub(crate) struct HostState<C: ResponseContext> {
    pub(crate) memory: Option<Memory>,
    pub(crate) connections: ConnectionTable<C>,
}

fn build_engine() -> Result<Engine> {
    let mut config = Config::new();
    let max_stack = env::var("WADA_WASM_MAX_STACK")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .filter(|val| *val > 0)
        .unwrap_or(8 * 1024 * 1024);
    config.max_wasm_stack(max_stack);
    tracing::debug!(max_stack, "wasmtime max_wasm_stack configured");
    if matches!(env::var("WADA_WASM_CACHE").as_deref(), Ok("1")) {
        let cache = match env::var("WADA_WASM_CACHE_CONFIG").ok() {
            Some(path) => Cache::from_file(Some(Path::new(&path)))?,
            None => Cache::from_file(None)?,
        };
        config.cache(Some(cache));
        tracing::debug!("wasmtime compilation cache enabled");
    }
    if matches!(env::var("WADA_WASM_COMPILE_FAST").as_deref(), Ok("1")) {
        config.cranelift_opt_level(OptLevel::None);
        tracing::debug!("wasmtime opt level set to none");
    }
    Ok(Engine::new(&config)?)
}

/// Host runtime bound to exactly one instantiated guest module.
///
/// Constructing a new runtime is how a module gets replaced. Access is
/// serialized through `&mut self`; a multi-threaded host dispatching
/// concurrent requests onto one instance must add its own lock around the
/// runtime.
pub struct WadaRuntime<C: ResponseContext> {
    store: Store<HostState<C>>,
    start: Option<TypedFunc<(), ()>>,
    request: Option<TypedFunc<u32, ()>>,
}

impl<C: ResponseContext> WadaRuntime<C> {
    /// Compile and instantiate a guest module from raw bytes.
    ///
    /// The module is given the fixed import table (`wasi_snapshot_preview1`
    /// stub plus the `wada` connection ABI) and nothing else.
    pub fn instantiate(bytes: &[u8]) -> Result<Self, RuntimeError> {
        let engine =
            build_engine().map_err(|e| RuntimeError::Instantiation(wasmtime::Error::from_anyhow(e)))?;
        let module = Module::new(&engine, bytes).map_err(RuntimeError::Instantiation)?;
        let mut store = Store::new(
            &engine,
            HostState {
                memory: None,
                connections: ConnectionTable::new(),
            },
        );
        let mut linker = Linker::new(&engine);
        define_wasi_stub(&mut linker, &mut store)
            .map_err(|e| RuntimeError::Instantiation(wasmtime::Error::from_anyhow(e)))?;
        define_conn_host(&mut linker, &mut store)
            .map_err(|e| RuntimeError::Instantiation(wasmtime::Error::from_anyhow(e)))?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(RuntimeError::Instantiation)?;

        let memory = instance.get_memory(&mut store, "memory");
        store.data_mut().memory = memory;
        let start = instance.get_typed_func::<(), ()>(&mut store, "_start").ok();
        let request = instance.get_typed_func::<u32, ()>(&mut store, "_request").ok();
        tracing::debug!(
            has_memory = memory.is_some(),
            has_start = start.is_some(),
            has_request = request.is_some(),
            "guest module instantiated"
        );
        Ok(Self {
            store,
            start,
            request,
        })
    }

    /// Run the guest's optional `_start` export. Called once at host-driven
    /// startup, before serving any request; a no-op if the export is
    /// absent.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if let Some(start) = &self.start {
            start
                .call(&mut self.store, ())
                .map_err(RuntimeError::Guest)?;
        }
        Ok(())
    }

    /// Bridge one external request into the guest.
    ///
    /// Invokes `_request(conn_id)` synchronously; the guest may call back
    /// into the connection ABI any number of times during that call, for
    /// this id or any other still-open one. The returned handle resolves
    /// as soon as the guest commits (first body write, or close). That may
    /// happen inside this call or on a later one, since table entries
    /// persist until the guest closes them.
    pub fn fetch(&mut self, ctx: C) -> Result<PendingResponse<C::Response>, RuntimeError> {
        let Some(request) = &self.request else {
            return Err(RuntimeError::NoHandler);
        };
        let (tx, rx) = oneshot::channel();
        let conn_id = self
            .store
            .data_mut()
            .connections
            .open(Connection::new(ctx, tx));
        tracing::debug!(conn_id, "dispatching request to guest");
        if let Err(trap) = request.call(&mut self.store, conn_id) {
            return self.purge_after_trap(conn_id, trap, rx);
        }
        Ok(PendingResponse { rx })
    }

    /// Guard for abnormal guest termination: the table entry is dropped on
    /// every trapping exit so a misbehaving guest cannot leak connections.
    fn purge_after_trap(
        &mut self,
        conn_id: u32,
        trap: wasmtime::Error,
        rx: oneshot::Receiver<C::Response>,
    ) -> Result<PendingResponse<C::Response>, RuntimeError> {
        let committed = match self.store.data_mut().connections.remove(conn_id) {
            Some(mut conn) => {
                let committed = conn.committed();
                conn.ctx_mut().body_close();
                committed
            }
            // The guest closed the connection itself before trapping.
            None => true,
        };
        if committed {
            // A settled completion cannot be unsettled; the response stands.
            tracing::error!(conn_id, error = %trap, "guest trapped after committing a response");
            Ok(PendingResponse { rx })
        } else {
            tracing::error!(conn_id, error = %trap, "guest trapped before committing a response");
            Err(RuntimeError::Guest(trap))
        }
    }
}

/// Completion handle returned by [`WadaRuntime::fetch`].
///
/// Resolves exactly once, when the guest commits to a response. If the
/// runtime is dropped before that happens, it resolves with
/// [`RuntimeError::ConnectionDropped`] instead of pending forever.
pub struct PendingResponse<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> Future for PendingResponse<R> {
    type Output = Result<R, RuntimeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| RuntimeError::ConnectionDropped))
    }
}
