//! Daemon lifecycle: start, reset, and idempotent destruction.

use std::net::SocketAddr;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::thread;

use tracing::{info, warn};

use simbridge_config::Config;
use simbridge_scene::Scene;

use crate::commands::{self, CommandDeps, Figure, ModuleSlot};
use crate::dispatch::{DispatchContext, RequestLog, TableError};
use crate::registry::Registry;
use crate::transport::{ListenerError, ListenerHandle, SocketListener};
use crate::worker::Worker;

/// Tracing target for lifecycle events.
pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors surfaced while starting the daemon.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or starting the TCP listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The command table could not be assembled.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Everything owned by one running instance of the daemon.
struct ServerRuntime {
    shutdown: Arc<AtomicBool>,
    worker: Arc<Worker>,
    worker_thread: thread::JoinHandle<()>,
    listener: ListenerHandle,
    local_addr: SocketAddr,
}

/// The control daemon.
///
/// The scene and the figure and module registries outlive individual runs:
/// [`Server::start`] after [`Server::destroy`] reattaches the listener to the
/// same simulation state.
pub struct Server {
    config: Config,
    scene: Arc<Scene>,
    figures: Arc<Registry<Figure>>,
    modules: Arc<Registry<ModuleSlot>>,
    runtime: Mutex<Option<ServerRuntime>>,
    destroying: AtomicBool,
}

impl Server {
    /// Creates a stopped server around an empty scene.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            scene: Arc::new(Scene::new()),
            figures: Arc::new(Registry::new()),
            modules: Arc::new(Registry::new()),
            runtime: Mutex::new(None),
            destroying: AtomicBool::new(false),
        }
    }

    fn runtime(&self) -> MutexGuard<'_, Option<ServerRuntime>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds the listener and spawns the worker and accept threads.
    ///
    /// Any previous run is torn down first, so `start` is also a restart.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the endpoint cannot be bound or the
    /// command table is malformed.
    pub fn start(&self) -> Result<(), ServerError> {
        self.destroy();

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = Worker::new();
        let worker_thread = worker.spawn();
        let deps = Arc::new(CommandDeps {
            scene: Arc::clone(&self.scene),
            figures: Arc::clone(&self.figures),
            modules: Arc::clone(&self.modules),
            worker: Arc::clone(&worker),
            shutdown: Arc::clone(&shutdown),
        });
        let table = commands::build_table(&deps)?;

        let trace = self.config.request_log_path().and_then(|path| {
            match RequestLog::create(&path) {
                Ok(log) => Some(Arc::new(log)),
                Err(error) => {
                    warn!(
                        target: SERVER_TARGET,
                        path = %path.display(),
                        error = %error,
                        "request trace disabled"
                    );
                    None
                }
            }
        });
        let context = Arc::new(DispatchContext {
            table,
            worker: Arc::clone(&worker),
            shutdown: Arc::clone(&shutdown),
            trace,
        });

        let listener = SocketListener::bind(&self.config.host, self.config.port)?;
        let local_addr = listener.local_addr();
        let listener = listener.start(context, Arc::clone(&shutdown));

        *self.runtime() = Some(ServerRuntime {
            shutdown,
            worker,
            worker_thread,
            listener,
            local_addr,
        });
        info!(target: SERVER_TARGET, addr = %local_addr, "server started");
        Ok(())
    }

    /// Address the running listener is bound to, if any.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime().as_ref().map(|runtime| runtime.local_addr)
    }

    /// Whether a client or signal has asked the daemon to exit.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.runtime()
            .as_ref()
            .is_some_and(|runtime| runtime.shutdown.load(Ordering::SeqCst))
    }

    /// Discards queued deferred work and drops every figure.
    ///
    /// The command in flight on the worker, if any, is allowed to finish
    /// before this returns.
    pub fn reset(&self) {
        if let Some(runtime) = self.runtime().as_ref() {
            runtime.worker.reset();
        }
        self.figures.release_all();
        info!(target: SERVER_TARGET, "server reset");
    }

    /// Stops the listener, joins every thread, and clears the registries.
    ///
    /// Safe to call repeatedly and from [`Drop`]; concurrent calls collapse
    /// into one teardown.
    pub fn destroy(&self) {
        if self.destroying.swap(true, Ordering::SeqCst) {
            return;
        }
        let runtime = self.runtime().take();
        if let Some(runtime) = runtime {
            runtime.shutdown.store(true, Ordering::SeqCst);
            runtime.listener.shutdown();
            if runtime.listener.join().is_err() {
                warn!(target: SERVER_TARGET, "listener thread panicked");
            }
            runtime.worker.shutdown();
            if runtime.worker_thread.join().is_err() {
                warn!(target: SERVER_TARGET, "worker thread panicked");
            }
            self.figures.release_all();
            self.modules.release_all();
            info!(target: SERVER_TARGET, "server stopped");
        }
        self.destroying.store(false, Ordering::SeqCst);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn test_config() -> Config {
        Config::parse_from(["simbridged", "--host", "127.0.0.1", "--port", "0", "--no-trace"])
    }

    #[test]
    fn start_reports_an_ephemeral_address() {
        let server = Server::new(test_config());
        server.start().expect("start server");
        let addr = server.local_addr().expect("bound address");
        assert_ne!(addr.port(), 0);
        server.destroy();
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn destroy_is_idempotent() {
        let server = Server::new(test_config());
        server.start().expect("start server");
        server.destroy();
        server.destroy();
    }

    #[test]
    fn concurrent_destroys_collapse_into_one() {
        let server = Arc::new(Server::new(test_config()));
        server.start().expect("start server");
        let destroyers: Vec<_> = (0..2)
            .map(|_| {
                let server = Arc::clone(&server);
                thread::spawn(move || server.destroy())
            })
            .collect();
        for destroyer in destroyers {
            destroyer.join().expect("destroy thread");
        }
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn restart_rebinds_after_destroy() {
        let server = Server::new(test_config());
        server.start().expect("first start");
        server.destroy();
        server.start().expect("second start");
        assert!(server.local_addr().is_some());
        server.destroy();
    }
}
