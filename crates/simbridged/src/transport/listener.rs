//! Accept loop for the daemon's TCP endpoint.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use super::{ListenerError, TRANSPORT_TARGET};
use crate::dispatch::{DispatchContext, run_connection};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const LISTEN_BACKLOG: i32 = 16;

/// Listener bound to the configured TCP endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl SocketListener {
    /// Resolves and binds the endpoint with `SO_REUSEADDR`, so a restarted
    /// daemon can reclaim the port without waiting out `TIME_WAIT`.
    pub(crate) fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?;
        let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ListenerError::Socket { source })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ListenerError::Socket { source })?;
        socket
            .bind(&addr.into())
            .map_err(|source| ListenerError::Bind { addr, source })?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|source| ListenerError::Socket { source })?;

        let listener = TcpListener::from(socket);
        listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::Socket { source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self { listener, addr })
    }

    /// Address the listener actually bound, after ephemeral port assignment.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Spawns the accept thread. Each accepted connection gets its own
    /// thread running the dispatch loop against `context`.
    pub(crate) fn start(
        self,
        context: Arc<DispatchContext>,
        shutdown: Arc<AtomicBool>,
    ) -> ListenerHandle {
        let connections = Arc::new(Mutex::new(Vec::new()));
        let accept_connections = Arc::clone(&connections);
        let accept_shutdown = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            run_accept_loop(&self, &accept_shutdown, &context, &accept_connections);
        });
        ListenerHandle {
            shutdown,
            accept: Some(handle),
            connections,
        }
    }
}

/// Handle to the accept thread and its spawned connection threads.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    accept: Option<thread::JoinHandle<()>>,
    connections: Arc<Mutex<Vec<thread::JoinHandle<()>>>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Joins the accept thread and every connection thread it spawned.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        let accept = self.accept.take();
        if let Some(handle) = accept {
            handle.join().map_err(|_| ListenerError::ThreadPanic)?;
        }
        let handles = {
            let mut connections = self
                .connections
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *connections)
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!(target: TRANSPORT_TARGET, "connection thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &Arc<AtomicBool>,
    context: &Arc<DispatchContext>,
    connections: &Arc<Mutex<Vec<thread::JoinHandle<()>>>>,
) {
    info!(
        target: TRANSPORT_TARGET,
        addr = %listener.addr,
        "listening for control clients"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                debug!(target: TRANSPORT_TARGET, peer = %peer, "accepted connection");
                let context = Arc::clone(context);
                let handle = thread::spawn(move || run_connection(stream, &context));
                let mut connections = connections.lock().unwrap_or_else(PoisonError::into_inner);
                connections.retain(|handle| !handle.is_finished());
                connections.push(handle);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: TRANSPORT_TARGET, error = %error, "socket accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: TRANSPORT_TARGET, "listener stopped");
}
