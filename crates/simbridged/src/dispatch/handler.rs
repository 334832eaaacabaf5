//! Per-connection request loop and two-phase command execution.

use std::net::TcpStream;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;

use tracing::{debug, error, warn};

use super::args::Args;
use super::table::{CommandTable, Context};
use super::trace::RequestLog;
use super::DISPATCH_TARGET;
use crate::transport::{POLL_INTERVAL, ReadOutcome, Transport};
use crate::worker::{Job, Worker};

/// Payload answered for unknown commands and failed immediate phases.
const ERROR_REPLY: &[u8] = b"error\n";

/// Everything a connection thread needs to execute requests.
pub(crate) struct DispatchContext {
    pub(crate) table: CommandTable,
    pub(crate) worker: Arc<Worker>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) trace: Option<Arc<RequestLog>>,
}

/// Runs the request loop for one accepted client until it disconnects or the
/// daemon shuts down.
pub(crate) fn run_connection(stream: TcpStream, context: &Arc<DispatchContext>) {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
    let mut transport = match Transport::new(stream) {
        Ok(transport) => transport,
        Err(error) => {
            warn!(target: DISPATCH_TARGET, peer = %peer, error = %error, "failed to initialise connection");
            return;
        }
    };
    debug!(target: DISPATCH_TARGET, peer = %peer, "client connected");
    while transport.is_open() && !context.shutdown.load(Ordering::SeqCst) {
        match transport.read_line() {
            ReadOutcome::Line(line) => handle_request(&line, &mut transport, context),
            ReadOutcome::NotReady => thread::sleep(POLL_INTERVAL),
            ReadOutcome::Closed => break,
        }
    }
    debug!(target: DISPATCH_TARGET, peer = %peer, "client disconnected");
}

/// Executes one request line.
///
/// The immediate phase runs here on the connection thread and its reply frame
/// is written before anything is queued, so a client that waits for the reply
/// still cannot assume the deferred phase has run. The deferred phase receives
/// the full argument tail again via a fresh cursor.
pub(crate) fn handle_request(
    line: &str,
    transport: &mut Transport,
    context: &Arc<DispatchContext>,
) {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return;
    }
    let (word, tail) = match trimmed.find(char::is_whitespace) {
        Some(position) => (&trimmed[..position], &trimmed[position..]),
        None => (trimmed, ""),
    };
    let command = word.to_ascii_lowercase();
    let trace_index = context.trace.as_ref().map(|trace| trace.record(trimmed));

    let Some(spec) = context.table.get(&command) else {
        warn!(target: DISPATCH_TARGET, command = %command, "unknown command");
        record_failure(context, trace_index);
        transport.send_frame(ERROR_REPLY);
        return;
    };

    let mut reply = Vec::new();
    let mut carried: Context = None;
    if let Some(immediate) = &spec.immediate {
        let mut args = Args::new(tail);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            immediate(&mut args, &mut reply, &mut carried)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = %command,
                    error = %failure,
                    "command rejected"
                );
                record_failure(context, trace_index);
                transport.send_frame(ERROR_REPLY);
                return;
            }
            Err(_) => {
                error!(target: DISPATCH_TARGET, command = %command, "command handler panicked");
                record_failure(context, trace_index);
                transport.send_frame(ERROR_REPLY);
                return;
            }
        }
    }

    // Reply first: the deferred phase must never be able to delay the frame.
    if spec.sends_reply {
        transport.send_frame(&reply);
    }
    if let Some(deferred) = &spec.deferred {
        context
            .worker
            .schedule(Job::new(Arc::clone(deferred), tail.to_owned(), carried));
    }
}

fn record_failure(context: &Arc<DispatchContext>, trace_index: Option<u64>) {
    if let (Some(trace), Some(index)) = (&context.trace, trace_index) {
        trace.record_failure(index);
    }
}
