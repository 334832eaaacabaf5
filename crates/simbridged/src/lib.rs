//! Text-protocol control daemon for a live simulation.
//!
//! The daemon owns a [`simbridge_scene::Scene`] and exposes it over TCP. Each
//! request is one ASCII line whose first word selects a command; each command
//! runs in up to two phases. The immediate phase executes on the connection
//! thread and produces the framed reply. The deferred phase is queued to a
//! single worker thread, so every state mutation routed through it observes a
//! global total order no matter how many clients are connected.
//!
//! Replies are length-prefixed: a 4-byte host-native `u32` byte count followed
//! by the payload. Unknown commands and failed immediate handlers answer with
//! the literal payload `error\n`.

mod commands;
mod dispatch;
mod registry;
mod server;
pub mod telemetry;
mod transport;
mod worker;

pub use dispatch::TableError;
pub use server::{Server, ServerError};
pub use transport::ListenerError;
