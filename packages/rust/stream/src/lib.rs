//! Server-sent event dispatch for contentmcp.
//!
//! One [`Dispatcher`] owns the registry of connected clients. It fans
//! broadcast events out to all of them, keeps idle connections alive, and
//! streams the `start`/`result`/`error`/`complete` events of triggered
//! operations to the client that asked for them.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{ClientConnection, ClientInfo, Dispatcher, DispatcherStats};
pub use event::{
    ClientId, EVENT_CONNECTED, EVENT_KEEPALIVE, EVENT_SERVER_SHUTDOWN, OperationKind, Phase,
    StreamEvent,
};
