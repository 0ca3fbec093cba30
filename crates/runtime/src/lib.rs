//! Transport and connection plumbing for talking CDP to a browser.
//!
//! [`Connection`] correlates command replies by id and fans events out to
//! subscribers. It runs over any [`Transport`]: a WebSocket to the browser
//! in production, or the in-memory [`fake_transport`] in tests.

pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod process;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};
