//! Local port helpers for launching a debuggable browser.

use std::net::TcpListener;

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	TcpListener::bind(("127.0.0.1", port)).is_ok()
}
