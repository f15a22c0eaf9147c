//! Transport collaborator: the seam through which live calls leave the
//! engine.
//!
//! Implemented by the surrounding system, typically as a thin wrapper over
//! whatever HTTP client the host application uses. The core never retries,
//! transforms or suppresses transport errors; timeout policy belongs to
//! the implementation.

use crate::http::{Request, Response};

/// Sends a real request over the network. Only the unmatched-request path
/// of the recorder ever calls this.
pub trait HttpTransport: Send {
    fn send(&mut self, request: &Request) -> anyhow::Result<Response>;
}
