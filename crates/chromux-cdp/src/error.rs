// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Everything that can go wrong between `invoke` and the browser.
///
/// [`CdpError::Remote`] is the one variant that represents a *successful*
/// round trip whose reply carried an application-level error from the
/// browser; front-ends map it to a client-error response. All other variants
/// are transport or lifecycle failures and map to server-error responses.
#[derive(Debug, Error)]
pub enum CdpError {
    /// The browser process failed to become reachable within the probe bound.
    #[error("browser failed to start: {0}")]
    Launch(String),

    /// The debug endpoint answered but listed no connectable page target.
    #[error("no page target found")]
    NoTarget,

    /// Opening the debug socket, or writing a frame to it, failed.
    #[error("connection error: {0}")]
    Connect(String),

    /// The debug socket closed while this request was still in flight.
    #[error("connection closed before the response arrived")]
    ConnectionClosed,

    /// No response arrived within the broker's request timeout.
    #[error("request timed out waiting for the browser")]
    Timeout,

    /// The browser reported an error for this specific request.
    /// The message text is preserved verbatim.
    #[error("{0}")]
    Remote(String),
}

impl CdpError {
    /// True for application-level errors reported by the browser itself,
    /// as opposed to transport or lifecycle failures of the relay.
    pub fn is_remote(&self) -> bool {
        matches!(self, CdpError::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_is_distinguishable_from_transport_errors() {
        assert!(CdpError::Remote("boom".into()).is_remote());
        assert!(!CdpError::ConnectionClosed.is_remote());
        assert!(!CdpError::Launch("nope".into()).is_remote());
        assert!(!CdpError::Timeout.is_remote());
    }

    #[test]
    fn remote_message_is_verbatim() {
        let e = CdpError::Remote("Cannot find context with specified id".into());
        assert_eq!(e.to_string(), "Cannot find context with specified id");
    }
}
