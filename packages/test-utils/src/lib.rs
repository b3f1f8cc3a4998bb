//! Shared test utilities for the Showlink workspace
//!
//! This crate provides scripted stand-ins for the client's external
//! collaborators so the connection layer and the reconciler can be tested
//! without a network or an audio device.
//!
//! # Mocks
//!
//! - [`ScriptedTransport`] - transport factory driven entirely by the test
//! - [`ScriptedSurface`] - media surface with settable position/playing state
//! - [`RecordingSink`] - outbound sink that records dispatched actions
//!
//! # Example
//!
//! ```rust,ignore
//! use showlink_test_utils::{wait_until, ScriptedTransport};
//! use showlink_client::TransportEvent;
//!
//! #[tokio::test]
//! async fn test_with_scripted_transport() {
//!     let transport = ScriptedTransport::new();
//!     transport.script([TransportEvent::Connected]);
//!
//!     // Pass `transport` to ConnectionManager::with_factory and use
//!     // wait_until to let the dispatch task observe the event.
//! }
//! ```

mod media;
mod transport;

pub use media::{RecordingSink, ScriptedSurface};
pub use transport::ScriptedTransport;

use std::time::Duration;

/// Poll `condition` until it holds or roughly a second has passed.
///
/// Event delivery crosses a channel and a background task, so assertions
/// about listener effects need a small settling window.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}
