//! The APDU responder: answers every command with `90 00`.
//!
//! ## Usage
//! ```rust
//! use hce::{CommunicationLog, DeactivationReason, HostApduService, Responder};
//!
//! let responder = Responder::new(CommunicationLog::new());
//!
//! assert_eq!(vec![0x90, 0x00], responder.handle_command(&[0x00, 0xA4, 0x04, 0x00]));
//! responder.handle_deactivation(DeactivationReason::LINK_LOSS);
//!
//! assert_eq!(3, responder.sink().len());
//! ```

#[cfg(feature = "tracing")]
use tracing::warn;

use crate::nfc::{DeactivationReason, HostApduService};
use crate::sink::{Event, NoopSink, Sink};
use crate::status::StatusWord;

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($t: tt)*) => {{
        let _ = ($($t)*);
    }};
}

/// A responder which accepts any command, records it to the sink, then reports success.
#[derive(Debug, Default, Clone)]
pub struct Responder<S = NoopSink>
where
    S: Sink,
{
    sink: S,
}

impl<S> Responder<S>
where
    S: Sink,
{
    /// Initiates a responder recording into the sink.
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Records the event. A failing sink never affects the response.
    fn observe(&self, event: Event<'_>) {
        if let Err(e) = self.sink.record(&event) {
            warn!("Failed to record {:?}: {}", event, e);
        }
    }
}

impl<S> HostApduService for Responder<S>
where
    S: Sink,
{
    fn handle_command(&self, command: &[u8]) -> Vec<u8> {
        self.observe(Event::Command(command));

        let response: Vec<u8> = StatusWord::OK.into();
        self.observe(Event::Response(&response));

        response
    }

    fn handle_deactivation(&self, reason: DeactivationReason) {
        self.observe(Event::Deactivated(reason));
    }
}
