//! Sinks receiving what the responder observes.
//!
//! A sink is injected into the [`Responder`](crate::Responder) instead of a process-wide
//! logger, so callers decide where the records go and tests can read them back.

use std::sync::Arc;

use crate::nfc::DeactivationReason;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Sink is unavailable: {0}")]
    Unavailable(String),

    #[error("Sink state was poisoned by a panicking writer")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

/// An event observed while serving the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// A command APDU was received, as raw octets.
    Command(&'a [u8]),

    /// A response APDU was returned, as raw octets.
    Response(&'a [u8]),

    /// The host deactivated the emulated card.
    Deactivated(DeactivationReason),
}

/// A destination for events.
pub trait Sink {
    /// Records the event.
    /// Failures are reported to the caller, which is free to ignore them.
    fn record(&self, event: &Event<'_>) -> Result<()>;
}

/// A sink which drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn record(&self, _: &Event<'_>) -> Result<()> {
        Ok(())
    }
}

/// A sink which emits every event as a `tracing` record.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl Sink for TracingSink {
    fn record(&self, event: &Event<'_>) -> Result<()> {
        match event {
            Event::Command(bytes) => tracing::debug!("Received APDU: {}", hex::encode_upper(bytes)),
            Event::Response(bytes) => tracing::debug!("Sent APDU: {}", hex::encode_upper(bytes)),
            Event::Deactivated(reason) => tracing::debug!("Deactivated: reason = {}", reason),
        }

        Ok(())
    }
}

impl<S> Sink for &S
where
    S: Sink + ?Sized,
{
    fn record(&self, event: &Event<'_>) -> Result<()> {
        (**self).record(event)
    }
}

impl<S> Sink for Box<S>
where
    S: Sink + ?Sized,
{
    fn record(&self, event: &Event<'_>) -> Result<()> {
        (**self).record(event)
    }
}

impl<S> Sink for Arc<S>
where
    S: Sink + ?Sized,
{
    fn record(&self, event: &Event<'_>) -> Result<()> {
        (**self).record(event)
    }
}

/// Records into both sinks. The second one is tried even when the first fails.
impl<A, B> Sink for (A, B)
where
    A: Sink,
    B: Sink,
{
    fn record(&self, event: &Event<'_>) -> Result<()> {
        let first = self.0.record(event);
        let second = self.1.record(event);

        first.and(second)
    }
}
