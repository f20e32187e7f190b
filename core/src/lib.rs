//! A crate to answer APDU commands as an emulated NFC card through a host delegate.

pub mod filter;
pub mod log;
pub mod nfc;
pub mod responder;
pub mod sink;
pub mod status;

pub use filter::Filter;
pub use log::CommunicationLog;
pub use nfc::{DeactivationReason, HostApduService};
pub use responder::Responder;
pub use sink::Sink;
pub use status::StatusWord;
