//! Add-in bridge: lets a sandboxed add-in talk to the messaging application hosting it.
//!
//! Both directions carry `{ eventType, data }` envelopes. The host pushes conversation events;
//! the add-in posts actions and correlated requests whose answers come back as
//! `<type>.success<N>` / `<type>.error<N>` events.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod state;
pub mod transport;

pub use client::{Bridge, PendingResponse};
pub use error::{BridgeError, NOT_INITIALIZED_MESSAGE};
pub use protocol::{ContactName, Conversation, Envelope, PrepareMethod};
pub use transport::{ChannelTransport, OutboundFrame, Transport};
