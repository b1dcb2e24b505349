//! PulseAudio driver for the undertow routing core.
//!
//! Implements [`undertow::ServerControl`] over the server's threaded
//! mainloop: one dedicated worker thread runs the protocol event loop,
//! every command submits a request under the loop-wide lock and blocks
//! the caller until the completion callback signals, and subscription
//! callbacks forward change events (after their follow-up
//! introspection) to the consumer over a channel.
//!
//! ```text
//! caller thread                    mainloop worker thread
//!      │                                  │
//!      ▼  lock / submit                   │
//! PulseSession ───────────────▶ context request
//!      │  wait                            │
//!      │◀──── signal ──────── completion callback
//!      ▼  unlock                          │
//!   result                    subscription callback
//!                                         │ Event (mpsc)
//!                                         ▼
//!                              consumer thread (Router)
//! ```
//!
//! Calling any command from inside a server callback deadlocks on the
//! mainloop lock; follow-up queries in the subscription path are
//! therefore submitted fire-and-forget.

mod convert;
mod session;
mod subscribe;

pub use session::{ConnectError, PulseSession};
