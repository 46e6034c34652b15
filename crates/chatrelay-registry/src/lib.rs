//! Client registry for chatrelay.
//!
//! The registry is the server's directory of logged-in users: for each
//! username it remembers where that user can be reached (network
//! address + transport handle).
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)   ← looks users up to deliver public/private messages
//!     ↕
//! Registry (this crate)   ← who is logged in, and how to reach them
//!     ↕
//! Transport (below)   ← the handle type stored in each entry
//! ```
//!
//! The registry is generic over the handle type `H`, so it can be
//! exercised in tests without opening sockets.

mod entry;
mod error;
mod registry;

pub use entry::{ClientEntry, RegistryConfig};
pub use error::RegistryError;
pub use registry::ClientRegistry;
