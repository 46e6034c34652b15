//! Registry entry and configuration types.

use std::net::SocketAddr;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for the client registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How many users may be logged in at the same time.
    ///
    /// Default: 5.
    pub max_clients: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_clients: 5 }
    }
}

// ---------------------------------------------------------------------------
// ClientEntry
// ---------------------------------------------------------------------------

/// One logged-in user.
///
/// Created when a login is accepted and dropped when the user
/// disconnects. The registry owns the entry; callers get clones that are
/// only good for the delivery they are about to make.
#[derive(Debug, Clone)]
pub struct ClientEntry<H> {
    /// Unique key.
    pub username: String,

    /// Where the user's traffic came from. Datagram replies are sent here.
    pub endpoint: SocketAddr,

    /// How to reach the user.
    pub transport: H,
}
