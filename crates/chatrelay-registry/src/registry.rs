//! The client registry: every logged-in user, keyed by username.
//!
//! # Concurrency note
//!
//! Stream connection tasks and the datagram loop all share one registry.
//! Every operation takes the same exclusive lock for the few map
//! operations it needs and releases it before returning, so no caller
//! ever holds it across network I/O. A plain mutex is enough: the
//! critical sections are tiny and about as many of them write as read.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::sync::Mutex;

use crate::{ClientEntry, RegistryConfig, RegistryError};

/// A capacity-bounded directory of logged-in users.
///
/// ## Invariants
///
/// - No two entries share a username.
/// - The number of entries never exceeds `config.max_clients`.
///
/// Both are checked and enforced under the lock inside [`add`], so two
/// concurrent logins can't race past either check.
///
/// [`add`]: ClientRegistry::add
pub struct ClientRegistry<H> {
    /// `BTreeMap` so snapshots come out in a stable (alphabetical) order.
    clients: Mutex<BTreeMap<String, ClientEntry<H>>>,
    config: RegistryConfig,
}

impl<H: Clone> ClientRegistry<H> {
    /// Creates a new, empty registry with the given config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            clients: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    /// Registers `username`.
    ///
    /// # Errors
    /// - [`RegistryError::Full`] if `max_clients` users are logged in.
    /// - [`RegistryError::NameTaken`] if the name is already registered.
    ///
    /// On error the registry is left exactly as it was.
    pub async fn add(
        &self,
        username: &str,
        endpoint: SocketAddr,
        transport: H,
    ) -> Result<(), RegistryError> {
        let mut clients = self.clients.lock().await;

        if clients.len() >= self.config.max_clients {
            return Err(RegistryError::Full {
                capacity: self.config.max_clients,
            });
        }
        if clients.contains_key(username) {
            return Err(RegistryError::NameTaken(username.to_string()));
        }

        clients.insert(
            username.to_string(),
            ClientEntry {
                username: username.to_string(),
                endpoint,
                transport,
            },
        );

        tracing::debug!(username, %endpoint, count = clients.len(), "client registered");
        Ok(())
    }

    /// Removes `username` and returns its entry. A no-op returning `None`
    /// if the name is not registered.
    pub async fn remove(&self, username: &str) -> Option<ClientEntry<H>> {
        let removed = self.clients.lock().await.remove(username);
        if removed.is_some() {
            tracing::debug!(username, "client unregistered");
        }
        removed
    }

    /// Looks up a user. The returned entry is a copy; it stays usable for
    /// a send even if the user is removed meanwhile (the send will then
    /// just fail).
    pub async fn lookup(&self, username: &str) -> Option<ClientEntry<H>> {
        self.clients.lock().await.get(username).cloned()
    }

    /// Returns `true` if `username` is currently registered.
    pub async fn is_member(&self, username: &str) -> bool {
        self.clients.lock().await.contains_key(username)
    }

    /// A point-in-time copy of all usernames, in alphabetical order.
    ///
    /// Users may come and go right after this returns. Callers that walk
    /// the snapshot must look each name up again and skip the ones that
    /// are gone.
    pub async fn snapshot_usernames(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    /// Returns the number of registered users.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Returns `true` if nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.config.max_clients
    }
}

impl<H: Clone> Default for ClientRegistry<H> {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `ClientRegistry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.
    //!
    //! The handle type is `u32` here because the registry never looks inside
    //! it, so there is no need for real sockets.

    use std::sync::Arc;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn registry(max_clients: usize) -> ClientRegistry<u32> {
        ClientRegistry::new(RegistryConfig { max_clients })
    }

    /// A distinct loopback address per port, so tests can tell entries
    /// apart by endpoint.
    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    // =====================================================================
    // add()
    // =====================================================================

    #[tokio::test]
    async fn test_add_new_user_is_member() {
        let reg = registry(5);

        reg.add("alice", addr(1), 10).await.expect("should succeed");

        assert!(reg.is_member("alice").await);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_name_is_rejected_and_changes_nothing() {
        let reg = registry(5);
        reg.add("alice", addr(1), 10).await.unwrap();

        let result = reg.add("alice", addr(2), 20).await;

        assert_eq!(result, Err(RegistryError::NameTaken("alice".into())));
        assert_eq!(reg.len().await, 1);
        // The first entry is untouched.
        let entry = reg.lookup("alice").await.unwrap();
        assert_eq!(entry.endpoint, addr(1));
        assert_eq!(entry.transport, 10);
    }

    #[tokio::test]
    async fn test_add_when_full_is_rejected() {
        let reg = registry(2);
        reg.add("alice", addr(1), 1).await.unwrap();
        reg.add("bob", addr(2), 2).await.unwrap();

        let result = reg.add("carol", addr(3), 3).await;

        assert_eq!(result, Err(RegistryError::Full { capacity: 2 }));
        assert_eq!(reg.snapshot_usernames().await, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_add_after_remove_frees_a_slot() {
        let reg = registry(1);
        reg.add("alice", addr(1), 1).await.unwrap();
        reg.remove("alice").await;

        reg.add("bob", addr(2), 2).await.expect("slot should be free");

        assert!(reg.is_member("bob").await);
    }

    #[tokio::test]
    async fn test_add_concurrent_logins_never_exceed_capacity() {
        // Twenty tasks race for five slots. Exactly five must win.
        let reg = Arc::new(registry(5));
        let mut tasks = Vec::new();
        for i in 0..20u16 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.add(&format!("user{i}"), addr(i), u32::from(i)).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(reg.len().await, 5);
    }

    #[tokio::test]
    async fn test_add_concurrent_same_name_only_one_wins() {
        let reg = Arc::new(registry(10));
        let mut tasks = Vec::new();
        for i in 0..10u16 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.add("alice", addr(i), u32::from(i)).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(reg.len().await, 1);
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[tokio::test]
    async fn test_remove_registered_user_returns_entry() {
        let reg = registry(5);
        reg.add("alice", addr(1), 7).await.unwrap();

        let removed = reg.remove("alice").await.expect("should be present");

        assert_eq!(removed.username, "alice");
        assert_eq!(removed.transport, 7);
        assert!(!reg.is_member("alice").await);
        assert!(reg.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_unknown_user_is_noop() {
        let reg = registry(5);
        reg.add("alice", addr(1), 1).await.unwrap();

        assert!(reg.remove("nobody").await.is_none());

        assert_eq!(reg.len().await, 1);
    }

    // =====================================================================
    // lookup() / snapshot_usernames()
    // =====================================================================

    #[tokio::test]
    async fn test_lookup_unknown_user_returns_none() {
        let reg = registry(5);
        assert!(reg.lookup("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted_and_detached() {
        let reg = registry(5);
        reg.add("carol", addr(3), 3).await.unwrap();
        reg.add("alice", addr(1), 1).await.unwrap();
        reg.add("bob", addr(2), 2).await.unwrap();

        let snapshot = reg.snapshot_usernames().await;
        assert_eq!(snapshot, vec!["alice", "bob", "carol"]);

        // A user vanishing after the snapshot doesn't change it, and a
        // fresh lookup for that name simply comes back empty.
        reg.remove("bob").await;
        assert_eq!(snapshot.len(), 3);
        let reachable: Vec<_> = {
            let mut found = Vec::new();
            for name in &snapshot {
                if let Some(entry) = reg.lookup(name).await {
                    found.push(entry.username);
                }
            }
            found
        };
        assert_eq!(reachable, vec!["alice", "carol"]);
    }

    // =====================================================================
    // Sequences
    // =====================================================================

    #[tokio::test]
    async fn test_membership_tracks_accepted_adds_minus_removes() {
        let reg = registry(3);
        let ops: &[(&str, bool)] = &[
            ("a", true),
            ("b", true),
            ("a", true),  // duplicate, rejected
            ("c", true),
            ("d", true),  // full, rejected
            ("b", false), // remove
            ("d", true),  // fits now
        ];

        let mut expected = std::collections::BTreeSet::new();
        for (i, (name, is_add)) in ops.iter().enumerate() {
            if *is_add {
                if reg.add(name, addr(i as u16), 0).await.is_ok() {
                    expected.insert(name.to_string());
                }
            } else {
                reg.remove(name).await;
                expected.remove(*name);
            }
            assert!(reg.len().await <= reg.capacity());
        }

        let actual: std::collections::BTreeSet<_> =
            reg.snapshot_usernames().await.into_iter().collect();
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 3);
    }

    #[tokio::test]
    async fn test_default_capacity_is_five() {
        let reg: ClientRegistry<u32> = ClientRegistry::default();
        assert_eq!(reg.capacity(), 5);
        assert!(reg.is_empty().await);
    }
}
