use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing;
use uuid::Uuid;

use crate::types::SenderType;

/// Outbound half of a live duplex connection. The socket task drains the
/// paired receiver and writes each string as one transport frame.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// The logical set of events a connection subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Admin dashboards receiving the batched log fan-out.
    Admins,
    /// One authenticated participant of one conversation.
    Conversation {
        conversation_id: String,
        principal_id: String,
        role: SenderType,
    },
}

/// Selects which registered connections a fan-out targets.
#[derive(Debug, Clone, Copy)]
pub enum AudienceFilter<'a> {
    /// Every admin dashboard.
    Admins,
    /// Every participant session of a conversation, both sides.
    Conversation(&'a str),
    /// The sessions of the party opposite `of` in a conversation.
    Counterpart { conversation_id: &'a str, of: SenderType },
    /// The sessions a given principal role holds in a conversation.
    Principal { conversation_id: &'a str, role: SenderType },
}

impl AudienceFilter<'_> {
    fn matches(&self, audience: &Audience) -> bool {
        match (self, audience) {
            (AudienceFilter::Admins, Audience::Admins) => true,
            (AudienceFilter::Conversation(id), Audience::Conversation { conversation_id, .. }) => {
                *id == conversation_id
            }
            (
                AudienceFilter::Counterpart { conversation_id: id, of },
                Audience::Conversation { conversation_id, role, .. },
            ) => *id == conversation_id && *role != *of,
            (
                AudienceFilter::Principal { conversation_id: id, role: wanted },
                Audience::Conversation { conversation_id, role, .. },
            ) => *id == conversation_id && *role == *wanted,
            _ => false,
        }
    }
}

struct Entry {
    audience: Audience,
    sender: OutboundSender,
}

/// Explicitly owned index of currently-open connections, constructed once at
/// process start and injected into the gateway and the dispatcher.
///
/// Registration returns a guard; dropping the guard removes the entry, so a
/// handler that panics or returns early cannot leak a registration.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<Uuid, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        self: Arc<Self>,
        audience: Audience,
        sender: OutboundSender,
    ) -> ConnectionGuard {
        let id = Uuid::new_v4();
        {
            let mut inner = self.inner.lock().expect("registry lock poisoned");
            inner.insert(id, Entry { audience: audience.clone(), sender });
        }
        tracing::debug!("Registered connection {} for {:?}", id, audience);
        ConnectionGuard { registry: self, id }
    }

    /// Invokes `f` once per open connection matching `filter`.
    ///
    /// Senders whose receiver side has gone away are skipped, so a closed
    /// connection is never written to. The snapshot is taken under the lock;
    /// `f` runs outside it.
    pub fn for_each<F>(&self, filter: AudienceFilter<'_>, mut f: F)
    where
        F: FnMut(&OutboundSender),
    {
        let matching: Vec<OutboundSender> = {
            let inner = self.inner.lock().expect("registry lock poisoned");
            inner
                .values()
                .filter(|entry| filter.matches(&entry.audience) && !entry.sender.is_closed())
                .map(|entry| entry.sender.clone())
                .collect()
        };

        for sender in &matching {
            f(sender);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: Uuid) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if inner.remove(&id).is_some() {
            tracing::debug!("Removed connection {}", id);
        }
    }
}

/// Scoped registration: the connection stays visible to `for_each` only while
/// this guard is alive.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: Uuid,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(conversation_id: &str, principal_id: &str, role: SenderType) -> Audience {
        Audience::Conversation {
            conversation_id: conversation_id.to_string(),
            principal_id: principal_id.to_string(),
            role,
        }
    }

    fn collect(registry: &ConnectionRegistry, filter: AudienceFilter<'_>) -> usize {
        let mut n = 0;
        registry.for_each(filter, |_| n += 1);
        n
    }

    #[test]
    fn registered_connection_is_visible_until_guard_drops() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _rx) = mpsc::unbounded_channel();

        let guard = registry.clone().register(Audience::Admins, tx);
        assert_eq!(collect(&registry, AudienceFilter::Admins), 1);

        drop(guard);
        assert_eq!(collect(&registry, AudienceFilter::Admins), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn closed_sender_is_never_visited() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let _guard = registry.clone().register(Audience::Admins, tx);
        drop(rx);

        assert_eq!(collect(&registry, AudienceFilter::Admins), 0);
    }

    #[test]
    fn counterpart_filter_targets_the_other_side_only() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (user_tx, _user_rx) = mpsc::unbounded_channel();
        let (seller_tx, _seller_rx) = mpsc::unbounded_channel();

        let _u = registry.clone().register(conversation("c1", "u1", SenderType::User), user_tx);
        let _s = registry.clone().register(conversation("c1", "s1", SenderType::Seller), seller_tx);

        let counterpart = AudienceFilter::Counterpart {
            conversation_id: "c1",
            of: SenderType::User,
        };
        assert_eq!(collect(&registry, counterpart), 1);
        assert_eq!(collect(&registry, AudienceFilter::Conversation("c1")), 2);
        assert_eq!(collect(&registry, AudienceFilter::Conversation("c2")), 0);
    }

    #[test]
    fn principal_filter_targets_own_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        let (b_tx, _b_rx) = mpsc::unbounded_channel();
        let (s_tx, _s_rx) = mpsc::unbounded_channel();

        // Same user on two devices plus the seller
        let _a = registry.clone().register(conversation("c1", "u1", SenderType::User), a_tx);
        let _b = registry.clone().register(conversation("c1", "u1", SenderType::User), b_tx);
        let _s = registry.clone().register(conversation("c1", "s1", SenderType::Seller), s_tx);

        let own = AudienceFilter::Principal {
            conversation_id: "c1",
            role: SenderType::User,
        };
        assert_eq!(collect(&registry, own), 2);
    }

    #[test]
    fn admin_filter_ignores_conversation_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _rx) = mpsc::unbounded_channel();

        let _c = registry.clone().register(conversation("c1", "u1", SenderType::User), tx);
        assert_eq!(collect(&registry, AudienceFilter::Admins), 0);
    }
}
