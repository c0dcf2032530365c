//! Account events
//!
//! The user store publishes on a broadcast bus; subscribers that fall behind
//! lose the oldest events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Change to a user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AccountEvent {
    /// A new account was registered
    #[serde(rename_all = "camelCase")]
    UserCreated {
        /// New account id
        user_id: String,
        /// Normalized email
        email: String,
    },
    /// The account's email changed
    #[serde(rename_all = "camelCase")]
    EmailUpdated {
        /// Account id
        user_id: String,
        /// New normalized email
        email: String,
    },
    /// The account's password changed
    #[serde(rename_all = "camelCase")]
    PasswordUpdated {
        /// Account id
        user_id: String,
    },
}

impl AccountEvent {
    /// Account the event is about
    pub fn user_id(&self) -> &str {
        match self {
            Self::UserCreated { user_id, .. }
            | Self::EmailUpdated { user_id, .. }
            | Self::PasswordUpdated { user_id } => user_id,
        }
    }
}

/// Broadcast bus for [`AccountEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AccountEvent>,
}

impl EventBus {
    /// Bus retaining up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers; having none is not an error
    pub fn publish(&self, event: AccountEvent) {
        tracing::trace!(?event, "Account event");
        let _ = self.tx.send(event);
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::default().publish(AccountEvent::PasswordUpdated {
            user_id: "user_0".into(),
        });
    }

    #[test]
    fn subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(AccountEvent::UserCreated {
            user_id: "user_0".into(),
            email: "a@example.com".into(),
        });
        bus.publish(AccountEvent::PasswordUpdated {
            user_id: "user_0".into(),
        });

        assert!(matches!(rx.try_recv().unwrap(), AccountEvent::UserCreated { .. }));
        assert_eq!(rx.try_recv().unwrap().user_id(), "user_0");
    }

    #[test]
    fn wire_format_is_tagged() {
        let json = serde_json::to_value(AccountEvent::EmailUpdated {
            user_id: "u".into(),
            email: "e".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "emailUpdated");
        assert_eq!(json["userId"], "u");
    }
}
