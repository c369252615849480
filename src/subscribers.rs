use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

/// A chat user who picked a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: u64,
    pub display_name: String,
}

/// Where a user stands in onboarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberState {
    Unknown,
    Named(String),
}

/// In-memory subscriber registry, shared between the chat handlers and the
/// scheduled broadcasts. Lives for the process lifetime only.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    names: Arc<Mutex<HashMap<u64, String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_known(&self, user_id: u64) -> bool {
        self.names.lock().await.contains_key(&user_id)
    }

    pub async fn state(&self, user_id: u64) -> SubscriberState {
        match self.names.lock().await.get(&user_id) {
            Some(name) => SubscriberState::Named(name.clone()),
            None => SubscriberState::Unknown,
        }
    }

    /// Insert or overwrite the display name, returning the previous one
    pub async fn set_name(&self, user_id: u64, display_name: &str) -> Option<String> {
        let previous = self
            .names
            .lock()
            .await
            .insert(user_id, display_name.to_string());
        match &previous {
            Some(old) => info!(
                "Subscriber {} renamed from {:?} to {:?}",
                user_id, old, display_name
            ),
            None => info!("New subscriber {} as {:?}", user_id, display_name),
        }
        previous
    }

    /// Copy of every subscriber, ordered by user id. Broadcasts iterate this
    /// copy so the lock is not held while messages go out.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        let mut subscribers: Vec<Subscriber> = self
            .names
            .lock()
            .await
            .iter()
            .map(|(user_id, name)| Subscriber {
                user_id: *user_id,
                display_name: name.clone(),
            })
            .collect();
        subscribers.sort_by_key(|s| s.user_id);
        subscribers
    }
}
