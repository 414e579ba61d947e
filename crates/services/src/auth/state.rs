use chrono::{DateTime, Duration, Utc};
use oauth2::CsrfToken;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Pending OAuth login attempts keyed by their CSRF state.
///
/// Each state is single use. Entries older than the window are dropped the
/// next time a state is generated and are never accepted.
pub struct OAuthStateStore {
    states: RwLock<HashMap<String, DateTime<Utc>>>,
    window: Duration,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

impl OAuthStateStore {
    pub fn new(window: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Store and return a fresh unguessable state.
    pub async fn generate(&self) -> String {
        let state = CsrfToken::new_random_len(32).secret().to_string();
        let now = Utc::now();
        let cutoff = now - self.window;

        let mut states = self.states.write().await;
        states.retain(|_, issued_at| *issued_at > cutoff);
        states.insert(state.clone(), now);
        state
    }

    /// Consume `state`. True exactly once per generated state.
    pub async fn validate(&self, state: &str) -> bool {
        let removed = self.states.write().await.remove(state);
        match removed {
            Some(issued_at) => issued_at > Utc::now() - self.window,
            None => false,
        }
    }

    pub async fn pending(&self) -> usize {
        self.states.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = OAuthStateStore::default();
        let state = store.generate().await;

        assert!(store.validate(&state).await);
        assert!(!store.validate(&state).await);
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let store = OAuthStateStore::default();
        store.generate().await;
        assert!(!store.validate("forged").await);
        assert!(!store.validate("").await);
    }

    #[tokio::test]
    async fn test_states_are_unique() {
        let store = OAuthStateStore::default();
        let a = store.generate().await;
        let b = store.generate().await;
        assert_ne!(a, b);
        assert!(a.len() >= 40);
        assert_eq!(store.pending().await, 2);
    }

    #[tokio::test]
    async fn test_expired_states_are_purged_and_refused() {
        let store = OAuthStateStore::new(Duration::zero());
        let stale = store.generate().await;
        assert!(!store.validate(&stale).await);

        store.generate().await;
        store.generate().await;
        // Every generation purges what the zero window already expired
        assert_eq!(store.pending().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_validation_succeeds_once() {
        let store = Arc::new(OAuthStateStore::default());
        let state = store.generate().await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let state = state.clone();
                tokio::spawn(async move { store.validate(&state).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
