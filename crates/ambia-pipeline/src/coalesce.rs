// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local coalescing of concurrent work on the same key.
//!
//! The first caller for a key becomes the leader and does the work; callers
//! arriving while it runs subscribe to a broadcast channel and receive the
//! leader's result. The entry is removed before the result is sent, so a
//! caller arriving afterwards starts fresh (and normally hits the cache).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

type Outcome<T> = Result<T, String>;
type Waiters<T> = Arc<Mutex<HashMap<String, broadcast::Sender<Outcome<T>>>>>;

/// Reason delivered to followers when a leader goes away without finishing.
pub const ABANDONED: &str = "in-flight generation was abandoned";

/// Registry of keys currently being worked on.
pub struct InFlight<T> {
    waiters: Waiters<T>,
}

/// A caller's role for one key.
pub enum Slot<T> {
    Leader(LeaderGuard<T>),
    Follower(Follower<T>),
}

impl<T: Clone + Send + 'static> InFlight<T> {
    pub fn new() -> Self {
        Self {
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers interest in `key`: leader if nobody is working on it,
    /// follower otherwise. Check and insert happen under one lock.
    pub fn join(&self, key: &str) -> Slot<T> {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = waiters.get(key) {
            return Slot::Follower(Follower {
                receiver: sender.subscribe(),
            });
        }
        let (sender, _) = broadcast::channel(1);
        waiters.insert(key.to_string(), sender.clone());
        Slot::Leader(LeaderGuard {
            key: key.to_string(),
            waiters: Arc::clone(&self.waiters),
            sender: Some(sender),
        })
    }

    /// Number of keys with a leader at work.
    pub fn len(&self) -> usize {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the leader. Dropping it without [`finish`](Self::finish) releases
/// followers with [`ABANDONED`].
pub struct LeaderGuard<T> {
    key: String,
    waiters: Waiters<T>,
    sender: Option<broadcast::Sender<Outcome<T>>>,
}

impl<T> LeaderGuard<T> {
    /// Publishes the result to every follower and clears the key.
    pub fn finish(mut self, outcome: Outcome<T>) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Outcome<T>) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
        // No receivers is fine: nobody was waiting.
        let _ = sender.send(outcome);
    }
}

impl<T> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        self.publish(Err(ABANDONED.to_string()));
    }
}

pub struct Follower<T> {
    receiver: broadcast::Receiver<Outcome<T>>,
}

impl<T: Clone> Follower<T> {
    /// Waits for the leader's result.
    pub async fn wait(mut self) -> Outcome<T> {
        match self.receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(ABANDONED.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn followers_receive_the_leaders_result() {
        let in_flight = InFlight::<u32>::new();
        let Slot::Leader(leader) = in_flight.join("k") else {
            panic!("first caller must lead");
        };
        let Slot::Follower(a) = in_flight.join("k") else {
            panic!("second caller must follow");
        };
        let Slot::Follower(b) = in_flight.join("k") else {
            panic!("third caller must follow");
        };
        assert_eq!(in_flight.len(), 1);

        let waiting = tokio::spawn(async move { (a.wait().await, b.wait().await) });
        leader.finish(Ok(7));
        assert_eq!(waiting.await.unwrap(), (Ok(7), Ok(7)));
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn dropped_leader_releases_followers() {
        let in_flight = InFlight::<u32>::new();
        let leader = in_flight.join("k");
        let Slot::Follower(follower) = in_flight.join("k") else {
            panic!("second caller must follow");
        };
        drop(leader);
        assert_eq!(follower.wait().await, Err(ABANDONED.to_string()));

        assert!(matches!(in_flight.join("k"), Slot::Leader(_)));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let in_flight = InFlight::<u32>::new();
        let _a = in_flight.join("a");
        assert!(matches!(in_flight.join("b"), Slot::Leader(_)));
    }
}
