//! Registry of active client sessions and state fan-out
//!
//! Each connected player owns a writer task draining an unbounded queue
//! into its socket. The registry maps player names to those queues so the
//! tick loop can broadcast without ever touching a socket itself: a slow
//! or stalled peer only backs up its own queue. Dropping a queue sender
//! is how a connection is closed from the server side; the writer task
//! finishes its backlog and shuts the write half down.

use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Thread-safe roster of sessions, keyed by player name. A duplicate
/// JOIN overwrites the earlier entry, silently shadowing that player.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, mpsc::UnboundedSender<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Registers a session's outbound queue under its player name.
    pub fn insert(&mut self, name: &str, outbound: mpsc::UnboundedSender<String>) {
        if self.sessions.insert(name.to_string(), outbound).is_some() {
            warn!("session {} replaced by a new connection", name);
        }
        info!("session {} registered, {} online", name, self.sessions.len());
    }

    /// Removes a session, which closes its queue and lets its writer
    /// task finish and release the connection.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.sessions.remove(name).is_some();
        if removed {
            info!("session {} removed, {} online", name, self.sessions.len());
        }
        removed
    }

    /// Enqueues a line for one player. Returns false if the player has
    /// no registered session.
    pub fn send_to(&self, name: &str, line: &str) -> bool {
        match self.sessions.get(name) {
            Some(outbound) => outbound.send(line.to_string()).is_ok(),
            None => {
                debug!("no session for {}, dropping line", name);
                false
            }
        }
    }

    /// Enqueues a line for every registered session. A session whose
    /// queue is gone (its writer died on a socket error) is dropped here,
    /// the same teardown any read failure gets.
    pub fn broadcast(&mut self, line: &str) {
        let mut stale = Vec::new();
        for (name, outbound) in &self.sessions {
            if outbound.send(line.to_string()).is_err() {
                stale.push(name.clone());
            }
        }
        for name in stale {
            warn!("dropping session {} after failed delivery", name);
            self.sessions.remove(&name);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
