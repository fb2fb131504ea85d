use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::session::{SupervisorEvent, SupervisorEventKind};
use crate::use_cases::session::connection::SessionConnection;

struct Entry<M> {
    conn: SessionConnection<M>,
    healthcheck: JoinHandle<()>,
}

/// `{user_id -> SessionConnection}` for one game, on one instance.
pub struct SessionGroup<M> {
    game_id: i64,
    connections: Mutex<HashMap<String, Entry<M>>>,
    supervisor_tx: mpsc::UnboundedSender<SupervisorEvent>,
    ping_interval: Duration,
    make_ping: Arc<dyn Fn() -> M + Send + Sync>,
}

impl<M: Clone + Send + 'static> SessionGroup<M> {
    pub fn new(
        game_id: i64,
        supervisor_tx: mpsc::UnboundedSender<SupervisorEvent>,
        ping_interval: Duration,
        make_ping: Arc<dyn Fn() -> M + Send + Sync>,
    ) -> Self {
        Self {
            game_id,
            connections: Mutex::new(HashMap::new()),
            supervisor_tx,
            ping_interval,
            make_ping,
        }
    }

    /// Registers `conn` under its `user_id`; an existing connection for that
    /// user is stopped and replaced. Spawns the health-check task.
    pub fn add(&self, conn: SessionConnection<M>, init_msg: Option<M>) {
        let user_id = conn.user_id.clone();

        if let Some(msg) = init_msg {
            conn.put(msg);
        }

        let healthcheck = spawn_healthcheck(
            conn.clone(),
            self.game_id,
            self.ping_interval,
            self.make_ping.clone(),
            self.supervisor_tx.clone(),
        );

        let previous = {
            let mut guard = self.connections.lock().expect("session group lock poisoned");
            guard.insert(user_id.clone(), Entry { conn, healthcheck })
        };
        if let Some(previous) = previous {
            previous.conn.stop(None);
            previous.healthcheck.abort();
        }

        let _ = self.supervisor_tx.send(SupervisorEvent {
            game_id: self.game_id,
            user_id,
            kind: SupervisorEventKind::Update,
        });
    }

    /// Stops and removes one user's connection.
    pub fn remove(&self, user_id: &str, final_msg: Option<M>) -> bool {
        let entry = {
            let mut guard = self.connections.lock().expect("session group lock poisoned");
            guard.remove(user_id)
        };
        let Some(entry) = entry else {
            return false;
        };
        entry.conn.stop(final_msg);
        entry.healthcheck.abort();

        let _ = self.supervisor_tx.send(SupervisorEvent {
            game_id: self.game_id,
            user_id: user_id.to_string(),
            kind: SupervisorEventKind::Update,
        });
        true
    }

    /// Enqueues `msg` on every connection's outbound queue. Never awaits network.
    pub fn broadcast(&self, msg: M) {
        let guard = self.connections.lock().expect("session group lock poisoned");
        for entry in guard.values() {
            entry.conn.put(msg.clone());
        }
    }

    /// Removes every connection, each with its own copy of `final_msg`.
    pub fn stop(&self, final_msg: Option<M>) {
        let drained: Vec<Entry<M>> = {
            let mut guard = self.connections.lock().expect("session group lock poisoned");
            guard.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            entry.conn.stop(final_msg.clone());
            entry.healthcheck.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.lock().expect("session group lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn spawn_healthcheck<M: Send + 'static>(
    conn: SessionConnection<M>,
    game_id: i64,
    ping_interval: Duration,
    make_ping: Arc<dyn Fn() -> M + Send + Sync>,
    supervisor_tx: mpsc::UnboundedSender<SupervisorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(ping_interval).await;
            if conn.is_stopped() {
                break;
            }
            if conn.ping(make_ping()).is_err() {
                conn.stop(None);
                let _ = supervisor_tx.send(SupervisorEvent {
                    game_id,
                    user_id: conn.user_id.clone(),
                    kind: SupervisorEventKind::HealthcheckFail,
                });
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_group() -> (SessionGroup<&'static str>, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let group = SessionGroup::new(1, tx, Duration::from_secs(3600), Arc::new(|| "PING"));
        (group, rx)
    }

    #[tokio::test]
    async fn when_second_connection_for_same_user_is_added_then_first_is_stopped() {
        let (group, mut events) = make_group();
        let (first, mut first_rx) = SessionConnection::new("u1".into());
        let (second, _second_rx) = SessionConnection::new("u1".into());

        group.add(first, None);
        let _ = events.recv().await;
        group.add(second, None);
        let _ = events.recv().await;

        assert_eq!(group.len(), 1);
        assert_eq!(first_rx.recv().await, None);
    }

    #[tokio::test]
    async fn when_broadcast_on_empty_group_then_nothing_happens() {
        let (group, _events) = make_group();
        group.broadcast("hello");
        assert_eq!(group.len(), 0);
    }

    #[tokio::test]
    async fn when_remove_runs_twice_then_second_call_returns_false() {
        let (group, mut events) = make_group();
        let (conn, _rx) = SessionConnection::new("u1".into());
        group.add(conn, None);
        let _ = events.recv().await;

        assert!(group.remove("u1", None));
        assert!(!group.remove("u1", None));
    }
}
