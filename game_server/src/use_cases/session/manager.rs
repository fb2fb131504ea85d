use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::session::{SupervisorEvent, SupervisorEventKind};
use crate::use_cases::session::group::SessionGroup;

/// Owns every `SessionGroup` on this instance and is the single writer of
/// group-membership deltas: groups only ever shrink or get reaped from
/// inside `supervise`, driven by the `SupervisorEvent` mailbox every
/// `SessionGroup` posts to, never by a connection or handler directly.
pub struct SessionManager<M> {
    groups: Mutex<HashMap<i64, Arc<SessionGroup<M>>>>,
    supervisor_tx: mpsc::UnboundedSender<SupervisorEvent>,
    ping_interval: Duration,
    make_ping: Arc<dyn Fn() -> M + Send + Sync>,
}

impl<M: Clone + Send + Sync + 'static> SessionManager<M> {
    /// Builds the manager and spawns its supervision loop. The returned
    /// `JoinHandle` is owned by the caller (typically dropped, or aborted on
    /// shutdown) — the loop itself runs for the process lifetime.
    pub fn new(
        ping_interval: Duration,
        make_ping: Arc<dyn Fn() -> M + Send + Sync>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            groups: Mutex::new(HashMap::new()),
            supervisor_tx: tx,
            ping_interval,
            make_ping,
        });
        let supervisor = tokio::spawn(manager.clone().supervise(rx));
        (manager, supervisor)
    }

    pub fn get_or_create(&self, game_id: i64) -> Arc<SessionGroup<M>> {
        let mut guard = self.groups.lock().expect("session manager lock poisoned");
        guard
            .entry(game_id)
            .or_insert_with(|| {
                Arc::new(SessionGroup::new(
                    game_id,
                    self.supervisor_tx.clone(),
                    self.ping_interval,
                    self.make_ping.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, game_id: i64) -> Option<Arc<SessionGroup<M>>> {
        self.groups.lock().expect("session manager lock poisoned").get(&game_id).cloned()
    }

    pub fn broadcast(&self, game_id: i64, msg: M) {
        if let Some(group) = self.get(game_id) {
            group.broadcast(msg);
        }
    }

    /// Stops and drops the whole group for `game_id` (game end / cleanup).
    pub fn remove_game(&self, game_id: i64, final_msg: Option<M>) {
        let group = self.groups.lock().expect("session manager lock poisoned").remove(&game_id);
        if let Some(group) = group {
            group.stop(final_msg);
        }
    }

    /// Stops every group (process shutdown). The manager is empty afterwards.
    pub fn cleanup(&self, final_msg: Option<M>) {
        let groups: Vec<_> = self
            .groups
            .lock()
            .expect("session manager lock poisoned")
            .drain()
            .map(|(_, group)| group)
            .collect();
        for group in groups {
            group.stop(final_msg.clone());
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().expect("session manager lock poisoned").len()
    }

    async fn supervise(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SupervisorEvent>) {
        while let Some(event) = events.recv().await {
            if matches!(event.kind, SupervisorEventKind::HealthcheckFail) {
                if let Some(group) = self.get(event.game_id) {
                    group.remove(&event.user_id, None);
                }
            }
            self.reap_if_empty(event.game_id);
        }
    }

    fn reap_if_empty(&self, game_id: i64) {
        let mut guard = self.groups.lock().expect("session manager lock poisoned");
        let empty = guard.get(&game_id).is_some_and(|g| g.is_empty());
        if empty {
            guard.remove(&game_id);
        }
    }
}
