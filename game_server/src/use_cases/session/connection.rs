use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Notify, mpsc};

/// One per `(user, game)` streaming client. Owns the outbound half of the
/// connection's channel; the inbound transport loop lives in
/// `interface_adapters::ws` and is handed this handle to register with a
/// `SessionGroup`.
///
/// `stop` is idempotent: at most one caller observes `was_open == true`.
pub struct SessionConnection<M> {
    pub user_id: String,
    outbound_tx: mpsc::UnboundedSender<M>,
    closed: Arc<Notify>,
    stopped: Arc<AtomicBool>,
}

impl<M> Clone for SessionConnection<M> {
    fn clone(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            outbound_tx: self.outbound_tx.clone(),
            closed: self.closed.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<M: Clone + Send + 'static> SessionConnection<M> {
    pub fn new(user_id: String) -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                user_id,
                outbound_tx: tx,
                closed: Arc::new(Notify::new()),
                stopped: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Enqueues `msg`; never blocks on network I/O. Silently dropped once stopped.
    pub fn put(&self, msg: M) {
        if !self.stopped.load(Ordering::Acquire) {
            let _ = self.outbound_tx.send(msg);
        }
    }

    /// Proof-of-life: if the real write loop has already exited (transport
    /// broken), the receiver is gone and this send fails.
    pub fn ping(&self, msg: M) -> Result<(), ()> {
        self.outbound_tx.send(msg).map_err(|_| ())
    }

    /// Cancels the connection. Idempotent: only the first caller sends
    /// `final_msg` and flips the closed event.
    pub fn stop(&self, final_msg: Option<M>) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Some(msg) = final_msg {
                let _ = self.outbound_tx.send(msg);
            }
            self.closed.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub async fn close_wait(&self) {
        if self.is_stopped() {
            return;
        }
        self.closed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn when_stop_is_called_twice_then_final_msg_is_sent_once() {
        let (conn, mut rx) = SessionConnection::<&'static str>::new("u1".into());

        conn.stop(Some("bye"));
        conn.stop(Some("bye-again"));

        assert_eq!(rx.recv().await, Some("bye"));
        // channel has no second message queued
        drop(conn);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn when_ping_fails_because_receiver_dropped_then_err() {
        let (conn, rx) = SessionConnection::<&'static str>::new("u1".into());
        drop(rx);

        assert!(conn.ping("PING").is_err());
    }

    #[tokio::test]
    async fn when_put_after_stop_then_message_is_dropped() {
        let (conn, mut rx) = SessionConnection::<&'static str>::new("u1".into());
        conn.stop(None);
        conn.put("late");

        // Only a closed channel with nothing in it.
        drop(conn);
        assert_eq!(rx.recv().await, None);
    }
}
