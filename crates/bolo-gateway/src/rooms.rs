use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use bolo_types::events::ServerEvent;
use bolo_types::models::UserId;

/// One live WebSocket connection's outbound queue.
///
/// Pushing never blocks: the queue is unbounded and drained by the
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Send to this connection only. Returns false if it has gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Presence router: user id -> live connections ("rooms").
///
/// Both maps are sharded, so joins, leaves and broadcasts for unrelated users
/// do not contend on a shared lock. The two maps are never locked at the
/// same time.
#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<RoomsInner>,
}

#[derive(Default)]
struct RoomsInner {
    /// room (user id) -> conn_id -> outbound queue
    rooms: DashMap<UserId, HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>,

    /// conn_id -> rooms it joined, so `leave` doesn't scan every room
    memberships: DashMap<Uuid, HashSet<UserId>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` under `user_id`. Joining twice is a no-op.
    pub fn join(&self, user_id: &str, conn: &ConnectionHandle) {
        self.inner
            .memberships
            .entry(conn.id)
            .or_default()
            .insert(user_id.to_string());

        self.inner
            .rooms
            .entry(user_id.to_string())
            .or_default()
            .insert(conn.id, conn.tx.clone());

        trace!("conn {} joined room {}", conn.id, user_id);
    }

    /// Drop `conn` from every room it joined. Rooms left empty are removed.
    pub fn leave(&self, conn: &ConnectionHandle) {
        let Some((_, joined)) = self.inner.memberships.remove(&conn.id) else {
            return;
        };

        for user_id in joined {
            if let Some(mut room) = self.inner.rooms.get_mut(&user_id) {
                room.remove(&conn.id);
            }
            self.inner.rooms.remove_if(&user_id, |_, room| room.is_empty());
            trace!("conn {} left room {}", conn.id, user_id);
        }
    }

    /// Hand `event` to every connection in `user_id`'s room and return how
    /// many took it. An empty room drops the event.
    pub fn broadcast(&self, user_id: &str, event: &ServerEvent) -> usize {
        let Some(room) = self.inner.rooms.get(user_id) else {
            trace!("{} to {}: nobody connected", event.name(), user_id);
            return 0;
        };

        room.values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Live connections in `user_id`'s room. Closed queues are not counted.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner
            .rooms
            .get(user_id)
            .map_or(0, |room| room.values().filter(|tx| !tx.is_closed()).count())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connection_count(user_id) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(from: &str) -> ServerEvent {
        ServerEvent::Typing {
            from: from.into(),
            typing: true,
        }
    }

    #[test]
    fn broadcast_reaches_every_tab_of_a_user() {
        let rooms = Rooms::new();
        let (tab1, mut rx1) = ConnectionHandle::new();
        let (tab2, mut rx2) = ConnectionHandle::new();
        let (other, mut rx3) = ConnectionHandle::new();
        rooms.join("u1", &tab1);
        rooms.join("u1", &tab2);
        rooms.join("u3", &other);

        assert_eq!(rooms.broadcast("u1", &typing("u2")), 2);
        assert_eq!(rx1.try_recv().unwrap(), typing("u2"));
        assert_eq!(rx2.try_recv().unwrap(), typing("u2"));
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn join_is_idempotent_per_connection() {
        let rooms = Rooms::new();
        let (conn, mut rx) = ConnectionHandle::new();
        rooms.join("u1", &conn);
        rooms.join("u1", &conn);

        assert_eq!(rooms.connection_count("u1"), 1);
        assert_eq!(rooms.broadcast("u1", &typing("u2")), 1);
        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn leave_removes_connection_and_empty_room() {
        let rooms = Rooms::new();
        let (conn, _rx) = ConnectionHandle::new();
        rooms.join("u1", &conn);
        assert!(rooms.is_online("u1"));

        rooms.leave(&conn);
        assert!(!rooms.is_online("u1"));
        assert_eq!(rooms.broadcast("u1", &typing("u2")), 0);

        // second leave is a no-op
        rooms.leave(&conn);
    }

    #[test]
    fn leave_keeps_other_tabs() {
        let rooms = Rooms::new();
        let (tab1, _rx1) = ConnectionHandle::new();
        let (tab2, mut rx2) = ConnectionHandle::new();
        rooms.join("u1", &tab1);
        rooms.join("u1", &tab2);

        rooms.leave(&tab1);
        assert_eq!(rooms.connection_count("u1"), 1);
        assert_eq!(rooms.broadcast("u1", &typing("u2")), 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn leave_covers_explicitly_joined_rooms() {
        let rooms = Rooms::new();
        let (conn, _rx) = ConnectionHandle::new();
        rooms.join("u1", &conn);
        rooms.join("lobby", &conn);

        rooms.leave(&conn);
        assert!(!rooms.is_online("u1"));
        assert!(!rooms.is_online("lobby"));
    }

    #[test]
    fn closed_connection_is_not_counted() {
        let rooms = Rooms::new();
        let (conn, rx) = ConnectionHandle::new();
        rooms.join("u1", &conn);
        drop(rx);

        assert_eq!(rooms.broadcast("u1", &typing("u2")), 0);
    }

    #[test]
    fn dropped_connection_does_not_count_as_online() {
        let rooms = Rooms::new();
        let (conn, rx) = ConnectionHandle::new();
        drop(rx);

        // a join arriving after the writer is gone must not mark the user online
        rooms.join("u1", &conn);
        assert_eq!(rooms.connection_count("u1"), 0);
        assert!(!rooms.is_online("u1"));

        let (live, _live_rx) = ConnectionHandle::new();
        rooms.join("u1", &live);
        assert_eq!(rooms.connection_count("u1"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_join_and_leave_settle_cleanly() {
        let rooms = Rooms::new();
        let mut tasks = Vec::new();
        for i in 0..64 {
            let rooms = rooms.clone();
            tasks.push(tokio::spawn(async move {
                let user = format!("u{}", i % 4);
                let (conn, _rx) = ConnectionHandle::new();
                rooms.join(&user, &conn);
                rooms.broadcast(&user, &typing("x"));
                rooms.leave(&conn);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        for i in 0..4 {
            assert!(!rooms.is_online(&format!("u{i}")));
        }
    }
}
