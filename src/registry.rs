//! Process-wide room table: create on first join, destroy on last leave.
//!
//! Constructed once in `main` and passed around by `Arc`; there is no global
//! state. Rooms are fully independent of each other.

use crate::host::GameHost;
use crate::protocol::ServerMessage;
use crate::puzzles::PuzzleStore;
use crate::room::RoomHandle;
use crate::types::{GameConfig, Player, PlayerId, RoomId};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    host: Arc<GameHost>,
    puzzles: Arc<PuzzleStore>,
    config: GameConfig,
}

/// Everything a fresh connection needs after joining a room.
pub struct JoinedPlayer {
    pub handle: RoomHandle,
    pub player_id: PlayerId,
    pub player_name: String,
    pub rx: broadcast::Receiver<ServerMessage>,
}

impl RoomRegistry {
    pub fn new(host: Arc<GameHost>, puzzles: Arc<PuzzleStore>, config: GameConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            host,
            puzzles,
            config,
        }
    }

    pub fn host(&self) -> &Arc<GameHost> {
        &self.host
    }

    /// Add a player to a room, creating the room if this id is unseen.
    /// The room-map lock is never held across the room mutex, so one room's
    /// activity cannot stall joins to the others. The broadcast subscription
    /// is taken under the room lock together with the insertion, so the
    /// player misses nothing sent after their join.
    pub async fn join(&self, room_id: &str, name: Option<String>) -> JoinedPlayer {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Player{}", rand::rng().random_range(1..=100)));

        loop {
            let handle = {
                let mut rooms = self.rooms.write().await;
                rooms
                    .entry(room_id.to_string())
                    .or_insert_with(|| {
                        tracing::info!("Creating room {}", room_id);
                        RoomHandle::new(
                            room_id.to_string(),
                            self.config.clone(),
                            self.host.clone(),
                            self.puzzles.clone(),
                        )
                    })
                    .clone()
            };

            let mut room = handle.room.lock().await;
            if room.closed {
                // Lost a race with the last player leaving; the entry is on
                // its way out of the table. Retry against a fresh room.
                drop(room);
                tokio::task::yield_now().await;
                continue;
            }
            let player = Player::new(name.clone());
            let player_id = player.id.clone();
            let player_name = player.name.clone();
            room.players.insert(player_id.clone(), player);
            let rx = room.subscribe();
            drop(room);

            tracing::info!("Player {} ({}) joined room {}", player_name, player_id, room_id);
            return JoinedPlayer {
                handle,
                player_id,
                player_name,
                rx,
            };
        }
    }

    /// Remove a player; when the room empties, stop its tasks and drop it.
    /// A later join with the same id gets a brand-new room in `Waiting`.
    pub async fn leave(&self, room_id: &str, player_id: &PlayerId) {
        let handle = match self.rooms.read().await.get(room_id) {
            Some(h) => h.clone(),
            None => return,
        };

        if handle.remove_player(player_id).await {
            let mut rooms = self.rooms.write().await;
            // The entry may already belong to a newer room under the same id.
            let same = rooms
                .get(room_id)
                .is_some_and(|current| Arc::ptr_eq(&current.room, &handle.room));
            if same {
                tracing::info!("Room {} is empty, removing it", room_id);
                rooms.remove(room_id);
            }
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Look up an existing room without creating one.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }
}
