use std::collections::HashMap;

use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use crate::tilecraft::{block_type::{BlockId, BlockRegistry, ItemRegistry}, chunk::Chunk, player::{PlayerState, SessionId}};

/// Position and motion of one player as seen by other clients.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub on_ground: bool
}

impl From<&PlayerState> for PlayerView {
    fn from(player: &PlayerState) -> Self {
        PlayerView {
            x: player.position.x,
            y: player.position.y,
            vel_x: player.velocity.x,
            vel_y: player.velocity.y,
            on_ground: player.on_ground
        }
    }
}

impl PlayerView {
    pub fn position(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }
}

pub type PlayerMap = HashMap<SessionId, PlayerView>;

/// Every message either side sends, tagged on the wire by a `type` field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // handshake
    SessionAssigned { session_id: SessionId },
    VersionCheck { version: String },
    VersionCheckOk,
    ConnectionRejected { reason: String },
    BlockDefinitions { blocks: BlockRegistry },
    ItemDefinitions { items: ItemRegistry },

    // client to server
    PlayerUpdate { x: f32, y: f32, vel_x: f32, vel_y: f32, on_ground: bool },
    PlaceBlock { x: i64, y: i64, block_type: BlockId },
    GetChunk { cx: i32, cy: i32 },
    Disconnect,

    // server to client
    ChunkData { cx: i32, cy: i32, data: Chunk },
    BlockChange { x: i64, y: i64, block_type: BlockId },
    PlayersUpdate {
        #[serde(with = "session_keys")]
        players: PlayerMap
    }
}

impl Message {
    pub fn player_update(player: &PlayerState) -> Message {
        Message::PlayerUpdate {
            x: player.position.x,
            y: player.position.y,
            vel_x: player.velocity.x,
            vel_y: player.velocity.y,
            on_ground: player.on_ground
        }
    }

    /// Wire tag, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SessionAssigned { .. } => "session_assigned",
            Message::VersionCheck { .. } => "version_check",
            Message::VersionCheckOk => "version_check_ok",
            Message::ConnectionRejected { .. } => "connection_rejected",
            Message::BlockDefinitions { .. } => "block_definitions",
            Message::ItemDefinitions { .. } => "item_definitions",
            Message::PlayerUpdate { .. } => "player_update",
            Message::PlaceBlock { .. } => "place_block",
            Message::GetChunk { .. } => "get_chunk",
            Message::Disconnect => "disconnect",
            Message::ChunkData { .. } => "chunk_data",
            Message::BlockChange { .. } => "block_change",
            Message::PlayersUpdate { .. } => "players_update"
        }
    }
}

// Tagged enums buffer their content before decoding it, which loses the
// string-to-integer key conversion serde_json normally does for maps, so
// session ids go over the wire as string keys and are parsed back here.
mod session_keys {
    use std::collections::HashMap;

    use serde::{de::Error, ser::SerializeMap, Deserialize, Deserializer, Serializer};

    use super::{PlayerMap, PlayerView};

    pub fn serialize<S: Serializer>(players: &PlayerMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(players.len()))?;
        for (id, view) in players {
            map.serialize_entry(&id.to_string(), view)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PlayerMap, D::Error> {
        let raw = HashMap::<String, PlayerView>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(id, view)| {
                id.parse()
                    .map(|id| (id, view))
                    .map_err(|_| D::Error::custom(format!("invalid session id {:?}", id)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tilecraft::block_type::BlockType;

    #[test]
    fn messages_are_tagged_with_snake_case_type() {
        let value = serde_json::to_value(Message::PlaceBlock { x: 10, y: 5, block_type: 2 }).unwrap();
        assert_eq!(value, json!({ "type": "place_block", "x": 10, "y": 5, "block_type": 2 }));

        let value = serde_json::to_value(Message::VersionCheckOk).unwrap();
        assert_eq!(value, json!({ "type": "version_check_ok" }));
    }

    #[test]
    fn players_update_uses_session_ids_as_keys() {
        let mut players = PlayerMap::new();
        players.insert(7, PlayerView { x: 1.5, y: -2.0, vel_x: 0.0, vel_y: 9.8, on_ground: true });
        let message = Message::PlayersUpdate { players };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["players"]["7"]["vel_y"], json!(9.8f32));

        let text = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&text).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn bad_session_keys_are_rejected() {
        let text = r#"{"type":"players_update","players":{"seven":{"x":0,"y":0,"vel_x":0,"vel_y":0,"on_ground":false}}}"#;
        assert!(serde_json::from_str::<Message>(text).is_err());
    }

    #[test]
    fn decodes_messages_written_by_hand() {
        let text = r#"{"type":"get_chunk","cx":-1,"cy":3}"#;
        assert_eq!(serde_json::from_str::<Message>(text).unwrap(), Message::GetChunk { cx: -1, cy: 3 });

        let text = r#"{"type":"player_update","x":100,"y":100.5,"vel_x":0,"vel_y":-3,"on_ground":false}"#;
        assert_eq!(
            serde_json::from_str::<Message>(text).unwrap(),
            Message::PlayerUpdate { x: 100.0, y: 100.5, vel_x: 0.0, vel_y: -3.0, on_ground: false }
        );
    }

    #[test]
    fn view_mirrors_player_state() {
        let mut player = PlayerState::new(3);
        player.velocity = Vector2::new(2.0, -1.0);
        player.on_ground = true;
        let view = PlayerView::from(&player);
        assert_eq!(view.position(), player.position);
        assert_eq!((view.vel_x, view.vel_y, view.on_ground), (2.0, -1.0, true));
        assert_eq!(Message::player_update(&player).kind(), "player_update");
        assert_eq!(Message::BlockChange { x: 0, y: 0, block_type: BlockType::Air.id() }.kind(), "block_change");
    }
}
