use cgmath::{InnerSpace, Vector2};

pub const TILE_SIZE: f32 = 40.0;
pub const PLAYER_WIDTH: f32 = 30.0;
pub const PLAYER_HEIGHT: f32 = 50.0;
pub const PLACE_REACH: i64 = 5;

pub type SessionId = u64;

/// Transient physical state of one player, in world pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub id: SessionId,
    pub position: Vector2<f32>,
    pub velocity: Vector2<f32>,
    pub on_ground: bool
}

impl PlayerState {
    pub fn new(id: SessionId) -> PlayerState {
        PlayerState {
            id,
            position: Vector2::new(100.0, 100.0),
            velocity: Vector2::new(0.0, 0.0),
            on_ground: false
        }
    }

    pub fn center(&self) -> Vector2<f32> {
        self.position + Vector2::new(PLAYER_WIDTH / 2.0, PLAYER_HEIGHT / 2.0)
    }

    /// Tile containing the player's centre.
    pub fn center_tile(&self) -> (i64, i64) {
        let center = self.center();
        ((center.x / TILE_SIZE).floor() as i64, (center.y / TILE_SIZE).floor() as i64)
    }
}

/// Whether the tile is within `max_dist` tiles of the player's centre tile.
pub fn can_place(player: &PlayerState, tile_x: i64, tile_y: i64, max_dist: i64) -> bool {
    let (px, py) = player.center_tile();
    // in f64 so cursor tiles at the ends of the i64 range cannot overflow
    let offset = Vector2::new(tile_x as f64 - px as f64, tile_y as f64 - py as f64);
    let reach = max_dist as f64;
    offset.magnitude2() <= reach * reach
}
