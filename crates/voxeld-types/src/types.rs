use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one connection/session for the lifetime of the TCP socket.
/// Issued by `GlobalState` from an atomic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// An absolute block position (x, y, z integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Packs into the wire's 64-bit layout: x[26] | z[26] | y[12], x in the
    /// top bits. y is kept as a raw 12-bit magnitude, not sign-extended.
    pub fn encode(&self) -> u64 {
        ((self.x as u64 & 0x3FF_FFFF) << 38)
            | ((self.z as u64 & 0x3FF_FFFF) << 12)
            | (self.y as u64 & 0xFFF)
    }

    /// Inverse of `encode`. x and z sign-extend via arithmetic right shift on
    /// the signed 64-bit reinterpretation of the word; y is returned as the
    /// raw unsigned 12-bit field.
    pub fn decode(val: u64) -> Self {
        let signed = val as i64;
        let x = (signed >> 38) as i32;
        let z = ((signed << 26) >> 38) as i32;
        let y = (val & 0xFFF) as i32;
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkCoord {
        ChunkCoord {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }

    /// `block -> chunkBlock = (x & 15, y, z & 15)`.
    pub fn chunk_local(&self) -> (i32, i32, i32) {
        (self.x & 15, self.y, self.z & 15)
    }
}

/// A chunk coordinate (cx, cz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance between two chunk coordinates.
    pub fn chebyshev_distance(&self, other: &ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// All chunk coordinates in the `(2*vd+1)^2` square centred on `self`.
    pub fn square(&self, vd: i32) -> impl Iterator<Item = ChunkCoord> + '_ {
        let cx = self.x;
        let cz = self.z;
        (-vd..=vd).flat_map(move |dx| (-vd..=vd).map(move |dz| ChunkCoord::new(cx + dx, cz + dz)))
    }
}

/// A 3D position with double precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkCoord {
        ChunkCoord {
            x: (self.x.floor() as i32) >> 4,
            z: (self.z.floor() as i32) >> 4,
        }
    }
}

/// A player's game profile (uuid + username).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameProfile {
    pub uuid: Uuid,
    pub name: String,
}

impl GameProfile {
    /// Deterministic offline-mode uuid: version-5 (SHA-1) name-based uuid,
    /// namespace the all-zero uuid, name the username. Matches the
    /// `boost::uuids::name_generator` construction the reference server uses.
    pub fn offline_uuid(username: &str) -> Uuid {
        Uuid::new_v5(&Uuid::nil(), username.as_bytes())
    }

    pub fn new(username: impl Into<String>) -> Self {
        let name = username.into();
        let uuid = Self::offline_uuid(&name);
        Self { uuid, name }
    }
}

/// Chat/disconnect text component, serialized as JSON via `serde_json` so
/// quotes, backslashes, and control characters are escaped correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TextComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"text":""}"#.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameMode {
    Survival = 0,
    Creative = 1,
    Adventure = 2,
    Spectator = 3,
}

impl GameMode {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// `Hand` distinguishes main/off hand in Animation/UseItem/InteractEntity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Hand {
    Main = 0,
    Off = 1,
}

impl Hand {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Hand::Main),
            1 => Some(Hand::Off),
            _ => None,
        }
    }
}

/// Face of a block, as sent by PlayerDigging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockFace {
    Bottom = 0,
    Top = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl BlockFace {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(BlockFace::Bottom),
            1 => Some(BlockFace::Top),
            2 => Some(BlockFace::North),
            3 => Some(BlockFace::South),
            4 => Some(BlockFace::West),
            5 => Some(BlockFace::East),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_pos_round_trip() {
        for &(x, y, z) in &[(0, 0, 0), (1, 2, 3), (-1, 0, -1), (33554431, 4095, -33554432)] {
            let pos = BlockPos::new(x, y, z);
            assert_eq!(BlockPos::decode(pos.encode()), pos);
        }
    }

    #[test]
    fn chunk_pos_from_block() {
        assert_eq!(BlockPos::new(16, 0, -1).chunk_pos(), ChunkCoord::new(1, -1));
        assert_eq!(BlockPos::new(-17, 0, 0).chunk_pos(), ChunkCoord::new(-2, 0));
    }

    #[test]
    fn chunk_local_wraps_into_0_15() {
        assert_eq!(BlockPos::new(-1, 5, 17).chunk_local(), (15, 5, 1));
    }

    #[test]
    fn square_has_correct_cardinality() {
        let center = ChunkCoord::new(0, 0);
        let count = center.square(2).count();
        assert_eq!(count, 25);
    }

    #[test]
    fn offline_uuid_is_deterministic() {
        let a = GameProfile::offline_uuid("alice");
        let b = GameProfile::offline_uuid("alice");
        let c = GameProfile::offline_uuid("bob");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn text_component_escapes_json() {
        let tc = TextComponent::plain("say \"hi\"\\ there");
        let json = tc.to_json();
        assert!(json.contains("\\\""));
        assert!(json.contains("\\\\"));
    }
}
