//! The packet catalog: client→server decode and server→client encode, for
//! the subset of protocol 498 this server actively handles.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use uuid::Uuid;
use voxeld_types::{BlockPos, TextComponent};

use crate::codec::{self, write_block_pos, write_string, write_uuid, CodecError, Cursor};
use crate::wire_ids::play;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unexpected packet id {id} in phase {phase}")]
    UnexpectedPacket { phase: &'static str, id: i32 },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Decoded client→server packets that this server acts on.
#[derive(Debug, Clone)]
pub enum ClientPacket {
    Handshake {
        version: i32,
        #[allow(dead_code)]
        host: String,
        #[allow(dead_code)]
        port: u16,
        next_state: i32,
    },
    LoginStart {
        name: String,
    },
    TeleportConfirm {
        teleport_id: i32,
    },
    PluginMessage {
        channel: String,
        data: Vec<u8>,
    },
    ClientSettings {
        view_distance: i8,
    },
    KeepAlive {
        id: i64,
    },
    PlayerPosition {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    PlayerPositionRotation {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerRotation {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerMovement {
        on_ground: bool,
    },
    ChatMessage {
        message: String,
    },
    CloseWindow {
        window_id: u8,
    },
    InteractEntity {
        entity_id: i32,
    },
    PlayerAbilities {
        flags: u8,
        flying_speed: f32,
        walking_speed: f32,
    },
    PlayerDigging {
        status: i32,
        location: BlockPos,
        face: i32,
    },
    EntityAction {
        entity_id: i32,
        action_id: i32,
    },
    HeldItemChange {
        slot: i16,
    },
    Animation {
        hand: i32,
    },
    UseItem {
        hand: i32,
    },
    /// A recognized id whose body this server does not inspect, or an
    /// id this server has no handler for. Carried so callers can log it.
    Unknown {
        id: i32,
    },
}

pub fn decode_handshake(payload: &[u8]) -> ProtocolResult<ClientPacket> {
    let mut c = Cursor::new(payload);
    let version = c.read_varint()?;
    let host = c.read_string()?;
    let port = c.read_u16()?;
    let next_state = c.read_varint()?;
    Ok(ClientPacket::Handshake {
        version,
        host,
        port,
        next_state,
    })
}

pub fn decode_login(id: i32, payload: &[u8]) -> ProtocolResult<ClientPacket> {
    match id {
        id if id == crate::wire_ids::login::serverbound::LOGIN_START => {
            let mut c = Cursor::new(payload);
            Ok(ClientPacket::LoginStart { name: c.read_string()? })
        }
        other => Err(ProtocolError::UnexpectedPacket { phase: "LOGIN", id: other }),
    }
}

/// Decodes a PLAY_INIT/PLAY packet. Unknown-but-harmless ids come back as
/// `ClientPacket::Unknown`.
pub fn decode_play(id: i32, payload: &[u8]) -> ProtocolResult<ClientPacket> {
    use play::serverbound::*;
    let mut c = Cursor::new(payload);
    let packet = match id {
        id if id == TELEPORT_CONFIRM => ClientPacket::TeleportConfirm {
            teleport_id: c.read_varint()?,
        },
        id if id == PLUGIN_MESSAGE => {
            let channel = c.read_string()?;
            let data = c.read_remaining().to_vec();
            ClientPacket::PluginMessage { channel, data }
        }
        id if id == CLIENT_SETTINGS => {
            let _locale = c.read_string()?;
            let view_distance = c.read_u8()? as i8;
            ClientPacket::ClientSettings { view_distance }
        }
        id if id == KEEP_ALIVE => ClientPacket::KeepAlive { id: c.read_i64()? },
        id if id == PLAYER_POSITION => {
            let x = c.read_f64()?;
            let y = c.read_f64()?;
            let z = c.read_f64()?;
            let on_ground = c.read_bool()?;
            ClientPacket::PlayerPosition { x, y, z, on_ground }
        }
        id if id == PLAYER_POSITION_ROTATION => {
            let x = c.read_f64()?;
            let y = c.read_f64()?;
            let z = c.read_f64()?;
            let yaw = c.read_f32()?;
            let pitch = c.read_f32()?;
            let on_ground = c.read_bool()?;
            ClientPacket::PlayerPositionRotation {
                x,
                y,
                z,
                yaw,
                pitch,
                on_ground,
            }
        }
        id if id == PLAYER_ROTATION => {
            let yaw = c.read_f32()?;
            let pitch = c.read_f32()?;
            let on_ground = c.read_bool()?;
            ClientPacket::PlayerRotation { yaw, pitch, on_ground }
        }
        id if id == PLAYER_MOVEMENT => ClientPacket::PlayerMovement {
            on_ground: c.read_bool()?,
        },
        id if id == CHAT_MESSAGE => ClientPacket::ChatMessage {
            message: c.read_string()?,
        },
        id if id == CLOSE_WINDOW => ClientPacket::CloseWindow {
            window_id: c.read_u8()?,
        },
        id if id == INTERACT_ENTITY => ClientPacket::InteractEntity {
            entity_id: c.read_varint()?,
        },
        id if id == PLAYER_ABILITIES => {
            let flags = c.read_u8()?;
            let flying_speed = c.read_f32()?;
            let walking_speed = c.read_f32()?;
            ClientPacket::PlayerAbilities {
                flags,
                flying_speed,
                walking_speed,
            }
        }
        id if id == PLAYER_DIGGING => {
            let status = c.read_varint()?;
            let location = c.read_block_pos()?;
            let face = c.read_varint()?;
            ClientPacket::PlayerDigging { status, location, face }
        }
        id if id == ENTITY_ACTION => {
            let entity_id = c.read_varint()?;
            let action_id = c.read_varint()?;
            let _jump_boost = c.read_varint()?;
            ClientPacket::EntityAction { entity_id, action_id }
        }
        id if id == HELD_ITEM_CHANGE => ClientPacket::HeldItemChange {
            slot: c.read_i16()?,
        },
        id if id == ANIMATION => ClientPacket::Animation {
            hand: c.read_varint()?,
        },
        id if id == USE_ITEM => ClientPacket::UseItem {
            hand: c.read_varint()?,
        },
        other => ClientPacket::Unknown { id: other },
    };
    Ok(packet)
}

/// Per-uuid update payload for `PlayerInfo`. The reference server treats the
/// entry list as homogeneous: every entry in a given packet shares the
/// action that names the variant.
#[derive(Debug, Clone)]
pub enum PlayerInfoAction {
    AddPlayer(Vec<AddPlayerEntry>),
    UpdateGameMode(Vec<(Uuid, i32)>),
    UpdateLatency(Vec<(Uuid, i32)>),
    UpdateDisplayName(Vec<(Uuid, Option<TextComponent>)>),
    RemovePlayer(Vec<Uuid>),
}

#[derive(Debug, Clone)]
pub struct AddPlayerEntry {
    pub uuid: Uuid,
    pub name: String,
    pub game_mode: i32,
    pub ping: i32,
}

impl PlayerInfoAction {
    fn action_id(&self) -> i32 {
        match self {
            PlayerInfoAction::AddPlayer(_) => 0,
            PlayerInfoAction::UpdateGameMode(_) => 1,
            PlayerInfoAction::UpdateLatency(_) => 2,
            PlayerInfoAction::UpdateDisplayName(_) => 3,
            PlayerInfoAction::RemovePlayer(_) => 4,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        codec::write_varint(buf, self.action_id());
        match self {
            PlayerInfoAction::AddPlayer(entries) => {
                codec::write_varint(buf, entries.len() as i32);
                for e in entries {
                    write_uuid(buf, &e.uuid);
                    write_string(buf, &e.name);
                    codec::write_varint(buf, 0); // no profile properties
                    codec::write_varint(buf, e.game_mode);
                    codec::write_varint(buf, e.ping);
                    buf.put_u8(0); // has no display name
                }
            }
            PlayerInfoAction::UpdateGameMode(entries) => {
                codec::write_varint(buf, entries.len() as i32);
                for (uuid, mode) in entries {
                    write_uuid(buf, uuid);
                    codec::write_varint(buf, *mode);
                }
            }
            PlayerInfoAction::UpdateLatency(entries) => {
                codec::write_varint(buf, entries.len() as i32);
                for (uuid, ping) in entries {
                    write_uuid(buf, uuid);
                    codec::write_varint(buf, *ping);
                }
            }
            PlayerInfoAction::UpdateDisplayName(entries) => {
                codec::write_varint(buf, entries.len() as i32);
                for (uuid, name) in entries {
                    write_uuid(buf, uuid);
                    match name {
                        Some(tc) => {
                            buf.put_u8(1);
                            write_string(buf, &tc.to_json());
                        }
                        None => buf.put_u8(0),
                    }
                }
            }
            PlayerInfoAction::RemovePlayer(uuids) => {
                codec::write_varint(buf, uuids.len() as i32);
                for uuid in uuids {
                    write_uuid(buf, uuid);
                }
            }
        }
    }
}

/// A server→client packet, carrying its own wire id.
pub enum ServerPacket {
    LoginSuccess { uuid: Uuid, username: String },
    DisconnectLogin { reason: TextComponent },
    JoinGame {
        entity_id: i32,
        game_mode: u8,
        dimension: i32,
        max_players: u8,
        view_distance: i32,
        reduced_debug_info: bool,
    },
    PluginMessage { channel: String, data: Vec<u8> },
    PlayerAbilities { flags: u8, flying_speed: f32, walking_speed: f32 },
    HeldItemChange { slot: i8 },
    SpawnPosition { location: BlockPos },
    PlayerPositionLook {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        teleport_id: i32,
    },
    ChunkData {
        chunk_x: i32,
        chunk_z: i32,
        primary_bitmask: i32,
        heightmap_nbt: Vec<u8>,
        section_data: Vec<u8>,
        biomes: Vec<i32>,
    },
    UnloadChunk { chunk_x: i32, chunk_z: i32 },
    UpdateViewPosition { chunk_x: i32, chunk_z: i32 },
    SpawnPlayer {
        entity_id: i32,
        uuid: Uuid,
        x: f64,
        y: f64,
        z: f64,
        yaw: u8,
        pitch: u8,
    },
    DestroyEntities { entity_ids: Vec<i32> },
    EntityMove { entity_id: i32, dx: i16, dy: i16, dz: i16, on_ground: bool },
    EntityMoveRotation {
        entity_id: i32,
        dx: i16,
        dy: i16,
        dz: i16,
        yaw: u8,
        pitch: u8,
        on_ground: bool,
    },
    EntityTeleport {
        entity_id: i32,
        x: f64,
        y: f64,
        z: f64,
        yaw: u8,
        pitch: u8,
        on_ground: bool,
    },
    EntityRotation { entity_id: i32, yaw: u8, pitch: u8, on_ground: bool },
    EntityHeadLook { entity_id: i32, yaw: u8 },
    EntityMetadata { entity_id: i32, metadata: Vec<u8> },
    EntityAnimation { entity_id: i32, animation_id: u8 },
    BlockChange { location: BlockPos, block_id: i32 },
    Chat { json: String, position: u8 },
    KeepAlive { id: i64 },
    PlayerInfo { action: PlayerInfoAction },
    Disconnect { reason: TextComponent },
}

impl ServerPacket {
    /// Returns `(wire id, encoded payload)`, ready for `framing::serialize_packet`.
    pub fn encode(&self) -> (i32, Vec<u8>) {
        let mut buf = BytesMut::new();
        let id = match self {
            ServerPacket::LoginSuccess { uuid, username } => {
                write_uuid(&mut buf, uuid);
                write_string(&mut buf, username);
                crate::wire_ids::login::clientbound::LOGIN_SUCCESS
            }
            ServerPacket::DisconnectLogin { reason } => {
                write_string(&mut buf, &reason.to_json());
                crate::wire_ids::login::clientbound::DISCONNECT
            }
            ServerPacket::JoinGame {
                entity_id,
                game_mode,
                dimension,
                max_players,
                view_distance,
                reduced_debug_info,
            } => {
                buf.put_i32(*entity_id);
                buf.put_u8(*game_mode);
                buf.put_i32(*dimension);
                buf.put_i64(0); // hashed seed, unused
                buf.put_u8(*max_players);
                write_string(&mut buf, "flat");
                codec::write_varint(&mut buf, *view_distance);
                buf.put_u8(if *reduced_debug_info { 1 } else { 0 });
                buf.put_u8(1); // enable respawn screen
                play::clientbound::JOIN_GAME
            }
            ServerPacket::PluginMessage { channel, data } => {
                write_string(&mut buf, channel);
                buf.put_slice(data);
                play::clientbound::PLUGIN_MESSAGE
            }
            ServerPacket::PlayerAbilities { flags, flying_speed, walking_speed } => {
                buf.put_u8(*flags);
                buf.put_f32(*flying_speed);
                buf.put_f32(*walking_speed);
                play::clientbound::PLAYER_ABILITIES
            }
            ServerPacket::HeldItemChange { slot } => {
                buf.put_i8(*slot);
                play::clientbound::HELD_ITEM_CHANGE
            }
            ServerPacket::SpawnPosition { location } => {
                write_block_pos(&mut buf, location);
                play::clientbound::SPAWN_POSITION
            }
            ServerPacket::PlayerPositionLook { x, y, z, yaw, pitch, teleport_id } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
                buf.put_f32(*yaw);
                buf.put_f32(*pitch);
                buf.put_u8(0); // flags: all absolute
                codec::write_varint(&mut buf, *teleport_id);
                play::clientbound::PLAYER_POSITION_LOOK
            }
            ServerPacket::ChunkData {
                chunk_x,
                chunk_z,
                primary_bitmask,
                heightmap_nbt,
                section_data,
                biomes,
            } => {
                buf.put_i32(*chunk_x);
                buf.put_i32(*chunk_z);
                buf.put_u8(1); // full chunk
                codec::write_varint(&mut buf, *primary_bitmask);
                buf.put_slice(heightmap_nbt);
                for b in biomes {
                    buf.put_i32(*b);
                }
                codec::write_byte_array(&mut buf, section_data);
                codec::write_varint(&mut buf, 0); // no block entities
                play::clientbound::CHUNK_DATA
            }
            ServerPacket::UnloadChunk { chunk_x, chunk_z } => {
                buf.put_i32(*chunk_x);
                buf.put_i32(*chunk_z);
                play::clientbound::UNLOAD_CHUNK
            }
            ServerPacket::UpdateViewPosition { chunk_x, chunk_z } => {
                codec::write_varint(&mut buf, *chunk_x);
                codec::write_varint(&mut buf, *chunk_z);
                play::clientbound::UPDATE_VIEW_POSITION
            }
            ServerPacket::SpawnPlayer { entity_id, uuid, x, y, z, yaw, pitch } => {
                codec::write_varint(&mut buf, *entity_id);
                write_uuid(&mut buf, uuid);
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
                buf.put_u8(*yaw);
                buf.put_u8(*pitch);
                play::clientbound::SPAWN_PLAYER
            }
            ServerPacket::DestroyEntities { entity_ids } => {
                codec::write_varint(&mut buf, entity_ids.len() as i32);
                for id in entity_ids {
                    codec::write_varint(&mut buf, *id);
                }
                play::clientbound::DESTROY_ENTITIES
            }
            ServerPacket::EntityMove { entity_id, dx, dy, dz, on_ground } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_i16(*dx);
                buf.put_i16(*dy);
                buf.put_i16(*dz);
                buf.put_u8(if *on_ground { 1 } else { 0 });
                play::clientbound::ENTITY_MOVE
            }
            ServerPacket::EntityMoveRotation { entity_id, dx, dy, dz, yaw, pitch, on_ground } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_i16(*dx);
                buf.put_i16(*dy);
                buf.put_i16(*dz);
                buf.put_u8(*yaw);
                buf.put_u8(*pitch);
                buf.put_u8(if *on_ground { 1 } else { 0 });
                play::clientbound::ENTITY_MOVE_ROTATION
            }
            ServerPacket::EntityTeleport { entity_id, x, y, z, yaw, pitch, on_ground } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
                buf.put_u8(*yaw);
                buf.put_u8(*pitch);
                buf.put_u8(if *on_ground { 1 } else { 0 });
                play::clientbound::ENTITY_TELEPORT
            }
            ServerPacket::EntityRotation { entity_id, yaw, pitch, on_ground } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_u8(*yaw);
                buf.put_u8(*pitch);
                buf.put_u8(if *on_ground { 1 } else { 0 });
                play::clientbound::ENTITY_ROTATION
            }
            ServerPacket::EntityHeadLook { entity_id, yaw } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_u8(*yaw);
                play::clientbound::ENTITY_HEAD_LOOK
            }
            ServerPacket::EntityMetadata { entity_id, metadata } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_slice(metadata);
                play::clientbound::ENTITY_METADATA
            }
            ServerPacket::EntityAnimation { entity_id, animation_id } => {
                codec::write_varint(&mut buf, *entity_id);
                buf.put_u8(*animation_id);
                play::clientbound::ENTITY_ANIMATION
            }
            ServerPacket::BlockChange { location, block_id } => {
                write_block_pos(&mut buf, location);
                codec::write_varint(&mut buf, *block_id);
                play::clientbound::BLOCK_CHANGE
            }
            ServerPacket::Chat { json, position } => {
                write_string(&mut buf, json);
                buf.put_u8(*position);
                play::clientbound::CHAT
            }
            ServerPacket::KeepAlive { id } => {
                buf.put_i64(*id);
                play::clientbound::KEEP_ALIVE
            }
            ServerPacket::PlayerInfo { action } => {
                action.write(&mut buf);
                play::clientbound::PLAYER_INFO
            }
            ServerPacket::Disconnect { reason } => {
                write_string(&mut buf, &reason.to_json());
                play::clientbound::DISCONNECT
            }
        };
        (id, buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_decodes_fields_in_order() {
        let mut raw = BytesMut::new();
        codec::write_varint(&mut raw, 498);
        write_string(&mut raw, "localhost");
        raw.put_u16(1337);
        codec::write_varint(&mut raw, 2);
        match decode_handshake(&raw).unwrap() {
            ClientPacket::Handshake { version, next_state, .. } => {
                assert_eq!(version, 498);
                assert_eq!(next_state, 2);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn player_info_add_player_round_trips_through_encode() {
        let entry = AddPlayerEntry {
            uuid: Uuid::nil(),
            name: "alice".into(),
            game_mode: 1,
            ping: 0,
        };
        let packet = ServerPacket::PlayerInfo {
            action: PlayerInfoAction::AddPlayer(vec![entry]),
        };
        let (id, payload) = packet.encode();
        assert_eq!(id, play::clientbound::PLAYER_INFO);
        assert!(!payload.is_empty());
    }
}
