use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tracing::{debug, info, warn};

use voxeld_protocol::codec::{self, Cursor};
use voxeld_protocol::connection::ConnectionWriter;
use voxeld_protocol::metadata::{encode_metadata, entity_flags_entry, pose_entry};
use voxeld_protocol::packets::{
    decode_handshake, decode_login, decode_play, AddPlayerEntry, ClientPacket, PlayerInfoAction, ServerPacket,
};
use voxeld_protocol::wire_ids;
use voxeld_types::{BlockPos, ChunkCoord, ConnectionId, GameMode, GameProfile, TextComponent, Vec3d};
use voxeld_world::blocks;

use crate::global::GlobalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Initial = 0,
    Status = 1,
    Login = 2,
    PlayInit = 3,
    Play = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Initial,
            1 => Phase::Status,
            2 => Phase::Login,
            3 => Phase::PlayInit,
            _ => Phase::Play,
        }
    }
}

/// Mutated only from the packet-handling path for this connection — the
/// transport's per-connection ordering makes one coarse mutex equivalent to
/// "only ever touched by one logical writer at a time".
pub struct PlayerState {
    pub profile: Option<GameProfile>,
    pub entity_id: i32,
    pub client_brand: Option<String>,
    pub game_mode: GameMode,
    pub view_distance: i32,
    pub position: Vec3d,
    pub yaw: f32,
    pub pitch: f32,
    pub held_item_slot: i16,
    pub open_window: u8,
    pub ability_flags: u8,
    pub flying_speed: f32,
    pub walking_speed: f32,
    pub crouching: bool,
    pub sprinting: bool,
    pub outstanding_teleport_ids: BTreeSet<i32>,
    pub next_teleport_id: i32,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            profile: None,
            entity_id: 0,
            client_brand: None,
            game_mode: GameMode::Survival,
            view_distance: 0,
            position: Vec3d::new(0.5, 64.0, 0.5),
            yaw: 0.0,
            pitch: 0.0,
            held_item_slot: 0,
            open_window: 0,
            ability_flags: 0x0f,
            flying_speed: 1.0,
            walking_speed: 1.0,
            crouching: false,
            sprinting: false,
            outstanding_teleport_ids: BTreeSet::new(),
            next_teleport_id: 0,
        }
    }

    fn chunk(&self) -> ChunkCoord {
        self.position.chunk_pos()
    }
}

/// One instance per accepted connection. Owns the PlayerState, drives the
/// phase state machine, and participates in broadcasts through the
/// `ConnectionWriter` handle (which enqueues onto the writer task — sends
/// here never block on socket I/O).
pub struct Session {
    pub id: ConnectionId,
    global: Arc<GlobalState>,
    phase: AtomicU8,
    last_packet_time_ns: AtomicI64,
    last_keepalive_sent_ns: AtomicI64,
    pub player: Mutex<PlayerState>,
    writer: ConnectionWriter,
}

impl Session {
    pub fn new(id: ConnectionId, global: Arc<GlobalState>, writer: ConnectionWriter) -> Arc<Self> {
        let now = global.now_ns();
        Arc::new(Self {
            id,
            global,
            phase: AtomicU8::new(Phase::Initial as u8),
            last_packet_time_ns: AtomicI64::new(now),
            last_keepalive_sent_ns: AtomicI64::new(now),
            player: Mutex::new(PlayerState::new()),
            writer,
        })
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn send(&self, packet: ServerPacket) {
        let (id, payload) = packet.encode();
        self.writer.send_packet(id, &payload);
    }

    /// Idempotent at the transport level — extra calls after the first are
    /// harmless once the writer's channel is gone.
    pub fn disconnect(&self, reason: &str) {
        let text = TextComponent::plain(reason);
        let packet = if self.phase() == Phase::Play {
            ServerPacket::Disconnect { reason: text }
        } else {
            ServerPacket::DisconnectLogin { reason: text }
        };
        self.send(packet);
        self.writer.disconnect();
    }

    /// Entry point for every received frame. `Err` means the caller should
    /// stop reading — a disconnect has already been queued.
    pub fn handle_frame(&self, id: i32, payload: &[u8]) -> Result<(), ()> {
        self.last_packet_time_ns.store(self.global.now_ns(), Ordering::Relaxed);
        match self.phase() {
            Phase::Initial => self.handle_initial(id, payload),
            Phase::Status => {
                self.disconnect("server list ping is not implemented");
                Err(())
            }
            Phase::Login => self.handle_login(id, payload),
            Phase::PlayInit => self.handle_play_init(id, payload),
            Phase::Play => self.handle_play(id, payload),
        }
    }

    /// Called once per tick from a different task than the packet reader —
    /// hence the atomics on the timestamps it reads and writes.
    pub fn on_tick(&self) {
        let now = self.global.now_ns();
        let last_packet = self.last_packet_time_ns.load(Ordering::Relaxed);
        if now - last_packet >= 10_000_000_000 {
            self.disconnect("timeout");
            return;
        }
        if self.phase() == Phase::Play {
            let last_ka = self.last_keepalive_sent_ns.load(Ordering::Relaxed);
            if now - last_ka >= 5_000_000_000 {
                self.last_keepalive_sent_ns.store(now, Ordering::Relaxed);
                self.send(ServerPacket::KeepAlive { id: now });
            }
        }
    }

    /// Removes this session from every shared structure it might be in.
    /// Safe to call regardless of which phase the session reached.
    pub fn cleanup(&self) {
        self.global.remove_session(self.id);
        if self.phase() == Phase::Play {
            let (chunk, vd) = {
                let player = self.player.lock().expect("player lock poisoned");
                (player.chunk(), player.view_distance)
            };
            self.global.tracker.leave(chunk, vd, self.id);
        }
    }

    // ---- INITIAL ---------------------------------------------------------

    fn handle_initial(&self, id: i32, payload: &[u8]) -> Result<(), ()> {
        if id != wire_ids::handshake::HANDSHAKE {
            self.disconnect("expected handshake");
            return Err(());
        }
        let packet = decode_handshake(payload).map_err(|_| self.disconnect("malformed handshake"))?;
        match packet {
            ClientPacket::Handshake { version, next_state, .. } => {
                if version != 498 {
                    warn!("handshake version mismatch: got {version}, expected 498");
                    self.disconnect("version mismatch");
                    return Err(());
                }
                match next_state {
                    1 => {
                        self.set_phase(Phase::Status);
                        Ok(())
                    }
                    2 => {
                        self.set_phase(Phase::Login);
                        Ok(())
                    }
                    _ => {
                        self.disconnect("invalid next state");
                        Err(())
                    }
                }
            }
            _ => {
                self.disconnect("expected handshake");
                Err(())
            }
        }
    }

    // ---- LOGIN -------------------------------------------------------------

    fn handle_login(&self, id: i32, payload: &[u8]) -> Result<(), ()> {
        let packet = decode_login(id, payload).map_err(|_| self.disconnect("expected login start"))?;
        let name = match packet {
            ClientPacket::LoginStart { name } => name,
            _ => {
                self.disconnect("expected login start");
                return Err(());
            }
        };

        let entity_id = self.global.next_entity_id();
        let uuid = GameProfile::offline_uuid(&name);
        {
            let mut player = self.player.lock().expect("player lock poisoned");
            player.entity_id = entity_id;
            player.profile = Some(GameProfile { uuid, name: name.clone() });
        }
        info!("{name} ({uuid}) logging in as entity {entity_id}");

        self.send(ServerPacket::LoginSuccess { uuid, username: name.clone() });
        self.send(ServerPacket::JoinGame {
            entity_id,
            game_mode: GameMode::Survival.id(),
            dimension: 0,
            max_players: 255,
            view_distance: self.global.config.max_view_distance,
            reduced_debug_info: false,
        });

        let mut brand_buf = BytesMut::new();
        codec::write_string(&mut brand_buf, &self.global.config.server_brand);
        self.send(ServerPacket::PluginMessage {
            channel: "minecraft:brand".into(),
            data: brand_buf.to_vec(),
        });
        self.send(ServerPacket::PlayerAbilities {
            flags: 0x0f,
            flying_speed: 1.0,
            walking_speed: 1.0,
        });
        self.send(ServerPacket::HeldItemChange { slot: 0 });

        let existing: Vec<AddPlayerEntry> = self
            .global
            .sessions_snapshot()
            .into_iter()
            .filter(|s| s.id != self.id)
            .filter_map(|s| {
                let p = s.player.lock().expect("player lock poisoned");
                p.profile.clone().map(|profile| AddPlayerEntry {
                    uuid: profile.uuid,
                    name: profile.name,
                    game_mode: GameMode::Survival.id() as i32,
                    ping: 0,
                })
            })
            .collect();
        self.send(ServerPacket::PlayerInfo { action: PlayerInfoAction::AddPlayer(existing) });

        let self_entry = AddPlayerEntry {
            uuid,
            name: name.clone(),
            game_mode: GameMode::Survival.id() as i32,
            ping: 0,
        };
        for s in self.global.sessions_snapshot() {
            s.send(ServerPacket::PlayerInfo {
                action: PlayerInfoAction::AddPlayer(vec![self_entry.clone()]),
            });
        }

        self.set_phase(Phase::PlayInit);
        Ok(())
    }

    // ---- PLAY_INIT ----------------------------------------------------------

    fn handle_play_init(&self, id: i32, payload: &[u8]) -> Result<(), ()> {
        let packet = match decode_play(id, payload) {
            Ok(p) => p,
            Err(e) => {
                debug!("malformed play_init packet id=0x{id:02x}: {e}");
                return Ok(());
            }
        };
        match packet {
            ClientPacket::PlayerPositionRotation { .. } => Ok(()),
            ClientPacket::PluginMessage { channel, data } => {
                if channel == "minecraft:brand" {
                    let mut c = Cursor::new(&data);
                    if let Ok(brand) = c.read_string() {
                        self.player.lock().expect("player lock poisoned").client_brand = Some(brand);
                    }
                } else {
                    debug!("ignoring plugin message on channel {channel}");
                }
                Ok(())
            }
            ClientPacket::ClientSettings { view_distance } => {
                self.adopt_client_settings(view_distance);
                self.stream_initial_chunks();
                self.send(ServerPacket::SpawnPosition { location: BlockPos::new(0, 0, 0) });
                let (x, y, z, yaw, pitch) = {
                    let player = self.player.lock().expect("player lock poisoned");
                    (player.position.x, player.position.y, player.position.z, player.yaw, player.pitch)
                };
                let teleport_id = self.start_teleport();
                self.send(ServerPacket::PlayerPositionLook { x, y, z, yaw, pitch, teleport_id });
                Ok(())
            }
            ClientPacket::TeleportConfirm { teleport_id } => self.confirm_teleport_into_play(teleport_id),
            ClientPacket::Unknown { id } => {
                debug!("ignoring unhandled play_init packet id=0x{id:02x}");
                Ok(())
            }
            other => {
                debug!("ignoring play_init packet {other:?}");
                Ok(())
            }
        }
    }

    fn start_teleport(&self) -> i32 {
        let mut player = self.player.lock().expect("player lock poisoned");
        let id = player.next_teleport_id;
        player.next_teleport_id += 1;
        player.outstanding_teleport_ids.insert(id);
        id
    }

    fn stream_initial_chunks(&self) {
        let vd = self.player.lock().expect("player lock poisoned").view_distance;
        for coord in ChunkCoord::new(0, 0).square(vd) {
            self.send_chunk(coord);
        }
    }

    fn adopt_client_settings(&self, raw_vd: i8) -> (i32, i32) {
        let max = self.global.config.max_view_distance;
        let new_vd = (raw_vd as i32).clamp(2, max);
        let mut player = self.player.lock().expect("player lock poisoned");
        let old_vd = player.view_distance;
        player.view_distance = new_vd;
        (old_vd, new_vd)
    }

    fn confirm_teleport_into_play(&self, teleport_id: i32) -> Result<(), ()> {
        let outstanding = self.player.lock().expect("player lock poisoned").outstanding_teleport_ids.remove(&teleport_id);
        if !outstanding {
            self.disconnect("unknown teleport id");
            return Err(());
        }

        let (chunk, vd, entity_id, uuid, position, yaw, pitch) = {
            let player = self.player.lock().expect("player lock poisoned");
            (
                player.chunk(),
                player.view_distance,
                player.entity_id,
                player.profile.as_ref().expect("profile set before play_init").uuid,
                player.position,
                player.yaw,
                player.pitch,
            )
        };

        self.global.tracker.enter(chunk, vd, self.id);

        for peer_id in self.global.tracker.subscribers(chunk) {
            if peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(peer_id) {
                peer.send(ServerPacket::SpawnPlayer {
                    entity_id,
                    uuid,
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    yaw: angle_to_byte(yaw),
                    pitch: angle_to_byte(pitch),
                });
            }
        }

        let mut peers_in_vision = HashSet::new();
        for coord in chunk.square(vd) {
            for member_id in self.global.tracker.members(coord) {
                if member_id != self.id {
                    peers_in_vision.insert(member_id);
                }
            }
        }
        for peer_id in peers_in_vision {
            if let Some(peer) = self.global.session(peer_id) {
                let peer_player = peer.player.lock().expect("player lock poisoned");
                if let Some(profile) = &peer_player.profile {
                    self.send(ServerPacket::SpawnPlayer {
                        entity_id: peer_player.entity_id,
                        uuid: profile.uuid,
                        x: peer_player.position.x,
                        y: peer_player.position.y,
                        z: peer_player.position.z,
                        yaw: angle_to_byte(peer_player.yaw),
                        pitch: angle_to_byte(peer_player.pitch),
                    });
                }
            }
        }

        self.set_phase(Phase::Play);
        Ok(())
    }

    // ---- PLAY ---------------------------------------------------------------

    fn handle_play(&self, id: i32, payload: &[u8]) -> Result<(), ()> {
        let packet = match decode_play(id, payload) {
            Ok(p) => p,
            Err(e) => {
                debug!("malformed play packet id=0x{id:02x}: {e}");
                return Ok(());
            }
        };
        match packet {
            ClientPacket::ChatMessage { message } => self.handle_chat(message),
            ClientPacket::ClientSettings { view_distance } => {
                self.handle_client_settings_in_play(view_distance);
                Ok(())
            }
            ClientPacket::CloseWindow { window_id } => self.handle_close_window(window_id),
            ClientPacket::InteractEntity { .. } => Ok(()),
            ClientPacket::PlayerPosition { x, y, z, .. } => {
                self.apply_move(Vec3d::new(x, y, z), None, None, false)
            }
            ClientPacket::PlayerPositionRotation { x, y, z, yaw, pitch, .. } => {
                self.apply_move(Vec3d::new(x, y, z), Some(yaw), Some(pitch), true)
            }
            ClientPacket::PlayerRotation { yaw, pitch, .. } => {
                let pos = self.player.lock().expect("player lock poisoned").position;
                self.apply_move(pos, Some(yaw), Some(pitch), true)
            }
            ClientPacket::PlayerMovement { .. } => {
                let pos = self.player.lock().expect("player lock poisoned").position;
                self.apply_move(pos, None, None, false)
            }
            ClientPacket::KeepAlive { .. } => Ok(()),
            ClientPacket::PlayerAbilities { flags, flying_speed, walking_speed } => {
                let mut player = self.player.lock().expect("player lock poisoned");
                player.ability_flags = flags;
                player.flying_speed = flying_speed;
                player.walking_speed = walking_speed;
                Ok(())
            }
            ClientPacket::PlayerDigging { status, location, face } => {
                self.handle_player_digging(status, location, face)
            }
            ClientPacket::EntityAction { entity_id, action_id } => {
                self.handle_entity_action(entity_id, action_id)
            }
            ClientPacket::HeldItemChange { slot } => self.handle_held_item_change(slot),
            ClientPacket::Animation { hand } => self.handle_animation(hand),
            ClientPacket::UseItem { hand } => {
                if hand != 0 && hand != 1 {
                    debug!("ignoring use_item with invalid hand {hand}");
                }
                Ok(())
            }
            ClientPacket::TeleportConfirm { teleport_id } => {
                self.player.lock().expect("player lock poisoned").outstanding_teleport_ids.remove(&teleport_id);
                Ok(())
            }
            ClientPacket::Unknown { id } => {
                debug!("ignoring unhandled play packet id=0x{id:02x}");
                Ok(())
            }
            other => {
                debug!("ignoring play packet {other:?}");
                Ok(())
            }
        }
    }

    fn handle_chat(&self, message: String) -> Result<(), ()> {
        if message.len() > 256 {
            self.disconnect("chat message too long");
            return Err(());
        }
        let username = self
            .player
            .lock()
            .expect("player lock poisoned")
            .profile
            .as_ref()
            .expect("profile set before play")
            .name
            .clone();
        let json = TextComponent::plain(format!("{username} {message}")).to_json();
        for s in self.global.sessions_snapshot() {
            s.send(ServerPacket::Chat { json: json.clone(), position: 0 });
        }
        Ok(())
    }

    fn handle_client_settings_in_play(&self, view_distance: i8) {
        let (old_vd, new_vd) = self.adopt_client_settings(view_distance);
        if old_vd == 0 || old_vd == new_vd {
            return;
        }
        let chunk = self.player.lock().expect("player lock poisoned").chunk();
        self.global.tracker.update_view_distance(chunk, old_vd, new_vd, self.id);

        let old_set: HashSet<_> = chunk.square(old_vd).collect();
        let new_set: HashSet<_> = chunk.square(new_vd).collect();
        for coord in old_set.difference(&new_set) {
            self.send(ServerPacket::UnloadChunk { chunk_x: coord.x, chunk_z: coord.z });
        }
        for coord in new_set.difference(&old_set) {
            self.send_chunk(*coord);
        }
    }

    fn handle_close_window(&self, window_id: u8) -> Result<(), ()> {
        if window_id == 0 {
            return Ok(());
        }
        let mut player = self.player.lock().expect("player lock poisoned");
        if player.open_window != window_id {
            drop(player);
            self.disconnect("close window: unexpected window id");
            return Err(());
        }
        player.open_window = 0;
        Ok(())
    }

    fn apply_move(&self, new_pos: Vec3d, yaw: Option<f32>, pitch: Option<f32>, rotate: bool) -> Result<(), ()> {
        let old_pos = {
            let mut player = self.player.lock().expect("player lock poisoned");
            let old = player.position;
            player.position = new_pos;
            if let Some(yaw) = yaw {
                player.yaw = yaw;
            }
            if let Some(pitch) = pitch {
                player.pitch = pitch;
            }
            old
        };
        self.on_move(old_pos, rotate);
        Ok(())
    }

    fn on_move(&self, old_pos: Vec3d, rotate: bool) {
        let old_chunk = old_pos.chunk_pos();
        let (new_pos, new_chunk, entity_id, yaw, pitch) = {
            let player = self.player.lock().expect("player lock poisoned");
            (player.position, player.chunk(), player.entity_id, player.yaw, player.pitch)
        };

        if new_chunk == old_chunk {
            let subs = self.global.tracker.subscribers(new_chunk);
            let dx = ((new_pos.x - old_pos.x) * 4096.0).round() as i64;
            let dy = ((new_pos.y - old_pos.y) * 4096.0).round() as i64;
            let dz = ((new_pos.z - old_pos.z) * 4096.0).round() as i64;
            let in_range = |v: i64| (-32768..=32767).contains(&v);
            let use_teleport = !(in_range(dx) && in_range(dy) && in_range(dz));

            for peer_id in subs {
                if peer_id == self.id {
                    continue;
                }
                let Some(peer) = self.global.session(peer_id) else { continue };
                if use_teleport {
                    peer.send(ServerPacket::EntityTeleport {
                        entity_id,
                        x: new_pos.x,
                        y: new_pos.y,
                        z: new_pos.z,
                        yaw: angle_to_byte(yaw),
                        pitch: angle_to_byte(pitch),
                        on_ground: true,
                    });
                } else if rotate {
                    peer.send(ServerPacket::EntityMoveRotation {
                        entity_id,
                        dx: dx as i16,
                        dy: dy as i16,
                        dz: dz as i16,
                        yaw: angle_to_byte(yaw),
                        pitch: angle_to_byte(pitch),
                        on_ground: true,
                    });
                } else {
                    peer.send(ServerPacket::EntityMove {
                        entity_id,
                        dx: dx as i16,
                        dy: dy as i16,
                        dz: dz as i16,
                        on_ground: true,
                    });
                }
                if rotate {
                    peer.send(ServerPacket::EntityHeadLook { entity_id, yaw: angle_to_byte(yaw) });
                }
            }
        } else {
            self.on_chunk_transition(old_chunk, new_chunk, rotate);
        }
    }

    fn on_chunk_transition(&self, old_chunk: ChunkCoord, new_chunk: ChunkCoord, rotate: bool) {
        let (vd, entity_id, uuid, position, yaw, pitch) = {
            let player = self.player.lock().expect("player lock poisoned");
            (
                player.view_distance,
                player.entity_id,
                player.profile.as_ref().expect("profile set before play").uuid,
                player.position,
                player.yaw,
                player.pitch,
            )
        };

        let old_square: HashSet<_> = old_chunk.square(vd).collect();
        let new_square: HashSet<_> = new_chunk.square(vd).collect();

        for coord in old_square.difference(&new_square) {
            self.send(ServerPacket::UnloadChunk { chunk_x: coord.x, chunk_z: coord.z });
        }
        for coord in new_square.difference(&old_square) {
            self.send_chunk(*coord);
        }
        self.send(ServerPacket::UpdateViewPosition { chunk_x: new_chunk.x, chunk_z: new_chunk.z });

        let from_subs = self.global.tracker.subscribers(old_chunk);
        let to_subs = self.global.tracker.subscribers(new_chunk);

        self.global.tracker.move_member(old_chunk, new_chunk, self.id);
        let added: Vec<ChunkCoord> = new_square.difference(&old_square).copied().collect();
        let removed: Vec<ChunkCoord> = old_square.difference(&new_square).copied().collect();
        self.global.tracker.unsubscribe(removed, self.id);
        self.global.tracker.subscribe(added, self.id);

        for peer_id in from_subs.intersection(&to_subs) {
            if *peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(*peer_id) {
                peer.send(ServerPacket::EntityTeleport {
                    entity_id,
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    yaw: angle_to_byte(yaw),
                    pitch: angle_to_byte(pitch),
                    on_ground: true,
                });
                if rotate {
                    peer.send(ServerPacket::EntityHeadLook { entity_id, yaw: angle_to_byte(yaw) });
                }
            }
        }
        for peer_id in from_subs.difference(&to_subs) {
            if *peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(*peer_id) {
                peer.send(ServerPacket::DestroyEntities { entity_ids: vec![entity_id] });
            }
        }
        for peer_id in to_subs.difference(&from_subs) {
            if *peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(*peer_id) {
                peer.send(ServerPacket::SpawnPlayer {
                    entity_id,
                    uuid,
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    yaw: angle_to_byte(yaw),
                    pitch: angle_to_byte(pitch),
                });
            }
        }
    }

    fn handle_player_digging(&self, status: i32, location: BlockPos, face: i32) -> Result<(), ()> {
        if !(0..=6).contains(&status) || !(0..=5).contains(&face) {
            self.disconnect("invalid player digging packet");
            return Err(());
        }
        if status != 0 {
            return Ok(());
        }

        let player_pos = self.player.lock().expect("player lock poisoned").position;
        let dx = player_pos.x - location.x as f64;
        let dy = player_pos.y - location.y as f64;
        let dz = player_pos.z - location.z as f64;
        if (dx * dx + dy * dy + dz * dz).sqrt() > 6.0 {
            debug!("digging range exceeded at {location:?}");
        }

        let chunk_coord = location.chunk_pos();
        let chunk = self.global.chunk_store.get_or_create(chunk_coord);
        let (x, y, z) = location.chunk_local();
        let mut state = chunk.lock();
        if blocks::is_air(state.get_block(x, y, z)) {
            return Ok(());
        }
        state.set_block(x, y, z, blocks::AIR);
        drop(state);

        for peer_id in self.global.tracker.subscribers(chunk_coord) {
            if let Some(peer) = self.global.session(peer_id) {
                peer.send(ServerPacket::BlockChange { location, block_id: blocks::AIR as i32 });
            }
        }
        Ok(())
    }

    fn handle_entity_action(&self, entity_id: i32, action_id: i32) -> Result<(), ()> {
        if !(0..=8).contains(&action_id) {
            self.disconnect("invalid entity action id");
            return Err(());
        }
        let my_entity_id = self.player.lock().expect("player lock poisoned").entity_id;
        if entity_id != my_entity_id {
            self.disconnect("entity action for foreign entity");
            return Err(());
        }

        let (crouching, sprinting) = {
            let mut player = self.player.lock().expect("player lock poisoned");
            match action_id {
                0 => {
                    if player.crouching {
                        drop(player);
                        self.disconnect("already crouching");
                        return Err(());
                    }
                    player.crouching = true;
                }
                1 => {
                    if !player.crouching {
                        drop(player);
                        self.disconnect("already standing");
                        return Err(());
                    }
                    player.crouching = false;
                }
                3 => {
                    if player.sprinting {
                        drop(player);
                        self.disconnect("already sprinting");
                        return Err(());
                    }
                    player.sprinting = true;
                }
                4 => {
                    if !player.sprinting {
                        drop(player);
                        self.disconnect("already not sprinting");
                        return Err(());
                    }
                    player.sprinting = false;
                }
                // 2, 5, 6, 7, 8 (leave bed, horse jump start/stop, open horse
                // inventory, elytra) are silently unimplemented no-ops.
                _ => return Ok(()),
            }
            (player.crouching, player.sprinting)
        };

        let (entity_id, chunk) = {
            let player = self.player.lock().expect("player lock poisoned");
            (player.entity_id, player.chunk())
        };
        let metadata = encode_metadata(&[entity_flags_entry(crouching, sprinting), pose_entry(crouching)]);
        for peer_id in self.global.tracker.subscribers(chunk) {
            if peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(peer_id) {
                peer.send(ServerPacket::EntityMetadata { entity_id, metadata: metadata.clone() });
            }
        }
        Ok(())
    }

    fn handle_held_item_change(&self, slot: i16) -> Result<(), ()> {
        if !(0..=8).contains(&slot) {
            self.disconnect("invalid held item slot");
            return Err(());
        }
        self.player.lock().expect("player lock poisoned").held_item_slot = slot;
        Ok(())
    }

    fn handle_animation(&self, hand: i32) -> Result<(), ()> {
        if hand != 0 && hand != 1 {
            self.disconnect("invalid animation hand");
            return Err(());
        }
        let (entity_id, chunk) = {
            let player = self.player.lock().expect("player lock poisoned");
            (player.entity_id, player.chunk())
        };
        let animation_id = if hand == 0 { 0 } else { 3 };
        for peer_id in self.global.tracker.subscribers(chunk) {
            if peer_id == self.id {
                continue;
            }
            if let Some(peer) = self.global.session(peer_id) {
                peer.send(ServerPacket::EntityAnimation { entity_id, animation_id });
            }
        }
        Ok(())
    }

    fn send_chunk(&self, coord: ChunkCoord) {
        let chunk = self.global.chunk_store.get_or_create(coord);
        let state = chunk.lock();
        let primary_bitmask = state.primary_bitmask();
        let heightmap_nbt = state.encode_heightmap_nbt();
        let section_data = state.encode_sections();
        let biomes = state.biomes_flat();
        drop(state);
        self.send(ServerPacket::ChunkData {
            chunk_x: coord.x,
            chunk_z: coord.z,
            primary_bitmask,
            heightmap_nbt,
            section_data,
            biomes,
        });
    }
}

/// Degrees to the protocol's single-byte angle representation
/// (`256` steps per full turn).
fn angle_to_byte(degrees: f32) -> u8 {
    (degrees.rem_euclid(360.0) * 256.0 / 360.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use tokio::net::{TcpListener, TcpStream};
    use voxeld_protocol::connection::Connection;

    use crate::config::ServerConfig;

    /// A real loopback socket pair — `ConnectionWriter` has no constructor
    /// independent of an accepted `TcpStream`. The client half is returned
    /// purely to keep the socket open for the caller's scope.
    async fn loopback_writer() -> (ConnectionWriter, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Connection::new(server).writer, client)
    }

    fn handshake_payload(version: i32, next_state: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec::write_varint(&mut buf, version);
        codec::write_string(&mut buf, "localhost");
        buf.put_u16(25565);
        codec::write_varint(&mut buf, next_state);
        buf.to_vec()
    }

    fn login_start_payload(name: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec::write_string(&mut buf, name);
        buf.to_vec()
    }

    fn client_settings_payload(view_distance: i8) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec::write_string(&mut buf, "en_US");
        buf.put_i8(view_distance);
        buf.to_vec()
    }

    fn teleport_confirm_payload(id: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec::write_varint(&mut buf, id);
        buf.to_vec()
    }

    #[tokio::test]
    async fn handshake_with_wrong_version_disconnects() {
        let global = GlobalState::new(ServerConfig::default());
        let (writer, _client) = loopback_writer().await;
        let session = Session::new(global.next_connection_id(), global.clone(), writer);

        let result = session.handle_frame(wire_ids::handshake::HANDSHAKE, &handshake_payload(1, 2));
        assert!(result.is_err());
        assert_eq!(session.phase(), Phase::Initial);
    }

    #[tokio::test]
    async fn full_login_sequence_reaches_play_and_registers_membership() {
        let global = GlobalState::new(ServerConfig::default());
        let (writer, _client) = loopback_writer().await;
        let session = Session::new(global.next_connection_id(), global.clone(), writer);
        global.register_session(session.clone());

        session.handle_frame(wire_ids::handshake::HANDSHAKE, &handshake_payload(498, 2)).unwrap();
        assert_eq!(session.phase(), Phase::Login);

        session
            .handle_frame(wire_ids::login::serverbound::LOGIN_START, &login_start_payload("alice"))
            .unwrap();
        assert_eq!(session.phase(), Phase::PlayInit);

        session
            .handle_frame(wire_ids::play::serverbound::CLIENT_SETTINGS, &client_settings_payload(6))
            .unwrap();
        assert_eq!(session.player.lock().unwrap().view_distance, 6);

        let teleport_id = *session.player.lock().unwrap().outstanding_teleport_ids.iter().next().unwrap();
        session
            .handle_frame(wire_ids::play::serverbound::TELEPORT_CONFIRM, &teleport_confirm_payload(teleport_id))
            .unwrap();

        assert_eq!(session.phase(), Phase::Play);
        let chunk = session.player.lock().unwrap().chunk();
        assert!(global.tracker.members(chunk).contains(&session.id));
    }

    #[tokio::test]
    async fn unknown_teleport_id_disconnects() {
        let global = GlobalState::new(ServerConfig::default());
        let (writer, _client) = loopback_writer().await;
        let session = Session::new(global.next_connection_id(), global.clone(), writer);

        session.handle_frame(wire_ids::handshake::HANDSHAKE, &handshake_payload(498, 2)).unwrap();
        session
            .handle_frame(wire_ids::login::serverbound::LOGIN_START, &login_start_payload("bob"))
            .unwrap();
        session
            .handle_frame(wire_ids::play::serverbound::CLIENT_SETTINGS, &client_settings_payload(4))
            .unwrap();

        let result = session.handle_frame(
            wire_ids::play::serverbound::TELEPORT_CONFIRM,
            &teleport_confirm_payload(999),
        );
        assert!(result.is_err());
        assert_eq!(session.phase(), Phase::PlayInit);
    }

    #[tokio::test]
    async fn entity_action_rejects_duplicate_crouch() {
        let global = GlobalState::new(ServerConfig::default());
        let (writer, _client) = loopback_writer().await;
        let session = Session::new(global.next_connection_id(), global.clone(), writer);
        {
            let mut player = session.player.lock().unwrap();
            player.entity_id = 42;
            player.profile = Some(GameProfile::new("carol"));
        }
        session.set_phase(Phase::Play);

        assert!(session.handle_entity_action(42, 0).is_ok());
        assert!(session.player.lock().unwrap().crouching);
        assert!(session.handle_entity_action(42, 0).is_err());
    }

    #[tokio::test]
    async fn entity_action_unimplemented_ids_are_ok_noop() {
        let global = GlobalState::new(ServerConfig::default());
        let (writer, _client) = loopback_writer().await;
        let session = Session::new(global.next_connection_id(), global.clone(), writer);
        {
            let mut player = session.player.lock().unwrap();
            player.entity_id = 7;
            player.profile = Some(GameProfile::new("dave"));
        }
        session.set_phase(Phase::Play);

        assert!(session.handle_entity_action(7, 5).is_ok());
        assert!(!session.player.lock().unwrap().crouching);
    }
}
