//! Wire id constants for protocol 498, grouped by phase/direction.

pub mod handshake {
    pub const HANDSHAKE: i32 = 0x00;
}

pub mod login {
    pub mod serverbound {
        pub const LOGIN_START: i32 = 0x00;
    }
    pub mod clientbound {
        pub const DISCONNECT: i32 = 0x00;
        pub const LOGIN_SUCCESS: i32 = 0x02;
    }
}

pub mod play {
    pub mod serverbound {
        pub const TELEPORT_CONFIRM: i32 = 0x00;
        pub const CHAT_MESSAGE: i32 = 0x03;
        pub const CLIENT_SETTINGS: i32 = 0x05;
        pub const CLOSE_WINDOW: i32 = 0x0A;
        pub const PLUGIN_MESSAGE: i32 = 0x0B;
        pub const INTERACT_ENTITY: i32 = 0x0E;
        pub const KEEP_ALIVE: i32 = 0x10;
        pub const PLAYER_POSITION: i32 = 0x12;
        pub const PLAYER_POSITION_ROTATION: i32 = 0x13;
        pub const PLAYER_ROTATION: i32 = 0x14;
        pub const PLAYER_MOVEMENT: i32 = 0x15;
        pub const PLAYER_ABILITIES: i32 = 0x1A;
        pub const PLAYER_DIGGING: i32 = 0x1B;
        pub const ENTITY_ACTION: i32 = 0x1C;
        pub const HELD_ITEM_CHANGE: i32 = 0x25;
        pub const ANIMATION: i32 = 0x2B;
        pub const USE_ITEM: i32 = 0x2E;
    }

    pub mod clientbound {
        pub const SPAWN_PLAYER: i32 = 0x05;
        pub const ENTITY_ANIMATION: i32 = 0x06;
        pub const BLOCK_CHANGE: i32 = 0x0B;
        pub const CHAT: i32 = 0x0E;
        pub const PLUGIN_MESSAGE: i32 = 0x18;
        pub const DISCONNECT: i32 = 0x1A;
        pub const UNLOAD_CHUNK: i32 = 0x1D;
        pub const KEEP_ALIVE: i32 = 0x20;
        pub const CHUNK_DATA: i32 = 0x21;
        pub const JOIN_GAME: i32 = 0x25;
        pub const ENTITY_MOVE: i32 = 0x28;
        pub const ENTITY_MOVE_ROTATION: i32 = 0x29;
        pub const ENTITY_ROTATION: i32 = 0x2A;
        pub const PLAYER_ABILITIES: i32 = 0x31;
        pub const PLAYER_INFO: i32 = 0x33;
        pub const PLAYER_POSITION_LOOK: i32 = 0x35;
        pub const DESTROY_ENTITIES: i32 = 0x37;
        pub const ENTITY_HEAD_LOOK: i32 = 0x3B;
        pub const HELD_ITEM_CHANGE: i32 = 0x3F;
        pub const UPDATE_VIEW_POSITION: i32 = 0x40;
        pub const SPAWN_POSITION: i32 = 0x42;
        pub const ENTITY_METADATA: i32 = 0x44;
        pub const ENTITY_TELEPORT: i32 = 0x56;
    }
}
