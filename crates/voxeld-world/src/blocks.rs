//! Block-id table: a minimal constant lookup keyed by symbolic name. Values
//! are protocol 498 (1.14.x) global palette block state ids for the default
//! variant of each block.

pub const AIR: u16 = 0;
pub const STONE: u16 = 1;
pub const GRASS_BLOCK: u16 = 9;
pub const DIRT: u16 = 10;
pub const BEDROCK: u16 = 33;

pub fn is_air(id: u16) -> bool {
    id == AIR
}
