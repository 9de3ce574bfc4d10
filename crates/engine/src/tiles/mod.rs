mod tile;
mod tileset;

pub use tile::{Tile, TileConfig, TileId};
pub use tileset::{TileSet, TileSetDef, TileSetError, TileSetId, TileSets};
