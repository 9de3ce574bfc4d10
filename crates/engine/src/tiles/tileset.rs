use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::properties::Properties;
use crate::render::{ImageHandle, TileTransform};
use crate::tiles::{Tile, TileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileSetId(pub u32);

/// Everything needed to register a tileset; the image itself stays with the
/// render backend.
#[derive(Debug, Clone, Default)]
pub struct TileSetDef {
    pub name: String,
    pub first_gid: u32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub tile_count: u32,
    pub properties: Properties,
    pub tile_properties: BTreeMap<u32, Properties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileSetError {
    #[error("tileset '{name}' has zero tile size {width}x{height}")]
    ZeroTileSize {
        name: String,
        width: i32,
        height: i32,
    },
    #[error("tileset '{name}' must start at gid 1 or above")]
    ZeroFirstGid { name: String },
    #[error("tileset '{name}' first gid {first_gid} overlaps a previous tileset")]
    OverlappingGids { name: String, first_gid: u32 },
}

#[derive(Debug, Clone)]
pub struct TileSet {
    id: TileSetId,
    name: String,
    first_gid: u32,
    tile_width: i32,
    tile_height: i32,
    gid_count: u32,
    /// Local id -> map-wide tile id. Synthesized tiles are appended past `gid_count`.
    tiles: Vec<TileId>,
    properties: Properties,
}

impl TileSet {
    pub fn id(&self) -> TileSetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_gid(&self) -> u32 {
        self.first_gid
    }

    pub fn tile_size(&self) -> (i32, i32) {
        (self.tile_width, self.tile_height)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    fn owns_gid(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid - self.first_gid < self.gid_count
    }
}

/// All tilesets of a map plus the flat tile table they share.
#[derive(Debug, Clone, Default)]
pub struct TileSets {
    sets: Vec<TileSet>,
    tiles: Vec<Tile>,
    animated: Vec<TileId>,
}

impl TileSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tileset(&mut self, def: &TileSetDef) -> Result<TileSetId, TileSetError> {
        if def.tile_width <= 0 || def.tile_height <= 0 {
            return Err(TileSetError::ZeroTileSize {
                name: def.name.clone(),
                width: def.tile_width,
                height: def.tile_height,
            });
        }
        if def.first_gid == 0 {
            return Err(TileSetError::ZeroFirstGid {
                name: def.name.clone(),
            });
        }
        let overlaps = self.sets.iter().any(|set| {
            set.owns_gid(def.first_gid)
                || (def.first_gid <= set.first_gid
                    && set.first_gid - def.first_gid < def.tile_count)
        });
        if overlaps {
            return Err(TileSetError::OverlappingGids {
                name: def.name.clone(),
                first_gid: def.first_gid,
            });
        }

        let set_id = TileSetId(self.sets.len() as u32);
        let mut tiles = Vec::with_capacity(def.tile_count as usize);
        for local_id in 0..def.tile_count {
            let tile_id = TileId(self.tiles.len() as u32);
            let properties = def
                .tile_properties
                .get(&local_id)
                .cloned()
                .unwrap_or_default();
            let tile = Tile::new(
                tile_id,
                set_id,
                local_id,
                (def.tile_width, def.tile_height),
                ImageHandle::new(set_id, local_id),
                properties,
            );
            if tile.is_animated() {
                self.animated.push(tile_id);
            }
            self.tiles.push(tile);
            tiles.push(tile_id);
        }

        debug!(
            tileset = %def.name,
            first_gid = def.first_gid,
            tiles = def.tile_count,
            animated = self.animated.len(),
            "tileset_loaded"
        );

        self.sets.push(TileSet {
            id: set_id,
            name: def.name.clone(),
            first_gid: def.first_gid,
            tile_width: def.tile_width,
            tile_height: def.tile_height,
            gid_count: def.tile_count,
            tiles,
            properties: def.properties.clone(),
        });
        self.sets.sort_by_key(|set| set.first_gid);
        Ok(set_id)
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize)
    }

    pub fn tileset(&self, id: TileSetId) -> Option<&TileSet> {
        self.sets.iter().find(|set| set.id == id)
    }

    pub fn tilesets(&self) -> impl Iterator<Item = &TileSet> {
        self.sets.iter()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Maps a global id as stored in map data (without flip bits) to a tile.
    pub fn resolve_gid(&self, gid: u32) -> Option<TileId> {
        let set = self.sets.iter().rev().find(|set| set.first_gid <= gid)?;
        if !set.owns_gid(gid) {
            return None;
        }
        set.tiles.get((gid - set.first_gid) as usize).copied()
    }

    pub fn local_tile(&self, set: TileSetId, local_id: u32) -> Option<TileId> {
        self.tileset(set)?.tiles.get(local_id as usize).copied()
    }

    /// Registers a transformed copy of `source` in the same tileset and
    /// returns its id.
    pub fn add_tile_from_tile(
        &mut self,
        source: TileId,
        transform: TileTransform,
    ) -> Option<TileId> {
        let source_tile = self.tiles.get(source.0 as usize)?;
        let set_index = self
            .sets
            .iter()
            .position(|set| set.id == source_tile.tileset())?;
        let id = TileId(self.tiles.len() as u32);
        let local_id = self.sets[set_index].tiles.len() as u32;
        let image = source_tile.original_image().with_transform(transform);
        let tile = source_tile.derive(id, local_id, image);

        if tile.is_animated() {
            self.animated.push(id);
        }
        self.tiles.push(tile);
        self.sets[set_index].tiles.push(id);
        Some(id)
    }

    /// Ticks every animated tile once.
    pub fn update(&mut self) {
        for id in &self.animated {
            if let Some(tile) = self.tiles.get_mut(id.0 as usize) {
                tile.update();
            }
        }
    }
}
