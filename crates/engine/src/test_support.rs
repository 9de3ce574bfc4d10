use std::collections::BTreeMap;

use crate::effects::{Effect, EffectStatus};
use crate::geometry::Rect;
use crate::layers::{
    ActorsLayer, ArrayLayer, LayerConfig, LayerContent, LayerId, PlatformsLayer, TriggersLayer,
};
use crate::map::{Map, MapConfig};
use crate::objects::{ActorHandle, ActorSpawn, TileActor};
use crate::properties::Properties;
use crate::render::{ImageHandle, RenderSink};
use crate::tiles::{TileId, TileSetDef, TileSetId, TileSets};

pub(crate) const TILE: i32 = 16;

/// One 16x16 tileset of 32 plain tiles, local id `n` being `TileId(n)`.
pub(crate) fn tilesets(tile_properties: BTreeMap<u32, Properties>) -> TileSets {
    let mut tilesets = TileSets::new();
    tilesets
        .add_tileset(&TileSetDef {
            name: "ground".to_string(),
            first_gid: 1,
            tile_width: TILE,
            tile_height: TILE,
            tile_count: 32,
            tile_properties,
            ..TileSetDef::default()
        })
        .expect("tileset");
    tilesets
}

/// A `width` x `height` map with one collision tiles layer named "ground"
/// holding `cells` as `((column, row), tile)`.
pub(crate) fn map_with_ground(width: u32, height: u32, cells: &[((i32, i32), u32)]) -> (Map, LayerId) {
    let mut map = Map::new(
        "test",
        (width, height),
        (TILE, TILE),
        tilesets(BTreeMap::new()),
        MapConfig::default(),
    );
    let mut ground = ArrayLayer::empty(width, height, (TILE, TILE));
    for &((column, row), tile) in cells {
        assert!(ground.set_cell(column, row, Some(TileId(tile))));
    }
    let id = map.add_layer(
        "ground",
        LayerConfig::default(),
        Properties::new(),
        LayerContent::Array(ground),
    );
    (map, id)
}

pub(crate) fn add_platforms(map: &mut Map, tiles_layer: Option<LayerId>) -> LayerId {
    map.add_layer(
        "platforms",
        LayerConfig::default(),
        Properties::new(),
        LayerContent::Platforms(PlatformsLayer::new(tiles_layer)),
    )
}

pub(crate) fn add_triggers(map: &mut Map, linked: LayerId) -> LayerId {
    let config = LayerConfig {
        group: crate::layers::ObjectGroupKind::Triggers,
        ..LayerConfig::default()
    };
    map.add_layer(
        "triggers",
        config,
        Properties::new(),
        LayerContent::Triggers(TriggersLayer::new(Some(linked))),
    )
}

pub(crate) fn add_actors(map: &mut Map) -> LayerId {
    let id = map.next_layer_id();
    let config = LayerConfig {
        actors: true,
        ..LayerConfig::default()
    };
    let boundary = map.boundary();
    map.add_layer(
        "actors",
        config,
        Properties::new(),
        LayerContent::Actors(ActorsLayer::new(id, boundary)),
    )
}

pub(crate) fn actor_spawn(map: &Map, rect: Rect) -> ActorSpawn {
    ActorSpawn {
        actor_type: "block".to_string(),
        tile: TileId(0),
        position: (rect.x, rect.y),
        collision: Rect::new(0, 0, rect.width, rect.height),
        image: ImageHandle::new(TileSetId(0), 0),
        boundary: map.boundary(),
        properties: Properties::new(),
    }
}

pub(crate) fn spawn(map: &mut Map, layer: LayerId, rect: Rect) -> ActorHandle {
    let spawn = actor_spawn(map, rect);
    map.spawn_actor(layer, TileActor::spawn(&spawn))
        .expect("actors layer")
}

/// Effect that finishes after a fixed number of updates.
#[derive(Debug)]
pub(crate) struct CountdownEffect {
    pub remaining: u32,
}

impl Effect for CountdownEffect {
    fn update(&mut self, _map: &mut Map) -> EffectStatus {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            EffectStatus::Finished
        } else {
            EffectStatus::Running
        }
    }

    fn draw(&self, _sink: &mut dyn RenderSink, _visible: &Rect) {}
}
