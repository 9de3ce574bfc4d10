use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::collision_cache::CollisionCache;
use crate::description::{LayerDescription, MapDescription, ObjectDescription};
use crate::geometry::Rect;
use crate::layers::{
    ActorsLayer, ArrayLayer, ArrayLayerError, LayerConfig, LayerContent, LayerId,
    ObjectGroupKind, PlatformsLayer, TriggersLayer,
};
use crate::map::{Map, MapConfig};
use crate::objects::{
    ActorRegistry, ActorSpawn, ObjectWithPath, PlatformConfig, PlatformTile, Trigger,
    TriggerConfig, Triggered, TriggeredConfig,
};
use crate::path::Path;
use crate::properties::{Properties, PropertyError};
use crate::tiles::{TileId, TileSetError, TileSets};

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("map '{map}' has invalid tile size {width}x{height}")]
    ZeroTileSize {
        map: String,
        width: i32,
        height: i32,
    },
    #[error(transparent)]
    TileSet(#[from] TileSetError),
    #[error("layer '{layer}' is malformed: {source}")]
    Layer {
        layer: String,
        #[source]
        source: ArrayLayerError,
    },
}

/// Builds a `Map` from a parsed description.
///
/// Bad object data never aborts a load: the object is logged and dropped, or
/// loaded with defaults. Only malformed grids and tile sizes are fatal.
#[derive(Debug, Clone, Default)]
pub struct MapLoader {
    registry: ActorRegistry,
    config: MapConfig,
}

impl MapLoader {
    pub fn new(registry: ActorRegistry) -> Self {
        Self {
            registry,
            config: MapConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn load(&self, description: &MapDescription) -> Result<Map, MapLoadError> {
        let tile_size = (description.tile_width, description.tile_height);
        if tile_size.0 <= 0 || tile_size.1 <= 0 {
            return Err(MapLoadError::ZeroTileSize {
                map: description.name.clone(),
                width: tile_size.0,
                height: tile_size.1,
            });
        }

        let mut tilesets = TileSets::new();
        for tileset in &description.tilesets {
            tilesets.add_tileset(&tileset.to_def())?;
        }

        let mut map = Map::new(
            &description.name,
            (description.width, description.height),
            tile_size,
            tilesets,
            self.config,
        )
        .with_properties(description.properties.clone());

        for layer in &description.layers {
            let config = layer_config(layer.name(), layer.properties());
            match layer {
                LayerDescription::Tiles {
                    name,
                    width,
                    height,
                    properties,
                    data,
                } => {
                    let tiles =
                        load_array_layer(*width, *height, tile_size, data, map.tilesets_mut())
                            .map_err(|source| MapLoadError::Layer {
                                layer: name.clone(),
                                source,
                            })?;
                    let content = if config.actors {
                        LayerContent::Actors(self.spawn_actors(&map, name, &tiles))
                    } else {
                        LayerContent::Array(tiles)
                    };
                    map.add_layer(name, config, properties.clone(), content);
                }
                LayerDescription::Objects {
                    name,
                    properties,
                    objects,
                } => {
                    let linked = linked_layer(&map, name, &config);
                    let content = match config.group {
                        ObjectGroupKind::Platforms => LayerContent::Platforms(load_platforms_layer(
                            &mut map, name, linked, objects,
                        )),
                        ObjectGroupKind::Triggers => LayerContent::Triggers(load_triggers_layer(
                            &map, name, linked, objects,
                        )),
                    };
                    map.add_layer(name, config, properties.clone(), content);
                }
            }
        }

        info!(
            map = %description.name,
            layers = map.layers().len(),
            tiles = map.tilesets().tile_count(),
            actors = map.actors().count(),
            "map_loaded"
        );
        Ok(map)
    }

    /// Turns every tile of an actors layer into an actor chosen by the tile's
    /// `type` property.
    fn spawn_actors(&self, map: &Map, layer: &str, tiles: &ArrayLayer) -> ActorsLayer {
        let id = map.next_layer_id();
        let boundary = map.boundary();
        let mut actors = ActorsLayer::new(id, boundary);

        for (x, y, tile_id) in tiles.tiles() {
            let Some(tile) = map.tilesets().tile(tile_id) else {
                continue;
            };
            let Some(actor_type) = tile.kind() else {
                warn!(layer = %layer, x, y, "actor_type_missing");
                continue;
            };
            let spawn = ActorSpawn {
                actor_type: actor_type.to_string(),
                tile: tile_id,
                position: (x, y),
                collision: tile.config().collision,
                image: tile.image(),
                boundary,
                properties: tile.properties().clone(),
            };
            match self.registry.create(&spawn) {
                Some(actor) => {
                    actors.spawn(actor, CollisionCache::new(map.config().actor_cache));
                }
                None => warn!(layer = %layer, actor = %actor_type, x, y, "actor_type_unknown"),
            }
        }
        debug!(layer = %layer, actors = actors.len(), "actors_spawned");
        actors
    }
}

impl Map {
    /// Loads a description without actor types: actor tiles are skipped.
    pub fn from_description(description: &MapDescription) -> Result<Map, MapLoadError> {
        MapLoader::default().load(description)
    }
}

fn layer_config(layer: &str, properties: &Properties) -> LayerConfig {
    LayerConfig::from_properties(properties).unwrap_or_else(|error| {
        warn!(layer = %layer, error = %error, "layer_properties_invalid");
        LayerConfig::default()
    })
}

fn linked_layer(map: &Map, layer: &str, config: &LayerConfig) -> Option<LayerId> {
    let name = config.linked_layer.as_deref()?;
    let id = map.layer_by_name(name);
    if id.is_none() {
        warn!(layer = %layer, linked = %name, "linked_layer_missing");
    }
    id
}

/// Decodes a tile grid; flipped ids become synthesized tiles.
pub fn load_array_layer(
    width: u32,
    height: u32,
    tile_size: (i32, i32),
    cells: &[u32],
    tilesets: &mut TileSets,
) -> Result<ArrayLayer, ArrayLayerError> {
    ArrayLayer::load(width, height, tile_size, cells, tilesets)
}

/// Path through `points` (map coordinates); speed from the `step` property.
pub fn load_path(points: &[(i32, i32)], properties: &Properties) -> Path {
    Path::from_properties(points, properties).unwrap_or_else(|error| {
        warn!(error = %error, "path_properties_invalid");
        Path::from_points(points, 1)
    })
}

/// A platform resolving its `path` property among `layer`'s paths. An
/// unknown path leaves the platform static.
pub fn load_platform(
    name: Option<&str>,
    rect: Rect,
    tiles: Vec<PlatformTile>,
    properties: &Properties,
    layer: &PlatformsLayer,
    map_config: &MapConfig,
) -> ObjectWithPath {
    let config = PlatformConfig::from_properties(properties).unwrap_or_else(|error| {
        warn!(platform = ?name, error = %error, "platform_properties_invalid");
        PlatformConfig::default()
    });
    let platform = ObjectWithPath::new(
        name.map(str::to_string),
        rect,
        tiles,
        &config,
        map_config.platform_cache,
    );
    let Some(path_name) = config.path.as_deref() else {
        return platform;
    };
    match layer.path(path_name) {
        Some(path) => platform.with_path(path.clone()),
        None => {
            error!(platform = ?name, path = %path_name, "platform_path_missing");
            platform
        }
    }
}

pub fn load_trigger(
    name: &str,
    rect: Rect,
    properties: &Properties,
    tile_on_fire: impl FnOnce(u32) -> Option<TileId>,
) -> Result<Trigger, PropertyError> {
    let config = TriggerConfig::from_properties(properties)?;
    let tile = config.tile_on_trigger.and_then(tile_on_fire);
    Ok(Trigger::new(name.to_string(), rect, config, tile))
}

/// A triggered plus the name of the trigger it hangs from.
pub fn load_triggered(
    name: &str,
    rect: Rect,
    properties: &Properties,
    resolve_layer: impl FnOnce(&str) -> Option<LayerId>,
) -> Result<(String, Triggered), PropertyError> {
    let config = TriggeredConfig::from_properties(properties)?;
    let target = match config.layer.as_deref() {
        Some(layer) => {
            let target = resolve_layer(layer);
            if target.is_none() {
                warn!(triggered = %name, layer = %layer, "triggered_layer_missing");
            }
            target
        }
        None => None,
    };
    Ok((
        config.trigger,
        Triggered::new(name.to_string(), rect, config.action, target),
    ))
}

fn object_name(object: &ObjectDescription, kind: &str, index: usize) -> String {
    object
        .name
        .clone()
        .unwrap_or_else(|| format!("{kind}_{index}"))
}

/// Paths first, then platforms, so platforms may name paths declared after
/// them.
fn load_platforms_layer(
    map: &mut Map,
    layer: &str,
    tiles_layer: Option<LayerId>,
    objects: &[ObjectDescription],
) -> PlatformsLayer {
    let mut platforms = PlatformsLayer::new(tiles_layer);

    for object in objects.iter().filter(|object| object.is_path()) {
        let Some(name) = object.name.as_deref() else {
            warn!(layer = %layer, x = object.x, y = object.y, "path_unnamed");
            continue;
        };
        platforms.add_path(name, load_path(&object.points(), &object.properties));
    }

    for object in objects.iter().filter(|object| !object.is_path()) {
        let Some(tiles_layer) = tiles_layer else {
            error!(layer = %layer, platform = ?object.name, "platform_tiles_layer_missing");
            continue;
        };
        let tiles = take_platform_tiles(map, tiles_layer, object.rect());
        let platform = load_platform(
            object.name.as_deref(),
            object.rect(),
            tiles,
            &object.properties,
            &platforms,
            map.config(),
        );
        platforms.add_platform(platform);
    }

    debug!(
        layer = %layer,
        paths = platforms.path_names().count(),
        platforms = platforms.len(),
        "platforms_layer_loaded"
    );
    platforms
}

/// Moves the tiles under `rect` out of the tiles layer and into a platform
/// image.
fn take_platform_tiles(map: &mut Map, tiles_layer: LayerId, rect: Rect) -> Vec<PlatformTile> {
    let mut cells = Vec::new();
    if let Some(tiles) = map.layer(tiles_layer).and_then(|layer| layer.as_array()) {
        tiles.for_each_visible(&rect, |x, y, tile| cells.push((x, y, tile)));
    }

    let (tile_width, tile_height) = map.tile_size();
    let mut platform_tiles = Vec::with_capacity(cells.len());
    for (x, y, tile) in cells {
        let Some(image) = map.tilesets().tile(tile).map(|tile| tile.image()) else {
            continue;
        };
        let (px, py) = (x as i32 * tile_width, y as i32 * tile_height);
        if !Rect::new(px, py, tile_width, tile_height).intersects(&rect) {
            continue;
        }
        platform_tiles.push(PlatformTile {
            offset: (px - rect.x, py - rect.y),
            image,
        });
        map.remove_object_at(tiles_layer, px, py);
    }
    platform_tiles
}

/// Triggers first, then triggereds, which attach to their trigger by name.
fn load_triggers_layer(
    map: &Map,
    layer: &str,
    linked: Option<LayerId>,
    objects: &[ObjectDescription],
) -> TriggersLayer {
    let mut triggers = TriggersLayer::new(linked);
    let is_triggered = |object: &ObjectDescription| object.properties.contains("trigger");

    for (index, object) in objects.iter().enumerate() {
        if is_triggered(object) {
            continue;
        }
        let name = object_name(object, "trigger", index);
        let rect = object.rect();
        let tile_on_fire = |local_id| tile_for_trigger(map, linked, rect, local_id);
        match load_trigger(&name, rect, &object.properties, tile_on_fire) {
            Ok(trigger) => {
                triggers.add_trigger(trigger);
            }
            Err(error) => warn!(layer = %layer, trigger = %name, error = %error, "trigger_invalid"),
        }
    }

    for (index, object) in objects.iter().enumerate() {
        if !is_triggered(object) {
            continue;
        }
        let name = object_name(object, "triggered", index);
        let loaded = load_triggered(&name, object.rect(), &object.properties, |layer| {
            map.layer_by_name(layer)
        });
        let (trigger_name, triggered) = match loaded {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(layer = %layer, triggered = %name, error = %error, "triggered_invalid");
                continue;
            }
        };
        let attached = triggers
            .find_trigger(&trigger_name)
            .and_then(|trigger| triggers.add_triggered(trigger, triggered));
        if attached.is_none() {
            warn!(
                layer = %layer,
                triggered = %name,
                trigger = %trigger_name,
                "triggered_trigger_missing"
            );
        }
    }

    debug!(
        layer = %layer,
        triggers = triggers.triggers().len(),
        "triggers_layer_loaded"
    );
    triggers
}

/// Local id resolved in the tileset of the tile under the trigger, or the
/// first tileset when the trigger sits on an empty cell.
fn tile_for_trigger(
    map: &Map,
    linked: Option<LayerId>,
    rect: Rect,
    local_id: u32,
) -> Option<TileId> {
    let tilesets = map.tilesets();
    let set = linked
        .and_then(|layer| map.get_object_at(layer, rect.x, rect.y))
        .and_then(|tile| tilesets.tile(tile))
        .map(|tile| tile.tileset())
        .or_else(|| tilesets.tilesets().next().map(|set| set.id()))?;
    tilesets.local_tile(set, local_id)
}
