pub mod collision_cache;
pub mod description;
pub mod effects;
pub mod fixed;
pub mod geometry;
pub mod layers;
pub mod loader;
pub mod map;
pub mod objects;
pub mod path;
pub mod properties;
pub mod quadtree;
pub mod render;
pub mod tiles;

#[cfg(test)]
mod test_support;

pub use collision_cache::{
    ActorCollision, Collision, CollisionCache, CollisionCacheConfig, CollisionSource,
    CollisionTarget,
};
pub use description::{
    DescriptionError, LayerDescription, MapDescription, ObjectDescription, TileSetDescription,
};
pub use effects::{Effect, EffectStatus, EffectsLayer, SlidingTileEffect, SLIDING_TILE_TICKS};
pub use fixed::{Fixed, FixedPoint2, FIXED_SHIFT};
pub use geometry::Rect;
pub use layers::{
    ActorsLayer, ArrayLayer, ArrayLayerError, Layer, LayerConfig, LayerContent, LayerId,
    ObjectGroupKind, PlatformsLayer, TileRef, TriggersLayer,
};
pub use loader::{
    load_array_layer, load_path, load_platform, load_trigger, load_triggered, MapLoadError,
    MapLoader,
};
pub use map::{Map, MapConfig, MapEvent};
pub use objects::{
    Actor, ActorBody, ActorContext, ActorFactory, ActorHandle, ActorMessage, ActorRegistry,
    ActorSpawn, ActorStatus, CameraPan, ObjectWithPath, PlatformConfig, PlatformState,
    PlatformStep, PlatformTile, TileActor, Trigger, TriggerConfig, TriggerSound, TriggerState,
    Triggered, TriggeredAction, TriggeredConfig, PAN_SLEEP_TICKS, PAN_STEPS,
};
pub use path::{Path, PathConfig, PathCursor, PathSegment};
pub use properties::{Properties, PropertyError};
pub use quadtree::QuadTree;
pub use render::{ImageHandle, RenderSink, TileTransform};
pub use tiles::{Tile, TileConfig, TileId, TileSet, TileSetDef, TileSetError, TileSetId, TileSets};
