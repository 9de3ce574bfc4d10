use tracing::trace;

use crate::collision_cache::{CollisionCache, CollisionCacheConfig};
use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::map::Map;
use crate::objects::{ActorHandle, ActorMessage};
use crate::path::Path;
use crate::properties::{Properties, PropertyError};
use crate::render::{ImageHandle, RenderSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub path: Option<String>,
    /// Actors standing on top are carried horizontally.
    pub sticky: bool,
    pub stopped: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            path: None,
            sticky: true,
            stopped: false,
        }
    }
}

impl PlatformConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, PropertyError> {
        Ok(Self {
            path: properties.get("path").map(str::to_string),
            sticky: properties.flag("sticky", true),
            stopped: properties.flag("stopped", false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    Stopped,
    Moving,
}

/// One tile of the platform image, relative to the platform's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTile {
    pub offset: (i32, i32),
    pub image: ImageHandle,
}

/// Result of a tentative path step, kept so the step can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformStep {
    pub previous: Rect,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// Moving platform: a block of tiles following a path. Without a path it is
/// a static solid object.
#[derive(Debug, Clone)]
pub struct ObjectWithPath {
    name: Option<String>,
    rect: Rect,
    path: Option<Path>,
    tiles: Vec<PlatformTile>,
    sticky: bool,
    state: PlatformState,
    cache: Option<CollisionCache>,
}

impl ObjectWithPath {
    pub fn new(
        name: Option<String>,
        rect: Rect,
        tiles: Vec<PlatformTile>,
        config: &PlatformConfig,
        cache: CollisionCacheConfig,
    ) -> Self {
        Self {
            name,
            rect,
            path: None,
            tiles,
            sticky: config.sticky,
            state: if config.stopped {
                PlatformState::Stopped
            } else {
                PlatformState::Moving
            },
            cache: Some(CollisionCache::new(cache)),
        }
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn path_mut(&mut self) -> Option<&mut Path> {
        self.path.as_mut()
    }

    pub fn tiles(&self) -> &[PlatformTile] {
        &self.tiles
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky
    }

    pub fn state(&self) -> PlatformState {
        self.state
    }

    pub fn start(&mut self) {
        self.state = PlatformState::Moving;
    }

    pub fn stop(&mut self) {
        self.state = PlatformState::Stopped;
    }

    /// Takes one tentative step along the path. `None` when the platform is
    /// static or stopped.
    pub fn advance(&mut self) -> Option<PlatformStep> {
        if self.state == PlatformState::Stopped {
            return None;
        }
        let path = self.path.as_mut()?;
        path.save();
        let (x, y) = path.iterate()?;
        let previous = self.rect;
        self.rect = self.rect.with_position(x, y);
        Some(PlatformStep {
            previous,
            x_offset: x - previous.x,
            y_offset: y - previous.y,
        })
    }

    /// Undoes the step returned by the last `advance`.
    pub fn revert(&mut self, step: &PlatformStep) {
        if let Some(path) = self.path.as_mut() {
            path.restore();
        }
        self.rect = step.previous;
    }

    pub(crate) fn take_cache(&mut self) -> Option<CollisionCache> {
        self.cache.take()
    }

    pub(crate) fn restore_cache(&mut self, cache: CollisionCache) {
        self.cache = Some(cache);
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect) {
        if !self.rect.intersects(visible) {
            return;
        }
        let origin_x = self.rect.x - visible.x;
        let origin_y = self.rect.y - visible.y;
        for tile in &self.tiles {
            sink.blit(
                tile.image,
                (origin_x + tile.offset.0, origin_y + tile.offset.1),
                None,
                None,
            );
        }
    }
}

/// Moves platform `index` of `layer` one step and resolves its riders.
///
/// Any actor overlapping the new position cancels a downward or sideways
/// step. On an upward step overlapping actors are lifted with it; if a lifted
/// actor then hits something, every lift and the step itself are undone.
/// A sticky platform that kept a horizontal step carries the actors standing
/// on its top edge.
pub(crate) fn update_platform(map: &mut Map, layer: LayerId, index: usize) {
    let Some(platform) = map.platform_mut(layer, index) else {
        return;
    };
    let Some(step) = platform.advance() else {
        return;
    };
    let Some(mut cache) = platform.take_cache() else {
        return;
    };
    let rect = platform.rect();
    let sticky = platform.is_sticky();

    let overlapping = cache.actor_collisions(&rect, &rect, &*map);
    let pushes = step.y_offset > 0 || step.x_offset != 0;
    let mut lifted: Vec<(ActorHandle, Rect)> = Vec::new();
    let mut rejected = false;

    for rider in &overlapping {
        if pushes {
            rejected = true;
            break;
        }
        let Some(before) = map.actor_rect(rider.actor) else {
            continue;
        };
        map.move_actor(rider.actor, 0, step.y_offset);
        lifted.push((rider.actor, before));
        if map.actor_blocked(rider.actor) {
            rejected = true;
            break;
        }
    }

    if rejected {
        for (actor, before) in lifted.into_iter().rev() {
            map.set_actor_rect(actor, before);
        }
        if let Some(platform) = map.platform_mut(layer, index) {
            platform.revert(&step);
        }
        trace!(layer = layer.0, platform = index, "platform_step_rejected");
    } else if sticky && step.x_offset != 0 {
        let top = Rect::new(rect.x, rect.y - 2, rect.width, rect.height + 2);
        for rider in cache.actor_collisions(&rect, &top, &*map) {
            map.move_actor(rider.actor, step.x_offset, 0);
            map.notify_actor(rider.actor, ActorMessage::Moved);
        }
    }

    if let Some(platform) = map.platform_mut(layer, index) {
        platform.restore_cache(cache);
    }
}
