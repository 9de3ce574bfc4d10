use std::collections::HashMap;
use std::fmt::{self, Debug};

use crate::collision_cache::{ActorCollision, Collision, CollisionCache};
use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::map::Map;
use crate::properties::Properties;
use crate::render::{ImageHandle, RenderSink};
use crate::tiles::TileId;

/// Stable reference to an actor: its layer and slot. Slots are never reused
/// while the map is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorHandle {
    pub layer: LayerId,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorMessage {
    /// The actor was hit and stops colliding.
    Hit,
    /// Something else displaced the actor.
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Alive,
    Remove,
}

/// Data handed to an actor factory for each actor tile found in an actors layer.
#[derive(Debug, Clone)]
pub struct ActorSpawn {
    pub actor_type: String,
    pub tile: TileId,
    pub position: (i32, i32),
    /// Tile collision box relative to the tile's top-left corner.
    pub collision: Rect,
    pub image: ImageHandle,
    pub boundary: Rect,
    pub properties: Properties,
}

/// Position, collision box and hit state shared by every actor kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorBody {
    actor_type: String,
    rect: Rect,
    collision_offset: (i32, i32),
    image: ImageHandle,
    boundary: Rect,
    impact: bool,
}

impl ActorBody {
    pub fn from_spawn(spawn: &ActorSpawn) -> Self {
        let (x, y) = spawn.position;
        Self {
            actor_type: spawn.actor_type.clone(),
            rect: Rect::new(x, y, spawn.collision.width, spawn.collision.height),
            collision_offset: (spawn.collision.x, spawn.collision.y),
            image: spawn.image,
            boundary: spawn.boundary,
            impact: false,
        }
    }

    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn collision_rect(&self) -> Rect {
        self.rect
            .translate(self.collision_offset.0, self.collision_offset.1)
    }

    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn set_image(&mut self, image: ImageHandle) {
        self.image = image;
    }

    pub fn is_active(&self) -> bool {
        !self.impact
    }

    /// Moves by an offset, kept inside the map boundary.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        self.rect = self.rect.translate(dx, dy).clamp_within(&self.boundary);
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.rect = rect.clamp_within(&self.boundary);
    }

    pub fn notify(&mut self, message: ActorMessage) {
        if message == ActorMessage::Hit {
            self.impact = true;
        }
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, screen_pos: (i32, i32)) {
        if self.impact {
            return;
        }
        sink.blit(self.image, screen_pos, None, None);
    }
}

/// Access to the map for an actor during its own update.
///
/// The updating actor is detached from its layer for the duration of the
/// call, so it never sees itself in actor queries.
pub struct ActorContext<'a> {
    map: &'a mut Map,
    cache: &'a mut CollisionCache,
    handle: ActorHandle,
}

impl<'a> ActorContext<'a> {
    pub(crate) fn new(map: &'a mut Map, cache: &'a mut CollisionCache, handle: ActorHandle) -> Self {
        Self { map, cache, handle }
    }

    pub fn handle(&self) -> ActorHandle {
        self.handle
    }

    pub fn map(&self) -> &Map {
        &*self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut *self.map
    }

    pub fn collisions(&mut self, rect: &Rect) -> Vec<Collision> {
        self.cache.object_collisions(rect, rect, &*self.map)
    }

    pub fn actor_collisions(&mut self, rect: &Rect) -> Vec<ActorCollision> {
        self.cache.actor_collisions(rect, rect, &*self.map)
    }

    /// True when `rect` overlaps a blocking tile or a platform.
    pub fn is_blocked(&mut self, rect: &Rect) -> bool {
        let collisions = self.collisions(rect);
        collisions
            .iter()
            .any(|collision| self.map.is_blocking(collision))
    }

    /// Fires every armed trigger overlapping `rect`.
    pub fn check_triggers(&mut self, rect: &Rect) -> usize {
        self.map.check_triggers(rect)
    }

    pub fn reset_cache(&mut self, rect: &Rect) {
        self.cache.reset(rect);
    }
}

pub trait Actor: Debug {
    fn body(&self) -> &ActorBody;

    fn body_mut(&mut self) -> &mut ActorBody;

    fn actor_type(&self) -> &str {
        self.body().actor_type()
    }

    fn rect(&self) -> Rect {
        self.body().rect()
    }

    fn collision_rect(&self) -> Rect {
        self.body().collision_rect()
    }

    fn is_active(&self) -> bool {
        self.body().is_active()
    }

    fn move_by(&mut self, dx: i32, dy: i32) {
        self.body_mut().move_by(dx, dy);
    }

    fn set_rect(&mut self, rect: Rect) {
        self.body_mut().set_rect(rect);
    }

    fn notify(&mut self, message: ActorMessage) {
        self.body_mut().notify(message);
    }

    /// Per-tick behaviour. Returning `Remove` drops the actor from its layer.
    fn update(&mut self, _ctx: &mut ActorContext<'_>) -> ActorStatus {
        if self.is_active() {
            ActorStatus::Alive
        } else {
            ActorStatus::Remove
        }
    }

    fn draw(&self, sink: &mut dyn RenderSink, screen_pos: (i32, i32)) {
        self.body().draw(sink, screen_pos);
    }
}

/// Actor with no behaviour of its own: it sits where it was placed until hit.
#[derive(Debug, Clone)]
pub struct TileActor {
    body: ActorBody,
}

impl TileActor {
    pub fn new(body: ActorBody) -> Self {
        Self { body }
    }

    pub fn spawn(spawn: &ActorSpawn) -> Box<dyn Actor> {
        Box::new(Self::new(ActorBody::from_spawn(spawn)))
    }
}

impl Actor for TileActor {
    fn body(&self) -> &ActorBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut ActorBody {
        &mut self.body
    }
}

pub type ActorFactory = fn(&ActorSpawn) -> Box<dyn Actor>;

/// Actor constructors keyed by the `type` property of actor tiles.
#[derive(Clone, Default)]
pub struct ActorRegistry {
    factories: HashMap<String, ActorFactory>,
}

impl Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ActorRegistry")
            .field("types", &types)
            .finish()
    }
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, actor_type: &str, factory: ActorFactory) -> &mut Self {
        self.factories.insert(actor_type.to_string(), factory);
        self
    }

    pub fn contains(&self, actor_type: &str) -> bool {
        self.factories.contains_key(actor_type)
    }

    pub fn create(&self, spawn: &ActorSpawn) -> Option<Box<dyn Actor>> {
        self.factories
            .get(&spawn.actor_type)
            .map(|factory| factory(spawn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileSetId;

    fn spawn(actor_type: &str) -> ActorSpawn {
        ActorSpawn {
            actor_type: actor_type.to_string(),
            tile: TileId(0),
            position: (10, 10),
            collision: Rect::new(2, 4, 12, 12),
            image: ImageHandle::new(TileSetId(0), 0),
            boundary: Rect::new(0, 0, 100, 100),
            properties: Properties::new(),
        }
    }

    #[test]
    fn collision_rect_is_offset_by_tile_box() {
        let body = ActorBody::from_spawn(&spawn("coin"));
        assert_eq!(body.rect(), Rect::new(10, 10, 12, 12));
        assert_eq!(body.collision_rect(), Rect::new(12, 14, 12, 12));
    }

    #[test]
    fn movement_is_clamped_to_boundary() {
        let mut body = ActorBody::from_spawn(&spawn("coin"));
        body.move_by(-50, 200);
        assert_eq!(body.rect(), Rect::new(0, 88, 12, 12));
    }

    #[test]
    fn hit_deactivates_actor_and_default_update_removes_it() {
        let mut actor = TileActor::new(ActorBody::from_spawn(&spawn("coin")));
        actor.notify(ActorMessage::Moved);
        assert!(actor.is_active());
        actor.notify(ActorMessage::Hit);
        assert!(!actor.is_active());
    }

    #[test]
    fn registry_creates_by_type() {
        let mut registry = ActorRegistry::new();
        registry.register("coin", TileActor::spawn);
        assert!(registry.create(&spawn("coin")).is_some());
        assert!(registry.create(&spawn("ghost")).is_none());
    }
}
