use tracing::{debug, trace};

use crate::collision_cache::{
    ActorCollision, Collision, CollisionCache, CollisionCacheConfig, CollisionSource,
    CollisionTarget,
};
use crate::effects::{Effect, EffectsLayer};
use crate::geometry::Rect;
use crate::layers::{
    ActorSlot, ActorsLayer, Layer, LayerConfig, LayerContent, LayerId, PlatformsLayer,
    TriggersLayer,
};
use crate::objects::{
    fire_trigger, update_platform, Actor, ActorContext, ActorHandle, ActorMessage, ActorStatus,
    CameraPan, ObjectWithPath, PAN_SLEEP_TICKS, PAN_STEPS,
};
use crate::properties::Properties;
use crate::render::RenderSink;
use crate::tiles::{TileId, TileSets};

/// Runtime tuning for a loaded map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapConfig {
    /// Screen size used to centre camera pans.
    pub viewport: (u32, u32),
    pub pan_steps: u32,
    pub pan_sleep_ticks: u32,
    pub platform_cache: CollisionCacheConfig,
    pub actor_cache: CollisionCacheConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            viewport: (640, 480),
            pan_steps: PAN_STEPS,
            pan_sleep_ticks: PAN_SLEEP_TICKS,
            platform_cache: CollisionCacheConfig::actors_only(32, 128),
            actor_cache: CollisionCacheConfig::objects_and_actors(32, 128),
        }
    }
}

/// Side effects the map asks its host to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    PlaySound { name: String, volume: f32 },
    TriggerFired { name: String },
}

/// A loaded level: tilesets, layers in load order and per-frame state.
#[derive(Debug)]
pub struct Map {
    name: String,
    size: (u32, u32),
    tile_size: (i32, i32),
    properties: Properties,
    config: MapConfig,
    tilesets: TileSets,
    layers: Vec<Layer>,
    rendering_layers: Vec<LayerId>,
    collision_layers: Vec<LayerId>,
    actor_layers: Vec<LayerId>,
    trigger_layers: Vec<LayerId>,
    display_position: (i32, i32),
    boundary: Rect,
    camera_pan: Option<CameraPan>,
    effects: EffectsLayer,
    events: Vec<MapEvent>,
    tick: u64,
}

impl Map {
    pub fn new(
        name: &str,
        size: (u32, u32),
        tile_size: (i32, i32),
        tilesets: TileSets,
        config: MapConfig,
    ) -> Self {
        let boundary = Rect::new(
            0,
            0,
            size.0 as i32 * tile_size.0,
            size.1 as i32 * tile_size.1,
        );
        Self {
            name: name.to_string(),
            size,
            tile_size,
            properties: Properties::new(),
            config,
            tilesets,
            layers: Vec::new(),
            rendering_layers: Vec::new(),
            collision_layers: Vec::new(),
            actor_layers: Vec::new(),
            trigger_layers: Vec::new(),
            display_position: (0, 0),
            boundary,
            camera_pan: None,
            effects: EffectsLayer::new(),
            events: Vec::new(),
            tick: 0,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in tiles.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn tile_size(&self) -> (i32, i32) {
        self.tile_size
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Map extent in pixels; actors are kept inside it.
    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    pub fn tilesets(&self) -> &TileSets {
        &self.tilesets
    }

    pub fn tilesets_mut(&mut self) -> &mut TileSets {
        &mut self.tilesets
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Id the next `add_layer` call will assign.
    pub fn next_layer_id(&self) -> LayerId {
        LayerId(self.layers.len())
    }

    pub fn add_layer(
        &mut self,
        name: &str,
        config: LayerConfig,
        properties: Properties,
        content: LayerContent,
    ) -> LayerId {
        let id = self.next_layer_id();
        let layer = Layer::new(id, name, config, properties, content);

        if layer.is_triggers() {
            self.trigger_layers.push(id);
        }
        if layer.is_collision() {
            self.collision_layers.push(id);
        }
        if layer.is_rendering() {
            self.rendering_layers.push(id);
        }
        if layer.is_actors() {
            self.actor_layers.push(id);
        }
        debug!(
            layer = %name,
            id = id.0,
            collision = layer.is_collision(),
            rendering = layer.is_rendering(),
            "layer_added"
        );
        self.layers.push(layer);
        id
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.0)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers
            .iter()
            .find(|layer| layer.name() == name)
            .map(Layer::id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn rendering_layers(&self) -> &[LayerId] {
        &self.rendering_layers
    }

    pub fn collision_layers(&self) -> &[LayerId] {
        &self.collision_layers
    }

    pub fn actor_layers(&self) -> &[LayerId] {
        &self.actor_layers
    }

    pub fn trigger_layers(&self) -> &[LayerId] {
        &self.trigger_layers
    }

    pub fn platforms_layer(&self, id: LayerId) -> Option<&PlatformsLayer> {
        self.layer(id)?.as_platforms()
    }

    pub fn platforms_layer_mut(&mut self, id: LayerId) -> Option<&mut PlatformsLayer> {
        self.layer_mut(id)?.as_platforms_mut()
    }

    pub fn triggers_layer(&self, id: LayerId) -> Option<&TriggersLayer> {
        self.layer(id)?.as_triggers()
    }

    pub fn triggers_layer_mut(&mut self, id: LayerId) -> Option<&mut TriggersLayer> {
        self.layer_mut(id)?.as_triggers_mut()
    }

    pub fn actors_layer(&self, id: LayerId) -> Option<&ActorsLayer> {
        self.layer(id)?.as_actors()
    }

    fn actors_layer_mut(&mut self, id: LayerId) -> Option<&mut ActorsLayer> {
        self.layer_mut(id)?.as_actors_mut()
    }

    pub fn platform(&self, layer: LayerId, index: usize) -> Option<&ObjectWithPath> {
        self.platforms_layer(layer)?.platform(index)
    }

    pub fn platform_mut(&mut self, layer: LayerId, index: usize) -> Option<&mut ObjectWithPath> {
        self.platforms_layer_mut(layer)?.platform_mut(index)
    }

    /// First platform with this name on any layer.
    pub fn platform_by_name(&self, name: &str) -> Option<(LayerId, usize)> {
        self.layers.iter().find_map(|layer| {
            let index = layer.as_platforms()?.find(name)?;
            Some((layer.id(), index))
        })
    }

    /// One simulation tick: platforms and actors in layer order (actors are
    /// frozen while a camera pan runs), then tile animations, then effects.
    pub fn update(&mut self) {
        self.tick += 1;
        let frozen = self.camera_pan.is_some();
        for index in 0..self.rendering_layers.len() {
            let id = self.rendering_layers[index];
            let (platforms, actors) = match self.layer(id).map(Layer::content) {
                Some(LayerContent::Platforms(platforms)) => (platforms.len(), false),
                Some(LayerContent::Actors(_)) => (0, true),
                _ => (0, false),
            };
            for platform in 0..platforms {
                update_platform(self, id, platform);
            }
            if actors && !frozen {
                self.update_actors(id);
            }
        }

        self.tilesets.update();

        let mut effects = std::mem::take(&mut self.effects);
        effects.update(self);
        effects.absorb(std::mem::take(&mut self.effects));
        self.effects = effects;
    }

    fn update_actors(&mut self, id: LayerId) {
        let Some(layer) = self.actors_layer_mut(id) else {
            return;
        };
        layer.rebuild_index();
        let slots = layer.slot_count();

        for slot in 0..slots {
            let Some(mut entry) = self.actors_layer_mut(id).and_then(|layer| layer.take(slot))
            else {
                continue;
            };
            let handle = ActorHandle { layer: id, slot };
            let status = {
                let mut ctx = ActorContext::new(self, &mut entry.cache, handle);
                entry.actor.update(&mut ctx)
            };
            let Some(layer) = self.actors_layer_mut(id) else {
                return;
            };
            match status {
                ActorStatus::Alive => layer.put_back(slot, entry),
                ActorStatus::Remove => {
                    debug!(
                        actor = %entry.actor.actor_type(),
                        layer = id.0,
                        slot,
                        "actor_finished"
                    );
                }
            }
        }

        if let Some(layer) = self.actors_layer_mut(id) {
            layer.rebuild_index();
        }
    }

    /// Runs the camera pan hook, then draws every rendering layer and the
    /// effects on top.
    pub fn draw(&mut self, sink: &mut dyn RenderSink) {
        if let Some(mut pan) = self.camera_pan.take() {
            if pan.step(self) {
                self.camera_pan.get_or_insert(pan);
            }
        }

        let size = sink.size();
        let display = self.display_position;
        for id in &self.rendering_layers {
            if let Some(layer) = self.layers.get(id.0) {
                layer.draw(&self.tilesets, sink, display, size);
            }
        }
        let visible = Rect::new(display.0, display.1, size.0 as i32, size.1 as i32);
        self.effects.draw(sink, &visible);
    }

    pub fn set_display_position(&mut self, x: i32, y: i32) {
        self.display_position = (x, y);
    }

    pub fn display_position(&self) -> (i32, i32) {
        self.display_position
    }

    /// World rect to screen space.
    pub fn translate_rect(&self, rect: &Rect) -> Rect {
        rect.translate(-self.display_position.0, -self.display_position.1)
    }

    pub fn is_panning(&self) -> bool {
        self.camera_pan.is_some()
    }

    /// Installs a camera pan. A pan replacing a running one still returns
    /// to where the first one started.
    pub(crate) fn install_camera_pan(&mut self, mut pan: CameraPan) {
        if let Some(running) = &self.camera_pan {
            pan.keep_original(running.original_position());
        }
        self.camera_pan = Some(pan);
    }

    /// Tiles and platforms of every collision layer overlapping `rect`.
    pub fn collisions(&self, rect: &Rect) -> Vec<Collision> {
        let mut found = Vec::new();
        for id in &self.collision_layers {
            let Some(layer) = self.layers.get(id.0) else {
                continue;
            };
            match layer.content() {
                LayerContent::Array(tiles) => {
                    found.extend(tiles.collisions(&self.tilesets, *rect).map(
                        |(tile_rect, tile, cell)| Collision {
                            rect: tile_rect,
                            target: CollisionTarget::Tile { tile, cell },
                            layer: *id,
                        },
                    ));
                }
                LayerContent::Platforms(platforms) => {
                    found.extend(platforms.collisions(rect).map(|(platform_rect, index)| {
                        Collision {
                            rect: platform_rect,
                            target: CollisionTarget::Platform(index),
                            layer: *id,
                        }
                    }));
                }
                LayerContent::Triggers(_) | LayerContent::Actors(_) => {}
            }
        }
        found
    }

    /// Active actors of every actor layer overlapping `rect`.
    pub fn actor_collisions(&self, rect: &Rect, exclude: Option<ActorHandle>) -> Vec<ActorCollision> {
        self.actor_layers
            .iter()
            .filter_map(|id| self.actors_layer(*id))
            .flat_map(|layer| layer.collisions(rect, exclude))
            .collect()
    }

    /// Fires every armed trigger overlapping `rect`; returns how many fired.
    pub fn check_triggers(&mut self, rect: &Rect) -> usize {
        let mut hits = Vec::new();
        for id in &self.trigger_layers {
            if let Some(triggers) = self.triggers_layer(*id) {
                hits.extend(triggers.collisions(rect).into_iter().map(|index| (*id, index)));
            }
        }
        hits.into_iter()
            .filter(|(layer, index)| fire_trigger(self, *layer, *index))
            .count()
    }

    /// Whether a collision stops movement: platforms always do, tiles unless
    /// flagged otherwise.
    pub fn is_blocking(&self, collision: &Collision) -> bool {
        match collision.target {
            CollisionTarget::Tile { tile, .. } => self
                .tilesets
                .tile(tile)
                .is_some_and(|tile| tile.blocks()),
            CollisionTarget::Platform(_) => true,
        }
    }

    pub fn get_object_at(&self, layer: LayerId, x: i32, y: i32) -> Option<TileId> {
        self.layer(layer)?.as_array()?.get_object_at(x, y)
    }

    pub fn set_tile_at(&mut self, layer: LayerId, x: i32, y: i32, tile: Option<TileId>) -> bool {
        self.layer_mut(layer)
            .and_then(Layer::as_array_mut)
            .is_some_and(|tiles| tiles.set_tile_at(x, y, tile))
    }

    pub fn remove_object_at(&mut self, layer: LayerId, x: i32, y: i32) -> bool {
        let removed = self
            .layer_mut(layer)
            .and_then(Layer::as_array_mut)
            .is_some_and(|tiles| tiles.remove_object_at(x, y));
        trace!(layer = layer.0, x, y, removed, "tile_removed");
        removed
    }

    pub fn add_effect(&mut self, key: Option<&str>, effect: Box<dyn Effect>) {
        self.effects.add(key, effect);
    }

    pub fn effects(&self) -> &EffectsLayer {
        &self.effects
    }

    pub(crate) fn push_event(&mut self, event: MapEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn spawn_actor(&mut self, layer: LayerId, actor: Box<dyn Actor>) -> Option<ActorHandle> {
        let cache = CollisionCache::new(self.config.actor_cache);
        Some(self.actors_layer_mut(layer)?.spawn(actor, cache))
    }

    pub fn remove_actor(&mut self, handle: ActorHandle) -> bool {
        self.actors_layer_mut(handle.layer)
            .is_some_and(|layer| layer.remove(handle.slot))
    }

    pub fn actor(&self, handle: ActorHandle) -> Option<&dyn Actor> {
        self.actors_layer(handle.layer)?.actor(handle.slot)
    }

    /// Every live actor on every actor layer.
    pub fn actors(&self) -> impl Iterator<Item = (ActorHandle, &dyn Actor)> {
        self.actor_layers
            .iter()
            .filter_map(|id| self.actors_layer(*id))
            .flat_map(ActorsLayer::actors)
    }

    pub fn actor_rect(&self, handle: ActorHandle) -> Option<Rect> {
        self.actor(handle).map(|actor| actor.rect())
    }

    pub fn move_actor(&mut self, handle: ActorHandle, dx: i32, dy: i32) -> bool {
        self.actors_layer_mut(handle.layer)
            .is_some_and(|layer| layer.move_actor(handle.slot, dx, dy))
    }

    pub fn set_actor_rect(&mut self, handle: ActorHandle, rect: Rect) -> bool {
        self.actors_layer_mut(handle.layer)
            .is_some_and(|layer| layer.set_actor_rect(handle.slot, rect))
    }

    pub fn notify_actor(&mut self, handle: ActorHandle, message: ActorMessage) -> bool {
        self.actors_layer_mut(handle.layer)
            .is_some_and(|layer| layer.notify(handle.slot, message))
    }

    /// True when the actor currently overlaps something blocking, checked
    /// through its own collision cache. Any blocking overlap counts, including
    /// one the actor already had before its last move.
    pub fn actor_blocked(&mut self, handle: ActorHandle) -> bool {
        let Some(mut entry) = self
            .actors_layer_mut(handle.layer)
            .and_then(|layer| layer.take(handle.slot))
        else {
            return false;
        };
        let rect = entry.actor.collision_rect();
        let blocked = entry
            .cache
            .object_collisions(&rect, &rect, &*self)
            .iter()
            .any(|collision| self.is_blocking(collision));
        self.restore_slot(handle, entry);
        blocked
    }

    fn restore_slot(&mut self, handle: ActorHandle, entry: ActorSlot) {
        if let Some(layer) = self.actors_layer_mut(handle.layer) {
            layer.put_back(handle.slot, entry);
        }
    }
}

impl CollisionSource for Map {
    fn collisions(&self, rect: &Rect) -> Vec<Collision> {
        Map::collisions(self, rect)
    }

    fn actor_collisions(&self, rect: &Rect, exclude: Option<ActorHandle>) -> Vec<ActorCollision> {
        Map::actor_collisions(self, rect, exclude)
    }

    fn refresh_collision(&self, candidate: &Collision) -> Option<Collision> {
        let layer = self.layer(candidate.layer)?;
        let rect = match candidate.target {
            CollisionTarget::Tile { tile, cell } => {
                let tiles = layer.as_array()?;
                if tiles.tile_at_cell(cell.0 as i32, cell.1 as i32) != Some(tile) {
                    return None;
                }
                let (tile_width, tile_height) = tiles.tile_size();
                self.tilesets.tile(tile)?.collision_rect_at(
                    cell.0 as i32 * tile_width,
                    cell.1 as i32 * tile_height,
                )
            }
            CollisionTarget::Platform(index) => layer.as_platforms()?.platform(index)?.rect(),
        };
        Some(Collision { rect, ..*candidate })
    }

    fn refresh_actor_collision(&self, candidate: &ActorCollision) -> Option<ActorCollision> {
        self.actors_layer(candidate.actor.layer)?
            .live_collision(candidate.actor.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::SLIDING_TILE_TICKS;
    use crate::objects::{
        execute_triggered, ActorBody, PlatformConfig, PlatformState, PlatformTile, Trigger,
        TriggerConfig, Triggered, TriggeredAction,
    };
    use crate::path::Path;
    use crate::render::{ImageHandle, RecordingSink};
    use crate::test_support::{
        actor_spawn, add_actors, add_platforms, add_triggers, map_with_ground, spawn,
        CountdownEffect,
    };
    use crate::tiles::TileSetId;

    fn add_platform(map: &mut Map, layer: LayerId, rect: Rect, path: Path) -> usize {
        let tiles = vec![PlatformTile {
            offset: (0, 0),
            image: ImageHandle::new(TileSetId(0), 2),
        }];
        let cache = map.config().platform_cache;
        let platform = ObjectWithPath::new(
            Some("lift".to_string()),
            rect,
            tiles,
            &PlatformConfig::default(),
            cache,
        )
        .with_path(path);
        let index = map
            .platforms_layer_mut(layer)
            .expect("platforms layer")
            .add_platform(platform);
        // Consume the path's starting point so the next update moves.
        map.platform_mut(layer, index)
            .expect("platform")
            .advance()
            .expect("first step");
        index
    }

    /// Trigger over cell (3, 4) that removes cells (5, 4) and (6, 4).
    fn lever_map(show: bool, action: TriggeredAction) -> (Map, LayerId, LayerId) {
        let (mut map, ground) =
            map_with_ground(20, 10, &[((3, 4), 1), ((5, 4), 2), ((6, 4), 2)]);
        let triggers = add_triggers(&mut map, ground);
        let config = TriggerConfig {
            sound: None,
            tile_on_trigger: Some(7),
            show,
        };
        let layer = map.triggers_layer_mut(triggers).expect("triggers layer");
        let lever = layer.add_trigger(Trigger::new(
            "lever".to_string(),
            Rect::new(48, 64, 16, 16),
            config,
            Some(TileId(7)),
        ));
        layer
            .add_triggered(
                lever,
                Triggered::new("gate".to_string(), Rect::new(80, 64, 32, 16), action, None),
            )
            .expect("triggered");
        (map, ground, triggers)
    }

    #[derive(Debug)]
    struct Drifter {
        body: ActorBody,
    }

    impl Actor for Drifter {
        fn body(&self) -> &ActorBody {
            &self.body
        }

        fn body_mut(&mut self) -> &mut ActorBody {
            &mut self.body
        }

        fn update(&mut self, ctx: &mut ActorContext<'_>) -> ActorStatus {
            self.move_by(4, 0);
            let rect = self.collision_rect();
            ctx.check_triggers(&rect);
            ActorStatus::Alive
        }
    }

    fn drifter(map: &mut Map, layer: LayerId, rect: Rect) -> ActorHandle {
        let spawn = actor_spawn(map, rect);
        let actor = Box::new(Drifter {
            body: ActorBody::from_spawn(&spawn),
        });
        map.spawn_actor(layer, actor).expect("actors layer")
    }

    #[test]
    fn layers_are_categorised_on_add() {
        let (mut map, ground) = map_with_ground(4, 4, &[]);
        let platforms = add_platforms(&mut map, Some(ground));
        let triggers = add_triggers(&mut map, ground);
        let actors = add_actors(&mut map);
        assert_eq!(map.collision_layers(), &[ground, platforms]);
        assert_eq!(map.rendering_layers(), &[ground, platforms, actors]);
        assert_eq!(map.trigger_layers(), &[triggers]);
        assert_eq!(map.actor_layers(), &[actors]);
        assert_eq!(map.layer_by_name("actors"), Some(actors));
        assert_eq!(map.boundary(), Rect::new(0, 0, 64, 64));
    }

    #[test]
    fn sticky_platform_carries_actor_standing_on_it() {
        let (mut map, ground) = map_with_ground(20, 20, &[]);
        let platforms = add_platforms(&mut map, Some(ground));
        let actors = add_actors(&mut map);
        let index = add_platform(
            &mut map,
            platforms,
            Rect::new(100, 100, 64, 16),
            Path::from_points(&[(100, 100), (200, 100)], 5),
        );
        let rider = spawn(&mut map, actors, Rect::new(110, 84, 16, 16));

        map.update();

        assert_eq!(
            map.platform(platforms, index).expect("platform").rect(),
            Rect::new(105, 100, 64, 16)
        );
        assert_eq!(map.actor_rect(rider), Some(Rect::new(115, 84, 16, 16)));
    }

    #[test]
    fn sideways_step_into_actor_is_rejected() {
        let (mut map, ground) = map_with_ground(20, 20, &[]);
        let platforms = add_platforms(&mut map, Some(ground));
        let actors = add_actors(&mut map);
        let index = add_platform(
            &mut map,
            platforms,
            Rect::new(100, 100, 64, 16),
            Path::from_points(&[(100, 100), (200, 100)], 5),
        );
        let wall = spawn(&mut map, actors, Rect::new(166, 100, 16, 16));

        map.update();

        assert_eq!(
            map.platform(platforms, index).expect("platform").rect(),
            Rect::new(100, 100, 64, 16)
        );
        assert_eq!(map.actor_rect(wall), Some(Rect::new(166, 100, 16, 16)));

        map.remove_actor(wall);
        map.update();
        assert_eq!(
            map.platform(platforms, index).expect("platform").rect(),
            Rect::new(105, 100, 64, 16)
        );
    }

    #[test]
    fn rising_platform_lifts_actor_unless_it_would_be_crushed() {
        // A solid tile at cell (7, 4) spans y 64..80, just above the rider's
        // first lifted position.
        let (mut map, ground) = map_with_ground(20, 20, &[((7, 4), 1)]);
        let platforms = add_platforms(&mut map, Some(ground));
        let actors = add_actors(&mut map);
        let index = add_platform(
            &mut map,
            platforms,
            Rect::new(100, 100, 64, 16),
            Path::from_points(&[(100, 100), (100, 0)], 4),
        );
        let rider = spawn(&mut map, actors, Rect::new(110, 84, 16, 16));

        map.update();
        assert_eq!(
            map.platform(platforms, index).expect("platform").rect(),
            Rect::new(100, 96, 64, 16)
        );
        assert_eq!(map.actor_rect(rider), Some(Rect::new(110, 80, 16, 16)));

        map.update();
        assert_eq!(
            map.platform(platforms, index).expect("platform").rect(),
            Rect::new(100, 96, 64, 16)
        );
        assert_eq!(map.actor_rect(rider), Some(Rect::new(110, 80, 16, 16)));
    }

    #[test]
    fn trigger_replaces_its_tile_and_removes_the_gate() {
        let (mut map, ground, triggers) = lever_map(false, TriggeredAction::Remove);

        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 1);

        let tiles = map.layer(ground).and_then(Layer::as_array).expect("ground");
        assert_eq!(tiles.tile_at_cell(3, 4), Some(TileId(7)));
        assert_eq!(tiles.tile_at_cell(5, 4), None);
        assert_eq!(tiles.tile_at_cell(6, 4), None);
        assert_eq!(
            map.drain_events(),
            vec![MapEvent::TriggerFired {
                name: "lever".to_string()
            }]
        );
        let layer = map.triggers_layer(triggers).expect("triggers layer");
        assert_eq!(layer.active_count(), 0);
        assert!(layer.triggered(0).expect("triggered").is_executed());
        assert!(!map.is_panning());
    }

    #[test]
    fn trigger_fires_only_once() {
        let (mut map, ground, triggers) = lever_map(false, TriggeredAction::Remove);
        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 1);
        map.drain_events();
        map.set_tile_at(ground, 80, 64, Some(TileId(2)));

        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 0);
        assert!(!fire_trigger(&mut map, triggers, 0));
        assert!(map.drain_events().is_empty());
        assert_eq!(map.get_object_at(ground, 80, 64), Some(TileId(2)));
    }

    #[test]
    fn triggered_action_runs_only_once() {
        let (mut map, ground, triggers) = lever_map(false, TriggeredAction::Remove);

        assert!(execute_triggered(&mut map, triggers, 0).is_none());
        assert_eq!(map.get_object_at(ground, 80, 64), None);
        assert_eq!(map.get_object_at(ground, 96, 64), None);

        map.set_tile_at(ground, 80, 64, Some(TileId(2)));
        assert!(execute_triggered(&mut map, triggers, 0).is_none());
        assert_eq!(map.get_object_at(ground, 80, 64), Some(TileId(2)));
    }

    #[test]
    fn start_action_starts_only_overlapping_platforms() {
        let (mut map, ground) = map_with_ground(20, 10, &[((3, 4), 1)]);
        let platforms = add_platforms(&mut map, Some(ground));
        let triggers = add_triggers(&mut map, ground);

        let stopped = PlatformConfig {
            stopped: true,
            ..PlatformConfig::default()
        };
        let cache = map.config().platform_cache;
        let layer = map.platforms_layer_mut(platforms).expect("platforms layer");
        let near = layer.add_platform(
            ObjectWithPath::new(
                Some("near".to_string()),
                Rect::new(80, 32, 32, 16),
                Vec::new(),
                &stopped,
                cache,
            )
            .with_path(Path::from_points(&[(80, 32), (160, 32)], 1)),
        );
        let far = layer.add_platform(
            ObjectWithPath::new(
                Some("far".to_string()),
                Rect::new(200, 32, 32, 16),
                Vec::new(),
                &stopped,
                cache,
            )
            .with_path(Path::from_points(&[(200, 32), (260, 32)], 1)),
        );

        let layer = map.triggers_layer_mut(triggers).expect("triggers layer");
        let lever = layer.add_trigger(Trigger::new(
            "lever".to_string(),
            Rect::new(48, 64, 16, 16),
            TriggerConfig {
                sound: None,
                tile_on_trigger: None,
                show: false,
            },
            None,
        ));
        layer
            .add_triggered(
                lever,
                Triggered::new(
                    "lift_start".to_string(),
                    Rect::new(80, 32, 32, 16),
                    TriggeredAction::Start,
                    Some(platforms),
                ),
            )
            .expect("triggered");

        map.update();
        let waiting = map.platform(platforms, near).expect("near");
        assert_eq!(waiting.rect(), Rect::new(80, 32, 32, 16));

        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 1);
        map.update();
        map.update();

        let near = map.platform(platforms, near).expect("near");
        assert_eq!(near.state(), PlatformState::Moving);
        assert!(near.rect().x > 80);
        assert_eq!(near.rect().y, 32);
        let far = map.platform(platforms, far).expect("far");
        assert_eq!(far.state(), PlatformState::Stopped);
        assert_eq!(far.rect(), Rect::new(200, 32, 32, 16));
    }

    #[test]
    fn actor_walking_into_trigger_fires_it() {
        let (mut map, _ground, _triggers) = lever_map(false, TriggeredAction::Remove);
        let actors = add_actors(&mut map);
        let walker = drifter(&mut map, actors, Rect::new(26, 64, 16, 16));

        map.update();
        assert!(map.drain_events().is_empty());
        map.update();
        assert_eq!(map.actor_rect(walker), Some(Rect::new(34, 64, 16, 16)));
        assert_eq!(map.drain_events().len(), 1);
    }

    #[test]
    fn camera_pan_visits_triggered_and_returns() {
        let (mut map, _ground, _triggers) = lever_map(true, TriggeredAction::Remove);
        let actors = add_actors(&mut map);
        let walker = drifter(&mut map, actors, Rect::new(200, 0, 16, 16));
        let mut sink = RecordingSink::new(640, 480);

        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 1);
        assert!(map.is_panning());

        map.update();
        assert_eq!(map.actor_rect(walker), Some(Rect::new(200, 0, 16, 16)));

        for _ in 0..31 {
            map.draw(&mut sink);
        }
        assert_eq!(map.display_position(), (80 - 320, 64 - 240));

        let mut frames = 31;
        while map.is_panning() && frames < 400 {
            map.draw(&mut sink);
            frames += 1;
        }
        assert!(!map.is_panning());
        assert_eq!(map.display_position(), (0, 0));

        map.update();
        assert_eq!(map.actor_rect(walker), Some(Rect::new(204, 0, 16, 16)));
    }

    #[test]
    fn sliding_removal_runs_as_an_effect() {
        let (mut map, ground, _triggers) = lever_map(false, TriggeredAction::RemoveSliding);
        assert_eq!(map.check_triggers(&Rect::new(50, 66, 4, 4)), 1);
        assert_eq!(map.effects().len(), 1);
        assert_eq!(map.get_object_at(ground, 80, 64), Some(TileId(2)));

        map.update();
        assert_eq!(map.get_object_at(ground, 80, 64), None);
        for _ in 1..SLIDING_TILE_TICKS {
            map.update();
        }
        assert_eq!(map.effects().len(), 1);
        map.update();
        assert!(map.effects().is_empty());
    }

    #[test]
    fn keyed_effects_replace_each_other() {
        let (mut map, _ground) = map_with_ground(4, 4, &[]);
        map.add_effect(Some("shake"), Box::new(CountdownEffect { remaining: 5 }));
        map.add_effect(Some("shake"), Box::new(CountdownEffect { remaining: 1 }));
        map.add_effect(None, Box::new(CountdownEffect { remaining: 2 }));
        assert_eq!(map.effects().len(), 2);
        assert!(map.effects().contains("shake"));

        map.update();
        assert_eq!(map.effects().len(), 1);
        assert!(!map.effects().contains("shake"));
        map.update();
        assert!(map.effects().is_empty());
    }

    #[test]
    fn refresh_tracks_live_map_state() {
        let (mut map, ground) = map_with_ground(8, 8, &[((1, 1), 3)]);
        let platforms = add_platforms(&mut map, Some(ground));
        let index = add_platform(
            &mut map,
            platforms,
            Rect::new(64, 64, 32, 16),
            Path::from_points(&[(64, 64), (96, 64)], 2),
        );

        let found = map.collisions(&Rect::new(0, 0, 128, 128));
        assert_eq!(found.len(), 2);
        let tile = found
            .iter()
            .find(|collision| collision.layer == ground)
            .copied()
            .expect("tile collision");
        let platform = found
            .iter()
            .find(|collision| collision.target == CollisionTarget::Platform(index))
            .copied()
            .expect("platform collision");

        map.platform_mut(platforms, index)
            .expect("platform")
            .advance();
        assert_eq!(
            map.refresh_collision(&platform).map(|collision| collision.rect),
            Some(Rect::new(66, 64, 32, 16))
        );

        assert!(map.refresh_collision(&tile).is_some());
        map.remove_object_at(ground, 16, 16);
        assert_eq!(map.refresh_collision(&tile), None);
    }

    #[test]
    fn finished_actors_leave_the_layer() {
        let (mut map, _ground) = map_with_ground(8, 8, &[]);
        let actors = add_actors(&mut map);
        let handle = spawn(&mut map, actors, Rect::new(0, 0, 16, 16));
        map.notify_actor(handle, ActorMessage::Hit);
        assert!(map.actor_collisions(&Rect::new(0, 0, 16, 16), None).is_empty());

        map.update();
        assert!(map.actor(handle).is_none());
        assert_eq!(map.actors().count(), 0);
    }
}
