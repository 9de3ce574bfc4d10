use tracing::trace;

use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::objects::ActorHandle;
use crate::tiles::TileId;

/// What a map collision refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionTarget {
    Tile { tile: TileId, cell: (u32, u32) },
    /// Index of a platform inside its platforms layer.
    Platform(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub rect: Rect,
    pub target: CollisionTarget,
    pub layer: LayerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorCollision {
    pub rect: Rect,
    pub actor: ActorHandle,
}

/// Broad and narrow collision queries a cache can fall back to.
pub trait CollisionSource {
    fn collisions(&self, rect: &Rect) -> Vec<Collision>;

    fn actor_collisions(&self, rect: &Rect, exclude: Option<ActorHandle>) -> Vec<ActorCollision>;

    fn possible_collisions(&self, rect: &Rect, range: i32) -> Vec<Collision> {
        self.collisions(&rect.inflate(range, range))
    }

    fn possible_actor_collisions(
        &self,
        rect: &Rect,
        range: i32,
        exclude: Option<ActorHandle>,
    ) -> Vec<ActorCollision> {
        self.actor_collisions(&rect.inflate(range, range), exclude)
    }

    /// Current state of a cached candidate, or `None` once it no longer exists.
    fn refresh_collision(&self, candidate: &Collision) -> Option<Collision>;

    fn refresh_actor_collision(&self, candidate: &ActorCollision) -> Option<ActorCollision>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionCacheConfig {
    pub caches_objects: bool,
    pub caches_actors: bool,
    /// Displacement, per axis, after which the cache is rebuilt.
    pub threshold: i32,
    /// Margin added on every side of the owner rect when repopulating.
    pub range_check: i32,
}

impl CollisionCacheConfig {
    pub const fn objects_and_actors(threshold: i32, range_check: i32) -> Self {
        Self {
            caches_objects: true,
            caches_actors: true,
            threshold,
            range_check,
        }
    }

    pub const fn actors_only(threshold: i32, range_check: i32) -> Self {
        Self {
            caches_objects: false,
            caches_actors: true,
            threshold,
            range_check,
        }
    }
}

impl Default for CollisionCacheConfig {
    fn default() -> Self {
        Self {
            caches_objects: false,
            caches_actors: false,
            threshold: 32,
            range_check: 128,
        }
    }
}

const NEVER_CACHED: (i32, i32) = (-100_000, -10_000);

/// Per-entity cache of nearby collision candidates.
///
/// Only the candidate set is cached. Every query re-reads the candidates'
/// live rects from the source and intersects them with the query rect.
#[derive(Debug, Clone)]
pub struct CollisionCache {
    config: CollisionCacheConfig,
    cached_top_left: (i32, i32),
    objects: Option<Vec<Collision>>,
    actors: Option<Vec<ActorCollision>>,
    exclude: Option<ActorHandle>,
}

impl CollisionCache {
    pub fn new(config: CollisionCacheConfig) -> Self {
        Self {
            config,
            cached_top_left: NEVER_CACHED,
            objects: None,
            actors: None,
            exclude: None,
        }
    }

    /// Actor never reported by this cache, usually the owner itself.
    pub fn with_exclude(mut self, actor: ActorHandle) -> Self {
        self.exclude = Some(actor);
        self
    }

    pub fn config(&self) -> &CollisionCacheConfig {
        &self.config
    }

    pub fn is_populated(&self) -> bool {
        self.objects.is_some() || self.actors.is_some()
    }

    pub fn reset(&mut self, owner: &Rect) {
        self.objects = None;
        self.actors = None;
        self.cached_top_left = owner.top_left();
    }

    /// Drops the cache when the owner moved past the threshold, then
    /// repopulates whatever kinds are cached.
    pub fn update(&mut self, owner: &Rect, source: &dyn CollisionSource) {
        let (cached_x, cached_y) = self.cached_top_left;
        if (cached_x - owner.x).abs() > self.config.threshold
            || (cached_y - owner.y).abs() > self.config.threshold
        {
            self.reset(owner);
        }

        let range = self.config.range_check;
        if self.config.caches_objects && self.objects.is_none() {
            let objects = source.possible_collisions(owner, range);
            trace!(candidates = objects.len(), "collision_cache_objects_filled");
            self.objects = Some(objects);
        }
        if self.config.caches_actors && self.actors.is_none() {
            let actors = source.possible_actor_collisions(owner, range, self.exclude);
            trace!(candidates = actors.len(), "collision_cache_actors_filled");
            self.actors = Some(actors);
        }
    }

    /// Map objects intersecting `query`, using the candidates cached around `owner`.
    pub fn object_collisions(
        &mut self,
        owner: &Rect,
        query: &Rect,
        source: &dyn CollisionSource,
    ) -> Vec<Collision> {
        if !self.config.caches_objects {
            return source.collisions(query);
        }
        self.update(owner, source);
        self.objects
            .iter()
            .flatten()
            .filter_map(|candidate| source.refresh_collision(candidate))
            .filter(|collision| collision.rect.intersects(query))
            .collect()
    }

    pub fn actor_collisions(
        &mut self,
        owner: &Rect,
        query: &Rect,
        source: &dyn CollisionSource,
    ) -> Vec<ActorCollision> {
        if !self.config.caches_actors {
            return source.actor_collisions(query, self.exclude);
        }
        self.update(owner, source);
        self.actors
            .iter()
            .flatten()
            .filter_map(|candidate| source.refresh_actor_collision(candidate))
            .filter(|collision| collision.rect.intersects(query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct StaticSource {
        blocks: Vec<Rect>,
        actors: Vec<Rect>,
        broad_queries: Cell<usize>,
    }

    impl StaticSource {
        fn grid() -> Self {
            let mut blocks = Vec::new();
            let mut actors = Vec::new();
            for i in 0..40 {
                blocks.push(Rect::new(i * 48, (i % 5) * 40, 16, 16));
                actors.push(Rect::new(i * 37 + 5, (i % 7) * 30, 12, 20));
            }
            Self {
                blocks,
                actors,
                broad_queries: Cell::new(0),
            }
        }

        fn block(&self, index: usize) -> Collision {
            Collision {
                rect: self.blocks[index],
                target: CollisionTarget::Platform(index),
                layer: LayerId(0),
            }
        }

        fn actor(&self, slot: usize) -> ActorCollision {
            ActorCollision {
                rect: self.actors[slot],
                actor: ActorHandle {
                    layer: LayerId(1),
                    slot,
                },
            }
        }
    }

    impl CollisionSource for StaticSource {
        fn collisions(&self, rect: &Rect) -> Vec<Collision> {
            self.broad_queries.set(self.broad_queries.get() + 1);
            (0..self.blocks.len())
                .filter(|i| self.blocks[*i].intersects(rect))
                .map(|i| self.block(i))
                .collect()
        }

        fn actor_collisions(
            &self,
            rect: &Rect,
            exclude: Option<ActorHandle>,
        ) -> Vec<ActorCollision> {
            self.broad_queries.set(self.broad_queries.get() + 1);
            (0..self.actors.len())
                .map(|slot| self.actor(slot))
                .filter(|c| Some(c.actor) != exclude && c.rect.intersects(rect))
                .collect()
        }

        fn refresh_collision(&self, candidate: &Collision) -> Option<Collision> {
            match candidate.target {
                CollisionTarget::Platform(index) => Some(self.block(index)),
                CollisionTarget::Tile { .. } => None,
            }
        }

        fn refresh_actor_collision(&self, candidate: &ActorCollision) -> Option<ActorCollision> {
            Some(self.actor(candidate.actor.slot))
        }
    }

    #[test]
    fn cached_queries_match_fresh_queries_for_slow_movers() {
        let source = StaticSource::grid();
        let config = CollisionCacheConfig::objects_and_actors(8, 16);
        let mut cache = CollisionCache::new(config);
        let mut owner = Rect::new(0, 0, 16, 24);

        for step in 0..400 {
            let dx = [7, 3, -2, 7][step % 4];
            let dy = [1, -3, 5, 0, 2][step % 5];
            owner = owner.translate(dx, dy);

            let mut cached: Vec<usize> = cache
                .object_collisions(&owner, &owner, &source)
                .iter()
                .map(|c| match c.target {
                    CollisionTarget::Platform(i) => i,
                    CollisionTarget::Tile { .. } => usize::MAX,
                })
                .collect();
            let mut fresh: Vec<usize> = source
                .collisions(&owner)
                .iter()
                .map(|c| match c.target {
                    CollisionTarget::Platform(i) => i,
                    CollisionTarget::Tile { .. } => usize::MAX,
                })
                .collect();
            cached.sort_unstable();
            fresh.sort_unstable();
            assert_eq!(cached, fresh, "step {step} owner {owner:?}");

            let cached_actors = cache.actor_collisions(&owner, &owner, &source).len();
            assert_eq!(cached_actors, source.actor_collisions(&owner, None).len());
        }
    }

    #[test]
    fn cache_is_reused_until_threshold_is_exceeded() {
        let source = StaticSource::grid();
        let mut cache = CollisionCache::new(CollisionCacheConfig::objects_and_actors(32, 128));
        let owner = Rect::new(100, 100, 16, 16);

        cache.object_collisions(&owner, &owner, &source);
        let after_fill = source.broad_queries.get();
        assert_eq!(after_fill, 2);

        let nudged = owner.translate(32, -32);
        cache.object_collisions(&nudged, &nudged, &source);
        assert_eq!(source.broad_queries.get(), after_fill);

        let moved = owner.translate(33, 0);
        cache.object_collisions(&moved, &moved, &source);
        assert_eq!(source.broad_queries.get(), after_fill + 2);
    }

    #[test]
    fn uncached_kinds_query_the_source_directly() {
        let source = StaticSource::grid();
        let mut cache = CollisionCache::new(CollisionCacheConfig::actors_only(32, 128));
        let owner = Rect::new(0, 0, 40, 40);

        cache.object_collisions(&owner, &owner, &source);
        cache.object_collisions(&owner, &owner, &source);
        assert_eq!(source.broad_queries.get(), 2);
        assert!(!cache.is_populated());
    }

    #[test]
    fn excluded_actor_is_never_reported() {
        let source = StaticSource::grid();
        let me = ActorHandle {
            layer: LayerId(1),
            slot: 0,
        };
        let mut cache =
            CollisionCache::new(CollisionCacheConfig::actors_only(32, 128)).with_exclude(me);
        let owner = source.actors[0];
        let hits = cache.actor_collisions(&owner, &owner, &source);
        assert!(hits.iter().all(|hit| hit.actor != me));
    }
}
