use tracing::debug;

use crate::collision_cache::{ActorCollision, CollisionCache};
use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::objects::{Actor, ActorHandle, ActorMessage};
use crate::quadtree::QuadTree;
use crate::render::RenderSink;

#[derive(Debug)]
pub(crate) struct ActorSlot {
    pub actor: Box<dyn Actor>,
    pub cache: CollisionCache,
}

/// Live actors of one layer with a quadtree over their collision rects.
///
/// The tree is rebuilt once per frame. Between rebuilds `drift` bounds how
/// far any indexed actor moved since it was indexed, and queries widen
/// their search by that much before narrowing against live rects, so
/// movement never hides an actor from a query.
#[derive(Debug)]
pub struct ActorsLayer {
    id: LayerId,
    slots: Vec<Option<ActorSlot>>,
    tree: QuadTree<usize>,
    indexed: Vec<Option<Rect>>,
    unindexed: Vec<usize>,
    drift: i32,
}

impl ActorsLayer {
    pub fn new(id: LayerId, bounds: Rect) -> Self {
        Self {
            id,
            slots: Vec::new(),
            tree: QuadTree::new(bounds),
            indexed: Vec::new(),
            unindexed: Vec::new(),
            drift: 0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub(crate) fn spawn(&mut self, actor: Box<dyn Actor>, cache: CollisionCache) -> ActorHandle {
        let slot = self.slots.len();
        let handle = ActorHandle {
            layer: self.id,
            slot,
        };
        self.slots.push(Some(ActorSlot {
            actor,
            cache: cache.with_exclude(handle),
        }));
        self.indexed.push(None);
        self.unindexed.push(slot);
        handle
    }

    /// Number of slots ever allocated, removed ones included.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn actor(&self, slot: usize) -> Option<&dyn Actor> {
        self.slots
            .get(slot)?
            .as_ref()
            .map(|entry| entry.actor.as_ref())
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorHandle, &dyn Actor)> {
        let layer = self.id;
        self.slots.iter().enumerate().filter_map(move |(slot, entry)| {
            entry
                .as_ref()
                .map(|entry| (ActorHandle { layer, slot }, entry.actor.as_ref()))
        })
    }

    /// Detaches a slot while its actor runs with mutable access to the map.
    pub(crate) fn take(&mut self, slot: usize) -> Option<ActorSlot> {
        self.slots.get_mut(slot)?.take()
    }

    pub(crate) fn put_back(&mut self, slot: usize, entry: ActorSlot) {
        if let Some(place) = self.slots.get_mut(slot) {
            *place = Some(entry);
            self.note_moved(slot);
        }
    }

    pub(crate) fn remove(&mut self, slot: usize) -> bool {
        let removed = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .is_some();
        if removed {
            debug!(layer = self.id.0, slot, "actor_removed");
        }
        removed
    }

    pub(crate) fn move_actor(&mut self, slot: usize, dx: i32, dy: i32) -> bool {
        let Some(Some(entry)) = self.slots.get_mut(slot) else {
            return false;
        };
        entry.actor.move_by(dx, dy);
        self.note_moved(slot);
        true
    }

    pub(crate) fn set_actor_rect(&mut self, slot: usize, rect: Rect) -> bool {
        let Some(Some(entry)) = self.slots.get_mut(slot) else {
            return false;
        };
        entry.actor.set_rect(rect);
        self.note_moved(slot);
        true
    }

    /// Delivers a message. A displaced actor also drops its collision cache.
    pub(crate) fn notify(&mut self, slot: usize, message: ActorMessage) -> bool {
        let Some(Some(entry)) = self.slots.get_mut(slot) else {
            return false;
        };
        entry.actor.notify(message);
        if message == ActorMessage::Moved {
            let rect = entry.actor.collision_rect();
            entry.cache.reset(&rect);
        }
        true
    }

    fn note_moved(&mut self, slot: usize) {
        let Some(Some(entry)) = self.slots.get(slot) else {
            return;
        };
        let Some(Some(indexed)) = self.indexed.get(slot) else {
            return;
        };
        let now = entry.actor.collision_rect();
        let dx = (now.x - indexed.x).abs() + (now.width - indexed.width).abs();
        let dy = (now.y - indexed.y).abs() + (now.height - indexed.height).abs();
        self.drift = self.drift.max(dx).max(dy);
    }

    /// Re-inserts every live actor at its current collision rect.
    pub fn rebuild_index(&mut self) {
        self.tree.clear();
        self.unindexed.clear();
        self.drift = 0;
        for (slot, entry) in self.slots.iter().enumerate() {
            match entry {
                Some(entry) => {
                    let rect = entry.actor.collision_rect();
                    self.tree.insert(rect, slot);
                    self.indexed[slot] = Some(rect);
                }
                None => self.indexed[slot] = None,
            }
        }
    }

    /// Active actors whose collision rect intersects `rect`.
    pub fn collisions(&self, rect: &Rect, exclude: Option<ActorHandle>) -> Vec<ActorCollision> {
        let mut candidates: Vec<usize> = self
            .tree
            .retrieve(&rect.inflate(self.drift, self.drift))
            .into_iter()
            .map(|(_, slot)| slot)
            .chain(self.unindexed.iter().copied())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        candidates
            .into_iter()
            .filter_map(|slot| self.live_collision(slot))
            .filter(|collision| Some(collision.actor) != exclude)
            .filter(|collision| collision.rect.intersects(rect))
            .collect()
    }

    /// Current collision rect of an active actor.
    pub fn live_collision(&self, slot: usize) -> Option<ActorCollision> {
        let entry = self.slots.get(slot)?.as_ref()?;
        if !entry.actor.is_active() {
            return None;
        }
        Some(ActorCollision {
            rect: entry.actor.collision_rect(),
            actor: ActorHandle {
                layer: self.id,
                slot,
            },
        })
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect) {
        for entry in self.slots.iter().flatten() {
            let actor = &entry.actor;
            if !actor.is_active() || !actor.collision_rect().intersects(visible) {
                continue;
            }
            let rect = actor.rect();
            actor.draw(sink, (rect.x - visible.x, rect.y - visible.y));
        }
    }
}
