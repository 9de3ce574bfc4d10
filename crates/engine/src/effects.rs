use std::fmt::Debug;

use tracing::trace;

use crate::fixed::Fixed;
use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::map::Map;
use crate::render::{ImageHandle, RenderSink};

/// Ticks a sliding tile takes to vanish.
pub const SLIDING_TILE_TICKS: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStatus {
    Running,
    Finished,
}

/// Transient visual drawn above every map layer.
pub trait Effect: Debug {
    fn update(&mut self, map: &mut Map) -> EffectStatus;

    fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect);
}

/// Running effects in insertion order. A keyed effect replaces the running
/// effect with the same key.
#[derive(Debug, Default)]
pub struct EffectsLayer {
    effects: Vec<(Option<String>, Box<dyn Effect>)>,
}

impl EffectsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.effects
            .iter()
            .any(|(existing, _)| existing.as_deref() == Some(key))
    }

    pub fn add(&mut self, key: Option<&str>, effect: Box<dyn Effect>) {
        if let Some(key) = key {
            if let Some(entry) = self
                .effects
                .iter_mut()
                .find(|(existing, _)| existing.as_deref() == Some(key))
            {
                entry.1 = effect;
                return;
            }
        }
        self.effects.push((key.map(str::to_string), effect));
    }

    /// Appends effects added while this layer was detached from the map.
    pub(crate) fn absorb(&mut self, other: EffectsLayer) {
        for (key, effect) in other.effects {
            self.add(key.as_deref(), effect);
        }
    }

    pub(crate) fn update(&mut self, map: &mut Map) {
        self.effects.retain_mut(|(key, effect)| {
            let status = effect.update(map);
            if status == EffectStatus::Finished {
                trace!(key = ?key, "effect_finished");
            }
            status == EffectStatus::Running
        });
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect) {
        for (_, effect) in &self.effects {
            effect.draw(sink, visible);
        }
    }
}

/// Removes a tile and draws it sliding out of its cell.
#[derive(Debug, Clone)]
pub struct SlidingTileEffect {
    layer: LayerId,
    rect: Rect,
    image: ImageHandle,
    size: (i32, i32),
    position: Fixed,
    step: Fixed,
    max: i32,
    horizontal: bool,
    removed: bool,
}

impl SlidingTileEffect {
    /// `None` when there is no tile at the top-left of `rect`.
    pub fn new(
        map: &Map,
        layer: LayerId,
        rect: Rect,
        ticks: u32,
        horizontal: bool,
    ) -> Option<Self> {
        let tile_id = map.get_object_at(layer, rect.x, rect.y)?;
        let tile = map.tilesets().tile(tile_id)?;
        let (width, height) = tile.size();
        let max = if horizontal { width } else { height };
        Some(Self {
            layer,
            rect,
            image: tile.image(),
            size: (width, height),
            position: Fixed::ZERO,
            step: Fixed::ratio(max, ticks.max(1) as i32),
            max,
            horizontal,
            removed: false,
        })
    }

    pub fn offset(&self) -> i32 {
        self.position.floor()
    }
}

impl Effect for SlidingTileEffect {
    fn update(&mut self, map: &mut Map) -> EffectStatus {
        if !self.removed {
            map.remove_object_at(self.layer, self.rect.x, self.rect.y);
            self.removed = true;
        }
        self.position += self.step;
        if self.position.floor() >= self.max {
            EffectStatus::Finished
        } else {
            EffectStatus::Running
        }
    }

    fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect) {
        let offset = self.offset();
        let (width, height) = self.size;
        let area = if self.horizontal {
            Rect::new(offset, 0, width - offset, height)
        } else {
            Rect::new(0, offset, width, height - offset)
        };
        sink.blit(
            self.image,
            (self.rect.x - visible.x, self.rect.y - visible.y),
            Some(area),
            None,
        );
    }
}
