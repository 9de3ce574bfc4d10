use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::objects::{Trigger, Triggered};

/// Triggers and their triggereds. Only armed triggers take part in
/// collision queries.
#[derive(Debug, Clone, Default)]
pub struct TriggersLayer {
    linked_layer: Option<LayerId>,
    triggers: Vec<Trigger>,
    triggereds: Vec<Triggered>,
    active: Vec<usize>,
}

impl TriggersLayer {
    pub fn new(linked_layer: Option<LayerId>) -> Self {
        Self {
            linked_layer,
            ..Self::default()
        }
    }

    /// Tiles layer mutated by triggers and triggereds unless they name another.
    pub fn linked_layer(&self) -> Option<LayerId> {
        self.linked_layer
    }

    pub fn add_trigger(&mut self, trigger: Trigger) -> usize {
        let index = self.triggers.len();
        self.triggers.push(trigger);
        self.active.push(index);
        index
    }

    /// Registers a triggered and attaches it to trigger `trigger`.
    pub fn add_triggered(&mut self, trigger: usize, triggered: Triggered) -> Option<usize> {
        let owner = self.triggers.get_mut(trigger)?;
        let index = self.triggereds.len();
        owner.append_triggered(index);
        self.triggereds.push(triggered);
        Some(index)
    }

    pub fn find_trigger(&self, name: &str) -> Option<usize> {
        self.triggers
            .iter()
            .position(|trigger| trigger.name() == name)
    }

    pub fn trigger(&self, index: usize) -> Option<&Trigger> {
        self.triggers.get(index)
    }

    pub(crate) fn trigger_mut(&mut self, index: usize) -> Option<&mut Trigger> {
        self.triggers.get_mut(index)
    }

    pub fn triggered(&self, index: usize) -> Option<&Triggered> {
        self.triggereds.get(index)
    }

    pub(crate) fn triggered_mut(&mut self, index: usize) -> Option<&mut Triggered> {
        self.triggereds.get_mut(index)
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn deactivate(&mut self, index: usize) {
        self.active.retain(|active| *active != index);
    }

    /// Armed triggers overlapping `rect`, in registration order.
    pub fn collisions(&self, rect: &Rect) -> Vec<usize> {
        self.active
            .iter()
            .copied()
            .filter(|index| {
                self.triggers
                    .get(*index)
                    .is_some_and(|trigger| trigger.rect().intersects(rect))
            })
            .collect()
    }
}
