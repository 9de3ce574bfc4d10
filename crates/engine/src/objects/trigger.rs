use std::str::FromStr;

use tracing::{debug, error, info, warn};

use crate::effects::{Effect, SlidingTileEffect, SLIDING_TILE_TICKS};
use crate::fixed::FixedPoint2;
use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::map::{Map, MapEvent};
use crate::properties::{Properties, PropertyError};
use crate::tiles::TileId;

/// Interpolation steps per camera pan leg.
pub const PAN_STEPS: u32 = 30;
/// Ticks the camera holds on each triggered before moving on.
pub const PAN_SLEEP_TICKS: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSound {
    pub name: String,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    pub sound: Option<TriggerSound>,
    /// Local id, in the tileset of the tile under the trigger, placed there on fire.
    pub tile_on_trigger: Option<u32>,
    /// Pan the camera over the triggereds after firing.
    pub show: bool,
}

impl TriggerConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, PropertyError> {
        let volume = match properties.parse_or("sound_volume", 1.0_f32) {
            Ok(volume) => volume,
            Err(error) => {
                warn!(error = %error, "trigger_sound_volume_invalid");
                1.0
            }
        };
        Ok(Self {
            sound: properties.get("sound").map(|name| TriggerSound {
                name: name.to_string(),
                volume,
            }),
            tile_on_trigger: properties.parse("tile_on_trigger")?,
            show: properties.flag("show", true),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Fired,
}

/// Fire-once event source living in a triggers layer.
#[derive(Debug, Clone)]
pub struct Trigger {
    name: String,
    rect: Rect,
    state: TriggerState,
    config: TriggerConfig,
    tile_on_fire: Option<TileId>,
    triggereds: Vec<usize>,
}

impl Trigger {
    pub fn new(name: String, rect: Rect, config: TriggerConfig, tile_on_fire: Option<TileId>) -> Self {
        Self {
            name,
            rect,
            state: TriggerState::Armed,
            config,
            tile_on_fire,
            triggereds: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn tile_on_fire(&self) -> Option<TileId> {
        self.tile_on_fire
    }

    /// Indices, in the owning layer, of the triggereds run on fire.
    pub fn triggereds(&self) -> &[usize] {
        &self.triggereds
    }

    pub(crate) fn append_triggered(&mut self, index: usize) {
        self.triggereds.push(index);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggeredAction {
    Remove,
    RemoveSliding,
    Start,
}

impl FromStr for TriggeredAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "remove" => Ok(Self::Remove),
            "remove-sliding" => Ok(Self::RemoveSliding),
            "start" => Ok(Self::Start),
            other => Err(format!("unknown triggered action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredConfig {
    pub trigger: String,
    pub action: TriggeredAction,
    /// Layer acted upon instead of the triggers layer's linked layer.
    pub layer: Option<String>,
}

impl TriggeredConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, PropertyError> {
        let action = properties.required("action")?;
        let action = action
            .parse::<TriggeredAction>()
            .map_err(|_| PropertyError::UnknownVariant {
                key: "action".to_string(),
                value: action.to_string(),
            })?;
        Ok(Self {
            trigger: properties.required("trigger")?.to_string(),
            action,
            layer: properties.get("layer").map(str::to_string),
        })
    }
}

/// One scripted consequence of a trigger.
#[derive(Debug, Clone)]
pub struct Triggered {
    name: String,
    rect: Rect,
    action: TriggeredAction,
    target: Option<LayerId>,
    executed: bool,
}

impl Triggered {
    pub fn new(name: String, rect: Rect, action: TriggeredAction, target: Option<LayerId>) -> Self {
        Self {
            name,
            rect,
            action,
            target,
            executed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn action(&self) -> TriggeredAction {
        self.action
    }

    pub fn target(&self) -> Option<LayerId> {
        self.target
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }
}

/// Fires trigger `index` of triggers layer `layer`. Returns false when the
/// trigger does not exist or already fired.
pub(crate) fn fire_trigger(map: &mut Map, layer: LayerId, index: usize) -> bool {
    let Some(triggers) = map.triggers_layer_mut(layer) else {
        return false;
    };
    let linked = triggers.linked_layer();
    let Some(trigger) = triggers.trigger_mut(index) else {
        return false;
    };
    if trigger.state == TriggerState::Fired {
        error!(trigger = %trigger.name, "trigger_already_fired");
        return false;
    }
    trigger.state = TriggerState::Fired;
    let trigger = trigger.clone();
    triggers.deactivate(index);

    if let Some(sound) = &trigger.config.sound {
        map.push_event(MapEvent::PlaySound {
            name: sound.name.clone(),
            volume: sound.volume,
        });
    }
    map.push_event(MapEvent::TriggerFired {
        name: trigger.name.clone(),
    });

    let mut legs = Vec::with_capacity(trigger.triggereds.len());
    for &triggered in &trigger.triggereds {
        let effect = execute_triggered(map, layer, triggered);
        let origin = map
            .triggers_layer(layer)
            .and_then(|triggers| triggers.triggered(triggered))
            .map(|triggered| triggered.rect.top_left());
        if let Some(origin) = origin {
            legs.push((origin, effect));
        }
    }

    if let (Some(tile), Some(linked)) = (trigger.tile_on_fire, linked) {
        map.set_tile_at(linked, trigger.rect.x, trigger.rect.y, Some(tile));
    }

    info!(
        trigger = %trigger.name,
        triggereds = legs.len(),
        show = trigger.config.show,
        "trigger_fired"
    );

    if trigger.config.show {
        let pan = CameraPan::new(map, legs);
        map.install_camera_pan(pan);
    } else {
        for (_, effect) in legs {
            if let Some(effect) = effect {
                map.add_effect(None, effect);
            }
        }
    }
    true
}

/// Runs triggered `index` of triggers layer `layer` once. A sliding removal
/// hands back its effect instead of touching the tiles right away.
pub(crate) fn execute_triggered(
    map: &mut Map,
    layer: LayerId,
    index: usize,
) -> Option<Box<dyn Effect>> {
    let triggers = map.triggers_layer_mut(layer)?;
    let linked = triggers.linked_layer();
    let triggered = triggers.triggered_mut(index)?;
    if triggered.executed {
        error!(triggered = %triggered.name, "triggered_already_executed");
        return None;
    }
    triggered.executed = true;
    let (name, rect, action) = (triggered.name.clone(), triggered.rect, triggered.action);

    let Some(target) = triggered.target.or(linked) else {
        warn!(triggered = %name, "triggered_target_layer_missing");
        return None;
    };
    debug!(triggered = %name, action = ?action, target = target.0, "triggered_executed");

    match action {
        TriggeredAction::Remove => {
            let (tile_width, tile_height) = map.tile_size();
            for y in (rect.top()..rect.bottom()).step_by(tile_height.max(1) as usize) {
                for x in (rect.left()..rect.right()).step_by(tile_width.max(1) as usize) {
                    map.remove_object_at(target, x, y);
                }
            }
            None
        }
        TriggeredAction::RemoveSliding => {
            match SlidingTileEffect::new(map, target, rect, SLIDING_TILE_TICKS, true) {
                Some(effect) => Some(Box::new(effect)),
                None => {
                    warn!(triggered = %name, "sliding_tile_missing");
                    None
                }
            }
        }
        TriggeredAction::Start => {
            let Some(platforms) = map.platforms_layer_mut(target) else {
                warn!(triggered = %name, target = target.0, "triggered_target_not_platforms");
                return None;
            };
            for platform in platforms.platforms_mut() {
                if platform.rect().intersects(&rect) {
                    platform.start();
                }
            }
            None
        }
    }
}

#[derive(Debug)]
struct PanLeg {
    target: FixedPoint2,
    gradient: FixedPoint2,
    effect: Option<Box<dyn Effect>>,
}

/// Scripted camera move over the triggereds of a fired trigger, ending back
/// where the display started. Driven once per frame before drawing.
#[derive(Debug)]
pub struct CameraPan {
    legs: Vec<PanLeg>,
    current: usize,
    step: u32,
    sleeping: u32,
    position: FixedPoint2,
    original: (i32, i32),
    steps: u32,
    sleep_ticks: u32,
}

impl CameraPan {
    /// `legs` holds each triggered's top-left and the effect shown on arrival.
    pub fn new(map: &Map, legs: Vec<((i32, i32), Option<Box<dyn Effect>>)>) -> Self {
        let config = map.config();
        let (view_w, view_h) = config.viewport;
        let (half_w, half_h) = ((view_w / 2) as i32, (view_h / 2) as i32);
        let original = map.display_position();
        let steps = config.pan_steps.max(1);

        let mut current = FixedPoint2::from_int(original.0, original.1);
        let mut pan_legs = Vec::with_capacity(legs.len() + 1);
        let back_home = ((original.0 + half_w, original.1 + half_h), None);
        for ((x, y), effect) in legs.into_iter().chain(std::iter::once(back_home)) {
            let target = FixedPoint2::from_int(x - half_w, y - half_h);
            pan_legs.push(PanLeg {
                target,
                gradient: (target - current).div_int(steps as i64),
                effect,
            });
            current = target;
        }

        Self {
            legs: pan_legs,
            current: 0,
            step: 0,
            sleeping: config.pan_sleep_ticks,
            position: FixedPoint2::from_int(original.0, original.1),
            original,
            steps,
            sleep_ticks: config.pan_sleep_ticks,
        }
    }

    pub fn original_position(&self) -> (i32, i32) {
        self.original
    }

    pub(crate) fn keep_original(&mut self, original: (i32, i32)) {
        self.original = original;
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.legs.len()
    }

    /// Advances one frame. Returns false once the pan is over and the
    /// display is back at its original position.
    pub fn step(&mut self, map: &mut Map) -> bool {
        let leg_count = self.legs.len();
        let Some(leg) = self.legs.get_mut(self.current) else {
            map.set_display_position(self.original.0, self.original.1);
            return false;
        };

        if self.step == self.steps {
            self.position = leg.target;
            if let Some(effect) = leg.effect.take() {
                map.add_effect(None, effect);
            }
            if self.current + 1 == leg_count || self.sleeping == 0 {
                self.step = 0;
                self.current += 1;
                self.sleeping = self.sleep_ticks;
            } else {
                self.sleeping -= 1;
            }
        } else {
            self.position += leg.gradient;
            self.step += 1;
        }

        let (x, y) = self.position.floor();
        map.set_display_position(x, y);
        true
    }
}
