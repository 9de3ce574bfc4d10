mod actors_layer;
mod array_layer;
mod platforms_layer;
mod triggers_layer;

pub use actors_layer::ActorsLayer;
pub use array_layer::{ArrayLayer, ArrayLayerError, TileRef};
pub use platforms_layer::PlatformsLayer;
pub use triggers_layer::TriggersLayer;

pub(crate) use actors_layer::ActorSlot;

use crate::geometry::Rect;
use crate::properties::{Properties, PropertyError};
use crate::render::RenderSink;
use crate::tiles::TileSets;

/// Index of a layer in its map, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub usize);

/// What an object layer holds, from its `type` property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectGroupKind {
    #[default]
    Platforms,
    Triggers,
}

/// Flags read from a layer's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    pub visible: bool,
    /// Only holds tiles referenced by other layers; never drawn or collided.
    pub holder: bool,
    /// Tile layer whose tiles become actors.
    pub actors: bool,
    pub parallax: bool,
    /// Percent of the display offset applied when drawing a parallax layer.
    pub parallax_factor: (i32, i32),
    pub group: ObjectGroupKind,
    /// Tile layer an object layer reads from or mutates.
    pub linked_layer: Option<String>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            visible: true,
            holder: false,
            actors: false,
            parallax: false,
            parallax_factor: (100, 100),
            group: ObjectGroupKind::Platforms,
            linked_layer: None,
        }
    }
}

impl LayerConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, PropertyError> {
        let group = match properties.get("type") {
            None | Some("platforms") => ObjectGroupKind::Platforms,
            Some("triggers") => ObjectGroupKind::Triggers,
            Some(other) => {
                return Err(PropertyError::UnknownVariant {
                    key: "type".to_string(),
                    value: other.to_string(),
                })
            }
        };
        Ok(Self {
            visible: properties.flag("visible", true),
            holder: properties.flag("holder", false),
            actors: properties.flag("actors", false),
            parallax: properties.flag("parallax", false),
            parallax_factor: (
                properties.parse_or("parallax_factor_x", 100)?,
                properties.parse_or("parallax_factor_y", 100)?,
            ),
            group,
            linked_layer: properties.get("layer").map(str::to_string),
        })
    }
}

#[derive(Debug)]
pub enum LayerContent {
    Array(ArrayLayer),
    Platforms(PlatformsLayer),
    Triggers(TriggersLayer),
    Actors(ActorsLayer),
}

#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    name: String,
    config: LayerConfig,
    properties: Properties,
    content: LayerContent,
}

impl Layer {
    pub fn new(
        id: LayerId,
        name: &str,
        config: LayerConfig,
        properties: Properties,
        content: LayerContent,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            config,
            properties,
            content,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut LayerContent {
        &mut self.content
    }

    pub fn is_triggers(&self) -> bool {
        matches!(self.content, LayerContent::Triggers(_))
    }

    pub fn is_actors(&self) -> bool {
        matches!(self.content, LayerContent::Actors(_))
    }

    pub fn is_collision(&self) -> bool {
        !self.config.holder
            && self.config.visible
            && !self.is_actors()
            && !self.config.parallax
            && !self.is_triggers()
    }

    pub fn is_rendering(&self) -> bool {
        !self.config.holder && self.config.visible && !self.is_triggers()
    }

    pub fn as_array(&self) -> Option<&ArrayLayer> {
        match &self.content {
            LayerContent::Array(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayLayer> {
        match &mut self.content {
            LayerContent::Array(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_platforms(&self) -> Option<&PlatformsLayer> {
        match &self.content {
            LayerContent::Platforms(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_platforms_mut(&mut self) -> Option<&mut PlatformsLayer> {
        match &mut self.content {
            LayerContent::Platforms(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_triggers(&self) -> Option<&TriggersLayer> {
        match &self.content {
            LayerContent::Triggers(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_triggers_mut(&mut self) -> Option<&mut TriggersLayer> {
        match &mut self.content {
            LayerContent::Triggers(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_actors(&self) -> Option<&ActorsLayer> {
        match &self.content {
            LayerContent::Actors(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_actors_mut(&mut self) -> Option<&mut ActorsLayer> {
        match &mut self.content {
            LayerContent::Actors(layer) => Some(layer),
            _ => None,
        }
    }

    /// World rect shown by this layer for a display at `display` of `size`
    /// pixels. Parallax layers scroll by a percentage of the display offset.
    pub fn visible_rect(&self, display: (i32, i32), size: (u32, u32)) -> Rect {
        let (mut x, mut y) = display;
        if self.config.parallax {
            x = (x * self.config.parallax_factor.0).div_euclid(100);
            y = (y * self.config.parallax_factor.1).div_euclid(100);
        }
        Rect::new(x, y, size.0 as i32, size.1 as i32)
    }

    pub fn draw(
        &self,
        tilesets: &TileSets,
        sink: &mut dyn RenderSink,
        display: (i32, i32),
        size: (u32, u32),
    ) {
        let visible = self.visible_rect(display, size);
        match &self.content {
            LayerContent::Array(layer) => layer.on_draw(tilesets, sink, &visible),
            LayerContent::Platforms(layer) => layer.draw(sink, &visible),
            LayerContent::Actors(layer) => layer.draw(sink, &visible),
            LayerContent::Triggers(_) => {}
        }
    }
}
