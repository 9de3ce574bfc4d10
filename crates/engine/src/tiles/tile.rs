use tracing::warn;

use crate::geometry::Rect;
use crate::properties::{Properties, PropertyError};
use crate::render::{ImageHandle, RenderSink};
use crate::tiles::TileSetId;

/// Index of a tile in the map-wide tile table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub u32);

/// Behaviour flags and geometry overrides read from a tile's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileConfig {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub blocks: bool,
    pub ladder: bool,
    pub lethal: bool,
    pub collectable: bool,
    /// Local ids, in the owning tileset, of the frames cycled after the base image.
    pub animation_frames: Vec<u32>,
    pub animation_delay: u32,
    /// Collision box relative to the tile's top-left corner.
    pub collision: Rect,
}

impl TileConfig {
    pub fn plain(width: i32, height: i32) -> Self {
        Self {
            kind: None,
            name: None,
            blocks: true,
            ladder: false,
            lethal: false,
            collectable: false,
            animation_frames: Vec::new(),
            animation_delay: 1,
            collision: Rect::new(0, 0, width, height),
        }
    }

    pub fn from_properties(
        properties: &Properties,
        width: i32,
        height: i32,
    ) -> Result<Self, PropertyError> {
        let kind = properties.get("type").map(str::to_string);
        let ladder = kind.as_deref() == Some("ladder");
        let collectable = kind.as_deref() == Some("collectable");
        let lethal = kind.as_deref() == Some("lethal") || properties.flag("lethal", false);
        // Ladders and collectables never block, whatever the flag says.
        let blocks = properties.flag("blocks", true) && !ladder && !collectable;

        let collision = Rect::new(
            properties.parse_or("left", 0)?,
            properties.parse_or("top", 0)?,
            properties.parse_or("width", width)?,
            properties.parse_or("height", height)?,
        );

        Ok(Self {
            kind,
            name: properties.get("name").map(str::to_string),
            blocks,
            ladder,
            lethal,
            collectable,
            animation_frames: properties.parse_list("animation")?,
            animation_delay: properties.parse_or("delay", 1_u32)?.max(1),
            collision,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TileAnimation {
    frames: Vec<ImageHandle>,
    delay: u32,
    countdown: u32,
    state: usize,
}

#[derive(Debug, Clone)]
pub struct Tile {
    id: TileId,
    tileset: TileSetId,
    local_id: u32,
    width: i32,
    height: i32,
    original: ImageHandle,
    image: ImageHandle,
    config: TileConfig,
    properties: Properties,
    animation: Option<TileAnimation>,
}

impl Tile {
    pub(crate) fn new(
        id: TileId,
        tileset: TileSetId,
        local_id: u32,
        size: (i32, i32),
        image: ImageHandle,
        properties: Properties,
    ) -> Self {
        let (width, height) = size;
        let config = match TileConfig::from_properties(&properties, width, height) {
            Ok(config) => config,
            Err(error) => {
                warn!(
                    tile = id.0,
                    local_id,
                    error = %error,
                    "tile_properties_invalid"
                );
                TileConfig::plain(width, height)
            }
        };

        let animation = (!config.animation_frames.is_empty()).then(|| TileAnimation {
            frames: config
                .animation_frames
                .iter()
                .map(|frame| ImageHandle::new(tileset, *frame).with_transform(image.transform))
                .collect(),
            delay: config.animation_delay,
            countdown: config.animation_delay,
            state: 0,
        });

        Self {
            id,
            tileset,
            local_id,
            width,
            height,
            original: image,
            image,
            config,
            properties,
            animation,
        }
    }

    /// Copy of this tile under a new id, drawn with `image`.
    pub(crate) fn derive(&self, id: TileId, local_id: u32, image: ImageHandle) -> Self {
        let mut tile = Tile::new(
            id,
            self.tileset,
            local_id,
            (self.width, self.height),
            image,
            self.properties.clone(),
        );
        tile.config = self.config.clone();
        tile
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn tileset(&self) -> TileSetId {
        self.tileset
    }

    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn kind(&self) -> Option<&str> {
        self.config.kind.as_deref()
    }

    pub fn blocks(&self) -> bool {
        self.config.blocks
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    pub fn original_image(&self) -> ImageHandle {
        self.original
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    /// World collision rect for this tile drawn with its top-left at `(x, y)`.
    pub fn collision_rect_at(&self, x: i32, y: i32) -> Rect {
        self.config.collision.translate(x, y)
    }

    /// Advances the animation clock by one tick.
    pub(crate) fn update(&mut self) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        animation.countdown = animation.countdown.saturating_sub(1);
        if animation.countdown > 0 {
            return;
        }
        animation.countdown = animation.delay;
        animation.state = (animation.state + 1) % (animation.frames.len() + 1);
        self.image = match animation.state {
            0 => self.original,
            state => animation.frames[state - 1],
        };
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, screen_pos: (i32, i32)) {
        sink.blit(self.image, screen_pos, None, None);
    }
}
