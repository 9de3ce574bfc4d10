use crate::geometry::Rect;
use crate::tiles::TileSetId;

/// Orientation applied to a tileset frame when it is blitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileTransform {
    pub flip_x: bool,
    pub flip_y: bool,
    /// Diagonal flip: swap axes before the other flips apply.
    pub rotate: bool,
}

impl TileTransform {
    pub fn is_identity(&self) -> bool {
        !self.flip_x && !self.flip_y && !self.rotate
    }
}

/// Opaque reference to one frame of a tileset image. The render backend owns
/// the pixels; the map only passes handles around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub sheet: TileSetId,
    pub frame: u32,
    pub transform: TileTransform,
}

impl ImageHandle {
    pub fn new(sheet: TileSetId, frame: u32) -> Self {
        Self {
            sheet,
            frame,
            transform: TileTransform::default(),
        }
    }

    pub fn with_transform(self, transform: TileTransform) -> Self {
        Self { transform, ..self }
    }
}

/// Drawing surface the map renders into.
pub trait RenderSink {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    fn blit(
        &mut self,
        image: ImageHandle,
        screen_pos: (i32, i32),
        source_area: Option<Rect>,
        alpha: Option<u8>,
    );
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Blit {
    pub image: ImageHandle,
    pub screen_pos: (i32, i32),
    pub source_area: Option<Rect>,
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub width: u32,
    pub height: u32,
    pub blits: Vec<Blit>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blits: Vec::new(),
        }
    }
}

#[cfg(test)]
impl RenderSink for RecordingSink {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn blit(
        &mut self,
        image: ImageHandle,
        screen_pos: (i32, i32),
        source_area: Option<Rect>,
        _alpha: Option<u8>,
    ) {
        self.blits.push(Blit {
            image,
            screen_pos,
            source_area,
        });
    }
}
