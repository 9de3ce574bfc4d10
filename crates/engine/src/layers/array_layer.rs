use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::Rect;
use crate::render::{RenderSink, TileTransform};
use crate::tiles::{TileId, TileSets};

const FLIPPED_HORIZONTALLY: u32 = 0x8000_0000;
const FLIPPED_VERTICALLY: u32 = 0x4000_0000;
const FLIPPED_DIAGONALLY: u32 = 0x2000_0000;
const FLAG_BITS: u32 = 0xF000_0000;
const GID_MASK: u32 = 0x0FFF_FFFF;

/// Grid cell content: 0 is empty, otherwise the tile id plus one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileRef(u32);

impl TileRef {
    pub const EMPTY: TileRef = TileRef(0);

    pub fn from_tile(tile: TileId) -> Self {
        Self(tile.0 + 1)
    }

    pub fn tile(self) -> Option<TileId> {
        self.0.checked_sub(1).map(TileId)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Option<TileId>> for TileRef {
    fn from(tile: Option<TileId>) -> Self {
        tile.map_or(TileRef::EMPTY, TileRef::from_tile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArrayLayerError {
    #[error("cell count mismatch: expected {expected}, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
}

/// Dense tile grid with a per-row occupancy cache.
///
/// `row_index[y]` lists the non-empty columns of row `y` in ascending order.
/// `row_offset[y][x]` is the position in `row_index[y]` of the first
/// non-empty column at or after `x`, or `None` when the rest of the row is
/// empty. Both are rebuilt for a row whenever one of its cells changes.
#[derive(Debug, Clone)]
pub struct ArrayLayer {
    width: u32,
    height: u32,
    tile_width: i32,
    tile_height: i32,
    data: Vec<TileRef>,
    row_index: Vec<Vec<(u32, TileId)>>,
    row_offset: Vec<Vec<Option<u32>>>,
}

impl ArrayLayer {
    pub fn new(
        width: u32,
        height: u32,
        tile_size: (i32, i32),
        data: Vec<TileRef>,
    ) -> Result<Self, ArrayLayerError> {
        let expected = width as usize * height as usize;
        let actual = data.len();
        if expected != actual {
            return Err(ArrayLayerError::CellCountMismatch { expected, actual });
        }
        let mut layer = Self {
            width,
            height,
            tile_width: tile_size.0.max(1),
            tile_height: tile_size.1.max(1),
            data,
            row_index: vec![Vec::new(); height as usize],
            row_offset: vec![Vec::new(); height as usize],
        };
        for y in 0..height {
            layer.rebuild_row(y);
        }
        Ok(layer)
    }

    pub fn empty(width: u32, height: u32, tile_size: (i32, i32)) -> Self {
        let data = vec![TileRef::EMPTY; width as usize * height as usize];
        Self {
            width,
            height,
            tile_width: tile_size.0.max(1),
            tile_height: tile_size.1.max(1),
            data,
            row_index: vec![Vec::new(); height as usize],
            row_offset: vec![vec![None; width as usize]; height as usize],
        }
    }

    /// Builds a layer from raw map ids. Ids carrying flip bits are replaced by
    /// a synthesized tile, one per distinct flagged id. Unknown ids leave the
    /// cell empty.
    pub fn load(
        width: u32,
        height: u32,
        tile_size: (i32, i32),
        gids: &[u32],
        tilesets: &mut TileSets,
    ) -> Result<Self, ArrayLayerError> {
        let expected = width as usize * height as usize;
        if gids.len() != expected {
            return Err(ArrayLayerError::CellCountMismatch {
                expected,
                actual: gids.len(),
            });
        }

        let mut resolved: HashMap<u32, TileRef> = HashMap::new();
        let mut data = Vec::with_capacity(expected);
        for &gid in gids {
            if gid == 0 {
                data.push(TileRef::EMPTY);
                continue;
            }
            let cell = *resolved
                .entry(gid)
                .or_insert_with(|| resolve_cell(gid, tilesets));
            data.push(cell);
        }

        let flipped = resolved
            .keys()
            .filter(|gid| *gid & FLAG_BITS != 0)
            .count();
        debug!(width, height, flipped, "array_layer_loaded");

        Self::new(width, height, tile_size, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> (i32, i32) {
        (self.tile_width, self.tile_height)
    }

    /// Layer extent in pixels.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            0,
            0,
            self.width as i32 * self.tile_width,
            self.height as i32 * self.tile_height,
        )
    }

    /// Cell containing pixel `(x, y)`; may lie outside the grid.
    pub fn cell_of(&self, x: i32, y: i32) -> (i32, i32) {
        (x.div_euclid(self.tile_width), y.div_euclid(self.tile_height))
    }

    fn index_of(&self, cx: i32, cy: i32) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.width as i32 || cy >= self.height as i32 {
            return None;
        }
        Some(cy as usize * self.width as usize + cx as usize)
    }

    pub fn tile_at_cell(&self, cx: i32, cy: i32) -> Option<TileId> {
        self.index_of(cx, cy)
            .and_then(|index| self.data.get(index))
            .and_then(|cell| cell.tile())
    }

    /// Tile under pixel `(x, y)`.
    pub fn get_object_at(&self, x: i32, y: i32) -> Option<TileId> {
        let (cx, cy) = self.cell_of(x, y);
        self.tile_at_cell(cx, cy)
    }

    /// Replaces the tile under pixel `(x, y)`. Returns false when the pixel
    /// lies outside the grid.
    pub fn set_tile_at(&mut self, x: i32, y: i32, tile: Option<TileId>) -> bool {
        let (cx, cy) = self.cell_of(x, y);
        self.set_cell(cx, cy, tile)
    }

    pub fn remove_object_at(&mut self, x: i32, y: i32) -> bool {
        self.set_tile_at(x, y, None)
    }

    pub fn set_cell(&mut self, cx: i32, cy: i32, tile: Option<TileId>) -> bool {
        let Some(index) = self.index_of(cx, cy) else {
            return false;
        };
        self.data[index] = TileRef::from(tile);
        self.rebuild_row(cy as u32);
        true
    }

    fn rebuild_row(&mut self, y: u32) {
        let width = self.width as usize;
        let start = y as usize * width;
        let row = &self.data[start..start + width];

        let index: Vec<(u32, TileId)> = row
            .iter()
            .enumerate()
            .filter_map(|(x, cell)| cell.tile().map(|tile| (x as u32, tile)))
            .collect();

        let mut offsets = vec![None; width];
        let mut column = 0_usize;
        for (position, (x, _)) in index.iter().enumerate() {
            while column <= *x as usize {
                offsets[column] = Some(position as u32);
                column += 1;
            }
        }

        self.row_index[y as usize] = index;
        self.row_offset[y as usize] = offsets;
    }

    /// Cell range `[x_start, x_end) x [y_start, y_end)` touched by `rect`,
    /// clipped to the grid. Partially covered border cells are included.
    pub fn cell_range(&self, rect: &Rect) -> (u32, u32, u32, u32) {
        if rect.is_empty() {
            return (0, 0, 0, 0);
        }
        let clip = |start: i32, end: i32, limit: u32| {
            let start = start.clamp(0, limit as i32) as u32;
            let end = end.clamp(0, limit as i32) as u32;
            (start, end.max(start))
        };
        let (x_start, x_end) = clip(
            rect.left().div_euclid(self.tile_width),
            (rect.right() + self.tile_width - 1).div_euclid(self.tile_width),
            self.width,
        );
        let (y_start, y_end) = clip(
            rect.top().div_euclid(self.tile_height),
            (rect.bottom() + self.tile_height - 1).div_euclid(self.tile_height),
            self.height,
        );
        (x_start, x_end, y_start, y_end)
    }

    /// Visits the non-empty cells touched by `rect`, row by row, using the
    /// row cache to skip empty columns.
    pub fn for_each_visible(&self, rect: &Rect, mut visit: impl FnMut(u32, u32, TileId)) {
        let (x_start, x_end, y_start, y_end) = self.cell_range(rect);
        if x_start >= x_end {
            return;
        }
        for y in y_start..y_end {
            let Some(first) = self.row_offset[y as usize][x_start as usize] else {
                continue;
            };
            for &(x, tile) in &self.row_index[y as usize][first as usize..] {
                if x >= x_end {
                    break;
                }
                visit(x, y, tile);
            }
        }
    }

    /// Draws the part of the layer inside `visible`, placing each tile at its
    /// world position minus the visible rect's top-left.
    pub fn on_draw(&self, tilesets: &TileSets, sink: &mut dyn RenderSink, visible: &Rect) {
        self.for_each_visible(visible, |x, y, tile_id| {
            let Some(tile) = tilesets.tile(tile_id) else {
                debug_assert!(false, "row cache references unknown tile {tile_id:?}");
                return;
            };
            let screen_x = x as i32 * self.tile_width - visible.left();
            let screen_y = y as i32 * self.tile_height - visible.top();
            tile.draw(sink, (screen_x, screen_y));
        });
    }

    /// Tiles whose collision rect intersects `rect`, with that world rect and
    /// their cell.
    pub fn collisions<'a>(
        &'a self,
        tilesets: &'a TileSets,
        rect: Rect,
    ) -> impl Iterator<Item = (Rect, TileId, (u32, u32))> + 'a {
        let (x_start, x_end, y_start, y_end) = self.cell_range(&rect);
        (y_start..y_end)
            .flat_map(move |y| (x_start..x_end).map(move |x| (x, y)))
            .filter_map(move |(x, y)| {
                let tile_id = self.tile_at_cell(x as i32, y as i32)?;
                let tile = tilesets.tile(tile_id)?;
                let tile_rect = tile
                    .collision_rect_at(x as i32 * self.tile_width, y as i32 * self.tile_height);
                tile_rect
                    .intersects(&rect)
                    .then_some((tile_rect, tile_id, (x, y)))
            })
    }

    /// Every non-empty cell as `(pixel_x, pixel_y, tile)`.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32, TileId)> + '_ {
        self.row_index.iter().enumerate().flat_map(move |(y, row)| {
            row.iter().map(move |&(x, tile)| {
                (
                    x as i32 * self.tile_width,
                    y as i32 * self.tile_height,
                    tile,
                )
            })
        })
    }

    #[cfg(test)]
    pub(crate) fn row_columns(&self, y: u32) -> Vec<u32> {
        self.row_index[y as usize].iter().map(|(x, _)| *x).collect()
    }
}

fn resolve_cell(gid: u32, tilesets: &mut TileSets) -> TileRef {
    let base = gid & GID_MASK;
    let Some(source) = tilesets.resolve_gid(base) else {
        warn!(gid = base, "tile_gid_unknown");
        return TileRef::EMPTY;
    };
    if gid & FLAG_BITS == 0 {
        return TileRef::from_tile(source);
    }
    let transform = TileTransform {
        flip_x: gid & FLIPPED_HORIZONTALLY != 0,
        flip_y: gid & FLIPPED_VERTICALLY != 0,
        rotate: gid & FLIPPED_DIAGONALLY != 0,
    };
    TileRef::from(tilesets.add_tile_from_tile(source, transform))
}
