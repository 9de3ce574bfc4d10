/// Axis-aligned integer rectangle in world pixels.
///
/// Edges follow the half-open convention: `right()` and `bottom()` are one
/// past the last covered pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Strict overlap test. Rects that only share an edge do not intersect and
    /// an empty rect never intersects anything.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && self.y < other.bottom()
            && self.right() > other.x
            && self.bottom() > other.y
    }

    /// True when `other` lies fully inside `self`, edges included.
    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Grows the rect by `dx` on the left and right and by `dy` on the top and bottom.
    pub fn inflate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + dx * 2,
            self.height + dy * 2,
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn with_position(&self, x: i32, y: i32) -> Rect {
        Rect::new(x, y, self.width, self.height)
    }

    /// Moves the rect so it lies inside `bounds`. A rect larger than `bounds`
    /// is aligned on the bounds' top-left edge.
    pub fn clamp_within(&self, bounds: &Rect) -> Rect {
        let x = if self.width >= bounds.width {
            bounds.x
        } else {
            self.x.clamp(bounds.x, bounds.right() - self.width)
        };
        let y = if self.height >= bounds.height {
            bounds.y
        } else {
            self.y.clamp(bounds.y, bounds.bottom() - self.height)
        };
        self.with_position(x, y)
    }
}
