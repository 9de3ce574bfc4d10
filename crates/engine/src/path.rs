use crate::fixed::Fixed;
use crate::properties::{Properties, PropertyError};

/// Settings read from a path object's properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathConfig {
    /// Pixels per tick along the dominant axis, from `step`.
    pub speed: u32,
}

impl PathConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, PropertyError> {
        Ok(Self {
            speed: properties.parse_or("step", 1_u32)?.max(1),
        })
    }
}

/// One straight leg of a path, walked in whole steps along its dominant axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    start: (i32, i32),
    offset: (i32, i32),
    x_step: Fixed,
    y_step: Fixed,
}

impl PathSegment {
    pub fn new(x: i32, y: i32, x_offset: i32, y_offset: i32) -> Self {
        let span = x_offset.abs().max(y_offset.abs());
        Self {
            start: (x, y),
            offset: (x_offset, y_offset),
            x_step: Fixed::ratio(x_offset, span),
            y_step: Fixed::ratio(y_offset, span),
        }
    }

    pub fn start(&self) -> (i32, i32) {
        self.start
    }

    pub fn end(&self) -> (i32, i32) {
        (self.start.0 + self.offset.0, self.start.1 + self.offset.1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.offset == (0, 0)
    }

    fn at_end(step: Fixed, value: i32, end: i32) -> bool {
        if step > Fixed::ZERO {
            value >= end
        } else {
            value <= end
        }
    }

    /// Coordinates after `position` steps of `speed` pixels, or `None` once
    /// both axes have reached the segment end.
    pub fn coords(&self, position: u32, speed: u32) -> Option<(i32, i32)> {
        let distance = position as i64 * speed as i64;
        let x = self.start.0 + self.x_step.scaled_floor(distance);
        let y = self.start.1 + self.y_step.scaled_floor(distance);
        let (end_x, end_y) = self.end();
        if Self::at_end(self.x_step, x, end_x) && Self::at_end(self.y_step, y, end_y) {
            return None;
        }
        Some((x, y))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathCursor {
    pub segment: usize,
    pub step: u32,
}

/// Closed-loop polyline walker. Running off the last segment wraps back to
/// the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
    cursor: PathCursor,
    saved: Option<PathCursor>,
    speed: u32,
}

impl Path {
    pub fn new(segments: Vec<PathSegment>, speed: u32) -> Self {
        Self {
            segments,
            cursor: PathCursor::default(),
            saved: None,
            speed: speed.max(1),
        }
    }

    /// Segments joining consecutive points.
    pub fn from_points(points: &[(i32, i32)], speed: u32) -> Self {
        let segments = points
            .windows(2)
            .map(|pair| {
                let (x, y) = pair[0];
                let (end_x, end_y) = pair[1];
                PathSegment::new(x, y, end_x - x, end_y - y)
            })
            .collect();
        Self::new(segments, speed)
    }

    pub fn from_properties(
        points: &[(i32, i32)],
        properties: &Properties,
    ) -> Result<Self, PropertyError> {
        let config = PathConfig::from_properties(properties)?;
        Ok(Self::from_points(points, config.speed))
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn cursor(&self) -> PathCursor {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = PathCursor::default();
    }

    /// Next position along the path. Returns `None` only when no segment
    /// can produce a coordinate at all.
    pub fn iterate(&mut self) -> Option<(i32, i32)> {
        // Two full passes: finish the current lap, then one fresh lap.
        let budget = self.segments.len() * 2 + 1;
        for _ in 0..budget {
            if self.cursor.segment >= self.segments.len() {
                self.reset();
            }
            let segment = self.segments.get(self.cursor.segment)?;
            match segment.coords(self.cursor.step, self.speed) {
                Some(position) => {
                    self.cursor.step += 1;
                    return Some(position);
                }
                None => {
                    self.cursor.segment += 1;
                    self.cursor.step = 0;
                }
            }
        }
        None
    }

    pub fn save(&mut self) {
        self.saved = Some(self.cursor);
    }

    /// Rolls the cursor back to the last `save`. No-op when nothing was saved.
    pub fn restore(&mut self) {
        if let Some(saved) = self.saved {
            self.cursor = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(path: &mut Path, count: usize) -> Vec<(i32, i32)> {
        (0..count)
            .map(|_| path.iterate().expect("position"))
            .collect()
    }

    #[test]
    fn axis_aligned_loop_closes() {
        let mut path = Path::from_points(&[(0, 0), (10, 0), (10, 6), (0, 6), (0, 0)], 1);
        let lap = 10 + 6 + 10 + 6;
        let coords = collect(&mut path, lap * 3 + 1);

        assert_eq!(coords[0], (0, 0));
        assert_eq!(coords[1], (1, 0));
        assert_eq!(coords[10], (10, 0));
        for i in 0..lap * 2 {
            assert_eq!(coords[i], coords[i + lap], "index {i}");
        }
    }

    #[test]
    fn diagonal_loop_closes() {
        let mut path = Path::from_points(&[(0, 0), (8, 8), (0, 16), (0, 0)], 1);
        let lap = 8 + 8 + 16;
        let coords = collect(&mut path, lap * 2);
        assert_eq!(coords[3], (3, 3));
        assert_eq!(coords[9], (7, 9));
        assert_eq!(coords[0], coords[lap]);
        assert_eq!(coords[lap - 1], coords[2 * lap - 1]);
    }

    #[test]
    fn uneven_slope_floors_and_may_overrun_the_span() {
        let segment = PathSegment::new(0, 0, 10, 3);
        assert_eq!(segment.coords(5, 1), Some((5, 1)));
        // x is done at step 10 but y, floored, still lags behind its end.
        assert_eq!(segment.coords(10, 1), Some((10, 2)));
        assert_eq!(segment.coords(11, 1), None);
    }

    #[test]
    fn negative_offsets_walk_backwards() {
        let segment = PathSegment::new(20, 20, -4, 0);
        let coords: Vec<_> = (0..5).map(|i| segment.coords(i, 1)).collect();
        assert_eq!(
            coords,
            vec![
                Some((20, 20)),
                Some((19, 20)),
                Some((18, 20)),
                Some((17, 20)),
                None
            ]
        );
    }

    #[test]
    fn speed_multiplies_the_step() {
        let mut path = Path::from_points(&[(0, 0), (20, 0), (0, 0)], 5);
        let coords = collect(&mut path, 9);
        assert_eq!(
            coords,
            vec![
                (0, 0),
                (5, 0),
                (10, 0),
                (15, 0),
                (20, 0),
                (15, 0),
                (10, 0),
                (5, 0),
                (0, 0)
            ]
        );
    }

    #[test]
    fn restore_rolls_back_to_saved_cursor() {
        let mut path = Path::from_points(&[(0, 0), (4, 0), (0, 0)], 1);
        path.iterate();
        path.save();
        let next = path.iterate();
        path.iterate();
        path.restore();
        assert_eq!(path.iterate(), next);
    }

    #[test]
    fn degenerate_paths_yield_nothing() {
        let mut empty = Path::new(Vec::new(), 1);
        assert_eq!(empty.iterate(), None);

        let mut still = Path::from_points(&[(3, 3), (3, 3)], 1);
        assert_eq!(still.iterate(), None);
        assert_eq!(still.iterate(), None);
    }

    #[test]
    fn step_property_sets_speed() {
        let props = Properties::new().with("step", "3");
        let path = Path::from_properties(&[(0, 0), (9, 0)], &props).expect("path");
        assert_eq!(path.speed(), 3);
    }
}
