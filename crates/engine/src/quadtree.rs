use crate::geometry::Rect;

pub const MAX_OBJECTS: usize = 10;
pub const MAX_LEVELS: u32 = 5;

/// Broad-phase index over axis-aligned rects.
///
/// Each entry lives in the deepest node whose bounds fully contain its rect,
/// so an entry is stored exactly once. The tree is rebuilt from scratch
/// (`clear` then `insert`) rather than updated in place.
#[derive(Debug, Clone)]
pub struct QuadTree<T: Copy> {
    level: u32,
    bounds: Rect,
    objects: Vec<(Rect, T)>,
    children: Option<Box<[QuadTree<T>; 4]>>,
}

impl<T: Copy> QuadTree<T> {
    pub fn new(bounds: Rect) -> Self {
        Self::with_level(0, bounds)
    }

    fn with_level(level: u32, bounds: Rect) -> Self {
        Self {
            level,
            bounds,
            objects: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.children = None;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
            + self
                .children
                .as_ref()
                .map_or(0, |children| children.iter().map(QuadTree::len).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> u32 {
        self.children.as_ref().map_or(self.level, |children| {
            children
                .iter()
                .map(QuadTree::depth)
                .max()
                .unwrap_or(self.level)
        })
    }

    pub fn insert(&mut self, rect: Rect, value: T) {
        if let Some(children) = self.children.as_mut() {
            if let Some(index) = fitting_child(children, &rect) {
                children[index].insert(rect, value);
                return;
            }
        }

        self.objects.push((rect, value));

        if self.objects.len() <= MAX_OBJECTS || self.level >= MAX_LEVELS {
            return;
        }
        if self.children.is_none() {
            self.split();
        }
        let Some(children) = self.children.as_mut() else {
            return;
        };
        let held = std::mem::take(&mut self.objects);
        for (rect, value) in held {
            match fitting_child(children, &rect) {
                Some(index) => children[index].insert(rect, value),
                None => self.objects.push((rect, value)),
            }
        }
    }

    fn split(&mut self) {
        let Rect {
            x,
            y,
            width,
            height,
        } = self.bounds;
        let mid_w = width / 2;
        let mid_h = height / 2;
        let end_w = width - mid_w;
        let end_h = height - mid_h;
        let level = self.level + 1;

        self.children = Some(Box::new([
            QuadTree::with_level(level, Rect::new(x, y, mid_w, mid_h)),
            QuadTree::with_level(level, Rect::new(x + mid_w, y, end_w, mid_h)),
            QuadTree::with_level(level, Rect::new(x, y + mid_h, mid_w, end_h)),
            QuadTree::with_level(level, Rect::new(x + mid_w, y + mid_h, end_w, end_h)),
        ]));
    }

    /// Candidates possibly intersecting `rect`. Callers narrow the result.
    pub fn retrieve(&self, rect: &Rect) -> Vec<(Rect, T)> {
        let mut found = Vec::new();
        self.retrieve_into(rect, &mut found);
        found
    }

    pub fn retrieve_into(&self, rect: &Rect, found: &mut Vec<(Rect, T)>) {
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                if child.bounds.intersects(rect) {
                    child.retrieve_into(rect, found);
                }
            }
        }
        found.extend(self.objects.iter().copied());
    }
}

fn fitting_child<T: Copy>(children: &[QuadTree<T>; 4], rect: &Rect) -> Option<usize> {
    children
        .iter()
        .position(|child| child.bounds.contains(rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn range(&mut self, low: i32, high: i32) -> i32 {
            low + (self.next() % (high - low) as u64) as i32
        }
    }

    #[test]
    fn retrieve_never_misses_an_intersecting_entry() {
        let mut rng = XorShift(0x2545_F491_4F6C_DD1D);
        let bounds = Rect::new(0, 0, 2048, 1024);
        let mut tree = QuadTree::new(bounds);
        let mut entries = Vec::new();
        for id in 0..300_usize {
            let rect = Rect::new(
                rng.range(-32, 2048),
                rng.range(-32, 1024),
                rng.range(1, 96),
                rng.range(1, 96),
            );
            tree.insert(rect, id);
            entries.push((rect, id));
        }
        assert_eq!(tree.len(), entries.len());
        assert!(tree.depth() > 0);

        for _ in 0..200 {
            let query = Rect::new(
                rng.range(-100, 2100),
                rng.range(-100, 1100),
                rng.range(1, 400),
                rng.range(1, 400),
            );
            let found: Vec<usize> = tree.retrieve(&query).iter().map(|(_, id)| *id).collect();
            for (rect, id) in &entries {
                if rect.intersects(&query) {
                    assert!(found.contains(id), "entry {id} missing for {query:?}");
                }
            }
        }
    }

    #[test]
    fn split_pushes_contained_entries_down() {
        let mut tree = QuadTree::new(Rect::new(0, 0, 100, 100));
        for i in 0..=MAX_OBJECTS {
            tree.insert(Rect::new(i as i32 * 2, 0, 2, 2), i);
        }
        // One straddles the vertical split line and stays at the root.
        tree.insert(Rect::new(45, 10, 10, 10), 99);

        assert_eq!(tree.objects.len(), 1);
        assert_eq!(tree.objects[0].1, 99);
        assert_eq!(tree.len(), MAX_OBJECTS + 2);

        let bottom_right = tree.retrieve(&Rect::new(80, 80, 5, 5));
        assert_eq!(bottom_right.len(), 1);
    }

    #[test]
    fn odd_bounds_split_without_gaps() {
        let mut tree: QuadTree<usize> = QuadTree::new(Rect::new(0, 0, 101, 51));
        tree.split();
        let children = tree.children.as_ref().expect("children");
        let covered: i32 = children
            .iter()
            .map(|c| c.bounds.width * c.bounds.height)
            .sum();
        assert_eq!(covered, 101 * 51);
        assert_eq!(children[3].bounds, Rect::new(50, 25, 51, 26));
    }

    #[test]
    fn clear_discards_everything() {
        let mut tree = QuadTree::new(Rect::new(0, 0, 64, 64));
        for i in 0..30 {
            tree.insert(Rect::new(i, i, 4, 4), i);
        }
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.retrieve(&Rect::new(0, 0, 64, 64)).is_empty());
    }
}
