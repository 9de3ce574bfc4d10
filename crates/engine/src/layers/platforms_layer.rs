use std::collections::BTreeMap;

use crate::geometry::Rect;
use crate::layers::LayerId;
use crate::objects::ObjectWithPath;
use crate::path::Path;
use crate::render::RenderSink;

/// Moving (or static) platforms built from tiles of a linked layer, plus
/// the named paths they follow.
#[derive(Debug, Clone, Default)]
pub struct PlatformsLayer {
    tiles_layer: Option<LayerId>,
    paths: BTreeMap<String, Path>,
    platforms: Vec<ObjectWithPath>,
}

impl PlatformsLayer {
    pub fn new(tiles_layer: Option<LayerId>) -> Self {
        Self {
            tiles_layer,
            ..Self::default()
        }
    }

    pub fn tiles_layer(&self) -> Option<LayerId> {
        self.tiles_layer
    }

    pub fn add_path(&mut self, name: &str, path: Path) {
        self.paths.insert(name.to_string(), path);
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.paths.get(name)
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn add_platform(&mut self, platform: ObjectWithPath) -> usize {
        self.platforms.push(platform);
        self.platforms.len() - 1
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn platform(&self, index: usize) -> Option<&ObjectWithPath> {
        self.platforms.get(index)
    }

    pub fn platform_mut(&mut self, index: usize) -> Option<&mut ObjectWithPath> {
        self.platforms.get_mut(index)
    }

    pub fn platforms(&self) -> &[ObjectWithPath] {
        &self.platforms
    }

    pub fn platforms_mut(&mut self) -> impl Iterator<Item = &mut ObjectWithPath> {
        self.platforms.iter_mut()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.platforms
            .iter()
            .position(|platform| platform.name() == Some(name))
    }

    /// Platforms overlapping `rect`, as `(rect, index)`.
    pub fn collisions<'a>(&'a self, rect: &'a Rect) -> impl Iterator<Item = (Rect, usize)> + 'a {
        self.platforms
            .iter()
            .enumerate()
            .filter(move |(_, platform)| platform.rect().intersects(rect))
            .map(|(index, platform)| (platform.rect(), index))
    }

    pub fn draw(&self, sink: &mut dyn RenderSink, visible: &Rect) {
        for platform in &self.platforms {
            platform.draw(sink, visible);
        }
    }
}
