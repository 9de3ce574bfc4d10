use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rect;
use crate::properties::Properties;
use crate::tiles::TileSetDef;

/// Parsed map file: dimensions, tilesets and layers in drawing order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MapDescription {
    pub name: String,
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    pub tile_width: i32,
    pub tile_height: i32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub tilesets: Vec<TileSetDescription>,
    #[serde(default)]
    pub layers: Vec<LayerDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TileSetDescription {
    pub name: String,
    pub first_gid: u32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub tile_count: u32,
    #[serde(default)]
    pub properties: Properties,
    /// Per-tile properties keyed by local id.
    #[serde(default)]
    pub tiles: BTreeMap<u32, Properties>,
}

impl TileSetDescription {
    pub fn to_def(&self) -> TileSetDef {
        TileSetDef {
            name: self.name.clone(),
            first_gid: self.first_gid,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            tile_count: self.tile_count,
            properties: self.properties.clone(),
            tile_properties: self.tiles.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerDescription {
    /// Grid of global tile ids, row-major, flip flags in the high bits.
    Tiles {
        name: String,
        width: u32,
        height: u32,
        #[serde(default)]
        properties: Properties,
        data: Vec<u32>,
    },
    Objects {
        name: String,
        #[serde(default)]
        properties: Properties,
        #[serde(default)]
        objects: Vec<ObjectDescription>,
    },
}

impl LayerDescription {
    pub fn name(&self) -> &str {
        match self {
            Self::Tiles { name, .. } | Self::Objects { name, .. } => name,
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Self::Tiles { properties, .. } | Self::Objects { properties, .. } => properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectDescription {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    /// Points relative to `(x, y)`. Objects with a polyline describe paths.
    #[serde(default)]
    pub polyline: Vec<(i32, i32)>,
    #[serde(default)]
    pub properties: Properties,
}

impl ObjectDescription {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_path(&self) -> bool {
        !self.polyline.is_empty()
    }

    /// Polyline in map coordinates.
    pub fn points(&self) -> Vec<(i32, i32)> {
        self.polyline
            .iter()
            .map(|(x, y)| (self.x + x, self.y + y))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("failed to read map description {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid map description {origin} at {at}: {source}")]
    Parse {
        origin: String,
        at: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MapDescription {
    /// Parses JSON text. `origin` names the source in errors.
    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, DescriptionError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let at = error.path().to_string();
            DescriptionError::Parse {
                origin: origin.to_string(),
                at,
                source: error.into_inner(),
            }
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, DescriptionError> {
        let raw = fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = r#"{
        "name": "cave",
        "width": 2,
        "height": 1,
        "tile_width": 16,
        "tile_height": 16,
        "tilesets": [
            {
                "name": "rocks",
                "first_gid": 1,
                "tile_width": 16,
                "tile_height": 16,
                "tile_count": 4,
                "tiles": { "2": { "type": "ladder" } }
            }
        ],
        "layers": [
            { "kind": "tiles", "name": "ground", "width": 2, "height": 1, "data": [1, 3] },
            {
                "kind": "objects",
                "name": "moving",
                "properties": { "layer": "ground" },
                "objects": [
                    { "name": "loop", "x": 10, "y": 20, "polyline": [[0, 0], [30, 0]] },
                    { "type": "platform", "x": 0, "y": 0, "width": 32, "height": 16 }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_tilesets_layers_and_objects() {
        let map = MapDescription::from_json_str(SMALL_MAP, "inline").expect("description");
        assert_eq!(map.name, "cave");
        assert_eq!(map.tilesets[0].to_def().tile_properties[&2].get("type"), Some("ladder"));
        assert_eq!(map.layers.len(), 2);
        assert_eq!(map.layers[1].properties().get("layer"), Some("ground"));

        let LayerDescription::Objects { objects, .. } = &map.layers[1] else {
            panic!("expected an object layer");
        };
        assert!(objects[0].is_path());
        assert_eq!(objects[0].points(), vec![(10, 20), (40, 20)]);
        assert_eq!(objects[1].kind.as_deref(), Some("platform"));
        assert_eq!(objects[1].rect(), Rect::new(0, 0, 32, 16));
    }

    #[test]
    fn parse_errors_name_the_offending_field() {
        let broken = SMALL_MAP.replace("\"first_gid\": 1", "\"first_gid\": \"one\"");
        let error = MapDescription::from_json_str(&broken, "inline").expect_err("bad gid");
        match error {
            DescriptionError::Parse { at, .. } => assert_eq!(at, "tilesets[0].first_gid"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_descriptions_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cave.json");
        fs::write(&path, SMALL_MAP).expect("write");
        let map = MapDescription::from_path(&path).expect("description");
        assert_eq!((map.width, map.height), (2, 1));

        let missing = MapDescription::from_path(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(DescriptionError::Io { .. })));
    }
}
