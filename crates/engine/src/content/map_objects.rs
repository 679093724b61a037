use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::app::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    TiledJson,
    Tmx,
}

impl MapFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("tmj") {
            Some(Self::TiledJson)
        } else if ext.eq_ignore_ascii_case("tmx") {
            Some(Self::Tmx)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported map file extension: {path} (expected .json, .tmj or .tmx)")]
    UnknownFormat { path: PathBuf },
    #[error("parse map json at {path}: {message}")]
    Json { path: String, message: String },
    #[error("malformed map xml: {message}")]
    Xml {
        message: String,
        location: Option<SourceLocation>,
    },
    #[error("invalid map root: {message}")]
    InvalidRoot { message: String },
}

/// A rectangle object from a map object layer, with its custom properties flattened to text.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub object_id: Option<u32>,
    pub name: String,
    pub bounds: Rect,
    pub properties: Vec<(String, String)>,
}

impl MapObject {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapObjects {
    /// Map extent in pixels, when the map header declares one.
    pub pixel_size: Option<(f32, f32)>,
    pub layer_found: bool,
    pub objects: Vec<MapObject>,
    pub skipped: usize,
}

pub fn load_map_objects(path: &Path, layer: &str) -> Result<MapObjects, MapLoadError> {
    let format = MapFormat::from_path(path).ok_or_else(|| MapLoadError::UnknownFormat {
        path: path.to_path_buf(),
    })?;
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let objects = match format {
        MapFormat::TiledJson => parse_tiled_json(&raw, layer)?,
        MapFormat::Tmx => parse_tmx(&raw, layer)?,
    };
    if !objects.layer_found {
        warn!(
            path = %path.display(),
            layer,
            "map_object_layer_missing"
        );
    }
    Ok(objects)
}

#[derive(Debug, Deserialize)]
struct TiledMapJson {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    tilewidth: u32,
    #[serde(default)]
    tileheight: u32,
    #[serde(default)]
    layers: Vec<TiledLayerJson>,
}

#[derive(Debug, Deserialize)]
struct TiledLayerJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    objects: Vec<Value>,
    #[serde(default)]
    layers: Vec<TiledLayerJson>,
}

#[derive(Debug, Deserialize)]
struct TiledObjectJson {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    name: String,
    x: f32,
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    properties: Vec<TiledPropertyJson>,
}

#[derive(Debug, Deserialize)]
struct TiledPropertyJson {
    name: String,
    #[serde(default)]
    value: Value,
}

pub fn parse_tiled_json(raw: &str, layer: &str) -> Result<MapObjects, MapLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let map = serde_path_to_error::deserialize::<_, TiledMapJson>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            MapLoadError::Json {
                path: if path.is_empty() { ".".to_string() } else { path },
                message: error.into_inner().to_string(),
            }
        },
    )?;

    let mut result = MapObjects {
        pixel_size: pixel_size(map.width, map.height, map.tilewidth, map.tileheight),
        ..MapObjects::default()
    };
    let Some(found) = find_json_layer(&map.layers, layer) else {
        return Ok(result);
    };
    result.layer_found = true;

    for (index, value) in found.objects.iter().enumerate() {
        let object = match serde_json::from_value::<TiledObjectJson>(value.clone()) {
            Ok(object) => object,
            Err(error) => {
                warn!(layer, index, error = %error, "map_object_skipped");
                result.skipped += 1;
                continue;
            }
        };
        let bounds = Rect::new(object.x, object.y, object.width, object.height);
        if !bounds_are_finite(bounds) {
            warn!(layer, index, "map_object_skipped_non_finite");
            result.skipped += 1;
            continue;
        }
        result.objects.push(MapObject {
            object_id: object.id,
            name: object.name,
            bounds,
            properties: object
                .properties
                .into_iter()
                .map(|property| (property.name, property_text(property.value)))
                .collect(),
        });
    }
    Ok(result)
}

fn find_json_layer<'a>(layers: &'a [TiledLayerJson], name: &str) -> Option<&'a TiledLayerJson> {
    for layer in layers {
        if layer.name == name {
            return Some(layer);
        }
        if let Some(nested) = find_json_layer(&layer.layers, name) {
            return Some(nested);
        }
    }
    None
}

fn property_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn parse_tmx(raw: &str, layer: &str) -> Result<MapObjects, MapLoadError> {
    let doc = Document::parse(raw).map_err(|error| {
        let pos = error.pos();
        MapLoadError::Xml {
            message: error.to_string(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(MapLoadError::InvalidRoot {
            message: format!("expected <map>, found <{}>", root.tag_name().name()),
        });
    }

    let mut result = MapObjects {
        pixel_size: pixel_size(
            attr_u32(root, "width"),
            attr_u32(root, "height"),
            attr_u32(root, "tilewidth"),
            attr_u32(root, "tileheight"),
        ),
        ..MapObjects::default()
    };
    let Some(group) = root.descendants().find(|node| {
        node.is_element()
            && node.tag_name().name() == "objectgroup"
            && node.attribute("name") == Some(layer)
    }) else {
        return Ok(result);
    };
    result.layer_found = true;

    for node in group
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        match tmx_object(node) {
            Ok(object) => result.objects.push(object),
            Err(message) => {
                let pos = doc.text_pos_at(node.range().start);
                warn!(
                    layer,
                    line = pos.row,
                    column = pos.col,
                    error = %message,
                    "map_object_skipped"
                );
                result.skipped += 1;
            }
        }
    }
    Ok(result)
}

fn tmx_object(node: Node<'_, '_>) -> Result<MapObject, String> {
    let x = required_f32(node, "x")?;
    let y = required_f32(node, "y")?;
    let width = optional_f32(node, "width")?;
    let height = optional_f32(node, "height")?;
    let bounds = Rect::new(x, y, width, height);
    if !bounds_are_finite(bounds) {
        return Err("object bounds are not finite".to_string());
    }

    let properties = node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "properties")
        .flat_map(|props| props.children())
        .filter(|child| child.is_element() && child.tag_name().name() == "property")
        .filter_map(|property| {
            let name = property.attribute("name")?;
            let value = property
                .attribute("value")
                .map(str::to_string)
                .or_else(|| property.text().map(str::to_string))
                .unwrap_or_default();
            Some((name.to_string(), value))
        })
        .collect();

    Ok(MapObject {
        object_id: node.attribute("id").and_then(|id| id.parse().ok()),
        name: node.attribute("name").unwrap_or_default().to_string(),
        bounds,
        properties,
    })
}

fn required_f32(node: Node<'_, '_>, name: &str) -> Result<f32, String> {
    let raw = node
        .attribute(name)
        .ok_or_else(|| format!("missing attribute '{name}'"))?;
    raw.trim()
        .parse::<f32>()
        .map_err(|_| format!("attribute '{name}' is not a number: '{raw}'"))
}

fn optional_f32(node: Node<'_, '_>, name: &str) -> Result<f32, String> {
    match node.attribute(name) {
        Some(_) => required_f32(node, name),
        None => Ok(0.0),
    }
}

fn attr_u32(node: Node<'_, '_>, name: &str) -> u32 {
    node.attribute(name)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

fn pixel_size(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Option<(f32, f32)> {
    let pixel_width = width.saturating_mul(tile_width);
    let pixel_height = height.saturating_mul(tile_height);
    if pixel_width == 0 || pixel_height == 0 {
        return None;
    }
    Some((pixel_width as f32, pixel_height as f32))
}

fn bounds_are_finite(bounds: Rect) -> bool {
    bounds.x.is_finite()
        && bounds.y.is_finite()
        && bounds.width.is_finite()
        && bounds.height.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYER: &str = "InteractionZones";

    fn tiled_fixture() -> String {
        serde_json::json!({
            "width": 100,
            "height": 80,
            "tilewidth": 32,
            "tileheight": 32,
            "layers": [
                { "name": "Ground", "type": "tilelayer", "data": [] },
                {
                    "name": LAYER,
                    "type": "objectgroup",
                    "objects": [
                        {
                            "id": 4, "name": "", "x": 10.0, "y": 20.0,
                            "width": 64.0, "height": 32.0,
                            "properties": [
                                { "name": "interaction_id", "type": "string", "value": "npc3" },
                                { "name": "weight", "type": "int", "value": 2 }
                            ]
                        },
                        { "id": 5, "x": "oops", "y": 0 },
                        { "id": 6, "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0 }
                    ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn tiled_json_reads_layer_objects_and_skips_malformed_entries() {
        let objects = parse_tiled_json(&tiled_fixture(), LAYER).expect("parse");
        assert!(objects.layer_found);
        assert_eq!(objects.pixel_size, Some((3200.0, 2560.0)));
        assert_eq!(objects.objects.len(), 2);
        assert_eq!(objects.skipped, 1);

        let first = &objects.objects[0];
        assert_eq!(first.object_id, Some(4));
        assert_eq!(first.bounds, Rect::new(10.0, 20.0, 64.0, 32.0));
        assert_eq!(first.property("interaction_id"), Some("npc3"));
        assert_eq!(first.property("weight"), Some("2"));
        assert_eq!(objects.objects[1].property("interaction_id"), None);
    }

    #[test]
    fn tiled_json_missing_layer_is_not_an_error() {
        let objects = parse_tiled_json(&tiled_fixture(), "Elsewhere").expect("parse");
        assert!(!objects.layer_found);
        assert!(objects.objects.is_empty());
    }

    #[test]
    fn tiled_json_layer_inside_group_is_found() {
        let raw = serde_json::json!({
            "layers": [{
                "name": "Group", "type": "group",
                "layers": [{ "name": LAYER, "type": "objectgroup", "objects": [
                    { "x": 0, "y": 0, "width": 8, "height": 8 }
                ]}]
            }]
        })
        .to_string();
        let objects = parse_tiled_json(&raw, LAYER).expect("parse");
        assert!(objects.layer_found);
        assert_eq!(objects.objects.len(), 1);
        assert_eq!(objects.pixel_size, None);
    }

    #[test]
    fn tiled_json_type_error_reports_path() {
        let raw = r#"{ "width": "wide", "layers": [] }"#;
        let err = parse_tiled_json(raw, LAYER).expect_err("err");
        match err {
            MapLoadError::Json { path, .. } => assert_eq!(path, "width"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tmx_reads_object_group_properties() {
        let raw = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="10" height="10" tilewidth="16" tileheight="16">
  <objectgroup id="2" name="InteractionZones">
    <object id="1" x="5" y="6" width="40" height="30">
      <properties>
        <property name="interaction_id" value="task2"/>
        <property name="note">multi
line</property>
      </properties>
    </object>
    <object id="2" x="bad" y="0" width="1" height="1"/>
  </objectgroup>
</map>"#;
        let objects = parse_tmx(raw, LAYER).expect("parse");
        assert_eq!(objects.pixel_size, Some((160.0, 160.0)));
        assert_eq!(objects.objects.len(), 1);
        assert_eq!(objects.skipped, 1);
        assert_eq!(objects.objects[0].property("interaction_id"), Some("task2"));
        assert_eq!(objects.objects[0].property("note"), Some("multi\nline"));
        assert_eq!(objects.objects[0].bounds, Rect::new(5.0, 6.0, 40.0, 30.0));
    }

    #[test]
    fn malformed_tmx_reports_location() {
        let err = parse_tmx("<map><objectgroup></map>", LAYER).expect_err("err");
        match err {
            MapLoadError::Xml { location, .. } => assert!(location.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tmx_wrong_root_is_rejected() {
        let err = parse_tmx("<tileset/>", LAYER).expect_err("err");
        assert!(matches!(err, MapLoadError::InvalidRoot { .. }));
    }

    #[test]
    fn load_rejects_unknown_extension_and_reads_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bad = temp.path().join("map.txt");
        fs::write(&bad, "{}").expect("write");
        assert!(matches!(
            load_map_objects(&bad, LAYER),
            Err(MapLoadError::UnknownFormat { .. })
        ));

        let good = temp.path().join("map.tmj");
        fs::write(&good, tiled_fixture()).expect("write");
        let objects = load_map_objects(&good, LAYER).expect("load");
        assert_eq!(objects.objects.len(), 2);
    }
}
