mod atomic_io;
mod map_objects;

pub use atomic_io::write_text_atomic;
pub use map_objects::{
    load_map_objects, parse_tiled_json, parse_tmx, MapFormat, MapLoadError, MapObject,
    MapObjects, SourceLocation,
};
