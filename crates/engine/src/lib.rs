use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;

pub use app::{
    run_headless, InputAction, InputPoll, InputSnapshot, InputSource, LoopConfig,
    LoopExit, LoopMetricsSnapshot, LoopSummary, MetricsHandle, Rect, RepeatingTimer, Scene,
    SceneCommand, SceneKey, SceneMachine, StagedDelay, Vec2,
};
pub use content::{
    load_map_objects, parse_tiled_json, parse_tmx, write_text_atomic, MapFormat, MapLoadError,
    MapObject, MapObjects, SourceLocation,
};

pub const ROOT_ENV_VAR: &str = "KEYHUNT_ROOT";

const ASSETS_DIR: &str = "assets";
const CACHE_DIR: &str = "cache";

/// Where the game reads shipped data from and keeps per-player files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    pub fn at_root(root: PathBuf) -> Self {
        Self {
            assets_dir: root.join(ASSETS_DIR),
            cache_dir: root.join(CACHE_DIR),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read the working directory: {0}")]
    CurrentDir(#[source] io::Error),
    #[error("{var} is set to {path}, which has no assets/ directory")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error("no directory containing assets/ found at or above {start}; set {var} to the game root")]
    RootNotFound { start: PathBuf, var: &'static str },
}

/// The cache directory is not created here; writers create it on first save.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let env_root = env::var_os(ROOT_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let start = env::current_dir().map_err(StartupError::CurrentDir)?;
    resolve_root(env_root, &start).map(AppPaths::at_root)
}

fn resolve_root(env_root: Option<PathBuf>, start: &Path) -> Result<PathBuf, StartupError> {
    if let Some(root) = env_root {
        let root = canonical_or_raw(&root);
        if !has_assets(&root) {
            return Err(StartupError::InvalidEnvRoot {
                var: ROOT_ENV_VAR,
                path: root,
            });
        }
        return Ok(root);
    }

    start
        .ancestors()
        .find(|dir| has_assets(dir))
        .map(canonical_or_raw)
        .ok_or_else(|| StartupError::RootNotFound {
            start: start.to_path_buf(),
            var: ROOT_ENV_VAR,
        })
}

fn has_assets(dir: &Path) -> bool {
    dir.join(ASSETS_DIR).is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
