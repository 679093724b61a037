use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use engine::{
    load_map_objects, resolve_app_paths, InputSource, MapObjects, SceneKey, SceneMachine,
    StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config::GameConfig;
use super::gameplay::{
    self, ChallengeResultSender, HttpRemoteStore, LoginDataFile, MessageCatalog,
    ProgressSnapshot, RemoteStore, SceneServices, SessionContext, INTERACTION_LAYER,
};
use super::script_input::ScriptInput;

pub(crate) struct AppWiring {
    pub(crate) config: GameConfig,
    pub(crate) scenes: SceneMachine<SessionContext>,
    pub(crate) input: Box<dyn InputSource>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to open input script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Keyhunt Startup ===");

    let paths = resolve_app_paths()?;
    let config = GameConfig::from_env(&paths);
    info!(
        root = %paths.root.display(),
        map = %config.map_path.display(),
        snapshot = %config.snapshot_path.display(),
        remote_sync = config.save_url.is_some(),
        "app_config"
    );

    let map = load_map(&config.map_path);
    let catalog = load_catalog(&config.messages_path);
    let snapshot = load_snapshot(&config.snapshot_path);
    let services = SceneServices::logging(
        start_remote_store(config.save_url.as_deref()),
        Box::new(LoginDataFile::new(config.login_data_path.clone())),
    );

    let pair = gameplay::build_scene_pair(&map, &catalog, services);
    let input = open_script(config.script_path.as_deref(), pair.challenge_results)?;
    let session = SessionContext {
        snapshot,
        carried: None,
    };
    let scenes = SceneMachine::new(
        pair.overworld,
        pair.underground,
        SceneKey::Overworld,
        session,
    );

    Ok(AppWiring {
        config,
        scenes,
        input,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_map(path: &Path) -> MapObjects {
    match load_map_objects(path, INTERACTION_LAYER) {
        Ok(map) => map,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "map_unavailable_using_empty");
            MapObjects::default()
        }
    }
}

fn load_catalog(path: &Path) -> MessageCatalog {
    match MessageCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(error = %err, "message_catalog_unavailable_using_builtin");
            MessageCatalog::builtin()
        }
    }
}

fn load_snapshot(path: &Path) -> ProgressSnapshot {
    match ProgressSnapshot::load_file(path) {
        Ok(Some(snapshot)) => {
            info!(path = %path.display(), "snapshot_loaded");
            snapshot
        }
        Ok(None) => {
            info!(path = %path.display(), "snapshot_missing_starting_fresh");
            ProgressSnapshot::default()
        }
        Err(err) => {
            warn!(error = %err, path = %path.display(), "snapshot_corrupt_starting_fresh");
            ProgressSnapshot::default()
        }
    }
}

fn start_remote_store(save_url: Option<&str>) -> Option<Box<dyn RemoteStore>> {
    let Some(url) = save_url else {
        info!("remote_sync_disabled");
        return None;
    };
    match HttpRemoteStore::spawn(url.to_string()) {
        Ok(store) => Some(Box::new(store)),
        Err(err) => {
            warn!(error = %err, "remote_sync_unavailable");
            None
        }
    }
}

fn open_script(
    path: Option<&Path>,
    challenge_results: ChallengeResultSender,
) -> Result<Box<dyn InputSource>, BootstrapError> {
    let lines: Box<dyn BufRead> = match path {
        Some(path) => {
            let file = File::open(path).map_err(|source| BootstrapError::Script {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "script_input_file");
            Box::new(BufReader::new(file))
        }
        None => {
            info!("script_input_stdin");
            Box::new(io::stdin().lock())
        }
    };
    Ok(Box::new(ScriptInput::new(lines, challenge_results)))
}
