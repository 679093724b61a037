use std::path::{Path, PathBuf};

use engine::{AppPaths, LoopConfig};
use tracing::warn;

const MAP_ENV_VAR: &str = "KEYHUNT_MAP";
const MESSAGES_ENV_VAR: &str = "KEYHUNT_MESSAGES";
const SNAPSHOT_ENV_VAR: &str = "KEYHUNT_SNAPSHOT";
const LOGIN_DATA_ENV_VAR: &str = "KEYHUNT_LOGIN_DATA";
const SAVE_URL_ENV_VAR: &str = "KEYHUNT_SAVE_URL";
const SCRIPT_ENV_VAR: &str = "KEYHUNT_SCRIPT";
const TPS_ENV_VAR: &str = "KEYHUNT_TPS";
const REALTIME_ENV_VAR: &str = "KEYHUNT_REALTIME";

const DEFAULT_MAP_FILE: &str = "maps/overworld.tmj";
const DEFAULT_MESSAGES_FILE: &str = "messages.json";
const DEFAULT_SNAPSHOT_FILE: &str = "session.json";
const DEFAULT_LOGIN_DATA_FILE: &str = "logindata.json";
const DEFAULT_TPS: u32 = 60;
const MAX_TPS: u32 = 1000;

#[derive(Debug, Clone)]
pub(crate) struct GameConfig {
    pub(crate) map_path: PathBuf,
    pub(crate) messages_path: PathBuf,
    pub(crate) snapshot_path: PathBuf,
    pub(crate) login_data_path: PathBuf,
    /// Remote sync is off when unset.
    pub(crate) save_url: Option<String>,
    /// Script file driving input; stdin when unset.
    pub(crate) script_path: Option<PathBuf>,
    pub(crate) loop_config: LoopConfig,
}

impl GameConfig {
    pub(crate) fn from_env(paths: &AppPaths) -> Self {
        Self::from_lookup(paths, |name| std::env::var(name).ok())
    }

    fn from_lookup(paths: &AppPaths, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let path_or = |name: &str, default: PathBuf| match value(name) {
            Some(raw) => resolve_against(&paths.root, &raw),
            None => default,
        };

        let script_path = value(SCRIPT_ENV_VAR).map(|raw| resolve_against(&paths.root, &raw));
        // Scripted runs from a file replay as fast as possible unless asked otherwise.
        let realtime = parse_realtime(value(REALTIME_ENV_VAR).as_deref(), script_path.is_none());
        let loop_config = LoopConfig {
            target_tps: parse_tps(value(TPS_ENV_VAR).as_deref()),
            realtime,
            ..LoopConfig::default()
        };

        Self {
            map_path: path_or(MAP_ENV_VAR, paths.assets_dir.join(DEFAULT_MAP_FILE)),
            messages_path: path_or(MESSAGES_ENV_VAR, paths.assets_dir.join(DEFAULT_MESSAGES_FILE)),
            snapshot_path: path_or(SNAPSHOT_ENV_VAR, paths.cache_dir.join(DEFAULT_SNAPSHOT_FILE)),
            login_data_path: path_or(
                LOGIN_DATA_ENV_VAR,
                paths.cache_dir.join(DEFAULT_LOGIN_DATA_FILE),
            ),
            save_url: value(SAVE_URL_ENV_VAR),
            script_path,
            loop_config,
        }
    }
}

fn resolve_against(root: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn parse_tps(raw: Option<&str>) -> u32 {
    let Some(value) = raw else {
        return DEFAULT_TPS;
    };
    match value.parse::<u32>() {
        Ok(tps) if (1..=MAX_TPS).contains(&tps) => tps,
        _ => {
            warn!(value, fallback_tps = DEFAULT_TPS, "invalid_tps_using_default");
            DEFAULT_TPS
        }
    }
}

fn parse_realtime(raw: Option<&str>, default: bool) -> bool {
    match raw {
        None => default,
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        Some(value) => {
            warn!(value, fallback = default, "invalid_realtime_flag_using_default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn paths() -> AppPaths {
        AppPaths {
            root: PathBuf::from("/game"),
            assets_dir: PathBuf::from("/game/assets"),
            cache_dir: PathBuf::from("/game/cache"),
        }
    }

    fn config_from(vars: &[(&str, &str)]) -> GameConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        GameConfig::from_lookup(&paths(), |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_live_under_assets_and_cache() {
        let config = config_from(&[]);
        assert_eq!(config.map_path, PathBuf::from("/game/assets/maps/overworld.tmj"));
        assert_eq!(config.messages_path, PathBuf::from("/game/assets/messages.json"));
        assert_eq!(config.snapshot_path, PathBuf::from("/game/cache/session.json"));
        assert_eq!(config.login_data_path, PathBuf::from("/game/cache/logindata.json"));
        assert_eq!(config.save_url, None);
        assert_eq!(config.script_path, None);
        assert_eq!(config.loop_config.target_tps, 60);
        assert!(config.loop_config.realtime);
    }

    #[test]
    fn relative_overrides_resolve_against_root() {
        let config = config_from(&[
            (MAP_ENV_VAR, "maps/alt.tmx"),
            (SNAPSHOT_ENV_VAR, "/tmp/blob.json"),
            (SAVE_URL_ENV_VAR, " https://example.test/save "),
            (SCRIPT_ENV_VAR, "runs/door.txt"),
        ]);
        assert_eq!(config.map_path, PathBuf::from("/game/maps/alt.tmx"));
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/blob.json"));
        assert_eq!(config.save_url.as_deref(), Some("https://example.test/save"));
        assert_eq!(config.script_path, Some(PathBuf::from("/game/runs/door.txt")));
        assert!(!config.loop_config.realtime);
    }

    #[test]
    fn invalid_loop_values_fall_back() {
        let config = config_from(&[(TPS_ENV_VAR, "0"), (REALTIME_ENV_VAR, "maybe")]);
        assert_eq!(config.loop_config.target_tps, DEFAULT_TPS);
        assert!(config.loop_config.realtime);

        let config = config_from(&[
            (TPS_ENV_VAR, "120"),
            (REALTIME_ENV_VAR, "1"),
            (SCRIPT_ENV_VAR, "run.txt"),
        ]);
        assert_eq!(config.loop_config.target_tps, 120);
        assert!(config.loop_config.realtime);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(SAVE_URL_ENV_VAR, "   "), (SCRIPT_ENV_VAR, "")]);
        assert_eq!(config.save_url, None);
        assert_eq!(config.script_path, None);
    }
}
