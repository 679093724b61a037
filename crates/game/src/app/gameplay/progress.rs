use std::collections::BTreeMap;
use std::path::Path;
use std::{fmt, fs, io};

use engine::{write_text_atomic, Vec2};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub(crate) const TASK_COUNT: usize = 6;
pub(crate) const NPC_COUNT: usize = 7;
pub(crate) const STARTING_BONUS_CASH: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TaskId(u8);

impl TaskId {
    pub(crate) fn new(number: u32) -> Option<Self> {
        if (1..=TASK_COUNT as u32).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    pub(crate) fn all() -> impl Iterator<Item = TaskId> {
        (1..=TASK_COUNT as u8).map(TaskId)
    }

    pub(crate) fn number(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Voice {
    Female,
    Male,
}

impl Voice {
    pub(crate) fn clip(self) -> &'static str {
        match self {
            Self::Female => "female_voice",
            Self::Male => "male_voice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NpcId(u8);

impl NpcId {
    pub(crate) fn new(number: u32) -> Option<Self> {
        if (1..=NPC_COUNT as u32).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    pub(crate) fn all() -> impl Iterator<Item = NpcId> {
        (1..=NPC_COUNT as u8).map(NpcId)
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub(crate) fn task_twin(self) -> Option<TaskId> {
        TaskId::new(self.0 as u32)
    }

    pub(crate) fn voice(self) -> Voice {
        match self.0 {
            3 | 6 => Voice::Female,
            _ => Voice::Male,
        }
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "npc{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct UndergroundFlags {
    pub(crate) chance: u32,
    pub(crate) is_guessed: bool,
}

/// Task and NPC flags only go from false to true; `key_count` equals the completed tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ProgressState {
    tasks: [bool; TASK_COUNT],
    npcs: [bool; NPC_COUNT],
    key_count: u8,
    pub(crate) cash: u64,
    pub(crate) position: Option<Vec2>,
    pub(crate) has_seen_intro: bool,
    pub(crate) underground: UndergroundFlags,
}

impl ProgressState {
    pub(crate) fn key_count(&self) -> u8 {
        self.key_count
    }

    pub(crate) fn is_task_complete(&self, task: TaskId) -> bool {
        self.tasks[task.index()]
    }

    pub(crate) fn has_met(&self, npc: NpcId) -> bool {
        self.npcs[npc.index()]
    }

    pub(crate) fn complete_task(&mut self, task: TaskId) -> bool {
        let flag = &mut self.tasks[task.index()];
        if *flag {
            return false;
        }
        *flag = true;
        self.key_count = self.key_count.saturating_add(1);
        true
    }

    pub(crate) fn mark_npc_met(&mut self, npc: NpcId) -> bool {
        let flag = &mut self.npcs[npc.index()];
        if *flag {
            return false;
        }
        *flag = true;
        true
    }

    pub(crate) fn add_cash(&mut self, amount: u64) {
        self.cash = self.cash.saturating_add(amount);
    }

    pub(crate) fn finish_intro(&mut self) -> bool {
        if self.has_seen_intro {
            return false;
        }
        self.has_seen_intro = true;
        self.add_cash(STARTING_BONUS_CASH);
        true
    }

    pub(crate) fn task_flags(&self) -> [bool; TASK_COUNT] {
        self.tasks
    }

    pub(crate) fn npc_flags(&self) -> [bool; NPC_COUNT] {
        self.npcs
    }

    pub(crate) fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        let mut tasks = [false; TASK_COUNT];
        for task in TaskId::all() {
            tasks[task.index()] = snapshot
                .tasks_completed
                .get(&task.to_string())
                .copied()
                .unwrap_or(false);
        }
        let mut npcs = [false; NPC_COUNT];
        for npc in NpcId::all() {
            npcs[npc.index()] = snapshot
                .samsaram
                .get(&npc.to_string())
                .copied()
                .unwrap_or(false);
        }

        let key_count = tasks.iter().filter(|done| **done).count() as u8;
        if snapshot.keys != u64::from(key_count) {
            warn!(
                stored = snapshot.keys,
                computed = key_count,
                "snapshot_key_count_mismatch"
            );
        }

        Self {
            tasks,
            npcs,
            key_count,
            cash: snapshot.cash,
            position: snapshot.player.map(SnapshotPosition::to_vec2),
            has_seen_intro: snapshot.rida,
            underground: UndergroundFlags {
                chance: snapshot.chance,
                is_guessed: snapshot.is_guessed,
            },
        }
    }

    pub(crate) fn to_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            player: self.position.map(SnapshotPosition::from_vec2),
            tasks_completed: task_flag_map(&self.tasks),
            samsaram: npc_flag_map(&self.npcs),
            keys: u64::from(self.key_count),
            cash: self.cash,
            rida: self.has_seen_intro,
            chance: self.underground.chance,
            is_guessed: self.underground.is_guessed,
        }
    }
}

pub(crate) fn task_flag_map(tasks: &[bool; TASK_COUNT]) -> BTreeMap<String, bool> {
    TaskId::all()
        .map(|task| (task.to_string(), tasks[task.index()]))
        .collect()
}

pub(crate) fn npc_flag_map(npcs: &[bool; NPC_COUNT]) -> BTreeMap<String, bool> {
    NpcId::all()
        .map(|npc| (npc.to_string(), npcs[npc.index()]))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct SnapshotPosition {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl SnapshotPosition {
    fn from_vec2(value: Vec2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }

    fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressSnapshot {
    #[serde(
        default,
        deserialize_with = "lenient_position",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) player: Option<SnapshotPosition>,
    #[serde(default, deserialize_with = "lenient_flag_map")]
    pub(crate) tasks_completed: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "lenient_flag_map")]
    pub(crate) samsaram: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub(crate) keys: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub(crate) cash: u64,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub(crate) rida: bool,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub(crate) chance: u32,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub(crate) is_guessed: bool,
}

#[derive(Debug, Error)]
pub(crate) enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse snapshot json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProgressSnapshot {
    pub(crate) fn from_json_str(raw: &str) -> Result<Self, SnapshotError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            SnapshotError::Parse {
                path: if path.is_empty() { ".".to_string() } else { path },
                message: error.into_inner().to_string(),
            }
        })
    }

    pub(crate) fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Encode)
    }

    /// `Ok(None)` when the file does not exist yet.
    pub(crate) fn load_file(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::from_json_str(&raw).map(Some)
    }

    pub(crate) fn save_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let text = self.to_json_pretty()?;
        write_text_atomic(path, &text).map_err(|source| SnapshotError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

fn bool_from_value(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn f64_from_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn u64_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| f64_from_value(value).map(|n| n.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| f64_from_value(value).map(|n| n.max(0.0) as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(bool_from_value(&value))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(u64_from_value(&value))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(u32::try_from(u64_from_value(&value)).unwrap_or(u32::MAX))
}

fn lenient_flag_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .iter()
        .map(|(key, flag)| (key.clone(), bool_from_value(flag)))
        .collect())
}

fn lenient_position<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SnapshotPosition>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let x = value.get("x").and_then(f64_from_value);
    let y = value.get("y").and_then(f64_from_value);
    Ok(match (x, y) {
        (Some(x), Some(y)) => Some(SnapshotPosition {
            x: x as f32,
            y: y as f32,
        }),
        _ => None,
    })
}
