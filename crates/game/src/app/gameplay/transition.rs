use std::time::Duration;

use engine::StagedDelay;
use tracing::info;

use super::progress::{ProgressState, NPC_COUNT, TASK_COUNT};

const DOOR_OPEN_DELAY: Duration = Duration::from_millis(1000);
const DOOR_ENTER_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CarriedProgress {
    pub(crate) tasks: [bool; TASK_COUNT],
    pub(crate) npcs: [bool; NPC_COUNT],
    pub(crate) key_count: u8,
}

pub(crate) fn carry_forward(progress: &ProgressState) -> CarriedProgress {
    CarriedProgress {
        tasks: progress.task_flags(),
        npcs: progress.npc_flags(),
        key_count: progress.key_count(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct DoorSequence {
    delay: Option<StagedDelay>,
    fired: bool,
}

impl DoorSequence {
    pub(crate) fn is_armed(&self) -> bool {
        self.delay.is_some() && !self.fired
    }

    pub(crate) fn has_fired(&self) -> bool {
        self.fired
    }

    pub(crate) fn arm(&mut self) -> bool {
        if self.delay.is_some() {
            return false;
        }
        info!("door_sequence_armed");
        self.delay = Some(StagedDelay::new(&[DOOR_OPEN_DELAY, DOOR_ENTER_DELAY]));
        true
    }

    /// True on exactly one tick: the one in which the last delay elapses.
    pub(crate) fn tick(&mut self, dt_seconds: f32) -> bool {
        if self.fired {
            return false;
        }
        let Some(delay) = self.delay.as_mut() else {
            return false;
        };
        if delay.tick(dt_seconds) {
            self.fired = true;
            return true;
        }
        false
    }
}
