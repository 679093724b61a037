use engine::{InputSnapshot, Scene, SceneCommand, Vec2};
use tracing::{info, warn};

use super::progress::{ProgressState, UndergroundFlags};
use super::sync::SessionContext;
use super::transition::CarriedProgress;
use super::ui::{Counter, MusicTrack, UiPort};
use super::walk;

pub(crate) const UNDERGROUND_SPAWN: Vec2 = Vec2 { x: -300.0, y: 20.0 };

pub(crate) struct UndergroundScene {
    ui: Box<dyn UiPort>,
    position: Vec2,
    carried: Option<CarriedProgress>,
    flags: UndergroundFlags,
}

impl UndergroundScene {
    pub(crate) fn new(ui: Box<dyn UiPort>) -> Self {
        Self {
            ui,
            position: UNDERGROUND_SPAWN,
            carried: None,
            flags: UndergroundFlags::default(),
        }
    }
}

impl Scene<SessionContext> for UndergroundScene {
    fn load(&mut self, session: &mut SessionContext) {
        self.position = UNDERGROUND_SPAWN;
        self.carried = session.carried;
        self.flags = ProgressState::from_snapshot(&session.snapshot).underground;
        if self.carried.is_none() {
            warn!("underground_loaded_without_carried_progress");
        }

        self.ui.set_counter_visible(Counter::Keys, false);
        if !self.flags.is_guessed {
            self.ui.set_counter_visible(Counter::Chance, true);
        }
        self.ui.play_music(MusicTrack::Underground);
        info!(
            keys = self.carried.map(|carried| carried.key_count),
            chance = self.flags.chance,
            guessed = self.flags.is_guessed,
            "underground_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        _session: &mut SessionContext,
    ) -> SceneCommand {
        self.position = walk(self.position, input, fixed_dt_seconds);
        SceneCommand::None
    }

    fn unload(&mut self, _session: &mut SessionContext) {
        info!(x = self.position.x, y = self.position.y, "underground_unloaded");
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!(
            "underground | chance {} | ({:.0}, {:.0})",
            self.flags.chance, self.position.x, self.position.y
        ))
    }
}

#[cfg(test)]
impl UndergroundScene {
    pub(crate) fn carried(&self) -> Option<CarriedProgress> {
        self.carried
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }
}
