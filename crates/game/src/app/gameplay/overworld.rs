use engine::{InputAction, InputSnapshot, Rect, Scene, SceneCommand, SceneKey, Vec2};
use tracing::info;

use super::interaction::{InteractionController, InteractionState, PressOutcome};
use super::progress::ProgressState;
use super::sync::{mirror, PersistenceSync, SessionContext};
use super::transition::{carry_forward, DoorSequence};
use super::ui::{Cinematic, Counter, MusicTrack};
use super::{walk, PLAYER_BODY_HEIGHT, PLAYER_BODY_WIDTH};

const FALLBACK_MAP_SIZE: (f32, f32) = (3000.0, 3000.0);
const DEFAULT_SPAWN_X: f32 = 100.0;
const DEFAULT_SPAWN_BOTTOM_OFFSET: f32 = 150.0;

pub(crate) struct OverworldScene {
    controller: InteractionController,
    sync: PersistenceSync,
    door: DoorSequence,
    map_bounds: Rect,
    progress: ProgressState,
    position: Vec2,
}

impl OverworldScene {
    pub(crate) fn new(
        controller: InteractionController,
        sync: PersistenceSync,
        map_pixel_size: Option<(f32, f32)>,
    ) -> Self {
        let (width, height) = map_pixel_size.unwrap_or(FALLBACK_MAP_SIZE);
        Self {
            controller,
            sync,
            door: DoorSequence::default(),
            map_bounds: Rect::new(0.0, 0.0, width, height),
            progress: ProgressState::default(),
            position: Vec2::ZERO,
        }
    }

    fn default_spawn(&self) -> Vec2 {
        Vec2::new(
            DEFAULT_SPAWN_X,
            self.map_bounds.bottom() - DEFAULT_SPAWN_BOTTOM_OFFSET,
        )
    }

    fn clamp_to_map(&self, position: Vec2) -> Vec2 {
        self.map_bounds
            .clamp_point(position, PLAYER_BODY_WIDTH / 2.0, PLAYER_BODY_HEIGHT / 2.0)
    }

    fn body(&self) -> Rect {
        Rect::centered_on(self.position, PLAYER_BODY_WIDTH, PLAYER_BODY_HEIGHT)
    }

    fn apply_challenge_messages(&mut self, session: &mut SessionContext) {
        for message in self.controller.drain_challenge_messages() {
            self.controller
                .handle_challenge_message(&message, &mut self.progress);
            mirror(
                &mut self.progress,
                self.position,
                session,
                self.controller.ui_mut(),
            );
        }
    }

    fn handle_input(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) {
        let state = self.controller.state();
        if state == InteractionState::ChallengeActive {
            return;
        }
        if state == InteractionState::ChoiceOpen {
            if input.just_pressed(InputAction::MoveUp) {
                self.controller.move_choice(-1);
                return;
            }
            if input.just_pressed(InputAction::MoveDown) {
                self.controller.move_choice(1);
                return;
            }
        }
        if input.just_pressed(InputAction::Action) {
            if self.controller.handle_action_press(&mut self.progress) == PressOutcome::DoorOpening
            {
                self.door.arm();
            }
            return;
        }
        if state != InteractionState::Idle {
            return;
        }

        let next = walk(self.position, input, fixed_dt_seconds);
        self.position = self.clamp_to_map(next);
        match self.controller.zones().first_overlapping(&self.body()) {
            Some(index) => self.controller.on_zone_enter(index),
            None => self.controller.on_zone_exit(),
        }
    }
}

impl Scene<SessionContext> for OverworldScene {
    fn load(&mut self, session: &mut SessionContext) {
        self.progress = ProgressState::from_snapshot(&session.snapshot);
        let spawn = self.progress.position.unwrap_or_else(|| self.default_spawn());
        self.position = self.clamp_to_map(spawn);
        self.door = DoorSequence::default();

        let ui = self.controller.ui_mut();
        if self.progress.has_seen_intro {
            ui.begin_play();
            ui.play_music(MusicTrack::Overworld);
        } else {
            ui.show_cinematic(Cinematic::GameStart);
        }
        ui.set_counter_visible(Counter::Keys, true);
        ui.set_counter_visible(Counter::Cash, true);
        ui.update_counters(self.progress.key_count(), self.progress.cash);

        info!(
            zones = self.controller.zones().len(),
            keys = self.progress.key_count(),
            cash = self.progress.cash,
            x = self.position.x,
            y = self.position.y,
            intro_seen = self.progress.has_seen_intro,
            "overworld_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        session: &mut SessionContext,
    ) -> SceneCommand {
        self.apply_challenge_messages(session);

        if self.door.is_armed() {
            if self.door.tick(fixed_dt_seconds) {
                session.carried = Some(carry_forward(&self.progress));
                mirror(
                    &mut self.progress,
                    self.position,
                    session,
                    self.controller.ui_mut(),
                );
                info!(keys = self.progress.key_count(), "entering_underground");
                return SceneCommand::SwitchTo(SceneKey::Underground);
            }
        } else if !self.door.has_fired() {
            self.handle_input(fixed_dt_seconds, input);
        }

        self.sync.tick(
            fixed_dt_seconds,
            &mut self.progress,
            self.position,
            session,
            self.controller.ui_mut(),
        );
        SceneCommand::None
    }

    fn unload(&mut self, session: &mut SessionContext) {
        mirror(
            &mut self.progress,
            self.position,
            session,
            self.controller.ui_mut(),
        );
        info!("overworld_unloaded");
    }

    fn debug_title(&self) -> Option<String> {
        let zone = self
            .controller
            .active_zone()
            .and_then(|index| self.controller.zones().get(index))
            .map_or("-", |zone| zone.id.as_str());
        Some(format!(
            "overworld | keys {}/6 | cash {} | {:?} | zone {} | challenge {:?}",
            self.progress.key_count(),
            self.progress.cash,
            self.controller.state(),
            zone,
            self.controller.pending_challenge()
        ))
    }
}

#[cfg(test)]
impl OverworldScene {
    pub(crate) fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    pub(crate) fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }
}
