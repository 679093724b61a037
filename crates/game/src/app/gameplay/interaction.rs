use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::challenge::{ChallengeBridge, ChallengeMessage, ChallengeStatus, LaunchError};
use super::dialogue::PLACEHOLDER_MESSAGE;
use super::progress::{NpcId, ProgressState, TaskId, TASK_COUNT};
use super::ui::{Cinematic, Counter, UiPort};
use super::zones::{ZoneEntry, ZoneKind, ZoneRegistry};

pub(crate) const CHOICE_OPTIONS: [&str; 2] = ["Start challenge", "Challenge later"];
const MAX_MESSAGE_VARIANTS: usize = 7;

const MEET_OWNER_FIRST_TEXT: &str = "Please talk once with its owner to play";
const ALREADY_COMPLETED_TEXT: &str = "You have already completed this challenge!";
const NOT_SET_UP_TEXT: &str = "Error: This challenge is not set up correctly.";
const SUCCESS_TEXT: &str = "Success! You have completed the challenge.";
const FAILED_TEXT: &str = "So close! Why not give it another try?";
const LEFT_EARLY_TEXT: &str = "You left the challenge early.";
const KEY_FOUND_TEXT: &str = "Ooh you found the key, Good luck in your journey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Panel {
    None,
    Dialogue,
    Choice { selected: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InteractionState {
    Idle,
    DialogueOpen,
    ChoiceOpen,
    ChallengeActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PressOutcome {
    Ignored,
    DialogueOpened,
    DialogueClosed,
    ChoiceOpened,
    ChoiceClosed,
    ChallengeLaunched,
    DoorOpening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageDisposition {
    Applied,
    Stale,
}

pub(crate) struct InteractionController {
    zones: ZoneRegistry,
    ui: Box<dyn UiPort>,
    bridge: ChallengeBridge,
    rng: StdRng,
    active_zone: Option<usize>,
    panel: Panel,
    music_ducked: bool,
}

impl InteractionController {
    pub(crate) fn new(zones: ZoneRegistry, ui: Box<dyn UiPort>, bridge: ChallengeBridge) -> Self {
        Self::with_rng(zones, ui, bridge, StdRng::from_os_rng())
    }

    pub(crate) fn with_rng(
        zones: ZoneRegistry,
        ui: Box<dyn UiPort>,
        bridge: ChallengeBridge,
        rng: StdRng,
    ) -> Self {
        Self {
            zones,
            ui,
            bridge,
            rng,
            active_zone: None,
            panel: Panel::None,
            music_ducked: false,
        }
    }

    pub(crate) fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    pub(crate) fn ui_mut(&mut self) -> &mut dyn UiPort {
        self.ui.as_mut()
    }

    pub(crate) fn active_zone(&self) -> Option<usize> {
        self.active_zone
    }

    #[cfg(test)]
    pub(crate) fn panel(&self) -> Panel {
        self.panel
    }

    pub(crate) fn pending_challenge(&self) -> Option<TaskId> {
        self.bridge.pending()
    }

    pub(crate) fn state(&self) -> InteractionState {
        if self.bridge.is_active() {
            return InteractionState::ChallengeActive;
        }
        match self.panel {
            Panel::None => InteractionState::Idle,
            Panel::Dialogue => InteractionState::DialogueOpen,
            Panel::Choice { .. } => InteractionState::ChoiceOpen,
        }
    }

    pub(crate) fn allows_movement(&self) -> bool {
        self.state() == InteractionState::Idle
    }

    pub(crate) fn on_zone_enter(&mut self, zone_index: usize) {
        if !self.allows_movement() || self.active_zone == Some(zone_index) {
            return;
        }
        let Some(zone) = self.zones.get(zone_index) else {
            return;
        };
        debug!(zone = %zone.id, kind = ?zone.interaction_type(), "zone_entered");
        self.active_zone = Some(zone_index);
    }

    pub(crate) fn on_zone_exit(&mut self) {
        if self.panel == Panel::None && self.active_zone.take().is_some() {
            debug!("zone_exited");
        }
    }

    pub(crate) fn handle_action_press(&mut self, progress: &mut ProgressState) -> PressOutcome {
        match self.panel {
            _ if self.bridge.is_active() => PressOutcome::Ignored,
            Panel::Choice { .. } => self.confirm_choice(progress),
            Panel::Dialogue => {
                self.close_dialogue();
                PressOutcome::DialogueClosed
            }
            Panel::None => {
                let Some(zone) = self.active_zone.and_then(|index| self.zones.get(index)) else {
                    return PressOutcome::Ignored;
                };
                let zone = zone.clone();
                self.ui.play_sfx(zone.sfx());
                self.interact(&zone, progress)
            }
        }
    }

    fn interact(&mut self, zone: &ZoneEntry, progress: &mut ProgressState) -> PressOutcome {
        match &zone.kind {
            ZoneKind::Message { variants } => {
                let pool = variants.len().min(MAX_MESSAGE_VARIANTS);
                let text = if pool == 0 {
                    PLACEHOLDER_MESSAGE
                } else {
                    variants[self.rng.random_range(0..pool)].as_str()
                };
                self.show_dialogue(text, None);
                PressOutcome::DialogueOpened
            }
            ZoneKind::Npc {
                npc,
                greeting,
                thug,
                portrait,
            } => {
                self.ui.duck_music();
                self.music_ducked = true;
                self.talk_to_npc(&zone.id, *npc, greeting, thug, portrait, progress);
                PressOutcome::DialogueOpened
            }
            ZoneKind::Choice { task_number } => {
                let owner_met = NpcId::new(*task_number).is_some_and(|npc| progress.has_met(npc));
                if !owner_met {
                    self.show_dialogue(MEET_OWNER_FIRST_TEXT, None);
                    return PressOutcome::DialogueOpened;
                }
                self.panel = Panel::Choice { selected: 0 };
                self.ui.show_choice(&CHOICE_OPTIONS, 0);
                PressOutcome::ChoiceOpened
            }
            ZoneKind::Door { locked_message } => {
                if usize::from(progress.key_count()) < TASK_COUNT {
                    self.show_dialogue(locked_message, None);
                    return PressOutcome::DialogueOpened;
                }
                self.ui.hide_door(&zone.id);
                info!(zone = %zone.id, "door_unlocked");
                PressOutcome::DoorOpening
            }
        }
    }

    fn talk_to_npc(
        &mut self,
        zone_id: &str,
        npc: Option<NpcId>,
        greeting: &str,
        thug: &str,
        portrait: &str,
        progress: &mut ProgressState,
    ) {
        let Some(npc) = npc else {
            self.ui.play_voice(&format!("{zone_id}_audio"));
            self.show_dialogue(greeting, Some(portrait));
            return;
        };

        if progress.mark_npc_met(npc) {
            info!(npc = %npc, "npc_met");
            self.ui.play_voice(&format!("{zone_id}_audio"));
            self.show_dialogue(greeting, Some(portrait));
            return;
        }

        match npc.task_twin() {
            Some(task) if progress.is_task_complete(task) => {
                self.ui.play_voice(npc.voice().clip());
                self.show_dialogue(KEY_FOUND_TEXT, Some(portrait));
            }
            Some(_) => {
                self.ui.play_voice(&format!("{zone_id}_audio2"));
                self.show_dialogue(thug, Some(portrait));
            }
            None => {
                self.ui.play_voice(&format!("{zone_id}_audio"));
                self.show_dialogue(greeting, Some(portrait));
            }
        }
    }

    pub(crate) fn move_choice(&mut self, delta: i32) {
        let Panel::Choice { selected } = self.panel else {
            return;
        };
        let len = CHOICE_OPTIONS.len() as i32;
        let next = (selected as i32 + delta).rem_euclid(len) as usize;
        self.panel = Panel::Choice { selected: next };
        self.ui.show_choice(&CHOICE_OPTIONS, next);
    }

    pub(crate) fn confirm_choice(&mut self, progress: &mut ProgressState) -> PressOutcome {
        let Panel::Choice { selected } = self.panel else {
            return PressOutcome::Ignored;
        };
        let task_number = self
            .active_zone
            .and_then(|index| self.zones.get(index))
            .and_then(|zone| match zone.kind {
                ZoneKind::Choice { task_number } => Some(task_number),
                _ => None,
            });
        self.ui.hide_choice();
        self.panel = Panel::None;
        self.active_zone = None;

        if selected != 0 {
            return PressOutcome::ChoiceClosed;
        }
        let Some(task_number) = task_number else {
            warn!("choice_confirmed_without_task_zone");
            return PressOutcome::ChoiceClosed;
        };

        if TaskId::new(task_number).is_some_and(|task| progress.is_task_complete(task)) {
            self.show_dialogue(ALREADY_COMPLETED_TEXT, None);
            return PressOutcome::DialogueOpened;
        }
        match self.bridge.launch(task_number) {
            Ok(_) => PressOutcome::ChallengeLaunched,
            Err(LaunchError::UnknownTask { .. }) => {
                self.show_dialogue(NOT_SET_UP_TEXT, None);
                PressOutcome::DialogueOpened
            }
            Err(LaunchError::AlreadyActive { .. }) => PressOutcome::Ignored,
        }
    }

    pub(crate) fn close_dialogue(&mut self) {
        if self.panel != Panel::Dialogue {
            return;
        }
        self.ui.hide_dialogue();
        self.ui.stop_voices();
        if self.music_ducked {
            self.ui.restore_music();
            self.music_ducked = false;
        }
        self.panel = Panel::None;
        self.active_zone = None;
    }

    pub(crate) fn drain_challenge_messages(&self) -> Vec<ChallengeMessage> {
        self.bridge.drain_results()
    }

    pub(crate) fn handle_challenge_message(
        &mut self,
        message: &ChallengeMessage,
        progress: &mut ProgressState,
    ) -> MessageDisposition {
        let pending = self.bridge.settle();
        if message.status.is_challenge_outcome() && pending.is_none() {
            debug!(status = ?message.status, "stale_challenge_result");
            return MessageDisposition::Stale;
        }
        info!(status = ?message.status, pending = ?pending, "challenge_message");

        match message.status {
            ChallengeStatus::Completed => {
                self.show_dialogue(SUCCESS_TEXT, None);
                if let Some(task) = pending {
                    if progress.complete_task(task) {
                        let keys = progress.key_count();
                        info!(task = %task, keys, "task_completed");
                        self.ui.update_counters(keys, progress.cash);
                        if keys > 0 && keys % 2 == 0 {
                            info!(keys, "milestone_reward");
                            self.ui.set_counter_visible(Counter::Keys, false);
                            self.ui.show_cinematic(Cinematic::MilestoneSpin);
                        }
                    }
                }
            }
            ChallengeStatus::Failed => self.show_dialogue(FAILED_TEXT, None),
            ChallengeStatus::Abandoned => self.show_dialogue(LEFT_EARLY_TEXT, None),
            ChallengeStatus::BeginPlay => self.ui.begin_play(),
            ChallengeStatus::IntroCompleted => {
                if progress.finish_intro() {
                    info!(cash = progress.cash, "intro_bonus_granted");
                }
                self.ui.show_cinematic(Cinematic::Trailer);
            }
            ChallengeStatus::ShowTrailer => self.ui.show_cinematic(Cinematic::ComicViewer),
            ChallengeStatus::SpinReward => {
                self.ui.begin_play();
                let score = message.score.as_deref().unwrap_or_default();
                self.show_dialogue(&format!("You Won: {score}"), None);
                if let Some(amount) = message.reward_amount() {
                    progress.add_cash(amount);
                    info!(amount, cash = progress.cash, "spin_reward_granted");
                }
            }
        }
        MessageDisposition::Applied
    }

    fn show_dialogue(&mut self, text: &str, portrait: Option<&str>) {
        if let Panel::Choice { .. } = self.panel {
            self.ui.hide_choice();
        }
        self.ui.show_dialogue(text, portrait);
        self.panel = Panel::Dialogue;
    }
}
