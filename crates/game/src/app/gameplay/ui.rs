use tracing::info;

use super::zones::Sfx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cinematic {
    GameStart,
    Trailer,
    ComicViewer,
    MilestoneSpin,
}

impl Cinematic {
    pub(crate) fn route(self) -> &'static str {
        match self {
            Self::GameStart => "/game_start",
            Self::Trailer => "/trailer",
            Self::ComicViewer => "/comicviewer",
            Self::MilestoneSpin => "/spin3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Keys,
    Cash,
    Chance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MusicTrack {
    Overworld,
    Underground,
}

pub(crate) trait UiPort {
    fn show_dialogue(&mut self, _text: &str, _portrait: Option<&str>) {}
    fn hide_dialogue(&mut self) {}
    fn show_choice(&mut self, _options: &[&str], _selected: usize) {}
    fn hide_choice(&mut self) {}
    fn play_sfx(&mut self, _sfx: Sfx) {}
    fn play_voice(&mut self, _clip: &str) {}
    fn stop_voices(&mut self) {}
    fn play_music(&mut self, _track: MusicTrack) {}
    fn duck_music(&mut self) {}
    fn restore_music(&mut self) {}
    fn show_cinematic(&mut self, _cinematic: Cinematic) {}
    fn begin_play(&mut self) {}
    fn set_counter_visible(&mut self, _counter: Counter, _visible: bool) {}
    fn update_counters(&mut self, _keys: u8, _cash: u64) {}
    fn hide_door(&mut self, _zone_id: &str) {}
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct NoopUi;

#[cfg(test)]
impl UiPort for NoopUi {}

#[derive(Debug, Default)]
pub(crate) struct LoggingUi {
    last_counters: Option<(u8, u64)>,
}

impl UiPort for LoggingUi {
    fn show_dialogue(&mut self, text: &str, portrait: Option<&str>) {
        info!(portrait = portrait.unwrap_or("-"), text, "dialogue_shown");
    }

    fn hide_dialogue(&mut self) {
        info!("dialogue_hidden");
    }

    fn show_choice(&mut self, options: &[&str], selected: usize) {
        info!(?options, selected, "choice_shown");
    }

    fn hide_choice(&mut self) {
        info!("choice_hidden");
    }

    fn play_sfx(&mut self, sfx: Sfx) {
        info!(sfx = sfx.key(), "sfx_played");
    }

    fn play_voice(&mut self, clip: &str) {
        info!(clip, "voice_played");
    }

    fn play_music(&mut self, track: MusicTrack) {
        info!(?track, "music_started");
    }

    fn show_cinematic(&mut self, cinematic: Cinematic) {
        info!(route = cinematic.route(), "cinematic_shown");
    }

    fn begin_play(&mut self) {
        info!("play_started");
    }

    fn set_counter_visible(&mut self, counter: Counter, visible: bool) {
        info!(?counter, visible, "hud_counter_visibility");
    }

    fn update_counters(&mut self, keys: u8, cash: u64) {
        if self.last_counters == Some((keys, cash)) {
            return;
        }
        self.last_counters = Some((keys, cash));
        info!(keys, cash, "hud_counters");
    }

    fn hide_door(&mut self, zone_id: &str) {
        info!(zone = zone_id, "door_sprite_hidden");
    }
}
