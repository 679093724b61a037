use engine::{InputSnapshot, MapObjects, Scene, Vec2};
use tracing::{info, warn};

mod challenge;
mod dialogue;
mod interaction;
mod overworld;
mod progress;
mod sync;
mod transition;
mod ui;
mod underground;
mod zones;

pub(crate) use challenge::{challenge_channel, ChallengeResultSender};
#[cfg(test)]
pub(crate) use challenge::ChallengeResultReceiver;
pub(crate) use dialogue::MessageCatalog;
pub(crate) use progress::ProgressSnapshot;
pub(crate) use sync::{HttpRemoteStore, LoginDataFile, RemoteStore, SessionContext};
pub(crate) use zones::INTERACTION_LAYER;

use challenge::{ChallengeBridge, ChallengeHost, LoggingChallengeHost};
use interaction::InteractionController;
use overworld::OverworldScene;
use sync::{CredentialSource, PersistenceSync};
use ui::{LoggingUi, UiPort};
use underground::UndergroundScene;
use zones::ZoneRegistry;

const PLAYER_SPEED_PX_PER_SECOND: f32 = 200.0;
const PLAYER_BODY_WIDTH: f32 = 48.0;
const PLAYER_BODY_HEIGHT: f32 = 68.0;

pub(crate) struct SceneServices {
    pub(crate) overworld_ui: Box<dyn UiPort>,
    pub(crate) underground_ui: Box<dyn UiPort>,
    pub(crate) challenge_host: Box<dyn ChallengeHost>,
    pub(crate) remote: Option<Box<dyn RemoteStore>>,
    pub(crate) credentials: Box<dyn CredentialSource>,
}

impl SceneServices {
    pub(crate) fn logging(
        remote: Option<Box<dyn RemoteStore>>,
        credentials: Box<dyn CredentialSource>,
    ) -> Self {
        Self {
            overworld_ui: Box::new(LoggingUi::default()),
            underground_ui: Box::new(LoggingUi::default()),
            challenge_host: Box::new(LoggingChallengeHost),
            remote,
            credentials,
        }
    }
}

pub(crate) struct ScenePair {
    pub(crate) overworld: Box<dyn Scene<SessionContext>>,
    pub(crate) underground: Box<dyn Scene<SessionContext>>,
    pub(crate) challenge_results: ChallengeResultSender,
}

pub(crate) fn build_scene_pair(
    map: &MapObjects,
    catalog: &MessageCatalog,
    services: SceneServices,
) -> ScenePair {
    let (overworld, underground, challenge_results) = build_scenes(map, catalog, services);
    ScenePair {
        overworld: Box::new(overworld),
        underground: Box::new(underground),
        challenge_results,
    }
}

fn build_scenes(
    map: &MapObjects,
    catalog: &MessageCatalog,
    services: SceneServices,
) -> (OverworldScene, UndergroundScene, ChallengeResultSender) {
    let zones = ZoneRegistry::build(&map.objects, catalog);
    if zones.is_empty() {
        warn!(layer_found = map.layer_found, "no_interaction_zones");
    }
    info!(
        zones = zones.len(),
        skipped_objects = map.skipped,
        messages = catalog.len(),
        "interaction_zones_built"
    );
    let (sender, receiver) = challenge_channel();
    let bridge = ChallengeBridge::new(services.challenge_host, receiver);
    let controller = InteractionController::new(zones, services.overworld_ui, bridge);
    let sync = PersistenceSync::new(services.remote, services.credentials);
    (
        OverworldScene::new(controller, sync, map.pixel_size),
        UndergroundScene::new(services.underground_ui),
        sender,
    )
}

fn walk(position: Vec2, input: &InputSnapshot, dt_seconds: f32) -> Vec2 {
    let step = input
        .move_axis()
        .scaled(PLAYER_SPEED_PX_PER_SECOND * dt_seconds);
    position.offset(step)
}
