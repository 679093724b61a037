mod input;
mod loop_runner;
mod metrics;
mod scene;
mod timer;

pub use input::InputAction;
pub use loop_runner::{
    run_headless, InputPoll, InputSource, LoopConfig, LoopExit, LoopSummary,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{InputSnapshot, Rect, Scene, SceneCommand, SceneKey, SceneMachine, Vec2};
pub use timer::{RepeatingTimer, StagedDelay};
