use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::metrics::MetricsAccumulator;
use super::{InputSnapshot, MetricsHandle, SceneCommand, SceneMachine};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// Pace ticks against the wall clock. When false, ticks run back to back, which is
    /// what scripted and test runs want.
    pub realtime: bool,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            realtime: true,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(5),
            max_ticks: None,
        }
    }
}

/// What an input source hands the loop for one simulation tick.
#[derive(Debug, Clone, Copy)]
pub enum InputPoll {
    Frame(InputSnapshot),
    Idle,
    Closed,
}

pub trait InputSource {
    fn poll(&mut self) -> InputPoll;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    InputClosed,
    QuitRequested,
    SceneQuit,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub exit: LoopExit,
}

/// Runs the active scene at a fixed timestep until the input closes, a quit is
/// requested, or the tick limit is reached. All scenes are unloaded before returning.
pub fn run_headless<C>(
    config: &LoopConfig,
    scenes: &mut SceneMachine<C>,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(5));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        realtime = config.realtime,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        "loop_config"
    );

    scenes.load_active();
    info!(scene = ?scenes.active_scene(), "scene_loaded");

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut ticks_run = 0u64;

    let exit = 'frames: loop {
        let frame_start = Instant::now();
        let ticks_this_frame = if config.realtime {
            let frame_dt = clamp_frame_delta(
                frame_start.saturating_duration_since(last_frame_instant),
                max_frame_delta,
            );
            last_frame_instant = frame_start;
            accumulator = accumulator.saturating_add(frame_dt);
            let plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
            accumulator = plan.remaining_accumulator;
            if !plan.dropped_backlog.is_zero() {
                metrics_accumulator.record_dropped_backlog(plan.dropped_backlog);
                debug!(
                    dropped_ms = plan.dropped_backlog.as_millis() as u64,
                    "sim_backlog_dropped"
                );
            }
            plan.ticks_to_run
        } else {
            1
        };

        for _ in 0..ticks_this_frame {
            if config.max_ticks.is_some_and(|limit| ticks_run >= limit) {
                break 'frames LoopExit::TickLimit;
            }
            let snapshot = match input.poll() {
                InputPoll::Frame(snapshot) => snapshot,
                InputPoll::Idle => InputSnapshot::empty(),
                InputPoll::Closed => break 'frames LoopExit::InputClosed,
            };
            if snapshot.quit_requested() {
                info!(reason = "input", "shutdown_requested");
                break 'frames LoopExit::QuitRequested;
            }

            let update_start = Instant::now();
            let command = scenes.update_active(fixed_dt_seconds, &snapshot);
            metrics_accumulator.record_tick(update_start.elapsed());
            ticks_run = ticks_run.saturating_add(1);

            match command {
                SceneCommand::None => {}
                SceneCommand::SwitchTo(next) => {
                    if scenes.switch_to(next) {
                        info!(scene = ?next, title = ?scenes.debug_title_active(), "scene_switched");
                    }
                }
                SceneCommand::Quit => {
                    info!(reason = "scene", "shutdown_requested");
                    break 'frames LoopExit::SceneQuit;
                }
            }
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            debug!(
                tps = snapshot.tps,
                update_ms = snapshot.update_time_ms,
                dropped_ms = snapshot.dropped_backlog_ms,
                total_ticks = snapshot.total_ticks,
                "loop_metrics"
            );
        }

        if config.realtime {
            let sleep = compute_tick_sleep(frame_start.elapsed(), fixed_dt);
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
        }
    };

    scenes.shutdown_all();
    info!(ticks_run, exit = ?exit, "loop_finished");
    LoopSummary { ticks_run, exit }
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_tick_sleep(elapsed: Duration, target: Duration) -> Duration {
    if elapsed < target {
        target - elapsed
    } else {
        Duration::ZERO
    }
}
