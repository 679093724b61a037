use std::process::ExitCode;

use engine::{run_headless, MetricsHandle};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut scenes,
        mut input,
    } = app;

    let metrics = MetricsHandle::default();
    let summary = run_headless(&config.loop_config, &mut scenes, input.as_mut(), &metrics);
    let final_metrics = metrics.snapshot();
    info!(
        ticks = summary.ticks_run,
        exit = ?summary.exit,
        tps = final_metrics.tps,
        "loop_finished"
    );

    // Scenes own the remote worker; save before they go away.
    let saved = scenes.context().snapshot.save_file(&config.snapshot_path);
    drop(scenes);
    if let Err(err) = saved {
        error!(error = %err, "snapshot_save_failed");
        return ExitCode::FAILURE;
    }
    info!(path = %config.snapshot_path.display(), "snapshot_saved");

    ExitCode::SUCCESS
}
