//! Load command - drive the task runner with synthetic BMC actions.
//!
//! Submits a batch of sleeping actions spread round-robin over a set of
//! host keys, shows a live status line while they run and prints a summary.
//! Useful for checking per-host serialization and the worker ceiling
//! without real BMCs.

use bmcrunner::config::parse_duration;
use bmcrunner::repository::StatusError;
use bmcrunner::taskrunner::{
    Action, ActionError, MetricsSnapshot, MultiplexTelemetrySink, TaskId, TaskRunner,
    TelemetryEvent, TelemetrySink, TracingTelemetrySink, WorkerExit,
};
use clap::Args;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the load command.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Number of tasks to submit
    #[arg(long, default_value = "1000")]
    pub tasks: usize,

    /// Number of distinct host keys to spread tasks over
    #[arg(long, default_value = "32")]
    pub hosts: usize,

    /// Override runner.max_workers from the config file
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Override runner.worker_idle_timeout (e.g. 2s, 500ms)
    #[arg(long)]
    pub idle_timeout: Option<String>,

    /// How long each synthetic action sleeps, in milliseconds
    #[arg(long, default_value = "250")]
    pub action_ms: u64,

    /// Make every Nth task fail with a structured error
    #[arg(long)]
    pub fail_every: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Worker turnover and dropped status writes seen during a run.
#[derive(Debug, Default)]
struct WorkerActivity {
    started: AtomicU64,
    idle_exits: AtomicU64,
    write_failures: AtomicU64,
}

impl TelemetrySink for WorkerActivity {
    fn emit(&self, event: TelemetryEvent) {
        let counter = match event {
            TelemetryEvent::WorkerStarted { .. } => &self.started,
            TelemetryEvent::WorkerStopped {
                reason: WorkerExit::Idle,
                ..
            } => &self.idle_exits,
            TelemetryEvent::StatusWriteFailed { .. } => &self.write_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run the load command.
pub fn run(args: LoadArgs) -> Result<(), CliError> {
    validate(&args)?;

    let cli = CliRunner::new(args.debug, false)?;
    cli.log_startup("load");

    let mut config = bmcrunner::taskrunner::RunnerConfig::from(&cli.config().runner);
    if let Some(max_workers) = args.max_workers {
        config = config.with_max_workers(max_workers);
    }
    if let Some(timeout) = idle_timeout_override(&args)? {
        config = config.with_worker_idle_timeout(timeout);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let activity = Arc::new(WorkerActivity::default());
    let telemetry = MultiplexTelemetrySink::new(Vec::new())
        .with(Arc::new(TracingTelemetrySink))
        .with(activity.clone());

    runtime.block_on(async {
        let runner = cli.create_task_runner(config, Arc::new(telemetry));
        let shutdown = CancellationToken::new();
        runner.start(shutdown.clone())?;

        println!(
            "Submitting {} tasks over {} hosts (max workers {}, action {}ms)",
            args.tasks,
            args.hosts,
            runner.config().max_workers,
            args.action_ms
        );

        let started = Instant::now();
        let ids = submit(&runner, &args);
        let interrupted = watch_progress(&runner, args.tasks as u64).await;

        runner.shutdown().await;
        println!();

        print_summary(&runner, &ids, &activity, started.elapsed(), interrupted);
        Ok::<(), CliError>(())
    })
}

fn validate(args: &LoadArgs) -> Result<(), CliError> {
    if args.tasks == 0 {
        return Err(CliError::InvalidArgument("--tasks must be at least 1".to_string()));
    }
    if args.hosts == 0 {
        return Err(CliError::InvalidArgument("--hosts must be at least 1".to_string()));
    }
    if args.fail_every == Some(0) {
        return Err(CliError::InvalidArgument(
            "--fail-every must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Parses `--idle-timeout`, which must be non-zero like the config value.
fn idle_timeout_override(args: &LoadArgs) -> Result<Option<Duration>, CliError> {
    let Some(raw) = &args.idle_timeout else {
        return Ok(None);
    };
    let timeout = parse_duration(raw).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    if timeout.is_zero() {
        return Err(CliError::InvalidArgument(
            "--idle-timeout must be greater than zero".to_string(),
        ));
    }
    Ok(Some(timeout))
}

/// Host key for the `index`th task.
fn host_for(index: usize, hosts: usize) -> String {
    format!("bmc-{:03}", index % hosts + 1)
}

fn submit(runner: &TaskRunner, args: &LoadArgs) -> Vec<TaskId> {
    let delay = Duration::from_millis(args.action_ms);

    (0..args.tasks)
        .map(|i| {
            let fail = args.fail_every.is_some_and(|n| (i + 1) % n == 0);
            let action = Action::new(move |progress| async move {
                progress.send("opening session");
                tokio::time::sleep(delay).await;
                if fail {
                    return Err(ActionError::from(
                        StatusError::new(14, "synthetic BMC failure")
                            .with_details([format!("task {}", i)]),
                    ));
                }
                progress.send("closing session");
                Ok(format!("task {} done", i))
            });
            runner.execute(format!("synthetic task {}", i), host_for(i, args.hosts), action)
        })
        .collect()
}

/// Prints a live status line until every task finishes or Ctrl-C.
///
/// Returns true if interrupted.
async fn watch_progress(runner: &TaskRunner, total: u64) -> bool {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                warn!("Interrupted, waiting for running actions");
                return true;
            }
            _ = ticker.tick() => {
                let snapshot = runner.metrics();
                print!("\r{}", format_progress(&snapshot, total));
                let _ = std::io::stdout().flush();
                if snapshot.tasks_completed >= total {
                    return false;
                }
            }
        }
    }
}

fn format_progress(snapshot: &MetricsSnapshot, total: u64) -> String {
    format!(
        "workers {:>4} (registered {:>4}) | intake {:>5} | dispatch {:>5} | completed {}/{}",
        snapshot.workers_running,
        snapshot.workers_registered,
        snapshot.intake_queue_depth,
        snapshot.dispatch_queue_depth,
        snapshot.tasks_completed,
        total
    )
}

fn print_summary(
    runner: &TaskRunner,
    ids: &[TaskId],
    activity: &WorkerActivity,
    elapsed: Duration,
    interrupted: bool,
) {
    let snapshot = runner.metrics();
    let recorded = ids
        .iter()
        .filter(|id| runner.status(id).map(|r| r.complete).unwrap_or(false))
        .count();

    println!("Summary");
    println!("=======");
    if interrupted {
        println!("  Interrupted before all tasks ran");
    }
    println!("  Elapsed:          {:.2}s", elapsed.as_secs_f64());
    println!("  Tasks completed:  {}", snapshot.tasks_completed);
    println!("  Tasks failed:     {}", snapshot.tasks_failed);
    println!("  Records complete: {}/{}", recorded, ids.len());
    println!("  Peak workers:     {}", snapshot.peak_workers);
    println!(
        "  Workers started:  {} ({} idle exits)",
        activity.started.load(Ordering::Relaxed),
        activity.idle_exits.load(Ordering::Relaxed)
    );
    let write_failures = activity.write_failures.load(Ordering::Relaxed);
    if write_failures > 0 {
        println!("  Status writes dropped: {}", write_failures);
    }

    info!(
        elapsed_ms = elapsed.as_millis(),
        completed = snapshot.tasks_completed,
        failed = snapshot.tasks_failed,
        peak_workers = snapshot.peak_workers,
        "Load run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> LoadArgs {
        LoadArgs {
            tasks: 10,
            hosts: 2,
            max_workers: None,
            idle_timeout: None,
            action_ms: 1,
            fail_every: None,
            debug: false,
        }
    }

    #[test]
    fn test_host_for_round_robin() {
        assert_eq!(host_for(0, 3), "bmc-001");
        assert_eq!(host_for(1, 3), "bmc-002");
        assert_eq!(host_for(3, 3), "bmc-001");
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        assert!(validate(&args()).is_ok());
        assert!(validate(&LoadArgs { tasks: 0, ..args() }).is_err());
        assert!(validate(&LoadArgs { hosts: 0, ..args() }).is_err());
        assert!(validate(&LoadArgs {
            fail_every: Some(0),
            ..args()
        })
        .is_err());
    }

    #[test]
    fn test_idle_timeout_override() {
        let with = |raw: &str| LoadArgs {
            idle_timeout: Some(raw.to_string()),
            ..args()
        };

        assert_eq!(idle_timeout_override(&args()).unwrap(), None);
        assert_eq!(
            idle_timeout_override(&with("500ms")).unwrap(),
            Some(Duration::from_millis(500))
        );
        assert!(idle_timeout_override(&with("0s")).is_err());
        assert!(idle_timeout_override(&with("0")).is_err());
        assert!(idle_timeout_override(&with("soon")).is_err());
    }

    #[test]
    fn test_format_progress() {
        let snapshot = MetricsSnapshot {
            workers_running: 3,
            tasks_completed: 7,
            ..MetricsSnapshot::default()
        };
        let line = format_progress(&snapshot, 10);
        assert!(line.contains("completed 7/10"));
        assert!(line.starts_with("workers    3"));
    }

    #[test]
    fn test_worker_activity_counts() {
        let activity = WorkerActivity::default();
        let host = bmcrunner::taskrunner::HostKey::new("bmc-001");

        activity.emit(TelemetryEvent::WorkerStarted { host: host.clone() });
        activity.emit(TelemetryEvent::WorkerStopped {
            host: host.clone(),
            reason: WorkerExit::Idle,
            tasks_processed: 3,
        });
        activity.emit(TelemetryEvent::WorkerStopped {
            host,
            reason: WorkerExit::Cancelled,
            tasks_processed: 0,
        });

        assert_eq!(activity.started.load(Ordering::Relaxed), 1);
        assert_eq!(activity.idle_exits.load(Ordering::Relaxed), 1);
        assert_eq!(activity.write_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_submit_runs_and_fails_every_nth() {
        let runner = TaskRunner::new(
            std::sync::Arc::new(bmcrunner::repository::MemoryRepository::new()),
            bmcrunner::taskrunner::RunnerConfig::default().with_max_workers(2),
        );
        runner.start(CancellationToken::new()).unwrap();

        let args = LoadArgs {
            fail_every: Some(5),
            ..args()
        };
        let ids = submit(&runner, &args);
        assert_eq!(ids.len(), 10);

        tokio::time::timeout(Duration::from_secs(5), async {
            while runner.total_tasks() < 10 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("all synthetic tasks should finish");

        assert_eq!(runner.metrics().tasks_failed, 2);
        let failed = runner.status(&ids[4]).unwrap();
        assert_eq!(failed.error.code, 14);
        assert_eq!(failed.error.details, vec!["task 4".to_string()]);
    }
}
