use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use courier_core::config;
use courier_publish::{pipeline, RunOptions, RunOutcome, RunReport};

use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, run_dir, socket_path, DAEMON_LABEL};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::schedule;

/// Outcome of the most recent run, kept for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub finished_at_unix: u64,
    pub ok: bool,
    pub outcome: Option<String>,
    pub commit: Option<String>,
    pub error: Option<String>,
}

pub type SharedLastRun = Arc<RwLock<Option<LastRun>>>;
pub type SharedNextFire = Arc<RwLock<Option<u64>>>;

struct RunJob {
    source: &'static str,
    dry_run: bool,
    respond_to: oneshot::Sender<Result<RunSummary, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub outcome: String,
    pub commit: Option<String>,
    pub label: Option<String>,
    pub changed: Vec<String>,
    pub missing: Vec<String>,
    pub duration_ms: u128,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let last_run: SharedLastRun = Arc::new(RwLock::new(None));
    let next_fire: SharedNextFire = Arc::new(RwLock::new(None));
    let started_at_unix = unix_seconds_now();

    let (run_tx, run_rx) = mpsc::channel::<RunJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let run_tx = run_tx.clone();
        let next_fire = next_fire.clone();
        tokio::spawn(async move {
            let result = scheduler_task(home, run_tx, next_fire, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let last_run = last_run.clone();
        tokio::spawn(async move {
            let result = run_processor_task(home, last_run, run_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let last_run = last_run.clone();
        let next_fire = next_fire.clone();
        let run_tx = run_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                last_run,
                next_fire,
                run_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, processor_result, socket_result, rotation_result, signal_result) =
        tokio::join!(
            scheduler_handle,
            processor_handle,
            socket_handle,
            rotation_handle,
            signal_handle
        );

    handle_join("scheduler", scheduler_result)?;
    handle_join("run_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Sleep until the configured daily fire time, then enqueue a run.
///
/// Config is reloaded every cycle so schedule edits take effect without a
/// restart; with no loadable config the scheduler idles and retries.
async fn scheduler_task(
    home: PathBuf,
    run_tx: mpsc::Sender<RunJob>,
    next_fire: SharedNextFire,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let wait = match config::load_at(&home) {
            Ok(config) => {
                let next = schedule::next_fire_after(Utc::now(), &config.schedule);
                *next_fire.write().await = Some(next.timestamp() as u64);
                tracing::info!(next_fire = %next, "scheduler armed");
                schedule::sleep_until_fire(Utc::now(), &config.schedule)
            }
            Err(err) => {
                tracing::warn!(error = %err, "no loadable config; scheduler idle");
                *next_fire.write().await = None;
                Duration::from_secs(60)
            }
        };

        let armed = next_fire.read().await.is_some();
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {
                if !armed {
                    continue;
                }
                match enqueue_run(&run_tx, "schedule", false).await {
                    Ok(summary) => {
                        tracing::info!(
                            outcome = %summary.outcome,
                            changed = summary.changed.len(),
                            duration_ms = summary.duration_ms,
                            "scheduled run completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "scheduled run failed");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_processor_task(
    home: PathBuf,
    last_run: SharedLastRun,
    mut run_rx: mpsc::Receiver<RunJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = run_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = std::time::Instant::now();

                let home_for_run = home.clone();
                let dry_run = job.dry_run;
                let run_result = tokio::task::spawn_blocking(move || -> Result<RunReport, DaemonError> {
                    let config = config::load_at(&home_for_run)?;
                    Ok(pipeline::run(&home_for_run, &config, RunOptions { dry_run })?)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("run task join error: {err}")))?;

                let outcome = match run_result {
                    Ok(report) => Ok(build_run_summary(job.source, &report, started.elapsed())),
                    Err(err) => Err(err.to_string()),
                };

                {
                    let mut guard = last_run.write().await;
                    *guard = Some(match &outcome {
                        Ok(summary) => LastRun {
                            finished_at_unix: unix_seconds_now(),
                            ok: true,
                            outcome: Some(summary.outcome.clone()),
                            commit: summary.commit.clone(),
                            error: None,
                        },
                        Err(message) => LastRun {
                            finished_at_unix: unix_seconds_now(),
                            ok: false,
                            outcome: None,
                            commit: None,
                            error: Some(message.clone()),
                        },
                    });
                }

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    last_run: SharedLastRun,
    next_fire: SharedNextFire,
    run_tx: mpsc::Sender<RunJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let last_run = last_run.clone();
                let next_fire = next_fire.clone();
                let run_tx = run_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        last_run,
                        next_fire,
                        run_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    last_run: SharedLastRun,
    next_fire: SharedNextFire,
    run_tx: mpsc::Sender<RunJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();

        let response = match cmd.as_str() {
            "status" => {
                let payload = build_status_payload(
                    &home,
                    last_run.clone(),
                    next_fire.clone(),
                    started_at_unix,
                )
                .await;
                DaemonResponse::ok(payload)
            }
            "run" => {
                let dry_run = request.dry_run.unwrap_or(false);
                match enqueue_run(&run_tx, "socket", dry_run).await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(err) => DaemonResponse::error(err.to_string()),
                }
            }
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(
    home: &Path,
    last_run: SharedLastRun,
    next_fire: SharedNextFire,
    started_at_unix: u64,
) -> Value {
    // Snapshot shared state (read locks, dropped before JSON assembly).
    let last = { last_run.read().await.clone() };
    let next = { *next_fire.read().await };

    // Config is re-read so status reflects edits made since startup.
    let config = config::load_at(home).ok();

    json!({
        "running": true,
        "label": DAEMON_LABEL,
        "started_at_unix": started_at_unix,
        "next_fire_at_unix": next,
        "schedule": config.as_ref().map(|c| json!({
            "hour_utc": c.schedule.hour_utc,
            "minute_utc": c.schedule.minute_utc,
        })),
        "repository": config.as_ref().map(|c| c.repository.display().to_string()),
        "last_run": last,
        "socket": socket_path(home).display().to_string(),
    })
}

async fn enqueue_run(
    run_tx: &mpsc::Sender<RunJob>,
    source: &'static str,
    dry_run: bool,
) -> Result<RunSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    run_tx
        .send(RunJob {
            source,
            dry_run,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("run queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("run response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    // Skip the first (immediate) tick to avoid rotating on startup.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_logs(&home);
                })
                .await
                .ok(); // rotation errors are logged inside rotate_logs; never crash the daemon
            }
        }
    }
    Ok(())
}

fn build_run_summary(
    source: &'static str,
    report: &RunReport,
    duration: Duration,
) -> RunSummary {
    let (outcome, commit, label) = match &report.outcome {
        RunOutcome::NoChange => ("no-change".to_string(), None, None),
        RunOutcome::WouldPublish { .. } => ("would-publish".to_string(), None, None),
        RunOutcome::Published { record } => (
            "published".to_string(),
            Some(record.commit.clone()),
            Some(record.label.clone()),
        ),
    };

    RunSummary {
        source: source.to_string(),
        outcome,
        commit,
        label,
        changed: report.changes.changed().iter().map(|n| n.0.clone()).collect(),
        missing: report.changes.missing().iter().map(|n| n.0.clone()).collect(),
        duration_ms: duration.as_millis(),
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    let logs = logs_dir(home);
    if !logs.exists() {
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use courier_core::types::ArtifactName;
    use courier_publish::detect::ArtifactState;
    use courier_publish::{ChangeReport, PublicationRecord, RunOutcome};
    use courier_source::ProduceReport;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::{broadcast, mpsc, RwLock};

    fn report_with(outcome: RunOutcome, states: &[(&str, ArtifactState)]) -> RunReport {
        let mut map = BTreeMap::new();
        for (name, state) in states {
            map.insert(ArtifactName::from(*name), *state);
        }
        RunReport {
            produced: ProduceReport::default(),
            changes: ChangeReport { states: map },
            outcome,
        }
    }

    #[test]
    fn run_summary_for_no_change() {
        let report = report_with(
            RunOutcome::NoChange,
            &[("a.txt", ArtifactState::Current), ("b.txt", ArtifactState::Missing)],
        );
        let summary = build_run_summary("schedule", &report, Duration::from_millis(42));

        assert_eq!(summary.outcome, "no-change");
        assert_eq!(summary.commit, None);
        assert!(summary.changed.is_empty());
        assert_eq!(summary.missing, vec!["b.txt"]);
        assert_eq!(summary.duration_ms, 42);
    }

    #[test]
    fn run_summary_for_publication() {
        let record = PublicationRecord {
            commit: "c0ffee".to_string(),
            label: "Automated update of CN ASN IP lists (2026-08-06)".to_string(),
            published_at: Utc::now(),
            artifacts: vec![ArtifactName::from("a.txt")],
        };
        let report = report_with(
            RunOutcome::Published { record },
            &[("a.txt", ArtifactState::Changed)],
        );
        let summary = build_run_summary("socket", &report, Duration::from_millis(7));

        assert_eq!(summary.outcome, "published");
        assert_eq!(summary.commit.as_deref(), Some("c0ffee"));
        assert_eq!(summary.changed, vec!["a.txt"]);
        assert_eq!(summary.source, "socket");
    }

    #[tokio::test]
    async fn status_payload_before_any_run() {
        let home = TempDir::new().expect("home");
        let last_run: SharedLastRun = Arc::new(RwLock::new(None));
        let next_fire: SharedNextFire = Arc::new(RwLock::new(Some(1_000_500)));

        let payload =
            build_status_payload(home.path(), last_run, next_fire, 1_000_000).await;

        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["label"], json!(DAEMON_LABEL));
        assert_eq!(payload["started_at_unix"], json!(1_000_000u64));
        assert_eq!(payload["next_fire_at_unix"], json!(1_000_500u64));
        assert_eq!(payload["last_run"], serde_json::Value::Null);
        assert_eq!(
            payload["repository"],
            serde_json::Value::Null,
            "no config registered in this home"
        );
    }

    #[tokio::test]
    async fn status_payload_reflects_the_registered_config() {
        let home = TempDir::new().expect("home");
        courier_core::config::init_at(PathBuf::from("/srv/cn-ip-lists"), home.path())
            .expect("init config");

        let last_run: SharedLastRun = Arc::new(RwLock::new(Some(LastRun {
            finished_at_unix: 1_000_100,
            ok: true,
            outcome: Some("no-change".to_string()),
            commit: None,
            error: None,
        })));
        let next_fire: SharedNextFire = Arc::new(RwLock::new(None));

        let payload =
            build_status_payload(home.path(), last_run, next_fire, 1_000_000).await;

        assert_eq!(payload["repository"], json!("/srv/cn-ip-lists"));
        assert_eq!(payload["schedule"]["hour_utc"], json!(3));
        assert_eq!(payload["last_run"]["outcome"], json!("no-change"));
        assert_eq!(payload["last_run"]["ok"], json!(true));
    }

    #[tokio::test]
    async fn socket_protocol_status_and_stop_over_in_memory_channels() {
        let (request_tx, mut request_rx) = mpsc::channel::<Vec<u8>>(8);
        let (response_tx, mut response_rx) = mpsc::channel::<Vec<u8>>(8);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

        tokio::spawn(async move {
            while let Some(bytes) = request_rx.recv().await {
                let line = String::from_utf8(bytes).expect("utf8");
                let request: DaemonRequest = serde_json::from_str(line.trim()).expect("request");
                let response = match request.cmd.as_str() {
                    "status" => DaemonResponse::ok(json!({"running": true})),
                    "stop" => {
                        let _ = shutdown_tx.send(());
                        DaemonResponse::ok(json!({"stopping": true}))
                    }
                    other => DaemonResponse::error(format!("unknown command '{other}'")),
                };
                let encoded = serde_json::to_vec(&response).expect("encode response");
                if response_tx.send(encoded).await.is_err() {
                    break;
                }
            }
        });

        request_tx
            .send(br#"{"cmd":"status"}"#.to_vec())
            .await
            .expect("send status request");
        let status_response = response_rx.recv().await.expect("status response");
        let status_json: serde_json::Value =
            serde_json::from_slice(&status_response).expect("decode status");
        assert_eq!(status_json["ok"], serde_json::Value::Bool(true));

        request_tx
            .send(br#"{"cmd":"stop"}"#.to_vec())
            .await
            .expect("send stop request");
        let stop_response = response_rx.recv().await.expect("stop response");
        let stop_json: serde_json::Value =
            serde_json::from_slice(&stop_response).expect("decode stop");
        assert_eq!(stop_json["ok"], serde_json::Value::Bool(true));

        shutdown_rx.recv().await.expect("shutdown signal");
    }

    #[tokio::test]
    async fn run_processor_records_last_run_on_failure() {
        // A home with no config: the processor must report the failure and
        // leave a failed LastRun behind rather than crash.
        let home = TempDir::new().expect("home");
        let last_run: SharedLastRun = Arc::new(RwLock::new(None));
        let (run_tx, run_rx) = mpsc::channel::<RunJob>(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let processor = tokio::spawn(run_processor_task(
            home.path().to_path_buf(),
            last_run.clone(),
            run_rx,
            shutdown_tx.subscribe(),
        ));

        let err = enqueue_run(&run_tx, "socket", false).await.unwrap_err();
        assert!(err.to_string().contains("config"), "unexpected error: {err}");

        let recorded = last_run.read().await.clone().expect("last run recorded");
        assert!(!recorded.ok);
        assert!(recorded.error.is_some());

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor exits cleanly");
    }
}
