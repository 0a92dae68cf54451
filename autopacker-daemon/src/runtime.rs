use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use autopacker_core::config::Settings;
use autopacker_core::{classify, locate, Conventions, LockMonitor, UnpackedDir};

use crate::error::{io_err, join_err, DaemonError};
use crate::monitor::ProcessMonitor;
use crate::queue::SyncQueue;
use crate::worker::{Worker, WorkerConfig};

/// Start the watcher runtime and block the current thread until it exits.
///
/// `shutdown_rx` must come from the same channel as `shutdown_tx` and be
/// created before anything can send on it. Sending on the channel (or
/// Ctrl-C) stops every task.
pub fn start_blocking(
    settings: Settings,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    init_tracing();
    let monitor: Arc<dyn LockMonitor> =
        Arc::new(ProcessMonitor::new(settings.conventions.owner_process.clone()));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(
        settings,
        monitor,
        WorkerConfig::default(),
        shutdown_tx,
        shutdown_rx,
    ))
}

/// Run the initial sync, the watcher, the worker and the Ctrl-C handler
/// until one of them ends or shutdown is signalled.
pub async fn run(
    settings: Settings,
    monitor: Arc<dyn LockMonitor>,
    worker_config: WorkerConfig,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let root = settings.working_dir.clone();
    let conventions = Arc::new(settings.conventions.clone());
    let queue = Arc::new(SyncQueue::new());

    tracing::info!(root = %root.display(), "watching for changes in unpacked mod folders");

    let initial = {
        let root = root.clone();
        let conventions = Arc::clone(&conventions);
        tokio::task::spawn_blocking(move || locate::discover_units(&root, &conventions))
            .await
            .map_err(|e| join_err("initial_scan", e))?
    };
    tracing::info!(units = initial.len(), "queueing unpacked folders for initial sync");
    for unit in initial {
        queue.enqueue(unit);
    }

    // Tasks subscribe before anything is spawned; a shutdown sent earlier is
    // still buffered in `shutdown_rx` and relayed by the signal task.
    let watcher_rx = shutdown_tx.subscribe();
    let worker_rx = shutdown_tx.subscribe();

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        let conventions = Arc::clone(&conventions);
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let result = watcher_task(root, conventions, queue, watcher_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let worker_handle = {
        let shutdown = shutdown_tx.clone();
        let worker = Worker::new(
            root.clone(),
            Arc::clone(&conventions),
            Arc::clone(&queue),
            monitor,
            settings.verbosity,
            worker_config,
        );
        tokio::spawn(async move {
            let result = worker.run(worker_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = shutdown.send(());
                    Ok(())
                }
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => {
                            let _ = shutdown.send(());
                            Err(DaemonError::Signal(err))
                        }
                    }
                }
            }
        })
    };

    let (watcher_result, worker_result, signal_result) =
        tokio::join!(watcher_handle, worker_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("worker", worker_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn watcher_task(
    root: PathBuf,
    conventions: Arc<Conventions>,
    queue: Arc<SyncQueue>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                for path in &event.paths {
                    if let Some(unit) = on_path_changed(path, &root, &conventions, &queue) {
                        tracing::debug!(
                            unit = %unit.display_path(&root),
                            path = %path.display(),
                            "change queued",
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Classify a changed path and queue the unpacked folder it belongs to.
///
/// Temp, hidden and (unless packed) backup files are ignored, as is anything
/// outside an unpacked folder, including the archives this tool writes.
pub fn on_path_changed(
    path: &Path,
    root: &Path,
    conventions: &Conventions,
    queue: &SyncQueue,
) -> Option<UnpackedDir> {
    if classify::is_excluded(path, conventions) {
        return None;
    }
    let unit = locate::locate_sync_unit(path, root, conventions)?;
    queue.enqueue(unit.clone());
    Some(unit)
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task, err)),
    }
}

/// Install the `fmt` subscriber on stderr: `RUST_LOG` when set, `info`
/// otherwise.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use notify::event::{CreateKind, ModifyKind};
    use tempfile::TempDir;

    use autopacker_core::ErrorVerbosity;

    use super::*;

    fn settings(root: &Path) -> Settings {
        Settings {
            working_dir: root.to_path_buf(),
            release_dir: root.join("Release"),
            conventions: Conventions::default(),
            any_folder: true,
            verbosity: ErrorVerbosity::Short,
        }
    }

    #[test]
    fn changed_file_queues_its_unit() {
        let root = PathBuf::from("/game/Mods");
        let queue = SyncQueue::new();
        let path = root.join("alpha/Data/Tables.unpacked/Libs/weapon.xml");

        let unit = on_path_changed(&path, &root, &Conventions::default(), &queue);

        let expected = UnpackedDir(root.join("alpha/Data/Tables.unpacked"));
        assert_eq!(unit, Some(expected.clone()));
        assert_eq!(queue.drain_distinct(), vec![expected]);
    }

    #[test]
    fn temp_files_and_archives_are_ignored() {
        let root = PathBuf::from("/game/Mods");
        let queue = SyncQueue::new();
        let conventions = Conventions::default();

        for path in [
            root.join("alpha/Data/Tables.unpacked/weapon.xml.tmp"),
            root.join("alpha/Data/Tables.unpacked/.weapon.xml.swp"),
            root.join("alpha/Data/Tables.unpacked/weapon.xml.original"),
            root.join("alpha/Data/Tables.pak"),
            root.join("alpha/Data/Tables.pak.autopacker.tmp"),
        ] {
            assert_eq!(on_path_changed(&path, &root, &conventions, &queue), None);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn relevant_event_kinds() {
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant_event_kind(&EventKind::Access(
            notify::event::AccessKind::Any
        )));
    }

    #[tokio::test]
    async fn initial_sync_packs_existing_units_and_stops_on_shutdown() {
        let tmp = TempDir::new().expect("tempdir");
        let unit = tmp.path().join("alpha").join("Data").join("Tables.unpacked");
        fs::create_dir_all(&unit).expect("mkdir");
        fs::write(unit.join("a.xml"), "<a/>").expect("write");
        let archive = tmp.path().join("alpha").join("Data").join("Tables.pak");

        let (tx, rx) = broadcast::channel(4);
        let monitor: Arc<dyn LockMonitor> = Arc::new(|| false);
        let handle = tokio::spawn(run(
            settings(tmp.path()),
            monitor,
            WorkerConfig {
                poll_interval: Duration::from_millis(20),
            },
            tx.clone(),
            rx,
        ));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !archive.is_file() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(archive.is_file());

        tx.send(()).expect("send shutdown");
        let joined = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runtime stops");
        joined.expect("join").expect("runtime result");
    }
}
