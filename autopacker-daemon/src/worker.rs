//! The single background worker that drains the queue.
//!
//! ```text
//!            owner running                 queue empty
//!   ┌──────────────────────────┐     ┌───────────────────┐
//!   ▼                          │     ▼                   │
//! WaitingForLockRelease ──► Idle ──────► Reconciling ────┘
//! ```
//!
//! Every wait observes the shutdown channel. A unit that is being reconciled
//! when shutdown arrives is allowed to finish; no further unit starts.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use autopacker_core::{Conventions, ErrorVerbosity, LockMonitor, UnpackedDir};
use autopacker_sync::reconcile;

use crate::error::{join_err, DaemonError};
use crate::queue::SyncQueue;

/// Worker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Lock polling, idle and post-failure wait.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Result of one drain-and-reconcile pass.
#[derive(Debug, Default)]
pub(crate) struct Cycle {
    pub processed: Vec<UnpackedDir>,
    pub failed: HashSet<UnpackedDir>,
    pub interrupted: bool,
}

pub struct Worker {
    root: PathBuf,
    conventions: Arc<Conventions>,
    queue: Arc<SyncQueue>,
    monitor: Arc<dyn LockMonitor>,
    verbosity: ErrorVerbosity,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        root: PathBuf,
        conventions: Arc<Conventions>,
        queue: Arc<SyncQueue>,
        monitor: Arc<dyn LockMonitor>,
        verbosity: ErrorVerbosity,
        config: WorkerConfig,
    ) -> Self {
        Self {
            root,
            conventions,
            queue,
            monitor,
            verbosity,
            config,
        }
    }

    /// Loop until shutdown is signalled.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), DaemonError> {
        let mut failed_last_cycle = HashSet::new();

        loop {
            if self.owner_running().await? {
                tracing::info!(
                    process = %self.conventions.owner_process,
                    "game is running; waiting for it to exit before syncing",
                );
                loop {
                    if wait_or_shutdown(&mut shutdown_rx, self.config.poll_interval).await {
                        return Ok(());
                    }
                    if !self.owner_running().await? {
                        break;
                    }
                }
                tracing::info!("game has exited; resuming sync");
            }

            if self.queue.is_empty() {
                if wait_or_shutdown(&mut shutdown_rx, self.config.poll_interval).await {
                    return Ok(());
                }
                continue;
            }

            let cycle = self.run_cycle(&failed_last_cycle, &mut shutdown_rx).await?;
            if cycle.interrupted {
                return Ok(());
            }
            tracing::debug!(
                units = cycle.processed.len(),
                failed = cycle.failed.len(),
                "sync cycle finished",
            );
            failed_last_cycle = cycle.failed;

            if failed_last_cycle.is_empty() {
                tracing::info!("all unpacked mods have been processed; you can safely exit");
            } else if wait_or_shutdown(&mut shutdown_rx, self.config.poll_interval).await {
                return Ok(());
            }
        }
    }

    /// Drain the queue once and reconcile each distinct unit in order.
    ///
    /// Failed units go back on the queue. Their error is logged only when
    /// they already failed in the previous cycle, so a single transient
    /// failure (file still being written, archive briefly locked) stays quiet.
    pub(crate) async fn run_cycle(
        &self,
        failed_last_cycle: &HashSet<UnpackedDir>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<Cycle, DaemonError> {
        let mut cycle = Cycle::default();

        for unit in self.queue.drain_distinct() {
            if shutdown_requested(shutdown_rx) {
                cycle.interrupted = true;
                break;
            }

            let conventions = Arc::clone(&self.conventions);
            let job = unit.clone();
            let result = tokio::task::spawn_blocking(move || reconcile(&job, &conventions))
                .await
                .map_err(|e| join_err("reconcile", e))?;

            if let Err(err) = result {
                self.queue.enqueue(unit.clone());
                if failed_last_cycle.contains(&unit) {
                    tracing::error!(
                        unit = %unit.display_path(&self.root),
                        "failed to sync unpacked folder: {}",
                        self.verbosity.render(&err),
                    );
                } else {
                    tracing::debug!(
                        unit = %unit.display_path(&self.root),
                        error = %err,
                        "sync failed; retrying next cycle",
                    );
                }
                cycle.failed.insert(unit.clone());
            }
            cycle.processed.push(unit);
        }

        Ok(cycle)
    }

    async fn owner_running(&self) -> Result<bool, DaemonError> {
        let monitor = Arc::clone(&self.monitor);
        tokio::task::spawn_blocking(move || monitor.is_owner_running())
            .await
            .map_err(|e| join_err("lock_monitor", e))
    }
}

/// Sleep for `duration`; true when shutdown arrived first.
async fn wait_or_shutdown(shutdown_rx: &mut broadcast::Receiver<()>, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown_rx.recv() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(
        shutdown_rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    )
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    use tempfile::TempDir;

    use super::*;

    const POLL: Duration = Duration::from_millis(20);

    fn unit_with_file(root: &Path, name: &str) -> UnpackedDir {
        let dir = root.join("alpha").join("Data").join(name);
        fs::create_dir_all(&dir).expect("mkdir unit");
        fs::write(dir.join("a.xml"), "<a/>").expect("write");
        UnpackedDir(dir)
    }

    fn worker(root: &Path, queue: Arc<SyncQueue>, running: Arc<AtomicBool>) -> Worker {
        let monitor: Arc<dyn LockMonitor> = Arc::new(move || running.load(Ordering::SeqCst));
        Worker::new(
            root.to_path_buf(),
            Arc::new(Conventions::default()),
            queue,
            monitor,
            ErrorVerbosity::Short,
            WorkerConfig {
                poll_interval: POLL,
            },
        )
    }

    const FAILURE_LOG: &str = "failed to sync unpacked folder";
    const DONE_LOG: &str = "all unpacked mods have been processed";

    /// Collects formatted log lines written on the current thread.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn count(&self, needle: &str) -> usize {
            let bytes = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            String::from_utf8_lossy(&bytes).matches(needle).count()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(POLL).await;
        }
        check()
    }

    #[tokio::test]
    async fn repeated_enqueues_reconcile_once() {
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        let queue = Arc::new(SyncQueue::new());
        for _ in 0..5 {
            queue.enqueue(unit.clone());
        }
        let worker = worker(tmp.path(), Arc::clone(&queue), Arc::new(AtomicBool::new(false)));
        let (_tx, mut rx) = broadcast::channel(1);

        let cycle = worker
            .run_cycle(&HashSet::new(), &mut rx)
            .await
            .expect("cycle");

        assert_eq!(cycle.processed, vec![unit.clone()]);
        assert!(cycle.failed.is_empty());
        assert!(queue.is_empty());
        assert!(unit.archive_path(&Conventions::default()).is_file());
    }

    #[tokio::test]
    async fn failed_unit_is_requeued_and_recovers() {
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        let archive = unit.archive_path(&Conventions::default());
        // A directory where the archive should be makes the zip reader fail.
        fs::create_dir_all(&archive).expect("mkdir blocker");

        let queue = Arc::new(SyncQueue::new());
        queue.enqueue(unit.clone());
        let worker = worker(tmp.path(), Arc::clone(&queue), Arc::new(AtomicBool::new(false)));
        let (_tx, mut rx) = broadcast::channel(1);

        let first = worker
            .run_cycle(&HashSet::new(), &mut rx)
            .await
            .expect("cycle");
        assert!(first.failed.contains(&unit));
        assert_eq!(queue.len(), 1);

        fs::remove_dir(&archive).expect("rm blocker");
        let second = worker
            .run_cycle(&first.failed, &mut rx)
            .await
            .expect("cycle");
        assert!(second.failed.is_empty());
        assert!(queue.is_empty());
        assert!(archive.is_file());
    }

    #[tokio::test]
    async fn shutdown_before_cycle_starts_nothing() {
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        let queue = Arc::new(SyncQueue::new());
        queue.enqueue(unit.clone());
        let worker = worker(tmp.path(), Arc::clone(&queue), Arc::new(AtomicBool::new(false)));
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).expect("send shutdown");

        let cycle = worker
            .run_cycle(&HashSet::new(), &mut rx)
            .await
            .expect("cycle");
        assert!(cycle.interrupted);
        assert!(cycle.processed.is_empty());
        assert!(!unit.archive_path(&Conventions::default()).exists());
    }

    #[tokio::test]
    async fn no_mutation_while_owner_runs() {
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        let archive = unit.archive_path(&Conventions::default());
        let queue = Arc::new(SyncQueue::new());
        queue.enqueue(unit);
        let running = Arc::new(AtomicBool::new(true));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker(tmp.path(), queue, Arc::clone(&running)).run(rx));

        tokio::time::sleep(POLL * 10).await;
        assert!(!archive.exists());

        running.store(false, Ordering::SeqCst);
        assert!(eventually(|| archive.is_file()).await);

        tx.send(()).expect("send shutdown");
        handle.await.expect("join").expect("worker result");
    }

    #[tokio::test]
    async fn shutdown_interrupts_lock_wait() {
        let tmp = TempDir::new().expect("tempdir");
        let queue = Arc::new(SyncQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker(tmp.path(), queue, running).run(rx));

        tokio::time::sleep(POLL * 3).await;
        tx.send(()).expect("send shutdown");
        let joined = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker stops promptly");
        joined.expect("join").expect("worker result");
    }

    #[tokio::test]
    async fn only_second_consecutive_failure_logs_an_error() {
        let logs = LogCapture::default();
        let _guard = logs.install();
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        fs::create_dir_all(unit.archive_path(&Conventions::default())).expect("mkdir blocker");
        let queue = Arc::new(SyncQueue::new());
        queue.enqueue(unit.clone());
        let worker = worker(tmp.path(), Arc::clone(&queue), Arc::new(AtomicBool::new(false)));
        let (_tx, mut rx) = broadcast::channel(1);

        let first = worker
            .run_cycle(&HashSet::new(), &mut rx)
            .await
            .expect("cycle");
        assert_eq!(logs.count(FAILURE_LOG), 0);

        worker.run_cycle(&first.failed, &mut rx).await.expect("cycle");
        assert_eq!(logs.count(FAILURE_LOG), 1);
    }

    #[tokio::test]
    async fn lock_wait_transitions_are_logged_once() {
        let logs = LogCapture::default();
        let _guard = logs.install();
        let tmp = TempDir::new().expect("tempdir");
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(
            worker(tmp.path(), Arc::new(SyncQueue::new()), Arc::clone(&running)).run(rx),
        );

        tokio::time::sleep(POLL * 10).await;
        running.store(false, Ordering::SeqCst);
        assert!(eventually(|| logs.count("game has exited") > 0).await);
        tokio::time::sleep(POLL * 5).await;

        tx.send(()).expect("send shutdown");
        handle.await.expect("join").expect("worker result");
        assert_eq!(logs.count("game is running"), 1);
        assert_eq!(logs.count("game has exited"), 1);
    }

    #[tokio::test]
    async fn completion_is_logged_only_after_a_clean_cycle() {
        let logs = LogCapture::default();
        let _guard = logs.install();
        let tmp = TempDir::new().expect("tempdir");
        let unit = unit_with_file(tmp.path(), "Tables.unpacked");
        let archive = unit.archive_path(&Conventions::default());
        fs::create_dir_all(&archive).expect("mkdir blocker");
        let queue = Arc::new(SyncQueue::new());
        queue.enqueue(unit);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(
            worker(tmp.path(), queue, Arc::new(AtomicBool::new(false))).run(rx),
        );

        assert!(eventually(|| logs.count(FAILURE_LOG) > 0).await);
        assert_eq!(logs.count(DONE_LOG), 0);

        fs::remove_dir(&archive).expect("rm blocker");
        assert!(eventually(|| logs.count(DONE_LOG) > 0).await);
        tokio::time::sleep(POLL * 5).await;

        tx.send(()).expect("send shutdown");
        handle.await.expect("join").expect("worker result");
        assert_eq!(logs.count(DONE_LOG), 1);
        assert!(archive.is_file());
    }
}
