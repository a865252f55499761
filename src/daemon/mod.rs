use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::buffer::LocalBuffer;
use crate::cloud::repositories::{DaemonRepository, SourceRepository};
use crate::cloud::CloudStore;
use crate::config::{Config, LOG_FORWARD_INTERVAL};
use crate::error::{DaemonError, DaemonResult};
use crate::logger::Logger;
use crate::shared::CoreEvent;
use crate::source::Source;

const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Applies §7's error-kind policy at a periodic-task call site:
/// `CloudUnavailable`/`PlcUnavailable` are absorbed as a warning and the
/// next cadence retries naturally, but `LocalBufferError` has no fallback
/// — the local buffer is the safety net, so a failure writing to it is a
/// real bug and must surface loudly rather than be swallowed forever.
fn handle_periodic_error(context: &str, e: DaemonError) {
    match e {
        DaemonError::LocalBufferError(ref msg) => {
            tracing::error!(error = %msg, "{context}: local buffer failure is unrecoverable");
            panic!("{context}: local buffer failure is unrecoverable: {msg}");
        }
        other => tracing::warn!(error = %other, "{context}"),
    }
}

/// Top-level scheduler: owns the daemon's identity, its sources, and the
/// four periodic tasks plus the fixed log-forward cadence (§4.1).
pub struct Daemon {
    daemon_id: i32,
    active: AtomicBool,
    sources: IndexMap<i32, Arc<Source>>,
    buffer: Arc<LocalBuffer>,
    cloud: Arc<CloudStore>,
    logger: Arc<Logger>,
}

impl Daemon {
    /// Resolves the daemon row by `config_key`, loads its sources, and
    /// wires the local buffer, cloud store, and logger in an order that
    /// avoids the cyclic construction the original had (§9): the buffer is
    /// built first since the logger only needs it to stage rows; the
    /// cloud store is handed to call sites that forward, not stored
    /// inside the logger itself.
    ///
    /// Retries the whole cloud-dependent bootstrap sequence (connect,
    /// resolve the daemon row, load sources) indefinitely on
    /// cloud-communication failure with a fixed back-off, rather than the
    /// unbounded recursion the original used (§9); a fatal configuration
    /// error still aborts immediately, since §4.1/§6 only promise retry
    /// for transient cloud outages, not bad config.
    pub async fn bootstrap(config: &Config) -> DaemonResult<Arc<Self>> {
        let buffer = Arc::new(LocalBuffer::connect(&config.local_buffer_path)?);

        let (cloud, daemon_id, sources) = loop {
            match Self::try_bootstrap_cloud_state(config).await {
                Ok(state) => break state,
                Err(DaemonError::CloudUnavailable(msg)) => {
                    tracing::warn!(error = %msg, "cloud unreachable during bootstrap, retrying in 5s");
                    tokio::time::sleep(BOOTSTRAP_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        };
        let cloud = Arc::new(cloud);
        let logger = Arc::new(Logger::new(daemon_id, Arc::clone(&buffer)));

        Ok(Arc::new(Daemon {
            daemon_id,
            active: AtomicBool::new(true),
            sources,
            buffer,
            cloud,
            logger,
        }))
    }

    /// One attempt at the full cloud-dependent bootstrap sequence. Any
    /// `CloudUnavailable` from either step is retried by the caller's
    /// loop; anything else (e.g. `ConfigFatal` from an unknown driver
    /// kind) propagates immediately.
    async fn try_bootstrap_cloud_state(
        config: &Config,
    ) -> DaemonResult<(CloudStore, i32, IndexMap<i32, Arc<Source>>)> {
        let (cloud, daemon_id) = Self::try_connect_cloud(config).await?;
        let sources = Self::load_sources(&cloud, daemon_id).await?;
        Ok((cloud, daemon_id, sources))
    }

    async fn try_connect_cloud(config: &Config) -> DaemonResult<(CloudStore, i32)> {
        let cloud = CloudStore::connect(&config.cloud_database_url()).await?;
        let mut conn = cloud.conn().await?;
        let row = DaemonRepository::find_by_config_key(&mut conn, &config.configuration_key)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;
        Ok((cloud, row.id))
    }

    async fn load_sources(
        cloud: &CloudStore,
        daemon_id: i32,
    ) -> DaemonResult<IndexMap<i32, Arc<Source>>> {
        let mut conn = cloud.conn().await?;
        let rows = SourceRepository::list_by_daemon(&mut conn, daemon_id)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;

        let mut sources = IndexMap::new();
        for row in rows {
            let driver_kind = row
                .driver
                .parse()
                .map_err(|_| DaemonError::ConfigFatal(format!("unknown driver kind {}", row.driver)))?;
            let source = Source::new(row.id, row.address.clone(), driver_kind, row.active)?;
            sources.insert(row.id, Arc::new(source));
        }
        Ok(sources)
    }

    /// Registers the four periodic tasks plus the fixed log-forward
    /// cadence, runs until `ctrl_c`, then signals shutdown and joins.
    pub async fn run(self: Arc<Self>, config: &Config) -> DaemonResult<()> {
        let (event_tx, _) = broadcast::channel::<CoreEvent>(16);

        let mut handles = Vec::new();
        handles.push(self.spawn_poll_task(config.poll_interval, event_tx.subscribe()));
        handles.push(self.spawn_store_task(config.store_interval, event_tx.subscribe()));
        handles.push(self.spawn_sync_task(config.sync_interval, event_tx.subscribe()));
        handles.push(self.spawn_forward_task(config.forward_interval, event_tx.subscribe()));
        handles.push(self.spawn_log_forward_task(LOG_FORWARD_INTERVAL, event_tx.subscribe()));

        let _ = event_tx.send(CoreEvent::Startup);

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::LocalBufferError(e.to_string()))?;
        tracing::info!("shutdown signal received, draining tasks");
        let _ = event_tx.send(CoreEvent::Shutdown);

        for handle in handles {
            let _ = handle.await;
        }

        for source in self.sources.values() {
            source.close();
        }

        Ok(())
    }

    fn spawn_poll_task(
        self: &Arc<Self>,
        period: Duration,
        mut event_rx: broadcast::Receiver<CoreEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !daemon.active.load(Ordering::Relaxed) {
                            continue;
                        }
                        for source in daemon.sources.values() {
                            if let Err(e) = source.poll().await {
                                handle_periodic_error("poll failed for source", e);
                            }
                        }
                    }
                    event = event_rx.recv() => {
                        if matches!(event, Ok(CoreEvent::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_store_task(
        self: &Arc<Self>,
        period: Duration,
        mut event_rx: broadcast::Receiver<CoreEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !daemon.active.load(Ordering::Relaxed) {
                            continue;
                        }
                        for source in daemon.sources.values() {
                            if let Err(e) = source.store_data(&daemon.buffer).await {
                                handle_periodic_error("store_data failed for source", e);
                            }
                        }
                    }
                    event = event_rx.recv() => {
                        if matches!(event, Ok(CoreEvent::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_sync_task(
        self: &Arc<Self>,
        period: Duration,
        mut event_rx: broadcast::Receiver<CoreEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        daemon.sync_once().await;
                    }
                    event = event_rx.recv() => {
                        if matches!(event, Ok(CoreEvent::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_forward_task(
        self: &Arc<Self>,
        period: Duration,
        mut event_rx: broadcast::Receiver<CoreEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !daemon.active.load(Ordering::Relaxed) {
                            continue;
                        }
                        if let Err(e) = daemon.forward_once().await {
                            handle_periodic_error("forward failed, will retry next cadence", e);
                        }
                    }
                    event = event_rx.recv() => {
                        if matches!(event, Ok(CoreEvent::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_log_forward_task(
        self: &Arc<Self>,
        period: Duration,
        mut event_rx: broadcast::Receiver<CoreEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = daemon.logger.forward(&daemon.cloud).await {
                            handle_periodic_error("log forward failed, will retry next cadence", e);
                        }
                    }
                    event = event_rx.recv() => {
                        if matches!(event, Ok(CoreEvent::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Re-reads this daemon's row (refreshing `active`, writing a
    /// heartbeat), then reconciles every source. Runs regardless of
    /// `active` so a paused daemon still observes un-pausing (§4.1 sync).
    async fn sync_once(&self) {
        match self.cloud.conn().await {
            Ok(mut conn) => {
                let now = Utc::now().naive_utc();
                match DaemonRepository::heartbeat(&mut conn, self.daemon_id, now).await {
                    Ok(row) => self.active.store(row.active, Ordering::Relaxed),
                    Err(e) => {
                        let _ = self.logger.warning(format!("daemon heartbeat failed: {e}")).await;
                    }
                }
            }
            Err(e) => {
                let _ = self.logger.warning(format!("cloud unreachable during sync: {e}")).await;
                return;
            }
        }

        for source in self.sources.values() {
            if let Err(e) = source.sync(&self.cloud).await {
                let _ = self
                    .logger
                    .warning(format!("source {} sync failed: {e}", source.source_id))
                    .await;
                continue;
            }
            if let Err(e) = source.heartbeat(&self.cloud).await {
                let _ = self
                    .logger
                    .warning(format!("source {} heartbeat failed: {e}", source.source_id))
                    .await;
            }
        }
    }

    /// Drains local facts up to "now" into the cloud with idempotent
    /// upsert, then deletes the forwarded rows locally using the same
    /// cutoff so concurrently-staged rows survive (§4.1 forward).
    async fn forward_once(&self) -> DaemonResult<()> {
        use crate::cloud::models::NewCloudFact;
        use crate::cloud::repositories::FactRepository;

        let cutoff = Utc::now().naive_utc();
        let staged = self.buffer.facts_until(cutoff).await?;
        if staged.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewCloudFact> = staged
            .into_iter()
            .map(|f| NewCloudFact {
                tag_id: f.tag_id,
                time: f.time,
                val: f.val,
            })
            .collect();

        let mut conn = self.cloud.conn().await?;
        FactRepository::upsert_batch(&mut conn, rows)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;

        self.buffer.delete_facts_until(cutoff).await?;
        Ok(())
    }
}
