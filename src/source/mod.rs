use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::buffer::models::NewFact;
use crate::buffer::LocalBuffer;
use crate::catalog::{Tag, TagCatalog};
use crate::cloud::models::NewTag;
use crate::cloud::repositories::{SourceRepository, TagRepository};
use crate::cloud::CloudStore;
use crate::config::PAUSED_SOURCE_LOG_EVERY;
use crate::driver::logix::LogixDriver;
use crate::error::{DaemonError, DaemonResult};
use crate::shared::DriverKindEnum;

/// A PLC endpoint owned by one daemon: its driver connection, its
/// monitored-tag catalog, and liveness state (§3 Source, §4.2).
pub struct Source {
    pub source_id: i32,
    pub address: String,
    pub driver_kind: DriverKindEnum,
    driver: Arc<LogixDriver>,
    catalog: TagCatalog,
    active: AtomicBool,
    paused_poll_ticks: AtomicU64,
}

impl Source {
    pub fn new(
        source_id: i32,
        address: String,
        driver_kind: DriverKindEnum,
        active: bool,
    ) -> DaemonResult<Self> {
        let driver = crate::driver::open_driver(driver_kind, &address)?;
        Ok(Source {
            source_id,
            address,
            driver_kind,
            driver,
            catalog: TagCatalog::new(),
            active: AtomicBool::new(active),
            paused_poll_ticks: AtomicU64::new(0),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Re-reads `active` from the cloud, then reconciles the monitored-tag
    /// catalog against the cloud's declared set (§4.2 sync). The cloud is
    /// authoritative for *which* tags are monitored; the driver is
    /// authoritative for *which* tags exist, so a monitored name absent
    /// from discovery is silently skipped (CatalogMismatch, §7).
    pub async fn sync(&self, cloud: &CloudStore) -> DaemonResult<()> {
        let mut conn = cloud.conn().await?;
        let row = SourceRepository::find_by_id(&mut conn, self.source_id)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;
        self.active.store(row.active, Ordering::Relaxed);

        if !row.active {
            for name in self.catalog.names().await {
                self.catalog.remove(&name).await;
            }
            return Ok(());
        }

        let monitored = TagRepository::list_monitored(&mut conn, self.source_id)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;

        let current_names: std::collections::HashSet<String> =
            self.catalog.names().await.into_iter().collect();
        let desired_names: std::collections::HashSet<String> =
            monitored.iter().map(|t| t.name.clone()).collect();

        for stale in current_names.difference(&desired_names) {
            self.catalog.remove(stale).await;
        }

        for row in monitored {
            if !self.catalog.contains(&row.name).await {
                self.catalog
                    .insert(Tag::new(row.id, row.name.clone(), row.data_type_name.clone()))
                    .await;
            }
        }

        Ok(())
    }

    /// Polls the driver for every monitored tag and appends results into
    /// the in-memory catalog (§4.2 poll). Paused sources are throttled to
    /// one warning every `PAUSED_SOURCE_LOG_EVERY` ticks to avoid log
    /// storms (§9 design note).
    pub async fn poll(&self) -> DaemonResult<()> {
        if !self.is_active() {
            let tick = self.paused_poll_ticks.fetch_add(1, Ordering::Relaxed);
            if tick % PAUSED_SOURCE_LOG_EVERY == 0 {
                tracing::warn!(source_id = self.source_id, "source is paused, skipping poll");
            }
            return Ok(());
        }
        self.paused_poll_ticks.store(0, Ordering::Relaxed);

        let names = self.catalog.names().await;
        if names.is_empty() {
            return Ok(());
        }

        let readings = self.driver.poll(names).await?;
        for (name, value, time) in readings {
            self.catalog.record(&name, time, value).await;
        }
        Ok(())
    }

    /// Atomically drains every tag's queue and inserts into the local
    /// buffer with conflict-ignore semantics (§4.2 storeData, §4.4).
    pub async fn store_data(&self, buffer: &LocalBuffer) -> DaemonResult<()> {
        let drained = self.catalog.drain_all().await;
        if drained.is_empty() {
            return Ok(());
        }
        let rows = drained
            .into_iter()
            .map(|(tag_id, time, val)| NewFact { tag_id, time, val })
            .collect();
        buffer.insert_facts(rows).await
    }

    /// Re-runs driver discovery and upserts the resulting catalog into the
    /// cloud (§4.2 discoverTags). Not wired to any periodic cadence (§9
    /// open question); callable directly by an operator or a future task.
    pub async fn discover_tags(&self, cloud: &CloudStore) -> DaemonResult<usize> {
        let discovered = self.driver.discover_tags()?;
        if discovered.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().naive_utc();
        let new_tags: Vec<NewTag> = discovered
            .into_iter()
            .map(|(name, data_type_name)| NewTag {
                name,
                data_type_name,
                source_id: self.source_id,
                monitor: false,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let mut conn = cloud.conn().await?;
        TagRepository::upsert_discovered(&mut conn, new_tags)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))
    }

    pub async fn heartbeat(&self, cloud: &CloudStore) -> DaemonResult<()> {
        let mut conn = cloud.conn().await?;
        let now = Utc::now().naive_utc();
        SourceRepository::heartbeat(&mut conn, self.source_id, now)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;
        Ok(())
    }

    pub fn close(&self) {
        self.driver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PlcValue;

    #[tokio::test]
    async fn paused_source_skips_poll_without_error() {
        let source = Source::new(1, "10.0.0.1".into(), DriverKindEnum::Logix, false).unwrap();
        source.poll().await.unwrap();
        assert_eq!(source.catalog.len().await, 0);
    }

    #[tokio::test]
    async fn poll_records_valid_values_for_monitored_tags() {
        let source = Source::new(1, "10.0.0.1".into(), DriverKindEnum::Logix, true).unwrap();
        source
            .catalog
            .insert(Tag::new(10, "Line1.Speed".into(), "REAL".into()))
            .await;
        source.driver.with_primary_link(|link| {
            link.set_value("Line1.Speed", PlcValue::Number(12.5));
        });

        source.poll().await.unwrap();

        let drained = source.catalog.drain_all().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].2, 12.5);
    }
}
