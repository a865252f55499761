use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tokio::sync::RwLock;

/// A named PLC variable selected for monitoring, with an in-memory queue of
/// samples collected since the last `storeData` flush (§3 Tag).
#[derive(Debug, Clone)]
pub struct Tag {
    pub tag_id: i32,
    pub name: String,
    pub data_type_name: String,
    records: Vec<(NaiveDateTime, f64)>,
}

impl Tag {
    pub fn new(tag_id: i32, name: String, data_type_name: String) -> Self {
        Tag {
            tag_id,
            name,
            data_type_name,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, time: NaiveDateTime, value: f64) {
        self.records.push((time, value));
    }

    /// Atomically snapshot and empty the queue (§4.2 storeData).
    pub fn drain(&mut self) -> Vec<(NaiveDateTime, f64)> {
        std::mem::take(&mut self.records)
    }
}

/// A source's monitored-tag map. Order-preserving so driver reads and
/// fan-out chunking are deterministic across polls (mirrors the original's
/// `OrderedDict`).
#[derive(Default)]
pub struct TagCatalog {
    tags: RwLock<IndexMap<String, Tag>>,
}

impl TagCatalog {
    pub fn new() -> Self {
        TagCatalog {
            tags: RwLock::new(IndexMap::new()),
        }
    }

    pub async fn names(&self) -> Vec<String> {
        self.tags.read().await.keys().cloned().collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.tags.read().await.contains_key(name)
    }

    pub async fn insert(&self, tag: Tag) {
        self.tags.write().await.insert(tag.name.clone(), tag);
    }

    pub async fn remove(&self, name: &str) {
        self.tags.write().await.shift_remove(name);
    }

    pub async fn record(&self, name: &str, time: NaiveDateTime, value: f64) {
        if let Some(tag) = self.tags.write().await.get_mut(name) {
            tag.push(time, value);
        }
    }

    /// Drains every tag's queue, returning `(tag_id, time, val)` rows ready
    /// for the local buffer.
    pub async fn drain_all(&self) -> Vec<(i32, NaiveDateTime, f64)> {
        let mut guard = self.tags.write().await;
        let mut out = Vec::new();
        for tag in guard.values_mut() {
            let tag_id = tag.tag_id;
            for (time, val) in tag.drain() {
                out.push((tag_id, time, val));
            }
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.tags.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_empties_queue() {
        let catalog = TagCatalog::new();
        catalog
            .insert(Tag::new(1, "Line1.Speed".into(), "REAL".into()))
            .await;
        let now = chrono::Utc::now().naive_utc();
        catalog.record("Line1.Speed", now, 42.0).await;
        catalog.record("Line1.Speed", now, 43.0).await;

        let drained = catalog.drain_all().await;
        assert_eq!(drained.len(), 2);
        assert!(catalog.drain_all().await.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_tag() {
        let catalog = TagCatalog::new();
        catalog
            .insert(Tag::new(1, "A".into(), "DINT".into()))
            .await;
        assert!(catalog.contains("A").await);
        catalog.remove("A").await;
        assert!(!catalog.contains("A").await);
    }
}
