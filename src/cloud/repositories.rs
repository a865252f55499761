use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use chrono::NaiveDateTime;

use super::models::{Daemon, NewCloudFact, NewCloudLogEntry, NewTag, SourceRow, TagRow};
use super::schema::*;

pub struct DaemonRepository;

impl DaemonRepository {
    pub async fn find_by_config_key(
        c: &mut AsyncPgConnection,
        config_key: &str,
    ) -> QueryResult<Daemon> {
        daemons::table
            .filter(daemons::config_key.eq(config_key))
            .first(c)
            .await
    }

    pub async fn heartbeat(
        c: &mut AsyncPgConnection,
        id: i32,
        now: NaiveDateTime,
    ) -> QueryResult<Daemon> {
        diesel::update(daemons::table.find(id))
            .set(daemons::last_communication.eq(now))
            .get_result(c)
            .await
    }
}

pub struct SourceRepository;

impl SourceRepository {
    pub async fn list_by_daemon(
        c: &mut AsyncPgConnection,
        daemon_id: i32,
    ) -> QueryResult<Vec<SourceRow>> {
        sources::table
            .filter(sources::daemon_id.eq(daemon_id))
            .load(c)
            .await
    }

    pub async fn find_by_id(c: &mut AsyncPgConnection, id: i32) -> QueryResult<SourceRow> {
        sources::table.find(id).get_result(c).await
    }

    pub async fn heartbeat(
        c: &mut AsyncPgConnection,
        id: i32,
        now: NaiveDateTime,
    ) -> QueryResult<SourceRow> {
        diesel::update(sources::table.find(id))
            .set(sources::last_communication.eq(now))
            .get_result(c)
            .await
    }
}

pub struct TagRepository;

impl TagRepository {
    pub async fn list_monitored(
        c: &mut AsyncPgConnection,
        source_id: i32,
    ) -> QueryResult<Vec<TagRow>> {
        tags::table
            .filter(tags::source_id.eq(source_id))
            .filter(tags::monitor.eq(true))
            .load(c)
            .await
    }

    /// Upserts discovered tags for a source; existing rows keep their
    /// `monitor` flag (discovery never changes who is being watched, only
    /// what exists to watch, per the catalog-authority split in §4.2).
    pub async fn upsert_discovered(
        c: &mut AsyncPgConnection,
        new_tags: Vec<NewTag>,
    ) -> QueryResult<usize> {
        if new_tags.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(tags::table)
            .values(&new_tags)
            .on_conflict((tags::name, tags::source_id))
            .do_update()
            .set(tags::data_type_name.eq(excluded(tags::data_type_name)))
            .execute(c)
            .await
    }
}

pub struct FactRepository;

impl FactRepository {
    pub async fn upsert_batch(
        c: &mut AsyncPgConnection,
        rows: Vec<NewCloudFact>,
    ) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(facts::table)
            .values(&rows)
            .on_conflict((facts::tag_id, facts::time))
            .do_nothing()
            .execute(c)
            .await
    }
}

pub struct LogRepository;

impl LogRepository {
    pub async fn insert_batch(
        c: &mut AsyncPgConnection,
        rows: Vec<NewCloudLogEntry>,
    ) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(logs::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(c)
            .await
    }
}
