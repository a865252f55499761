use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::shared::LogLevelEnum;

use super::schema::{daemons, facts, logs, sources, tags};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = daemons)]
pub struct Daemon {
    pub id: i32,
    pub config_key: String,
    pub active: bool,
    pub last_communication: Option<NaiveDateTime>,
}

#[derive(Queryable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(Daemon))]
#[diesel(table_name = sources)]
pub struct SourceRow {
    pub id: i32,
    pub daemon_id: i32,
    pub active: bool,
    pub address: String,
    pub driver: String,
    pub last_communication: Option<NaiveDateTime>,
}

#[derive(Queryable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(SourceRow, foreign_key = source_id))]
#[diesel(table_name = tags)]
pub struct TagRow {
    pub id: i32,
    pub name: String,
    pub data_type_name: String,
    pub source_id: i32,
    pub monitor: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = tags)]
pub struct NewTag {
    pub name: String,
    pub data_type_name: String,
    pub source_id: i32,
    pub monitor: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Queryable, Debug, Clone)]
#[diesel(table_name = facts)]
pub struct NewCloudFact {
    pub tag_id: i32,
    pub time: NaiveDateTime,
    pub val: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = logs)]
pub struct NewCloudLogEntry {
    pub time: NaiveDateTime,
    pub message: String,
    pub level: LogLevelEnum,
    pub daemon_id: i32,
}
