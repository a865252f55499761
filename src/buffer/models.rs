use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::schema::{facts, logs};

#[derive(Insertable, Queryable, Debug, Clone)]
#[diesel(table_name = facts)]
pub struct NewFact {
    pub tag_id: i32,
    pub time: NaiveDateTime,
    pub val: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = logs)]
pub struct NewLocalLogEntry {
    pub time: NaiveDateTime,
    pub message: String,
    pub level: String,
    pub daemon_id: i32,
}

#[derive(Queryable, Debug, Clone)]
pub struct LocalLogEntry {
    pub id: Option<i32>,
    pub time: NaiveDateTime,
    pub message: String,
    pub level: String,
    pub daemon_id: i32,
}
