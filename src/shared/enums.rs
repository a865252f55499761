use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::ToSql;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// Broadcast over the shared `tokio::sync::broadcast` channel to every
/// periodic task so each can react to process lifecycle without its own
/// signal handler (mirrors the pulse-broadcaster's `CoreEvent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    Startup,
    Shutdown,
}

#[derive(AsExpression, Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, FromSqlRow)]
#[diesel(sql_type = diesel::sql_types::Text)]
pub enum LogLevelEnum {
    Info,
    Success,
    Warning,
    Danger,
}

impl ToString for LogLevelEnum {
    fn to_string(&self) -> String {
        match self {
            LogLevelEnum::Info => String::from("Info"),
            LogLevelEnum::Success => String::from("Success"),
            LogLevelEnum::Warning => String::from("Warning"),
            LogLevelEnum::Danger => String::from("Danger"),
        }
    }
}

impl FromStr for LogLevelEnum {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Info" => Ok(LogLevelEnum::Info),
            "Success" => Ok(LogLevelEnum::Success),
            "Warning" => Ok(LogLevelEnum::Warning),
            "Danger" => Ok(LogLevelEnum::Danger),
            _ => Err(()),
        }
    }
}

impl FromSql<Text, Pg> for LogLevelEnum {
    fn from_sql(value: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        match value.as_bytes() {
            b"Info" => Ok(LogLevelEnum::Info),
            b"Success" => Ok(LogLevelEnum::Success),
            b"Warning" => Ok(LogLevelEnum::Warning),
            b"Danger" => Ok(LogLevelEnum::Danger),
            _ => Err("unexpected log level value".into()),
        }
    }
}

impl ToSql<Text, Pg> for LogLevelEnum {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Pg>,
    ) -> diesel::serialize::Result {
        match self {
            LogLevelEnum::Info => out.write_all(b"Info")?,
            LogLevelEnum::Success => out.write_all(b"Success")?,
            LogLevelEnum::Warning => out.write_all(b"Warning")?,
            LogLevelEnum::Danger => out.write_all(b"Danger")?,
        }
        Ok(diesel::serialize::IsNull::No)
    }
}

/// Which `PlcLink` implementation a source's `driver` column selects.
/// Only `Logix` exists today; the enum exists so the cloud `sources`
/// table can grow new drivers without a schema migration.
#[derive(AsExpression, Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, FromSqlRow)]
#[diesel(sql_type = diesel::sql_types::Text)]
pub enum DriverKindEnum {
    Logix,
}

impl ToString for DriverKindEnum {
    fn to_string(&self) -> String {
        match self {
            DriverKindEnum::Logix => String::from("Logix"),
        }
    }
}

impl FromStr for DriverKindEnum {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Logix" => Ok(DriverKindEnum::Logix),
            _ => Err(()),
        }
    }
}

impl FromSql<Text, Pg> for DriverKindEnum {
    fn from_sql(value: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        match value.as_bytes() {
            b"Logix" => Ok(DriverKindEnum::Logix),
            _ => Err("unexpected driver kind value".into()),
        }
    }
}

impl ToSql<Text, Pg> for DriverKindEnum {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Pg>,
    ) -> diesel::serialize::Result {
        match self {
            DriverKindEnum::Logix => out.write_all(b"Logix")?,
        }
        Ok(diesel::serialize::IsNull::No)
    }
}
