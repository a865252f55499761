pub mod enums;

pub use enums::{CoreEvent, DriverKindEnum, LogLevelEnum};
