pub mod logix;

use indexmap::IndexMap;

use crate::error::DaemonResult;
use crate::shared::DriverKindEnum;

/// A discovered PLC tag's type description, as the controller reports it.
/// Structs nest further `TagDef`s; scalars terminate the recursion (§6).
#[derive(Debug, Clone)]
pub struct TagDef {
    pub data_type_name: String,
    pub data_type: DataTypeRef,
    pub dim: u32,
    pub dimensions: Vec<u32>,
}

#[derive(Debug, Clone)]
pub enum DataTypeRef {
    Scalar,
    Struct(IndexMap<String, TagDef>),
}

/// The raw discovery tree returned by `PlcLink::tags_json`.
#[derive(Debug, Clone, Default)]
pub struct TagTree(pub IndexMap<String, TagDef>);

/// A value read back from the controller, before validity filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum PlcValue {
    Bool(bool),
    Number(f64),
    Null,
}

impl PlcValue {
    /// §4.3 validity predicate: booleans always pass, null always fails,
    /// numbers pass unless NaN or infinite (exact zero is valid).
    pub fn as_valid_f64(&self) -> Option<f64> {
        match self {
            PlcValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PlcValue::Number(n) if n.is_finite() => Some(*n),
            PlcValue::Number(_) | PlcValue::Null => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagReadResult {
    pub name: String,
    pub value: PlcValue,
}

/// The wire-level protocol boundary (§6). A production implementation
/// speaking real EtherNet/IP against Logix-family controllers is an
/// external collaborator; the core owns everything around this trait
/// (discovery filtering, chunked concurrent reads, pool checkout).
pub trait PlcLink: Send {
    fn tags_json(&mut self) -> DaemonResult<TagTree>;
    fn read(&mut self, names: &[String]) -> DaemonResult<Vec<TagReadResult>>;
    fn close(&mut self);
}

/// Constructs the orchestration driver for a source's configured kind.
/// Only `Logix` exists today; new kinds extend this match arm.
pub fn open_driver(
    kind: DriverKindEnum,
    address: &str,
) -> DaemonResult<std::sync::Arc<logix::LogixDriver>> {
    match kind {
        DriverKindEnum::Logix => Ok(std::sync::Arc::new(logix::LogixDriver::new(address)?)),
    }
}
