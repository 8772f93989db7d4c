#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod consumers;
pub mod decode;
pub mod graph;
pub mod resolve;
pub mod source;
pub mod time;
pub mod topology;

// Reexports
pub use consumers::{map_consumers, ConsumerBucket, Consumers};
pub use decode::{decode, decode_words, NodeState, Ratio};
pub use graph::{BridgeReport, ClockGraph, GraphNode, Snapshot};
pub use resolve::{resolve, DecodedNodes, ResolvedFrequency};
pub use source::{MemoryMap, ReadError, RegisterSource};
#[cfg(feature = "probe-rs")]
pub use source::ProbeSource;
pub use time::Hertz;
pub use topology::{ClockNodeKind, NodeDescriptor, NodeId, Topology, TopologyError};
