//! Topology Description: the static node set of one chip's clock tree.
//!
//! A [`Topology`] is loaded once and shared read-only by every
//! [`ClockGraph`](crate::ClockGraph) built against it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

mod layout;
mod schema;

pub use layout::{
    BandLayout, Divider, DividerEncoding, Field, FieldSpec, Layout, MuxEntry, MuxTable,
    RatioLayout, Selector,
};
pub use schema::{BridgeSpec, ChannelsSpec, GeneratorsSpec, NodeSpec, TopologySpec};

/// Closed set of clock node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockNodeKind {
    ExternalOscillator,
    InternalOscillator,
    Dfll,
    Dpll,
    GenericClockGenerator,
    PeripheralChannel,
    BusDivider,
}

impl ClockNodeKind {
    /// Oscillators are leaves: their frequency never depends on another node.
    pub const fn is_oscillator(self) -> bool {
        matches!(
            self,
            ClockNodeKind::ExternalOscillator | ClockNodeKind::InternalOscillator
        )
    }

    const fn tag(self) -> &'static str {
        match self {
            ClockNodeKind::ExternalOscillator => "xosc",
            ClockNodeKind::InternalOscillator => "osc",
            ClockNodeKind::Dfll => "dfll",
            ClockNodeKind::Dpll => "dpll",
            ClockNodeKind::GenericClockGenerator => "gclk",
            ClockNodeKind::PeripheralChannel => "pch",
            ClockNodeKind::BusDivider => "bus",
        }
    }
}

/// Node identity: kind plus instance index.
///
/// Generators are indexed by channel number, peripheral channels by
/// peripheral ID, and every other kind by declaration order within its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub kind: ClockNodeKind,
    pub instance: u32,
}

impl NodeId {
    pub const fn new(kind: ClockNodeKind, instance: u32) -> Self {
        Self { kind, instance }
    }

    pub const fn generator(index: u32) -> Self {
        Self::new(ClockNodeKind::GenericClockGenerator, index)
    }

    pub const fn channel(peripheral_id: u32) -> Self {
        Self::new(ClockNodeKind::PeripheralChannel, peripheral_id)
    }

    pub const fn dpll(index: u32) -> Self {
        Self::new(ClockNodeKind::Dpll, index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.instance)
    }
}

/// One node of a loaded topology, with its fields bound to absolute
/// addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub name: String,
    pub register: u32,
    pub reference_hz: Option<f64>,
    pub source: Option<String>,
    pub layout: Layout<Field>,
}

impl NodeDescriptor {
    /// Every register address needed to decode this node, ascending.
    pub fn addresses(&self) -> BTreeSet<u32> {
        core::iter::once(self.register)
            .chain(self.layout.addresses())
            .collect()
    }
}

/// A bridge mask register with its bit names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub name: String,
    pub register: u32,
    pub bits: BTreeMap<u32, String>,
}

impl Bridge {
    /// Names of the peripherals whose bit is set in `mask`, in bit order.
    /// Undocumented bits are named `Unknown(<bit>)`.
    pub fn enabled_peripherals(&self, mask: u32) -> Vec<String> {
        (0..32)
            .filter(|bit| mask & (1 << bit) != 0)
            .map(|bit| match self.bits.get(&bit) {
                Some(name) => name.clone(),
                None => format!("Unknown({})", bit),
            })
            .collect()
    }
}

/// Topology loading failure.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("failed to parse topology description: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("duplicate node name {name:?}")]
    DuplicateName { name: String },
    #[error("node {node:?} ({kind:?}) has no {part}")]
    MissingPart {
        node: String,
        kind: ClockNodeKind,
        part: &'static str,
    },
    #[error("generator template with stride 0 would place {count} generators on one register")]
    ZeroStride { count: u32 },
}

/// A validated, read-only clock tree description.
#[derive(Debug, Clone)]
pub struct Topology {
    name: String,
    nodes: Vec<NodeDescriptor>,
    by_id: BTreeMap<NodeId, usize>,
    by_name: BTreeMap<String, NodeId>,
    generator_count: u32,
    peripherals: BTreeMap<u32, Vec<String>>,
    bridges: Vec<Bridge>,
}

impl Topology {
    /// Parse and validate a YAML description.
    pub fn from_yaml(text: &str) -> Result<Self, TopologyError> {
        let spec: TopologySpec = serde_yaml::from_str(text)?;
        Self::from_spec(spec)
    }

    /// The bundled SAM D5x/E5x description.
    #[cfg(feature = "same54")]
    pub fn same54() -> Result<Self, TopologyError> {
        Self::from_yaml(include_str!("../../data/same54/topology.yaml"))
    }

    /// Expand templates, bind fields to addresses, and validate.
    pub fn from_spec(spec: TopologySpec) -> Result<Self, TopologyError> {
        let TopologySpec {
            name,
            nodes: node_specs,
            generators,
            peripheral_channels,
            bridges,
        } = spec;

        if generators.count > 1 && generators.stride == 0 {
            return Err(TopologyError::ZeroStride {
                count: generators.count,
            });
        }

        let mut nodes = Vec::new();
        let mut instances: BTreeMap<ClockNodeKind, u32> = BTreeMap::new();

        for node in node_specs {
            let counter = instances.entry(node.kind).or_insert(0);
            let id = NodeId::new(node.kind, *counter);
            *counter += 1;
            nodes.push(NodeDescriptor {
                id,
                layout: node.layout.bind(node.register),
                name: node.name,
                register: node.register,
                reference_hz: node.reference_hz,
                source: node.source,
            });
        }

        for n in 0..generators.count {
            let register = generators
                .register
                .wrapping_add(n.wrapping_mul(generators.stride));
            nodes.push(NodeDescriptor {
                id: NodeId::generator(n),
                name: format!("{}{}", generators.prefix, n),
                register,
                reference_hz: None,
                source: None,
                layout: generators.layout.bind(register),
            });
        }

        let mut channel_layout = peripheral_channels.layout;
        if let Some(selector) = channel_layout.selector.as_mut() {
            if selector.mux.is_empty() {
                selector.mux = (0..generators.count)
                    .map(|n| (n, format!("{}{}", generators.prefix, n)))
                    .collect();
            }
        }
        for &id in peripheral_channels.peripherals.keys() {
            let register = peripheral_channels
                .register
                .wrapping_add(id.wrapping_mul(peripheral_channels.stride));
            nodes.push(NodeDescriptor {
                id: NodeId::channel(id),
                name: format!("{}{}", peripheral_channels.prefix, id),
                register,
                reference_hz: None,
                source: None,
                layout: channel_layout.bind(register),
            });
        }

        let mut by_id = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for (index, node) in nodes.iter().enumerate() {
            validate(node)?;
            if by_name.insert(node.name.clone(), node.id).is_some() {
                return Err(TopologyError::DuplicateName {
                    name: node.name.clone(),
                });
            }
            by_id.insert(node.id, index);
        }

        let bridges = bridges
            .into_iter()
            .map(|b| Bridge {
                name: b.name,
                register: b.register,
                bits: b.bits,
            })
            .collect();

        let topology = Self {
            name,
            nodes,
            by_id,
            by_name,
            generator_count: generators.count,
            peripherals: peripheral_channels.peripherals,
            bridges,
        };
        info!(
            "topology {}: {} nodes, {} generators, {} peripheral channels",
            topology.name,
            topology.nodes.len(),
            topology.generator_count,
            topology.peripherals.len()
        );
        Ok(topology)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All nodes, in declaration order (individual nodes, then generators,
    /// then peripheral channels).
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDescriptor> {
        self.by_id.get(&id).map(|&i| &self.nodes[i])
    }

    /// Look a node up by name (as used in mux tables and fixed sources).
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn nodes_of_kind(&self, kind: ClockNodeKind) -> impl Iterator<Item = &NodeDescriptor> + '_ {
        self.nodes.iter().filter(move |n| n.id.kind == kind)
    }

    /// Number of generic clock generators (the generator index space).
    pub fn generator_count(&self) -> u32 {
        self.generator_count
    }

    /// Peripheral ID → peripheral names, as described.
    pub fn peripherals(&self) -> &BTreeMap<u32, Vec<String>> {
        &self.peripherals
    }

    pub fn peripheral_names(&self, peripheral_id: u32) -> &[String] {
        self.peripherals
            .get(&peripheral_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Every register address a snapshot of this topology must read.
    pub fn addresses(&self) -> BTreeSet<u32> {
        self.nodes
            .iter()
            .flat_map(|n| n.addresses())
            .chain(self.bridges.iter().map(|b| b.register))
            .collect()
    }
}

fn validate(node: &NodeDescriptor) -> Result<(), TopologyError> {
    let missing = |part| {
        Err(TopologyError::MissingPart {
            node: node.name.clone(),
            kind: node.id.kind,
            part,
        })
    };

    match node.id.kind {
        ClockNodeKind::Dpll if node.layout.selector.is_none() => missing("reference selector"),
        ClockNodeKind::Dpll if node.layout.ratio.is_none() => missing("ratio layout"),
        ClockNodeKind::Dfll if node.reference_hz.is_none() => missing("nominal frequency"),
        ClockNodeKind::BusDivider if node.source.is_none() && node.layout.selector.is_none() => {
            missing("source")
        }
        _ => Ok(()),
    }
}
