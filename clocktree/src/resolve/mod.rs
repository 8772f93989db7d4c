//! Frequency Resolver.
//!
//! Memoized depth-first evaluation over the source edges implied by each
//! node's selector. Each node is evaluated once; a node reached again while
//! still being evaluated is a cycle and yields [`ResolvedFrequency::Circular`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::decode::NodeState;
use crate::source::ReadError;
use crate::time::Hertz;
use crate::topology::{ClockNodeKind, MuxEntry, NodeDescriptor, NodeId, Topology};

/// Outcome of resolving one node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFrequency {
    Hertz(Hertz),
    /// Qualitative output with no single meaningful number (e.g. a crystal
    /// band).
    SymbolicDescription(String),
    Disabled,
    Unresolved(String),
    Circular,
}

impl ResolvedFrequency {
    pub fn hertz(&self) -> Option<Hertz> {
        match self {
            ResolvedFrequency::Hertz(f) => Some(*f),
            _ => None,
        }
    }

    /// Apply `f` to a concrete frequency; every other outcome passes through.
    pub fn map(self, f: impl FnOnce(Hertz) -> Hertz) -> Self {
        match self {
            ResolvedFrequency::Hertz(hz) => ResolvedFrequency::Hertz(f(hz)),
            other => other,
        }
    }
}

impl fmt::Display for ResolvedFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedFrequency::Hertz(hz) => write!(f, "{}", hz),
            ResolvedFrequency::SymbolicDescription(text) => f.write_str(text),
            ResolvedFrequency::Disabled => f.write_str("Disabled"),
            ResolvedFrequency::Unresolved(reason) => write!(f, "Unresolved ({})", reason),
            ResolvedFrequency::Circular => f.write_str("Circular reference"),
        }
    }
}

/// Decoded state of every captured node. A node whose registers could not
/// be read carries the read error instead.
pub type DecodedNodes = BTreeMap<NodeId, Result<NodeState, ReadError>>;

/// Resolve every node of `topology`.
///
/// Pure: the same inputs always give the same outputs.
pub fn resolve(nodes: &DecodedNodes, topology: &Topology) -> BTreeMap<NodeId, ResolvedFrequency> {
    let mut resolver = Resolver {
        topology,
        nodes,
        memo: BTreeMap::new(),
        in_progress: BTreeSet::new(),
    };
    for node in topology.nodes() {
        resolver.resolve(node.id);
    }
    resolver.memo
}

/// The source a node's selector (or fixed input) points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Node(NodeId),
    /// Named in the mux table but not modelled as a node.
    External(String),
    /// Selector value missing from the mux table.
    Unknown(u32),
}

/// Work out which source `state` selects for `node`, if the node has one.
///
/// A loop-capable node running open loop has no source edge.
pub fn selected_source(
    node: &NodeDescriptor,
    state: &NodeState,
    topology: &Topology,
) -> Option<SourceSelection> {
    if state.closed_loop == Some(false) {
        return None;
    }
    let name = match (&node.layout.selector, state.selector) {
        (Some(selector), Some(value)) => match selector.mux.lookup(value) {
            MuxEntry::Known(name) => name,
            MuxEntry::Unknown(value) => return Some(SourceSelection::Unknown(value)),
        },
        _ => node.source.as_deref()?,
    };
    Some(match topology.find(name) {
        Some(id) => SourceSelection::Node(id),
        None => SourceSelection::External(name.to_string()),
    })
}

struct Resolver<'a> {
    topology: &'a Topology,
    nodes: &'a DecodedNodes,
    memo: BTreeMap<NodeId, ResolvedFrequency>,
    in_progress: BTreeSet<NodeId>,
}

impl Resolver<'_> {
    fn resolve(&mut self, id: NodeId) -> ResolvedFrequency {
        if let Some(done) = self.memo.get(&id) {
            return done.clone();
        }
        if !self.in_progress.insert(id) {
            debug!("resolve: cycle through {}", id);
            return ResolvedFrequency::Circular;
        }

        let result = self.evaluate(id);

        self.in_progress.remove(&id);
        self.memo.insert(id, result.clone());
        result
    }

    fn evaluate(&mut self, id: NodeId) -> ResolvedFrequency {
        let Some(node) = self.topology.node(id) else {
            return ResolvedFrequency::Unresolved(format!("{} is not in the topology", id));
        };
        let state = match self.nodes.get(&id) {
            Some(Ok(state)) => state,
            Some(Err(e)) => return ResolvedFrequency::Unresolved(format!("read failed: {}", e)),
            None => return ResolvedFrequency::Unresolved("not captured in snapshot".into()),
        };

        if !state.enabled {
            return ResolvedFrequency::Disabled;
        }

        match id.kind {
            ClockNodeKind::ExternalOscillator | ClockNodeKind::InternalOscillator => {
                base_frequency(node, state)
            }
            ClockNodeKind::Dfll => self.dfll(node, state),
            ClockNodeKind::Dpll => {
                let divider = state.divider.unwrap_or(1);
                let multiplier = state.ratio.map_or(1.0, |r| r.value());
                self.numeric_source(node, state)
                    .map(|reference| reference / divider * multiplier)
            }
            ClockNodeKind::GenericClockGenerator
            | ClockNodeKind::PeripheralChannel
            | ClockNodeKind::BusDivider => {
                let divider = state.divider.unwrap_or(1);
                self.numeric_source(node, state).map(|parent| parent / divider)
            }
        }
    }

    /// Open loop runs at the nominal frequency. Closed loop still outputs
    /// the nominal frequency, provided the reference resolves at all; the
    /// feedback multiplier is not traced.
    fn dfll(&mut self, node: &NodeDescriptor, state: &NodeState) -> ResolvedFrequency {
        let Some(nominal) = node.reference_hz else {
            return ResolvedFrequency::Unresolved("no nominal frequency".into());
        };
        if state.closed_loop != Some(true) {
            return ResolvedFrequency::Hertz(Hertz(nominal));
        }
        match self.source(node, state) {
            ResolvedFrequency::Hertz(_) | ResolvedFrequency::SymbolicDescription(_) => {
                ResolvedFrequency::Hertz(Hertz(nominal))
            }
            other => other,
        }
    }

    /// Resolve the selected source, insisting on a concrete number.
    fn numeric_source(&mut self, node: &NodeDescriptor, state: &NodeState) -> ResolvedFrequency {
        match self.source(node, state) {
            ResolvedFrequency::SymbolicDescription(text) => {
                ResolvedFrequency::Unresolved(format!("source has no exact frequency ({})", text))
            }
            other => other,
        }
    }

    fn source(&mut self, node: &NodeDescriptor, state: &NodeState) -> ResolvedFrequency {
        match selected_source(node, state, self.topology) {
            Some(SourceSelection::Node(parent)) => self.resolve(parent),
            Some(SourceSelection::External(name)) => {
                ResolvedFrequency::Unresolved(format!("source {} is not modelled", name))
            }
            Some(SourceSelection::Unknown(value)) => {
                debug!("resolve: {} selector {} not in mux table", node.name, value);
                ResolvedFrequency::Unresolved(format!("selector {} not in mux table", value))
            }
            None => ResolvedFrequency::Unresolved("no source".into()),
        }
    }
}

fn base_frequency(node: &NodeDescriptor, state: &NodeState) -> ResolvedFrequency {
    match (node.reference_hz, &state.band) {
        (Some(hz), _) => ResolvedFrequency::Hertz(Hertz(hz)),
        (None, Some(band)) => ResolvedFrequency::SymbolicDescription(band.clone()),
        (None, None) => ResolvedFrequency::Unresolved("no reference frequency".into()),
    }
}
