//! ClockGraph: one snapshot of the whole tree, decoded and resolved.

use std::collections::{BTreeMap, BTreeSet};

use crate::consumers::{map_consumers, ConsumerBucket, Consumers};
use crate::decode::{decode_words, NodeState};
use crate::resolve::{resolve, selected_source, DecodedNodes, ResolvedFrequency, SourceSelection};
use crate::source::{MemoryMap, ReadError, RegisterSource};
use crate::topology::{ClockNodeKind, MuxEntry, NodeDescriptor, NodeId, Topology};

// =============================================================================
// Snapshot
// =============================================================================

/// One batch of register reads covering every address a topology needs.
///
/// Registers are not latched together by the hardware, so a snapshot taken
/// from a running target is only as consistent as the read sequence allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    words: BTreeMap<u32, Result<u32, ReadError>>,
}

impl Snapshot {
    /// Read every address of `topology` once, in ascending order.
    pub fn capture<S: RegisterSource + ?Sized>(topology: &Topology, source: &mut S) -> Self {
        let mut words = BTreeMap::new();
        let mut failed = 0usize;

        for address in topology.addresses() {
            let word = source.read_word(address);
            if let Err(e) = &word {
                warn!("read of {:#010x} failed: {}", address, e);
                failed += 1;
            }
            words.insert(address, word);
        }

        debug!("snapshot: {} registers read, {} failed", words.len(), failed);
        Self { words }
    }

    /// Result of reading `address`, if it was part of the snapshot.
    pub fn word(&self, address: u32) -> Option<&Result<u32, ReadError>> {
        self.words.get(&address)
    }

    /// Every word `node` needs, or the first read error among them.
    pub fn words_for(&self, node: &NodeDescriptor) -> Result<BTreeMap<u32, u32>, ReadError> {
        node.addresses()
            .into_iter()
            .map(|address| match self.words.get(&address) {
                Some(Ok(word)) => Ok((address, *word)),
                Some(Err(e)) => Err(e.clone()),
                None => Err(ReadError::Unmapped { address }),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Result<u32, ReadError>)> + '_ {
        self.words.iter().map(|(a, w)| (*a, w))
    }

    /// The successful reads, e.g. for saving and replaying later.
    pub fn to_memory_map(&self) -> MemoryMap {
        self.words
            .iter()
            .filter_map(|(address, word)| word.as_ref().ok().map(|w| (*address, *w)))
            .collect()
    }
}

// =============================================================================
// Graph
// =============================================================================

/// One node's decoded state and resolved output.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub name: String,
    pub state: Result<NodeState, ReadError>,
    pub frequency: ResolvedFrequency,
    /// Name of the selected (or fixed) source, when the node has one and
    /// its registers could be read.
    pub source: Option<String>,
}

/// A bus bridge mask with the peripherals it clocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    pub name: String,
    pub mask: Result<u32, ReadError>,
    /// Peripheral names whose bit is set; empty when the read failed.
    pub peripherals: Vec<String>,
}

/// Immutable view of the clock tree at one instant.
///
/// Built fresh per snapshot. Every node of the topology is present, even
/// when its registers could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockGraph {
    chip: String,
    nodes: BTreeMap<NodeId, GraphNode>,
    consumers: Consumers,
    peripherals: BTreeMap<u32, Vec<String>>,
    bridges: Vec<BridgeReport>,
}

impl ClockGraph {
    /// Read a snapshot through `source` and build the graph from it.
    pub fn capture<S: RegisterSource + ?Sized>(topology: &Topology, source: &mut S) -> Self {
        Self::from_snapshot(topology, &Snapshot::capture(topology, source))
    }

    pub fn from_snapshot(topology: &Topology, snapshot: &Snapshot) -> Self {
        let decoded: DecodedNodes = topology
            .nodes()
            .iter()
            .map(|node| {
                let state = snapshot.words_for(node).map(|w| decode_words(node, &w));
                (node.id, state)
            })
            .collect();

        let mut frequencies = resolve(&decoded, topology);

        let channels = decoded.iter().filter_map(|(id, state)| match (id.kind, state) {
            (ClockNodeKind::PeripheralChannel, Ok(state)) => Some((id.instance, state)),
            _ => None,
        });
        let consumers = map_consumers(channels, topology);

        let nodes = topology
            .nodes()
            .iter()
            .map(|node| {
                let state = decoded
                    .get(&node.id)
                    .cloned()
                    .unwrap_or(Err(ReadError::Unmapped {
                        address: node.register,
                    }));
                let source = state
                    .as_ref()
                    .ok()
                    .and_then(|s| source_name(node, s, topology));
                let frequency = frequencies
                    .remove(&node.id)
                    .unwrap_or_else(|| ResolvedFrequency::Unresolved("not resolved".into()));
                let entry = GraphNode {
                    name: node.name.clone(),
                    state,
                    frequency,
                    source,
                };
                (node.id, entry)
            })
            .collect();

        let bridges = topology
            .bridges()
            .iter()
            .map(|bridge| {
                let mask = snapshot
                    .word(bridge.register)
                    .cloned()
                    .unwrap_or(Err(ReadError::Unmapped {
                        address: bridge.register,
                    }));
                let peripherals = mask
                    .as_ref()
                    .map(|m| bridge.enabled_peripherals(*m))
                    .unwrap_or_default();
                BridgeReport {
                    name: bridge.name.clone(),
                    mask,
                    peripherals,
                }
            })
            .collect();

        Self {
            chip: topology.name().to_string(),
            nodes,
            consumers,
            peripherals: topology.peripherals().clone(),
            bridges,
        }
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// All nodes, ordered by kind and then instance.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> + '_ {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn of_kind(&self, kind: ClockNodeKind) -> impl Iterator<Item = (NodeId, &GraphNode)> + '_ {
        self.nodes().filter(move |(id, _)| id.kind == kind)
    }

    pub fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    /// Peripherals clocked by generator `index`.
    pub fn consumers_of(&self, index: u32) -> Option<&BTreeSet<String>> {
        self.consumers.get(&ConsumerBucket::Generator(index))
    }

    /// Peripherals behind enabled channels that select a nonexistent
    /// generator.
    pub fn unmapped(&self) -> Option<&BTreeSet<String>> {
        self.consumers.get(&ConsumerBucket::Unmapped)
    }

    /// Peripheral names fed by channel `peripheral_id`.
    pub fn peripheral_names(&self, peripheral_id: u32) -> &[String] {
        self.peripherals
            .get(&peripheral_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bridges(&self) -> &[BridgeReport] {
        &self.bridges
    }
}

fn source_name(node: &NodeDescriptor, state: &NodeState, topology: &Topology) -> Option<String> {
    Some(match selected_source(node, state, topology)? {
        SourceSelection::Node(id) => topology.node(id)?.name.clone(),
        SourceSelection::External(name) => name,
        SourceSelection::Unknown(value) => MuxEntry::Unknown(value).to_string(),
    })
}

#[cfg(test)]
mod tests;
