//! Consumer Mapper: which peripherals each generator clocks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::decode::NodeState;
use crate::topology::Topology;

/// Where a peripheral channel's consumers are filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsumerBucket {
    Generator(u32),
    /// Enabled channel whose generator index is outside the generator range.
    Unmapped,
}

impl fmt::Display for ConsumerBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerBucket::Generator(n) => write!(f, "generator {}", n),
            ConsumerBucket::Unmapped => f.write_str("unmapped"),
        }
    }
}

/// Generator → peripheral names it clocks. Every generator of the topology
/// has an entry, possibly empty.
pub type Consumers = BTreeMap<ConsumerBucket, BTreeSet<String>>;

/// Group the peripherals behind every enabled channel by selected generator.
///
/// `channels` yields `(peripheral ID, decoded channel state)`. Disabled
/// channels contribute nothing. A peripheral ID feeding several names adds
/// all of them.
pub fn map_consumers<'a>(
    channels: impl IntoIterator<Item = (u32, &'a NodeState)>,
    topology: &Topology,
) -> Consumers {
    let mut consumers: Consumers = (0..topology.generator_count())
        .map(|n| (ConsumerBucket::Generator(n), BTreeSet::new()))
        .collect();

    for (peripheral_id, state) in channels {
        if !state.enabled {
            continue;
        }
        let bucket = match state.selector {
            Some(n) if n < topology.generator_count() => ConsumerBucket::Generator(n),
            other => {
                warn!(
                    "channel {} selects generator {:?}, outside 0..{}",
                    peripheral_id,
                    other,
                    topology.generator_count()
                );
                ConsumerBucket::Unmapped
            }
        };
        consumers
            .entry(bucket)
            .or_default()
            .extend(topology.peripheral_names(peripheral_id).iter().cloned());
    }

    consumers
}

#[cfg(test)]
mod tests;
