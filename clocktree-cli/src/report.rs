//! Text rendering of a [`ClockGraph`].

use std::fmt::{self, Display, Formatter};

use clocktree::{BridgeReport, ClockGraph, ClockNodeKind, GraphNode, NodeId};

const SOURCE_KINDS: [ClockNodeKind; 4] = [
    ClockNodeKind::ExternalOscillator,
    ClockNodeKind::InternalOscillator,
    ClockNodeKind::Dfll,
    ClockNodeKind::Dpll,
];

/// Render the whole tree as the multi-section report.
pub fn render(graph: &ClockGraph) -> String {
    Report(graph).to_string()
}

struct Report<'a>(&'a ClockGraph);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = self.0;
        let title = format!("{} Clock Tree", graph.chip());
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;

        section(f, "Clock Sources")?;
        for (_, node) in graph.nodes().filter(|(id, _)| SOURCE_KINDS.contains(&id.kind)) {
            write_line(f, node)?;
        }

        section(f, "Generic Clocks")?;
        for (id, node) in graph.of_kind(ClockNodeKind::GenericClockGenerator) {
            write_generator(f, graph, id, node)?;
        }

        section(f, "Peripheral Channels")?;
        write_channels(f, graph)?;

        section(f, "Main Clock Buses")?;
        for (_, node) in graph.of_kind(ClockNodeKind::BusDivider) {
            write_line(f, node)?;
        }
        for bridge in graph.bridges() {
            write_bridge(f, bridge)?;
        }

        if let Some(unmapped) = graph.unmapped().filter(|set| !set.is_empty()) {
            section(f, "Unmapped peripheral channels")?;
            for name in unmapped {
                writeln!(f, "  - {}", name)?;
            }
        }

        Ok(())
    }
}

fn section(f: &mut Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, " {}:", title)?;
    writeln!(f, "{}", "-".repeat(title.len() + 3))
}

fn write_line(f: &mut Formatter<'_>, node: &GraphNode) -> fmt::Result {
    write!(f, "  ")?;
    write_node(f, node)?;
    writeln!(f)
}

/// One-line summary of a node: enable state, frequency, source, divider,
/// flags and the raw control word. No trailing newline.
fn write_node(f: &mut Formatter<'_>, node: &GraphNode) -> fmt::Result {
    let state = match &node.state {
        Ok(state) => state,
        Err(_) => return write!(f, "{}: {}", node.name, node.frequency),
    };
    if !state.enabled {
        return write!(f, "{}: Disabled (raw {:#010x})", node.name, state.raw);
    }

    write!(f, "{}: Enabled, {}", node.name, node.frequency)?;
    if let Some(source) = &node.source {
        write!(f, ", Source: {}", source)?;
    }
    match state.divider {
        Some(d) if d > 1 => write!(f, ", Divide by {}", d)?,
        Some(_) => write!(f, ", No division")?,
        None => {}
    }
    if let Some(ratio) = &state.ratio {
        write!(f, ", Ratio {}", ratio.value())?;
    }
    match state.closed_loop {
        Some(true) => write!(f, ", closed loop")?,
        Some(false) => write!(f, ", open loop")?,
        None => {}
    }
    // Loop parameters mean nothing while the loop is open.
    if state.closed_loop != Some(false) {
        for (name, value) in &state.values {
            write!(f, ", {} {}", name, value)?;
        }
    }

    if !state.status_bits.is_empty() {
        let flags: Vec<String> = state
            .status_bits
            .iter()
            .map(|(name, &set)| {
                if set {
                    name.clone()
                } else {
                    format!("NOT {}", name)
                }
            })
            .collect();
        write!(f, " [{}]", flags.join(", "))?;
    }
    write!(f, " (raw {:#010x})", state.raw)
}

fn write_generator(
    f: &mut Formatter<'_>,
    graph: &ClockGraph,
    id: NodeId,
    node: &GraphNode,
) -> fmt::Result {
    write_line(f, node)?;
    if !node.state.as_ref().map_or(false, |s| s.enabled) {
        return Ok(());
    }

    writeln!(f, "    Peripherals using {}:", node.name)?;
    match graph.consumers_of(id.instance).filter(|set| !set.is_empty()) {
        Some(consumers) => {
            for name in consumers {
                writeln!(f, "      - {}", name)?;
            }
        }
        None => writeln!(f, "      None")?,
    }
    Ok(())
}

/// Enabled and unreadable channels, each with the peripherals behind it.
fn write_channels(f: &mut Formatter<'_>, graph: &ClockGraph) -> fmt::Result {
    let mut hidden = 0;
    for (id, node) in graph.of_kind(ClockNodeKind::PeripheralChannel) {
        if node.state.as_ref().map_or(false, |s| !s.enabled) {
            hidden += 1;
            continue;
        }
        write_line(f, node)?;
        for name in graph.peripheral_names(id.instance) {
            writeln!(f, "    - {}", name)?;
        }
    }
    if hidden > 0 {
        writeln!(f, "  ({} disabled channels not shown)", hidden)?;
    }
    Ok(())
}

fn write_bridge(f: &mut Formatter<'_>, bridge: &BridgeReport) -> fmt::Result {
    match &bridge.mask {
        Ok(mask) => writeln!(f, "  {} Bridge: Mask {:#010x}", bridge.name, mask)?,
        Err(e) => return writeln!(f, "  {} Bridge: Unresolved (read failed: {})", bridge.name, e),
    }
    if !bridge.peripherals.is_empty() {
        writeln!(f, "    Enabled peripherals:")?;
        for name in &bridge.peripherals {
            writeln!(f, "      - {}", name)?;
        }
    }
    Ok(())
}
