//! On-disk topology description.
//!
//! ```yaml
//! name: SAME54
//! nodes:
//!   - name: XOSC1
//!     kind: external_oscillator
//!     register: 0x40001018
//!     reference_hz: 12000000
//!     layout:
//!       enable: [{ mask: 0x2 }]
//! generators:
//!   count: 12
//!   register: 0x40001c20
//!   stride: 4
//!   layout:
//!     enable: [{ mask: 0x100 }]
//!     selector:
//!       field: { mask: 0xf }
//!       mux: { 1: XOSC1 }
//!     divider:
//!       field: { mask: 0xffff0000 }
//!       encoding:
//!         doubled_when:
//!           select: { mask: 0x1000 }
//! peripheral_channels:
//!   register: 0x40001c80
//!   stride: 4
//!   layout: { ... }
//!   peripherals:
//!     3: [SERCOM0_GCLK_ID_SLOW, SERCOM1_GCLK_ID_SLOW]
//! bridges:
//!   - name: APBA
//!     register: 0x40000814
//!     bits: { 7: MCLK_APBAMASK_GCLK }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::layout::{FieldSpec, Layout};
use super::ClockNodeKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeSpec>,
    pub generators: GeneratorsSpec,
    pub peripheral_channels: ChannelsSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bridges: Vec<BridgeSpec>,
}

/// An individually described node (oscillator, DFLL, DPLL, bus divider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: ClockNodeKind,
    /// Primary register; relative fields are offsets from it.
    pub register: u32,
    /// Known output frequency: a crystal's fitted frequency, an internal
    /// oscillator's nominal frequency, or a DFLL's locked frequency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_hz: Option<f64>,
    /// Fixed (non-muxed) input, by node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub layout: Layout<FieldSpec>,
}

/// Template for the generic clock generators. Generator `n` lives at
/// `register + n * stride` and is named `{prefix}{n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorsSpec {
    pub count: u32,
    #[serde(default = "default_generator_prefix")]
    pub prefix: String,
    pub register: u32,
    pub stride: u32,
    #[serde(default)]
    pub layout: Layout<FieldSpec>,
}

/// Template for the peripheral channels, one per peripheral ID.
///
/// Channel `id` lives at `register + id * stride` and is named
/// `{prefix}{id}`. When the layout's selector has an empty mux table, it is
/// filled with the generator index space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsSpec {
    #[serde(default = "default_channel_prefix")]
    pub prefix: String,
    pub register: u32,
    pub stride: u32,
    #[serde(default)]
    pub layout: Layout<FieldSpec>,
    /// Peripheral ID → peripheral names. One ID may feed several names.
    #[serde(default)]
    pub peripherals: BTreeMap<u32, Vec<String>>,
}

/// A bus-clock mask register (AHB/APBx bridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSpec {
    pub name: String,
    pub register: u32,
    /// Bit index → peripheral name.
    #[serde(default)]
    pub bits: BTreeMap<u32, String>,
}

fn default_generator_prefix() -> String {
    "GCLK".into()
}

fn default_channel_prefix() -> String {
    "PCHCTRL".into()
}
