//! Node State Decoder.
//!
//! Turns raw register words into a [`NodeState`]. Decoding is total: every
//! bit pattern yields a state, reserved encodings included.

use std::collections::BTreeMap;

use crate::topology::{BandLayout, Divider, DividerEncoding, Field, NodeDescriptor, RatioLayout};

/// Decoded PLL multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    /// Integer field as read, before `offset` is added.
    pub integer: u32,
    pub fraction: u32,
    pub denominator: u32,
    pub offset: u32,
}

impl Ratio {
    /// `(integer + offset) + fraction / denominator`.
    ///
    /// A zero denominator drops the fractional part.
    pub fn value(&self) -> f64 {
        let whole = f64::from(self.integer) + f64::from(self.offset);
        if self.denominator == 0 {
            whole
        } else {
            whole + f64::from(self.fraction) / f64::from(self.denominator)
        }
    }
}

/// Immutable snapshot of one node at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub enabled: bool,
    /// Raw source-select value, if the node has a mux.
    pub selector: Option<u32>,
    /// Effective divisor, always >= 1.
    pub divider: Option<u32>,
    pub ratio: Option<Ratio>,
    /// DFLL loop mode; `Some(true)` means closed loop.
    pub closed_loop: Option<bool>,
    /// Qualitative output description for range-coded nodes.
    pub band: Option<String>,
    pub status_bits: BTreeMap<String, bool>,
    /// Informational numeric fields, e.g. a DFLL's loop multiplier.
    pub values: BTreeMap<String, u32>,
    /// Word at the node's primary register.
    pub raw: u32,
}

impl NodeState {
    pub fn status(&self, flag: &str) -> Option<bool> {
        self.status_bits.get(flag).copied()
    }

    pub fn value(&self, name: &str) -> Option<u32> {
        self.values.get(name).copied()
    }
}

/// Decode a node whose fields all live in the single word `raw`.
///
/// Every field of the layout is read from `raw`, whatever its address.
pub fn decode(node: &NodeDescriptor, raw: u32) -> NodeState {
    decode_with(node, |_| raw)
}

/// Decode a node from a set of register words keyed by address.
///
/// Addresses missing from `words` read as 0.
pub fn decode_words(node: &NodeDescriptor, words: &BTreeMap<u32, u32>) -> NodeState {
    decode_with(node, |address| words.get(&address).copied().unwrap_or(0))
}

fn decode_with(node: &NodeDescriptor, read: impl Fn(u32) -> u32) -> NodeState {
    let layout = &node.layout;
    let get = |field: &Field| field.extract(read(field.address));
    let flag = |field: &Field| field.is_set(read(field.address));

    NodeState {
        enabled: layout.enable.iter().all(flag),
        selector: layout.selector.as_ref().map(|s| get(&s.field)),
        divider: layout.divider.as_ref().map(|d| divisor(d, &read)),
        ratio: layout.ratio.as_ref().map(|r| ratio(r, get)),
        closed_loop: layout.closed_loop.as_ref().map(flag),
        band: layout.band.as_ref().map(|b| band(b, &read)),
        status_bits: layout
            .status
            .iter()
            .map(|(name, field)| (name.clone(), flag(field)))
            .collect(),
        values: layout
            .values
            .iter()
            .map(|(name, field)| (name.clone(), get(field)))
            .collect(),
        raw: read(node.register),
    }
}

fn divisor(divider: &Divider<Field>, read: &impl Fn(u32) -> u32) -> u32 {
    let code = divider.field.extract(read(divider.field.address));
    let value = match &divider.encoding {
        DividerEncoding::Direct => code,
        DividerEncoding::Doubled => code.saturating_mul(2),
        DividerEncoding::DoubledWhen { select } => {
            if select.extract(read(select.address)) != 0 {
                code.saturating_mul(2)
            } else {
                code
            }
        }
        DividerEncoding::TwiceIncremented => code.saturating_add(1).saturating_mul(2),
    };
    value.max(1)
}

fn ratio(layout: &RatioLayout<Field>, get: impl Fn(&Field) -> u32) -> Ratio {
    Ratio {
        integer: get(&layout.integer),
        fraction: get(&layout.fraction),
        denominator: layout.denominator,
        offset: layout.integer_offset,
    }
}

fn band(layout: &BandLayout<Field>, read: &impl Fn(u32) -> u32) -> String {
    let crystal = layout
        .crystal
        .as_ref()
        .map_or(true, |f| f.extract(read(f.address)) != 0);
    if !crystal {
        return layout.otherwise.clone();
    }
    let code = layout.field.extract(read(layout.field.address));
    layout
        .bands
        .get(&code)
        .cloned()
        .unwrap_or_else(|| layout.otherwise.clone())
}
