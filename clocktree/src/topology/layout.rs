//! Register field layouts.
//!
//! Layouts are generic over the field type: descriptions are written with
//! [`FieldSpec`]s (relative to the node's register), and a loaded
//! [`Topology`](super::Topology) holds them bound to absolute addresses as
//! [`Field`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Fields
// =============================================================================

/// A bit field as written in a topology description.
///
/// `address` is absolute when present; otherwise the field lives at
/// `node register + offset`. `shift` defaults to the lowest set bit of `mask`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u32,
    pub mask: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<u32>,
}

impl FieldSpec {
    pub const fn new(mask: u32) -> Self {
        Self {
            address: None,
            offset: 0,
            mask,
            shift: None,
        }
    }

    pub const fn at(address: u32, mask: u32) -> Self {
        Self {
            address: Some(address),
            offset: 0,
            mask,
            shift: None,
        }
    }

    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub const fn with_shift(mut self, shift: u32) -> Self {
        self.shift = Some(shift);
        self
    }

    pub(crate) fn bind(&self, register: u32) -> Field {
        Field {
            address: self
                .address
                .unwrap_or_else(|| register.wrapping_add(self.offset)),
            mask: self.mask,
            shift: self.shift.unwrap_or(self.mask.trailing_zeros()),
        }
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// A bit field bound to an absolute register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub address: u32,
    pub mask: u32,
    pub shift: u32,
}

impl Field {
    /// Extract the field value from `word`.
    ///
    /// A zero mask, or a shift of 32 or more, extracts 0.
    pub fn extract(&self, word: u32) -> u32 {
        (word & self.mask).checked_shr(self.shift).unwrap_or(0)
    }

    /// Whether every bit of the mask is set in `word`.
    pub fn is_set(&self, word: u32) -> bool {
        word & self.mask == self.mask
    }
}

// =============================================================================
// Multiplexer tables
// =============================================================================

/// Selector value → source name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MuxTable(BTreeMap<u32, String>);

/// Result of looking a selector up in a [`MuxTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxEntry<'a> {
    Known(&'a str),
    /// Reserved or undocumented encoding.
    Unknown(u32),
}

impl MuxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: u32, source: impl Into<String>) -> Self {
        self.0.insert(selector, source.into());
        self
    }

    pub fn lookup(&self, selector: u32) -> MuxEntry<'_> {
        match self.0.get(&selector) {
            Some(name) => MuxEntry::Known(name),
            None => MuxEntry::Unknown(selector),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl FromIterator<(u32, String)> for MuxTable {
    fn from_iter<T: IntoIterator<Item = (u32, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl core::fmt::Display for MuxEntry<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MuxEntry::Known(name) => f.write_str(name),
            MuxEntry::Unknown(value) => write!(f, "UNKNOWN_SOURCE({})", value),
        }
    }
}

// =============================================================================
// Layout parts
// =============================================================================

/// Source-select field plus the table that names its encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector<F> {
    pub field: F,
    #[serde(default)]
    pub mux: MuxTable,
}

/// How a raw divider code maps to an integer divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividerEncoding<F> {
    /// Divisor is the code.
    Direct,
    /// Divisor is twice the code.
    Doubled,
    /// Divisor is twice the code while the one-bit `select` field is set,
    /// the code otherwise.
    DoubledWhen { select: F },
    /// Divisor is `2 * (code + 1)`.
    TwiceIncremented,
}

impl<F> Default for DividerEncoding<F> {
    fn default() -> Self {
        DividerEncoding::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divider<F> {
    pub field: F,
    /// Written as `direct` or as a one-key map such as
    /// `{ doubled_when: { select: { mask: 0x1000 } } }`.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub encoding: DividerEncoding<F>,
}

/// PLL multiplier fields.
///
/// The multiplier is `(integer + integer_offset) + fraction / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioLayout<F> {
    pub integer: F,
    pub fraction: F,
    #[serde(default = "default_denominator")]
    pub denominator: u32,
    #[serde(default)]
    pub integer_offset: u32,
}

fn default_denominator() -> u32 {
    16
}

/// Range-coded output, e.g. a crystal's selectable frequency band.
///
/// When `crystal` is present and clear, the oscillator is driven by an
/// external clock and `otherwise` describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandLayout<F> {
    pub field: F,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crystal: Option<F>,
    pub bands: BTreeMap<u32, String>,
    pub otherwise: String,
}

/// Everything the decoder needs to know about one node's registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout<F> {
    /// All of these must be set for the node to count as enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable: Vec<F>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector<F>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divider: Option<Divider<F>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<RatioLayout<F>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<BandLayout<F>>,
    /// DFLL loop mode bit; set means closed loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_loop: Option<F>,
    /// Reportable one-bit flags (`locked`, `ready`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub status: BTreeMap<String, F>,
    /// Multi-bit fields reported as plain numbers (`multiplier`, ...).
    /// They never feed into frequency resolution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, F>,
}

impl<F> Default for Layout<F> {
    fn default() -> Self {
        Self {
            enable: Vec::new(),
            selector: None,
            divider: None,
            ratio: None,
            band: None,
            closed_loop: None,
            status: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }
}

impl Layout<FieldSpec> {
    /// Resolve every field against the node's register address.
    pub(crate) fn bind(&self, register: u32) -> Layout<Field> {
        let bind = |f: &FieldSpec| f.bind(register);
        Layout {
            enable: self.enable.iter().map(bind).collect(),
            selector: self.selector.as_ref().map(|s| Selector {
                field: bind(&s.field),
                mux: s.mux.clone(),
            }),
            divider: self.divider.as_ref().map(|d| Divider {
                field: bind(&d.field),
                encoding: match &d.encoding {
                    DividerEncoding::Direct => DividerEncoding::Direct,
                    DividerEncoding::Doubled => DividerEncoding::Doubled,
                    DividerEncoding::DoubledWhen { select } => DividerEncoding::DoubledWhen {
                        select: bind(select),
                    },
                    DividerEncoding::TwiceIncremented => DividerEncoding::TwiceIncremented,
                },
            }),
            ratio: self.ratio.as_ref().map(|r| RatioLayout {
                integer: bind(&r.integer),
                fraction: bind(&r.fraction),
                denominator: r.denominator,
                integer_offset: r.integer_offset,
            }),
            band: self.band.as_ref().map(|b| BandLayout {
                field: bind(&b.field),
                crystal: b.crystal.as_ref().map(bind),
                bands: b.bands.clone(),
                otherwise: b.otherwise.clone(),
            }),
            closed_loop: self.closed_loop.as_ref().map(bind),
            status: self
                .status
                .iter()
                .map(|(name, f)| (name.clone(), bind(f)))
                .collect(),
            values: self
                .values
                .iter()
                .map(|(name, f)| (name.clone(), bind(f)))
                .collect(),
        }
    }
}

impl Layout<Field> {
    /// Every register address this layout reads.
    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        let divider_select = self.divider.as_ref().and_then(|d| match &d.encoding {
            DividerEncoding::DoubledWhen { select } => Some(select),
            _ => None,
        });
        self.enable
            .iter()
            .chain(self.selector.as_ref().map(|s| &s.field))
            .chain(self.divider.as_ref().map(|d| &d.field))
            .chain(divider_select)
            .chain(self.ratio.iter().flat_map(|r| [&r.integer, &r.fraction]))
            .chain(self.band.iter().flat_map(|b| core::iter::once(&b.field).chain(b.crystal.as_ref())))
            .chain(self.closed_loop.as_ref())
            .chain(self.status.values())
            .chain(self.values.values())
            .map(|f| f.address)
    }
}
