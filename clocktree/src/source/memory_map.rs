use std::collections::BTreeMap;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ReadError, RegisterSource};

/// A fixed address → word table.
///
/// Used for tests and for replaying a register image captured earlier.
/// Addresses missing from the table read as [`ReadError::Unmapped`].
///
/// The serialized form is a map of hex strings, e.g.
/// `{ "0x40001c20": "0x00000106" }`. Keys and values may also be written
/// in decimal, and values may be plain numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    words: BTreeMap<u32, u32>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the word at `address`, replacing any previous value.
    pub fn insert(&mut self, address: u32, word: u32) -> Option<u32> {
        self.words.insert(address, word)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, address: u32, word: u32) -> Self {
        self.words.insert(address, word);
        self
    }

    /// OR `bits` into the word at `address` (a missing word counts as 0).
    pub fn set_bits(&mut self, address: u32, bits: u32) {
        *self.words.entry(address).or_insert(0) |= bits;
    }

    pub fn get(&self, address: u32) -> Option<u32> {
        self.words.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.words.iter().map(|(a, w)| (*a, *w))
    }
}

impl FromIterator<(u32, u32)> for MemoryMap {
    fn from_iter<T: IntoIterator<Item = (u32, u32)>>(iter: T) -> Self {
        Self {
            words: iter.into_iter().collect(),
        }
    }
}

impl RegisterSource for MemoryMap {
    fn read_word(&mut self, address: u32) -> Result<u32, ReadError> {
        self.get(address).ok_or(ReadError::Unmapped { address })
    }
}

/// A word that could not be parsed from a register image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid register word {text:?}")]
pub struct ParseWordError {
    text: String,
}

/// Parse `0x`-prefixed hex or decimal text into a 32-bit word.
pub(crate) fn parse_word(text: &str) -> Result<u32, ParseWordError> {
    let trimmed = text.trim().replace('_', "");
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };
    parsed.map_err(|_| ParseWordError {
        text: text.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WordRepr {
    Number(u64),
    Text(String),
}

impl WordRepr {
    fn into_word(self) -> Result<u32, ParseWordError> {
        match self {
            WordRepr::Number(n) => u32::try_from(n).map_err(|_| ParseWordError {
                text: n.to_string(),
            }),
            WordRepr::Text(text) => parse_word(&text),
        }
    }
}

impl<'de> Deserialize<'de> for MemoryMap {
    fn deserialize<D>(deserializer: D) -> Result<MemoryMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, WordRepr>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(address, word)| Ok::<_, ParseWordError>((parse_word(&address)?, word.into_word()?)))
            .collect::<Result<MemoryMap, ParseWordError>>()
            .map_err(de::Error::custom)
    }
}

impl Serialize for MemoryMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            self.words
                .iter()
                .map(|(address, word)| (format!("{:#010x}", address), format!("{:#010x}", word))),
        )
    }
}
