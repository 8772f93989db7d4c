//! Register transports.
//!
//! A [`RegisterSource`] hands out 32-bit words by address and nothing else.
//! It performs no retries; the caller owns any retry policy.

mod memory_map;
#[cfg(feature = "probe-rs")]
mod probe;

pub use memory_map::{MemoryMap, ParseWordError};
#[cfg(feature = "probe-rs")]
pub use probe::ProbeSource;

/// Register transport failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The target cannot be reached (probe or connection lost).
    #[error("target unreachable: {detail}")]
    Unreachable { detail: String },
    /// Nothing is mapped at the address.
    #[error("address {address:#010x} is not mapped")]
    Unmapped { address: u32 },
}

/// Something that can read a 32-bit word at a bus address.
pub trait RegisterSource {
    fn read_word(&mut self, address: u32) -> Result<u32, ReadError>;
}

impl<S: RegisterSource + ?Sized> RegisterSource for &mut S {
    fn read_word(&mut self, address: u32) -> Result<u32, ReadError> {
        (**self).read_word(address)
    }
}
