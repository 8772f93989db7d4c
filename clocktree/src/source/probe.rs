use probe_rs::MemoryInterface;

use super::{ReadError, RegisterSource};

/// Reads registers from a live target through a debug probe.
///
/// The target is not halted. Registers are not latched together by the
/// hardware, so a capture taken while the firmware reconfigures clocks may
/// mix old and new values.
pub struct ProbeSource<'a> {
    mem: &'a mut dyn MemoryInterface,
}

impl<'a> ProbeSource<'a> {
    pub fn new(mem: &'a mut dyn MemoryInterface) -> Self {
        Self { mem }
    }
}

impl RegisterSource for ProbeSource<'_> {
    fn read_word(&mut self, address: u32) -> Result<u32, ReadError> {
        self.mem
            .read_word_32(u64::from(address))
            .map_err(|e| ReadError::Unreachable {
                detail: e.to_string(),
            })
    }
}
