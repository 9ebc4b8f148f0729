// src/test_support.rs
// In-memory tag used by the unit tests.
use std::collections::HashSet;

use crate::error::TransportFault;
use crate::transport::TagTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate(u16),
    Read(u16),
    Write(u16, Vec<u8>),
    EndSession,
}

/// Flat byte memory addressed in units of `unit_size`. Reads always return 16 bytes.
pub struct FakeTag {
    pub memory: Vec<u8>,
    pub unit_size: usize,
    pub uid: Option<Vec<u8>>,
    pub reader_ok: bool,
    pub calls: Vec<Call>,
    rejected_auth: HashSet<u16>,
    nacked_writes: HashSet<u16>,
    faults: HashSet<u16>,
}

impl FakeTag {
    fn with_memory(unit_size: usize, units: usize) -> Self {
        Self {
            memory: vec![0; unit_size * units],
            unit_size,
            uid: Some(vec![0x04, 0xA1, 0x2B, 0x3C]),
            reader_ok: true,
            calls: Vec::new(),
            rejected_auth: HashSet::new(),
            nacked_writes: HashSet::new(),
            faults: HashSet::new(),
        }
    }

    /// MIFARE Classic 1K: 64 blocks.
    pub fn sectored() -> Self {
        Self::with_memory(16, 64)
    }

    /// NTAG215: 135 pages.
    pub fn paged() -> Self {
        Self::with_memory(4, 135)
    }

    pub fn fill(&mut self, offset: usize, bytes: &[u8]) {
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn remove(&mut self) {
        self.uid = None;
    }

    pub fn reject_auth_at(&mut self, block: u16) {
        self.rejected_auth.insert(block);
    }

    pub fn nack_write_at(&mut self, unit: u16) {
        self.nacked_writes.insert(unit);
    }

    pub fn fault_at(&mut self, unit: u16) {
        self.faults.insert(unit);
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Write(unit, data) => Some((*unit, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn hardware_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::EndSession))
            .count()
    }
}

impl TagTransport for FakeTag {
    fn request(&mut self) -> bool {
        self.uid.is_some()
    }

    fn read_uid(&mut self) -> Option<Vec<u8>> {
        self.uid.clone()
    }

    fn authenticate(&mut self, block: u16, _key: &[u8; 6]) -> Result<bool, TransportFault> {
        self.calls.push(Call::Authenticate(block));
        Ok(!self.rejected_auth.contains(&block))
    }

    fn read_unit(&mut self, index: u16) -> Result<Vec<u8>, TransportFault> {
        self.calls.push(Call::Read(index));
        if self.faults.contains(&index) {
            return Err(TransportFault("timeout".into()));
        }
        let start = (index as usize * self.unit_size).min(self.memory.len());
        let end = (start + 16).min(self.memory.len());
        Ok(self.memory[start..end].to_vec())
    }

    fn write_unit(&mut self, index: u16, data: &[u8]) -> Result<bool, TransportFault> {
        self.calls.push(Call::Write(index, data.to_vec()));
        if self.faults.contains(&index) {
            return Err(TransportFault("timeout".into()));
        }
        if self.nacked_writes.contains(&index) {
            return Ok(false);
        }
        let start = index as usize * self.unit_size;
        self.memory[start..start + data.len()].copy_from_slice(data);
        Ok(true)
    }

    fn end_session(&mut self) {
        self.calls.push(Call::EndSession);
    }

    fn reader_available(&self) -> bool {
        self.reader_ok
    }
}
