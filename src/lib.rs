// src/lib.rs
//! NFC tag text codec and memory sequencer for the RFID jukebox.
//!
//! Tags carry the name of an album folder as an NDEF Well-Known Text record.
//! [`ndef`] encodes and decodes that record and its TLV framing, [`memory`] maps
//! the framed bytes onto sectored (MIFARE Classic) or paged (NTAG) memory, and
//! [`service::TagTextService`] ties both to a [`transport::TagTransport`].

pub mod apdu;
pub mod config;
pub mod error;
pub mod memory;
pub mod ndef;
pub mod nfc_service;
pub mod service;
pub mod transport;
pub mod types;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use error::{ConfigError, NdefError, TagError, TransportFault};
pub use memory::{MemoryModel, PagedMemory, SectoredMemory, TagMemory};
pub use service::{PresenceEvent, TagTextService};
