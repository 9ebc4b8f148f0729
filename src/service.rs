// src/service.rs
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::TagError;
use crate::memory::{MemoryModel, TagMemory};
use crate::ndef;
use crate::transport::TagTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Idle,
    Reading,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub last_uid: Option<String>,
}

/// What a poll observed, if anything worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Detected { uid: String, text: Option<String> },
    ReadFailed { uid: String, error: TagError },
    Removed { uid: String },
}

/// Reads and writes the text record of whatever tag sits on one reader.
///
/// Owns the "last seen UID" used to report each tag once while it stays in the field.
pub struct TagTextService<T: TagTransport> {
    transport: T,
    memory: MemoryModel,
    language: String,
    state: ServiceState,
    last_uid: Option<String>,
}

pub fn format_uid(uid: &[u8]) -> String {
    hex::encode_upper(uid)
}

impl<T: TagTransport> TagTextService<T> {
    pub fn new(transport: T, memory: MemoryModel, language: impl Into<String>) -> Self {
        Self {
            transport,
            memory,
            language: language.into(),
            state: ServiceState::Idle,
            last_uid: None,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn last_uid(&self) -> Option<&str> {
        self.last_uid.as_deref()
    }

    pub fn memory(&self) -> &MemoryModel {
        &self.memory
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: self.state,
            last_uid: self.last_uid.clone(),
        }
    }

    /// A tag with `uid` is in the field. Only a new UID triggers a read.
    ///
    /// A failed read is reported once; the tag is not retried until it leaves the field.
    pub fn present(&mut self, uid: &str) -> Option<PresenceEvent> {
        if self.last_uid.as_deref() == Some(uid) {
            return None;
        }

        info!("New tag detected with UID {}", uid);
        self.state = ServiceState::Reading;
        self.last_uid = Some(uid.to_string());

        match self.read_text() {
            Ok(text) => {
                self.state = ServiceState::Settled;
                Some(PresenceEvent::Detected {
                    uid: uid.to_string(),
                    text,
                })
            }
            Err(error) => {
                warn!("Reading tag {} failed: {}", uid, error);
                self.state = ServiceState::Idle;
                Some(PresenceEvent::ReadFailed {
                    uid: uid.to_string(),
                    error,
                })
            }
        }
    }

    /// The field is empty.
    pub fn absent(&mut self) -> Option<PresenceEvent> {
        self.state = ServiceState::Idle;
        self.last_uid.take().map(|uid| {
            info!("Tag {} removed from reader", uid);
            PresenceEvent::Removed { uid }
        })
    }

    /// One turn of the polling loop.
    pub fn poll(&mut self) -> Option<PresenceEvent> {
        let uid = if self.transport.request() {
            self.transport.read_uid()
        } else {
            None
        };

        match uid {
            Some(uid) => {
                let event = self.present(&format_uid(&uid));
                self.transport.end_session();
                event
            }
            None => self.absent(),
        }
    }

    /// Encodes `text` and writes it to the tag in the field. Does not touch de-duplication.
    pub fn write_text(&mut self, text: &str) -> Result<(), TagError> {
        let record = ndef::encode_text_record(text, &self.language)?;
        let tlv = ndef::wrap_tlv(&record, self.memory.unit_size());
        self.memory.ensure_fits(tlv.len())?;

        if !self.tag_in_field() {
            return Err(TagError::NoTag);
        }

        debug!("Writing TLV ({} bytes): {}", tlv.len(), hex::encode(&tlv));
        let result = self.memory.write(&mut self.transport, &tlv);
        self.transport.end_session();

        match &result {
            Ok(()) => info!("Wrote text {:?} to tag", text),
            Err(e) => warn!("Write failed: {}", e),
        }
        result
    }

    /// Re-reads the tag in the field without counting it as a new observation.
    pub fn read_back(&mut self) -> Result<Option<String>, TagError> {
        if !self.tag_in_field() {
            return Err(TagError::NoTag);
        }
        let result = self.read_text();
        self.transport.end_session();
        result
    }

    fn tag_in_field(&mut self) -> bool {
        self.transport.request() && self.transport.read_uid().is_some()
    }

    fn read_text(&mut self) -> Result<Option<String>, TagError> {
        let raw = self
            .memory
            .read(&mut self.transport, self.memory.capacity())?;

        let Some(message) = ndef::unwrap_tlv(&raw) else {
            debug!("No NDEF message TLV on tag");
            return Ok(None);
        };

        match ndef::classify_text_record(message) {
            Ok(Some(text)) => Ok(Some(text)),
            Ok(None) => {
                debug!("Tag carries no text record");
                Ok(None)
            }
            Err(e) => {
                warn!("Malformed NDEF message: {}", e);
                Ok(None)
            }
        }
    }
}
