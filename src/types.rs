// src/types.rs
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

use crate::error::TagError;
use crate::service::{PresenceEvent, ServiceState, ServiceStatus};

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS {
        success: bool,
    },
    TAG_DETECTED {
        uid: String,
        text: Option<String>,
    },
    TAG_REMOVED {
        uid: String,
    },
    TAG_READ_ERROR {
        uid: String,
        error: String,
    },
    DATA_WRITE_SUCCESS {
        text: String,
    },
    DATA_WRITE_ERROR {
        error: String,
        unit: Option<u16>,
    },
    SERVICE_STATUS {
        state: ServiceState,
        last_uid: Option<String>,
    },
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    GET_SERVICE_STATUS,
    WRITE_TEXT { text: String },
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug, Clone, PartialEq)]
pub enum NfcCommand {
    WriteText { text: String },
    CheckReaderStatus,
    GetServiceStatus,
}

impl From<IncomingMessage> for NfcCommand {
    fn from(msg: IncomingMessage) -> Self {
        match msg {
            IncomingMessage::GET_READER_STATUS => NfcCommand::CheckReaderStatus,
            IncomingMessage::GET_SERVICE_STATUS => NfcCommand::GetServiceStatus,
            IncomingMessage::WRITE_TEXT { text } => NfcCommand::WriteText { text },
        }
    }
}

impl From<PresenceEvent> for OutgoingMessage {
    fn from(event: PresenceEvent) -> Self {
        match event {
            PresenceEvent::Detected { uid, text } => OutgoingMessage::TAG_DETECTED { uid, text },
            PresenceEvent::Removed { uid } => OutgoingMessage::TAG_REMOVED { uid },
            PresenceEvent::ReadFailed { uid, error } => OutgoingMessage::TAG_READ_ERROR {
                uid,
                error: error.to_string(),
            },
        }
    }
}

impl From<ServiceStatus> for OutgoingMessage {
    fn from(status: ServiceStatus) -> Self {
        OutgoingMessage::SERVICE_STATUS {
            state: status.state,
            last_uid: status.last_uid,
        }
    }
}

impl OutgoingMessage {
    pub fn write_result(text: &str, result: Result<(), TagError>) -> Self {
        match result {
            Ok(()) => OutgoingMessage::DATA_WRITE_SUCCESS {
                text: text.to_string(),
            },
            Err(e) => OutgoingMessage::DATA_WRITE_ERROR {
                unit: e.unit(),
                error: e.to_string(),
            },
        }
    }
}
