// src/nfc_service.rs
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info, warn};

use crate::memory::TagMemory;
use crate::service::TagTextService;
use crate::transport::TagTransport;
use crate::types::{NfcCommand, OutgoingMessage};

/// Blocking polling loop. Returns once every command sender is gone.
pub fn run<T: TagTransport>(
    mut service: TagTextService<T>,
    tx: Sender<OutgoingMessage>,
    rx: Receiver<NfcCommand>,
    poll_interval: Duration,
) {
    info!(
        "Starting NFC Service ({} memory, {} bytes)...",
        service.memory().name(),
        service.memory().capacity()
    );

    let mut reader_ok = service.transport().reader_available();
    let _ = tx.send(OutgoingMessage::READER_STATUS { success: reader_ok });

    loop {
        // 1. CHECK FOR COMMANDS
        loop {
            match rx.try_recv() {
                Ok(cmd) => handle_command(&mut service, cmd, &tx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Command channel closed, stopping NFC Service");
                    return;
                }
            }
        }

        // 2. READER HEALTH
        let available = service.transport().reader_available();
        if available != reader_ok {
            reader_ok = available;
            if reader_ok {
                info!("Reader reconnected");
            } else {
                warn!("Reader disconnected");
            }
            let _ = tx.send(OutgoingMessage::READER_STATUS { success: reader_ok });
        }

        // 3. POLL THE FIELD
        if reader_ok {
            if let Some(event) = service.poll() {
                let _ = tx.send(event.into());
            }
        }

        std::thread::sleep(poll_interval);
    }
}

pub fn handle_command<T: TagTransport>(
    service: &mut TagTextService<T>,
    cmd: NfcCommand,
    tx: &Sender<OutgoingMessage>,
) {
    match cmd {
        NfcCommand::WriteText { text } => {
            info!("Received write command: {:?}", text);
            let result = service.write_text(&text);
            let _ = tx.send(OutgoingMessage::write_result(&text, result));
        }
        NfcCommand::CheckReaderStatus => {
            let _ = tx.send(OutgoingMessage::READER_STATUS {
                success: service.transport().reader_available(),
            });
        }
        NfcCommand::GetServiceStatus => {
            debug!("Service status requested");
            let _ = tx.send(service.status().into());
        }
    }
}
