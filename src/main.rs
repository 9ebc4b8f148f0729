use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::broadcast;

use rfid_jukebox::config::CONFIG;
use rfid_jukebox::service::TagTextService;
use rfid_jukebox::transport::PcscTransport;
use rfid_jukebox::types::{NfcCommand, OutgoingMessage};
use rfid_jukebox::{nfc_service, ws};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting RFID jukebox tag service...");

    let config = match &*CONFIG {
        Ok(config) => config.clone(),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let transport = match PcscTransport::open(config.reader_filter.as_deref()) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to open reader: {}", e);
            std::process::exit(1);
        }
    };
    info!("Reader: {}", transport.reader_name());
    let service = TagTextService::new(transport, config.memory.clone(), config.language.clone());

    // Channel: WS -> NFC (Commands)
    // Crossbeam (sync) because the NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<NfcCommand>();

    // Channel: NFC -> WS (Events), fanned out to clients
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    // Bridge: NFC thread -> broadcast
    let (bridge_tx, bridge_rx) = unbounded::<OutgoingMessage>();
    let poll_interval = config.poll_interval;
    std::thread::spawn(move || {
        nfc_service::run(service, bridge_tx, cmd_rx, poll_interval);
    });
    std::thread::spawn(move || {
        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(cmd_tx, event_rx, config.ws_port).await;
}
