// src/bin/diagnose_tag.rs
// Prints every tag that enters the field and the text it carries.
use std::process::ExitCode;
use std::thread;

use log::error;

use rfid_jukebox::config::CONFIG;
use rfid_jukebox::service::{PresenceEvent, TagTextService};
use rfid_jukebox::transport::PcscTransport;

fn main() -> ExitCode {
    env_logger::init();

    let config = match &*CONFIG {
        Ok(config) => config.clone(),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    let transport = match PcscTransport::open(config.reader_filter.as_deref()) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to open reader: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("Reader: {}", transport.reader_name());
    println!("Memory: {:?}", config.memory);
    println!("Hold a programmed tag near the reader. Ctrl+C to exit.");

    let mut service = TagTextService::new(transport, config.memory.clone(), config.language.clone());
    loop {
        match service.poll() {
            Some(PresenceEvent::Detected { uid, text: Some(text) }) => {
                println!("{}  text: {:?}", uid, text)
            }
            Some(PresenceEvent::Detected { uid, text: None }) => println!("{}  (no text record)", uid),
            Some(PresenceEvent::ReadFailed { uid, error }) => println!("{}  read failed: {}", uid, error),
            Some(PresenceEvent::Removed { uid }) => println!("{}  removed", uid),
            None => {}
        }
        thread::sleep(config.poll_interval);
    }
}
