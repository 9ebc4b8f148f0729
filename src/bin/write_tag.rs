// src/bin/write_tag.rs
// Waits for a tag, writes the text given on the command line and verifies it.
use std::process::ExitCode;
use std::thread;

use log::{error, info};

use rfid_jukebox::config::CONFIG;
use rfid_jukebox::service::TagTextService;
use rfid_jukebox::transport::{PcscTransport, TagTransport};

fn main() -> ExitCode {
    env_logger::init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        eprintln!("usage: write_tag <text>");
        return ExitCode::from(2);
    }

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
    let mut service = TagTextService::new(transport, config.memory.clone(), config.language.clone());

    println!("Place a tag on the reader to write {:?}. Ctrl+C to abort.", text);
    while !service.transport_mut().request() {
        thread::sleep(config.poll_interval);
    }

    if let Err(e) = service.write_text(&text) {
        println!("✗ Failed to program the tag: {}", e);
        return ExitCode::FAILURE;
    }

    match service.read_back() {
        Ok(Some(read)) if read == text.trim() => {
            println!("✓ Tag programmed with text: {:?}", read);
            ExitCode::SUCCESS
        }
        Ok(other) => {
            println!("✗ Read back {:?} after writing {:?}", other, text);
            ExitCode::FAILURE
        }
        Err(e) => {
            info!("Verification read failed: {}", e);
            println!("✗ Written, but could not read the tag back: {}", e);
            ExitCode::FAILURE
        }
    }
}
