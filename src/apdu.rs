// src/apdu.rs
// Pseudo-APDUs understood by PC/SC contactless readers (ACR122U and friends).
use pcsc::Card;

use crate::error::TransportFault;

pub const KEY_TYPE_A: u8 = 0x60;
pub const KEY_TYPE_B: u8 = 0x61;

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Sends one frame and splits the response into `(data, status_ok)`.
fn exchange(card: &Card, apdu: &[u8]) -> Result<(Vec<u8>, bool), TransportFault> {
    let mut recv_buffer = [0u8; 256];
    let resp = card.transmit(apdu, &mut recv_buffer)?;
    if resp.len() < 2 {
        return Err(TransportFault(format!("short response: {:02X?}", resp)));
    }
    let (data, sw) = resp.split_at(resp.len() - 2);
    Ok((data.to_vec(), sw == SW_SUCCESS))
}

// Get Data (UID): FF CA 00 00 00
pub fn get_uid(card: &Card) -> Result<Option<Vec<u8>>, TransportFault> {
    let (data, ok) = exchange(card, &[0xFF, 0xCA, 0x00, 0x00, 0x00])?;
    Ok((ok && !data.is_empty()).then_some(data))
}

// Load Authentication Keys into Reader Memory (location 0x00)
// FF 82 00 key_num 06 [KEY]
pub fn load_key(card: &Card, key: &[u8; 6]) -> Result<bool, TransportFault> {
    let mut apdu = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
    apdu.extend_from_slice(key);
    Ok(exchange(card, &apdu)?.1)
}

// Authenticate Block
// FF 86 00 00 05 01 00 Block KeyType KeyNumber
pub fn authenticate(card: &Card, block: u8, key_type: u8) -> Result<bool, TransportFault> {
    let apdu = [
        0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, key_type, 0x00,
    ];
    Ok(exchange(card, &apdu)?.1)
}

// Read: FF B0 00 Block Len
pub fn read_binary(card: &Card, block: u8, length: u8) -> Result<Vec<u8>, TransportFault> {
    let (data, ok) = exchange(card, &[0xFF, 0xB0, 0x00, block, length])?;
    if ok {
        Ok(data)
    } else {
        Err(TransportFault(format!("read of unit {} refused", block)))
    }
}

// Write: FF D6 00 Block Len [Data]
pub fn update_binary(card: &Card, block: u8, data: &[u8]) -> Result<bool, TransportFault> {
    let len = u8::try_from(data.len())
        .map_err(|_| TransportFault(format!("{} bytes do not fit one frame", data.len())))?;
    let mut apdu = vec![0xFF, 0xD6, 0x00, block, len];
    apdu.extend_from_slice(data);
    Ok(exchange(card, &apdu)?.1)
}
