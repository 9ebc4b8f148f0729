// src/transport.rs
use std::ffi::CString;

use log::{debug, info, warn};
use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode};

use crate::apdu;
use crate::error::TransportFault;

/// The low-level tag protocol. Every call is one blocking exchange with the tag.
pub trait TagTransport {
    /// Is a tag in the field?
    fn request(&mut self) -> bool;

    /// Anticollision result for the tag in the field.
    fn read_uid(&mut self) -> Option<Vec<u8>>;

    /// Authenticates the sector holding `block`. `Ok(false)` means the key was rejected.
    fn authenticate(&mut self, block: u16, key: &[u8; 6]) -> Result<bool, TransportFault>;

    /// Reads the transport's native chunk starting at `index` (16 bytes).
    fn read_unit(&mut self, index: u16) -> Result<Vec<u8>, TransportFault>;

    /// Writes one unit. `Ok(false)` means the tag did not acknowledge.
    fn write_unit(&mut self, index: u16, data: &[u8]) -> Result<bool, TransportFault>;

    /// Drops crypto state and releases the tag.
    fn end_session(&mut self);

    /// Whether the reader itself is still attached.
    fn reader_available(&self) -> bool {
        true
    }
}

const READ_CHUNK: u8 = 16;

/// PC/SC reader driving the tag with pseudo-APDUs.
pub struct PcscTransport {
    ctx: Context,
    reader: CString,
    card: Option<Card>,
}

impl PcscTransport {
    /// Connects to the first reader whose name contains `filter` (or the first reader at all).
    pub fn open(filter: Option<&str>) -> Result<Self, TransportFault> {
        let ctx = Context::establish(Scope::User)?;
        let reader = find_reader(&ctx, filter)?
            .ok_or_else(|| TransportFault("no matching PC/SC reader connected".into()))?;
        info!("Using reader {:?}", reader);
        Ok(Self {
            ctx,
            reader,
            card: None,
        })
    }

    pub fn reader_name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    fn card(&self) -> Result<&Card, TransportFault> {
        self.card
            .as_ref()
            .ok_or_else(|| TransportFault("no tag session".into()))
    }

    fn unit_address(index: u16) -> Result<u8, TransportFault> {
        u8::try_from(index)
            .map_err(|_| TransportFault(format!("unit {} is outside the addressable range", index)))
    }
}

fn find_reader(ctx: &Context, filter: Option<&str>) -> Result<Option<CString>, TransportFault> {
    let mut readers_buf = [0; 2048];
    let names = ctx.list_readers(&mut readers_buf)?;
    for name in names {
        let matches = match filter {
            Some(f) => name.to_string_lossy().contains(f),
            None => true,
        };
        if matches {
            return Ok(Some(CString::from(name)));
        }
    }
    Ok(None)
}

impl TagTransport for PcscTransport {
    fn request(&mut self) -> bool {
        if let Some(card) = &self.card {
            let mut names_buf = [0u8; 128];
            let mut atr_buf = [0u8; 64];
            if card.status2(&mut names_buf, &mut atr_buf).is_ok() {
                return true;
            }
            self.card = None;
        }

        match self
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
        {
            Ok(card) => {
                self.card = Some(card);
                true
            }
            Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => false,
            Err(err) => {
                warn!("Failed to connect to tag: {}", err);
                false
            }
        }
    }

    fn read_uid(&mut self) -> Option<Vec<u8>> {
        let card = self.card.as_ref()?;
        match apdu::get_uid(card) {
            Ok(uid) => uid,
            Err(err) => {
                debug!("UID read failed: {}", err);
                None
            }
        }
    }

    fn authenticate(&mut self, block: u16, key: &[u8; 6]) -> Result<bool, TransportFault> {
        let block = Self::unit_address(block)?;
        let card = self.card()?;
        if !apdu::load_key(card, key)? {
            return Ok(false);
        }
        Ok(apdu::authenticate(card, block, apdu::KEY_TYPE_A)?
            || apdu::authenticate(card, block, apdu::KEY_TYPE_B)?)
    }

    fn read_unit(&mut self, index: u16) -> Result<Vec<u8>, TransportFault> {
        let index = Self::unit_address(index)?;
        apdu::read_binary(self.card()?, index, READ_CHUNK)
    }

    fn write_unit(&mut self, index: u16, data: &[u8]) -> Result<bool, TransportFault> {
        let index = Self::unit_address(index)?;
        apdu::update_binary(self.card()?, index, data)
    }

    fn end_session(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, err)) = card.disconnect(Disposition::LeaveCard) {
                debug!("Disconnect failed: {}", err);
            }
        }
    }

    fn reader_available(&self) -> bool {
        let mut readers_buf = [0; 2048];
        match self.ctx.list_readers(&mut readers_buf) {
            Ok(mut names) => names.any(|name| name == self.reader.as_c_str()),
            Err(_) => false,
        }
    }
}
