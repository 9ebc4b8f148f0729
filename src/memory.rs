// src/memory.rs
// Turns a byte range into block/page exchanges for the two tag memory models.
use log::debug;

use crate::error::TagError;
use crate::transport::TagTransport;

pub const BLOCK_SIZE: usize = 16;
pub const PAGE_SIZE: usize = 4;
pub const BLOCKS_PER_SECTOR: u16 = 4;

/// Common interface of the memory adapters. Callers only ever see this.
pub trait TagMemory {
    /// Bytes per addressable unit (16 for blocks, 4 for pages).
    fn unit_size(&self) -> usize;

    /// Writable bytes in the configured range.
    fn capacity(&self) -> usize;

    /// Reads exactly `len` bytes from the start of the range.
    fn read(&self, transport: &mut dyn TagTransport, len: usize) -> Result<Vec<u8>, TagError>;

    /// Writes `data` from the start of the range. Never truncates.
    fn write(&self, transport: &mut dyn TagTransport, data: &[u8]) -> Result<(), TagError>;

    fn ensure_fits(&self, len: usize) -> Result<(), TagError> {
        let available = self.capacity();
        if len > available {
            return Err(TagError::Capacity {
                needed: len,
                available,
            });
        }
        Ok(())
    }
}

/// MIFARE-Classic-style memory: 16-byte blocks, every 4th block is a sector trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectoredMemory {
    pub start_block: u16,
    pub block_count: u16,
    pub auth_key: [u8; 6],
}

/// NTAG-style memory: 4-byte pages, no authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedMemory {
    pub start_page: u16,
    pub page_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryModel {
    Sectored(SectoredMemory),
    Paged(PagedMemory),
}

pub fn is_sector_trailer(block: u16) -> bool {
    (block + 1) % BLOCKS_PER_SECTOR == 0
}

pub fn sector_of(block: u16) -> u16 {
    block / BLOCKS_PER_SECTOR
}

impl SectoredMemory {
    pub fn new(start_block: u16, block_count: u16, auth_key: [u8; 6]) -> Self {
        Self {
            start_block,
            block_count,
            auth_key,
        }
    }

    /// Data blocks of the range in increasing order, trailers removed.
    pub fn data_blocks(&self) -> Vec<u16> {
        let end = self.start_block.saturating_add(self.block_count);
        (self.start_block..end)
            .filter(|&block| !is_sector_trailer(block))
            .collect()
    }

    /// Authenticates `block`'s sector unless it is already open in this operation.
    fn open_sector(
        &self,
        transport: &mut dyn TagTransport,
        block: u16,
        current: &mut Option<u16>,
    ) -> Result<(), TagError> {
        let sector = sector_of(block);
        if *current == Some(sector) {
            return Ok(());
        }

        let accepted = transport
            .authenticate(block, &self.auth_key)
            .map_err(|fault| TagError::transport(block, fault))?;
        if !accepted {
            return Err(TagError::Authentication { sector, block });
        }

        debug!("Authenticated sector {} at block {}", sector, block);
        *current = Some(sector);
        Ok(())
    }
}

impl TagMemory for SectoredMemory {
    fn unit_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn capacity(&self) -> usize {
        self.data_blocks().len() * BLOCK_SIZE
    }

    fn read(&self, transport: &mut dyn TagTransport, len: usize) -> Result<Vec<u8>, TagError> {
        self.ensure_fits(len)?;

        let blocks_needed = len.div_ceil(BLOCK_SIZE);
        let mut full_data = Vec::with_capacity(blocks_needed * BLOCK_SIZE);
        let mut sector = None;

        for block in self.data_blocks().into_iter().take(blocks_needed) {
            self.open_sector(transport, block, &mut sector)?;

            let data = transport
                .read_unit(block)
                .map_err(|fault| TagError::transport(block, fault))?;
            if data.len() < BLOCK_SIZE {
                return Err(TagError::Transport {
                    unit: block,
                    reason: format!("short read of {} bytes", data.len()),
                });
            }
            full_data.extend_from_slice(&data[..BLOCK_SIZE]);
        }

        full_data.truncate(len);
        Ok(full_data)
    }

    fn write(&self, transport: &mut dyn TagTransport, data: &[u8]) -> Result<(), TagError> {
        let padded_len = data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        self.ensure_fits(padded_len)?;

        let mut sector = None;
        for (block, chunk) in self.data_blocks().into_iter().zip(data.chunks(BLOCK_SIZE)) {
            self.open_sector(transport, block, &mut sector)?;

            // Pad with 0s
            let mut unit = [0u8; BLOCK_SIZE];
            unit[..chunk.len()].copy_from_slice(chunk);

            let acked = transport
                .write_unit(block, &unit)
                .map_err(|fault| TagError::transport(block, fault))?;
            if !acked {
                return Err(TagError::Write { unit: block });
            }
        }
        Ok(())
    }
}

impl PagedMemory {
    pub fn new(start_page: u16, page_count: u16) -> Self {
        Self {
            start_page,
            page_count,
        }
    }

    /// Pages of the range that fall inside the 16-bit unit address space.
    fn usable_pages(&self) -> usize {
        let addressable = u16::MAX as usize - self.start_page as usize + 1;
        (self.page_count as usize).min(addressable)
    }
}

impl TagMemory for PagedMemory {
    fn unit_size(&self) -> usize {
        PAGE_SIZE
    }

    fn capacity(&self) -> usize {
        self.usable_pages() * PAGE_SIZE
    }

    fn read(&self, transport: &mut dyn TagTransport, len: usize) -> Result<Vec<u8>, TagError> {
        self.ensure_fits(len)?;

        let mut full_data = Vec::with_capacity(len + BLOCK_SIZE);
        let mut next_page = Some(self.start_page);

        // A read returns several pages at once (4 pages / 16 bytes on NTAG)
        while full_data.len() < len {
            let Some(page) = next_page else {
                return Err(TagError::Capacity {
                    needed: len,
                    available: full_data.len(),
                });
            };
            let data = transport
                .read_unit(page)
                .map_err(|fault| TagError::transport(page, fault))?;
            let pages_read = data.len() / PAGE_SIZE;
            if pages_read == 0 {
                return Err(TagError::Transport {
                    unit: page,
                    reason: format!("short read of {} bytes", data.len()),
                });
            }
            full_data.extend_from_slice(&data[..pages_read * PAGE_SIZE]);
            next_page = u16::try_from(pages_read)
                .ok()
                .and_then(|n| page.checked_add(n));
        }

        full_data.truncate(len);
        Ok(full_data)
    }

    fn write(&self, transport: &mut dyn TagTransport, data: &[u8]) -> Result<(), TagError> {
        let padded_len = data.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
        self.ensure_fits(padded_len)?;

        // ensure_fits keeps every page below u16::MAX
        for (offset, chunk) in data.chunks(PAGE_SIZE).enumerate() {
            let page = self.start_page + offset as u16;
            let mut unit = [0u8; PAGE_SIZE];
            unit[..chunk.len()].copy_from_slice(chunk);

            let acked = transport
                .write_unit(page, &unit)
                .map_err(|fault| TagError::transport(page, fault))?;
            if !acked {
                return Err(TagError::Write { unit: page });
            }
        }
        Ok(())
    }
}

impl MemoryModel {
    fn adapter(&self) -> &dyn TagMemory {
        match self {
            MemoryModel::Sectored(memory) => memory,
            MemoryModel::Paged(memory) => memory,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MemoryModel::Sectored(_) => "sectored",
            MemoryModel::Paged(_) => "paged",
        }
    }
}

impl TagMemory for MemoryModel {
    fn unit_size(&self) -> usize {
        self.adapter().unit_size()
    }

    fn capacity(&self) -> usize {
        self.adapter().capacity()
    }

    fn read(&self, transport: &mut dyn TagTransport, len: usize) -> Result<Vec<u8>, TagError> {
        self.adapter().read(transport, len)
    }

    fn write(&self, transport: &mut dyn TagTransport, data: &[u8]) -> Result<(), TagError> {
        self.adapter().write(transport, data)
    }
}
