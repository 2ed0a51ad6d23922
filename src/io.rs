//! The seam between the FAT library and the card hardware.
//!
//! The platform only has to provide a [`BlockDevice`] (usually a thin wrapper
//! around the SDMMC peripheral driver). [`BlockStorage`] turns it into the
//! byte-addressed read/write/seek stream the FAT library expects.

#[cfg(feature = "std")]
mod file_disk;
mod ram_disk;

#[cfg(feature = "std")]
pub use file_disk::*;
pub use ram_disk::*;

use core::cell::{RefCell, RefMut};
use core::{cmp, fmt};

use fatfs::{IoBase, Read, Seek, SeekFrom, Write};
use log::{error, trace};

use crate::error::StorageError;

/// The size (in bytes) of a single SD card block
pub const BLOCK_SIZE: usize = 512;

/// A sector-addressed storage medium, such as an SD card
///
/// Every buffer passed to [`read_blocks`](BlockDevice::read_blocks) and
/// [`write_blocks`](BlockDevice::write_blocks) is a whole multiple of [`BLOCK_SIZE`]
pub trait BlockDevice {
    /// The error type of this device
    type Error: fmt::Debug;

    /// Read `buf.len() / BLOCK_SIZE` consecutive blocks, starting at `start_block`
    fn read_blocks(&mut self, start_block: u64, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `buf.len() / BLOCK_SIZE` consecutive blocks, starting at `start_block`
    fn write_blocks(&mut self, start_block: u64, buf: &[u8]) -> Result<(), Self::Error>;

    /// The total number of blocks on this device
    fn block_count(&mut self) -> Result<u64, Self::Error>;

    /// Make sure every previous write has reached the medium
    fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A byte-addressed view of a shared [`BlockDevice`]
///
/// Partial-block writes are done read-modify-write.
/// Several [`BlockStorage`]s may point at the same device, each with its own cursor.
#[derive(Debug)]
pub struct BlockStorage<'d, D>
where
    D: BlockDevice,
{
    device: &'d RefCell<D>,
    pos: u64,
    size: Option<u64>,
}

impl<'d, D> BlockStorage<'d, D>
where
    D: BlockDevice,
{
    /// Create a new [`BlockStorage`] with its cursor at the start of the device
    pub fn new(device: &'d RefCell<D>) -> Self {
        Self {
            device,
            pos: 0,
            size: None,
        }
    }

    /// The current cursor position, in bytes
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn borrow_device(&self) -> Result<RefMut<'d, D>, StorageError<D::Error>> {
        self.device.try_borrow_mut().map_err(|_| StorageError::Busy)
    }

    /// The size of the underlying device, in bytes
    pub fn size(&mut self) -> Result<u64, StorageError<D::Error>> {
        if let Some(size) = self.size {
            return Ok(size);
        }

        let blocks = self
            .borrow_device()?
            .block_count()
            .map_err(StorageError::Device)?;
        let size = blocks * BLOCK_SIZE as u64;
        self.size = Some(size);

        Ok(size)
    }
}

impl<D> IoBase for BlockStorage<'_, D>
where
    D: BlockDevice,
{
    type Error = StorageError<D::Error>;
}

impl<D> Read for BlockStorage<'_, D>
where
    D: BlockDevice,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let size = self.size()?;
        if self.pos >= size {
            return Ok(0);
        }

        let len = cmp::min(buf.len() as u64, size - self.pos) as usize;
        let mut device = self.borrow_device()?;
        let mut sector = [0_u8; BLOCK_SIZE];
        let mut read_len = 0;

        while read_len < len {
            let block = self.pos / BLOCK_SIZE as u64;
            let offset = (self.pos % BLOCK_SIZE as u64) as usize;
            let remaining = len - read_len;

            let bytes_read = if offset == 0 && remaining >= BLOCK_SIZE {
                // whole blocks go straight into the caller's buffer
                let bytes = remaining - remaining % BLOCK_SIZE;
                device
                    .read_blocks(block, &mut buf[read_len..read_len + bytes])
                    .map_err(|e| {
                        error!("block read error at block {}: {:?}", block, e);
                        StorageError::Device(e)
                    })?;
                bytes
            } else {
                device.read_blocks(block, &mut sector).map_err(|e| {
                    error!("block read error at block {}: {:?}", block, e);
                    StorageError::Device(e)
                })?;
                let bytes = cmp::min(remaining, BLOCK_SIZE - offset);
                buf[read_len..read_len + bytes].copy_from_slice(&sector[offset..offset + bytes]);
                bytes
            };

            self.pos += bytes_read as u64;
            read_len += bytes_read;
        }

        Ok(read_len)
    }
}

impl<D> Write for BlockStorage<'_, D>
where
    D: BlockDevice,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let size = self.size()?;
        if self.pos >= size {
            return Ok(0);
        }

        let len = cmp::min(buf.len() as u64, size - self.pos) as usize;
        let mut device = self.borrow_device()?;
        let mut sector = [0_u8; BLOCK_SIZE];
        let mut written_len = 0;

        while written_len < len {
            let block = self.pos / BLOCK_SIZE as u64;
            let offset = (self.pos % BLOCK_SIZE as u64) as usize;
            let remaining = len - written_len;

            let bytes_written = if offset == 0 && remaining >= BLOCK_SIZE {
                let bytes = remaining - remaining % BLOCK_SIZE;
                device
                    .write_blocks(block, &buf[written_len..written_len + bytes])
                    .map_err(|e| {
                        error!("block write error at block {}: {:?}", block, e);
                        StorageError::Device(e)
                    })?;
                bytes
            } else {
                // read-modify-write
                device.read_blocks(block, &mut sector).map_err(|e| {
                    error!("block read-for-write error at block {}: {:?}", block, e);
                    StorageError::Device(e)
                })?;
                let bytes = cmp::min(remaining, BLOCK_SIZE - offset);
                sector[offset..offset + bytes]
                    .copy_from_slice(&buf[written_len..written_len + bytes]);
                device.write_blocks(block, &sector).map_err(|e| {
                    error!("block write error at block {}: {:?}", block, e);
                    StorageError::Device(e)
                })?;
                bytes
            };

            self.pos += bytes_written as u64;
            written_len += bytes_written;
        }

        Ok(written_len)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        trace!("syncing block device");

        self.borrow_device()?.sync().map_err(|e| {
            error!("block device sync error: {:?}", e);
            StorageError::Device(e)
        })
    }
}

impl<D> Seek for BlockStorage<'_, D>
where
    D: BlockDevice,
{
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let size = self.size()?;

        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
            SeekFrom::End(offset) => size.checked_add_signed(offset),
        }
        .filter(|new_pos| *new_pos <= size)
        .ok_or(StorageError::OutOfBounds)?;

        self.pos = new_pos;

        Ok(self.pos)
    }
}
