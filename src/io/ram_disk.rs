use alloc::{vec, vec::Vec};

use super::{BlockDevice, BLOCK_SIZE};

/// An error returned by a [`RamDisk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
pub enum RamDiskError {
    /// Block range starting at {0} is out of range
    OutOfRange(u64),
    /// Buffer length isn't a multiple of the block size
    UnalignedBuffer,
}

/// A [`BlockDevice`] kept entirely in memory
///
/// Handy for tests and for staging a volume before copying it onto a card
#[derive(Debug, Clone)]
pub struct RamDisk {
    data: Vec<u8>,
    syncs: usize,
}

impl RamDisk {
    /// Create a zeroed disk of (at least) `size` bytes, rounded up to whole blocks
    pub fn new(size: usize) -> Self {
        let blocks = size.div_ceil(BLOCK_SIZE);
        Self {
            data: vec![0; blocks * BLOCK_SIZE],
            syncs: 0,
        }
    }

    /// Wrap an existing disk image, padding it to whole blocks
    pub fn from_image(mut image: Vec<u8>) -> Self {
        let blocks = image.len().div_ceil(BLOCK_SIZE);
        image.resize(blocks * BLOCK_SIZE, 0);
        Self {
            data: image,
            syncs: 0,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// How many times [`BlockDevice::sync`] has been called on this disk
    #[inline]
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    pub fn into_image(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, start_block: u64, len: usize) -> Result<core::ops::Range<usize>, RamDiskError> {
        if len % BLOCK_SIZE != 0 {
            return Err(RamDiskError::UnalignedBuffer);
        }

        let start = usize::try_from(start_block)
            .ok()
            .and_then(|block| block.checked_mul(BLOCK_SIZE))
            .ok_or(RamDiskError::OutOfRange(start_block))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(RamDiskError::OutOfRange(start_block))?;

        Ok(start..end)
    }
}

impl BlockDevice for RamDisk {
    type Error = RamDiskError;

    fn read_blocks(&mut self, start_block: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(start_block, buf.len())?;
        buf.copy_from_slice(&self.data[range]);

        Ok(())
    }

    fn write_blocks(&mut self, start_block: u64, buf: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(start_block, buf.len())?;
        self.data[range].copy_from_slice(buf);

        Ok(())
    }

    #[inline]
    fn block_count(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / BLOCK_SIZE) as u64)
    }

    #[inline]
    fn sync(&mut self) -> Result<(), Self::Error> {
        self.syncs += 1;

        Ok(())
    }
}
