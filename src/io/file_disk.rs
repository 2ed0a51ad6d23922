use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use super::{BlockDevice, BLOCK_SIZE};

/// A [`BlockDevice`] backed by a regular file or a raw block device node
///
/// Useful for working with card images (or an unmounted card reader) on a host
#[derive(Debug)]
pub struct FileDisk {
    file: File,
}

impl FileDisk {
    /// Open an existing disk image or block device for reading and writing
    pub fn open<P>(path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        debug!("opening disk image {}", path.display());

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self { file })
    }

    /// Create (or truncate) a zero-filled disk image of `size` bytes, rounded up to whole blocks
    pub fn create<P>(path: P, size: u64) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        debug!("creating {} byte disk image {}", size, path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64)?;

        Ok(Self { file })
    }

    pub fn into_inner(self) -> File {
        self.file
    }

    fn seek_to_block(&mut self, block: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(block * BLOCK_SIZE as u64))?;

        Ok(())
    }
}

impl BlockDevice for FileDisk {
    type Error = io::Error;

    fn read_blocks(&mut self, start_block: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.seek_to_block(start_block)?;
        self.file.read_exact(buf)
    }

    fn write_blocks(&mut self, start_block: u64, buf: &[u8]) -> Result<(), Self::Error> {
        self.seek_to_block(start_block)?;
        self.file.write_all(buf)
    }

    fn block_count(&mut self) -> Result<u64, Self::Error> {
        // block device nodes report a zero length in their metadata
        let size = self.file.seek(SeekFrom::End(0))?;

        Ok(size / BLOCK_SIZE as u64)
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.file.sync_data()
    }
}
