use core::num::NonZeroU32;

use fatfs::{Seek, SeekFrom, Write};
use log::{debug, trace, warn};

use super::{File, Volume};
use crate::error::*;
use crate::io::BlockDevice;
use crate::path::CardPath;
use crate::time::Clock;

/// An append-only logging session on a single file
///
/// The file is opened on the first [`append`](AppendLogger::append) and then kept open:
/// appends are batched and the file is only synced every `sync_interval` appends
/// (see [`SdConfig::sync_interval`](super::SdConfig::sync_interval)),
/// limiting card wear and write latency.
/// [`close`](AppendLogger::close) (or [`finish`](AppendLogger::finish)) syncs and releases the file;
/// appending after that starts a new session at the end of the file.
///
/// Dropping an open logger closes it, logging any error.
pub struct AppendLogger<'a, 'd, D, C>
where
    D: BlockDevice,
    C: Clock,
{
    volume: &'a Volume<'d, D, C>,
    path: CardPath,
    file: Option<File<'a, 'd, D, C>>,
    sync_interval: NonZeroU32,
    pending: u32,
    syncs: usize,
}

impl<'a, 'd, D, C> AppendLogger<'a, 'd, D, C>
where
    D: BlockDevice,
    C: Clock,
{
    pub(crate) fn new(volume: &'a Volume<'d, D, C>, path: CardPath, sync_interval: NonZeroU32) -> Self {
        Self {
            volume,
            path,
            file: None,
            sync_interval,
            pending: 0,
            syncs: 0,
        }
    }

    #[inline]
    pub fn path(&self) -> &CardPath {
        &self.path
    }

    /// Whether the log file is currently held open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The number of appends since the last sync
    #[inline]
    pub fn pending_writes(&self) -> u32 {
        self.pending
    }

    /// The number of syncs this logger has performed so far
    #[inline]
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    fn open(&mut self) -> SdResult<&mut File<'a, 'd, D, C>, D::Error> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let volume = self.volume;
                let mut file = volume.root_dir().create_file(&self.path.to_fat_path())?;
                let offset = file.seek(SeekFrom::End(0))?;

                debug!("opened log file {} at offset {}", self.path, offset);

                file
            }
        };

        Ok(self.file.insert(file))
    }

    /// Append `data` to the log file, syncing it once every `sync_interval` calls
    ///
    /// If writing fails, the file stays open and the next call tries again on it
    pub fn append(&mut self, data: &[u8]) -> SdResult<(), D::Error> {
        self.open()?.write_all(data)?;
        self.pending += 1;

        trace!(
            "appended {} bytes to {} ({} since last sync)",
            data.len(),
            self.path,
            self.pending
        );

        if self.pending >= self.sync_interval.get() {
            self.sync()?;
        }

        Ok(())
    }

    /// Append `data`, then [`close`](AppendLogger::close) the log file
    pub fn finish(&mut self, data: &[u8]) -> SdResult<(), D::Error> {
        self.append(data)?;
        self.close()
    }

    /// Sync the log file now, whatever the number of pending appends
    pub fn sync(&mut self) -> SdResult<(), D::Error> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            self.syncs += 1;

            trace!("synced log file {}", self.path);
        }
        self.pending = 0;

        Ok(())
    }

    /// Sync and close the log file. Closing a logger that isn't open does nothing
    pub fn close(&mut self) -> SdResult<(), D::Error> {
        if self.file.is_some() {
            self.sync()?;
            self.file = None;

            debug!("closed log file {}", self.path);
        }

        Ok(())
    }
}

impl<D, C> Drop for AppendLogger<'_, '_, D, C>
where
    D: BlockDevice,
    C: Clock,
{
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close log file {}: {}", self.path, e);
        }
    }
}
