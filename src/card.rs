//! The SD card driver itself.
//!
//! Every operation is a thin forwarding call into the FAT library, with
//! logging along the way and library errors passed through unchanged.

mod config;
mod consts;
mod logger;

pub use config::*;
pub use consts::*;
pub use logger::*;

use core::cell::RefCell;
use core::fmt;

use alloc::{string::String, vec::Vec};

use bitflags::bitflags;
use fatfs::{FatType, FileAttributes, FileSystem, FsOptions, LossyOemCpConverter};
use fatfs::{Read, Seek, SeekFrom, Write};
use log::{debug, error, info, warn};

use crate::error::*;
use crate::io::{BlockDevice, BlockStorage};
use crate::path::{CardPath, PathError};
use crate::time::*;

/// A mounted FAT volume, as the FAT library sees it
pub type Volume<'d, D, C> =
    FileSystem<BlockStorage<'d, D>, ClockTimeProvider<C>, LossyOemCpConverter>;
pub(crate) type Dir<'a, 'd, D, C> =
    fatfs::Dir<'a, BlockStorage<'d, D>, ClockTimeProvider<C>, LossyOemCpConverter>;
pub(crate) type File<'a, 'd, D, C> =
    fatfs::File<'a, BlockStorage<'d, D>, ClockTimeProvider<C>, LossyOemCpConverter>;

bitflags! {
    /// Which directory entries [`SdCard::scan_dir`] lists
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanFilter: u8 {
        /// Regular files
        const FILES = 1;
        /// Subdirectories (`.` and `..` are never listed)
        const DIRECTORIES = 1 << 1;
        /// Entries with the hidden attribute
        const HIDDEN = 1 << 2;
        /// Entries with the system attribute
        const SYSTEM = 1 << 3;
    }
}

impl Default for ScanFilter {
    /// Every file, no directories
    fn default() -> Self {
        ScanFilter::FILES | ScanFilter::HIDDEN | ScanFilter::SYSTEM
    }
}

impl ScanFilter {
    fn accepts(&self, attributes: FileAttributes) -> bool {
        if attributes.contains(FileAttributes::VOLUME_ID) {
            return false;
        }
        if attributes.contains(FileAttributes::HIDDEN) && !self.contains(ScanFilter::HIDDEN) {
            return false;
        }
        if attributes.contains(FileAttributes::SYSTEM) && !self.contains(ScanFilter::SYSTEM) {
            return false;
        }

        if attributes.contains(FileAttributes::DIRECTORY) {
            self.contains(ScanFilter::DIRECTORIES)
        } else {
            self.contains(ScanFilter::FILES)
        }
    }
}

/// A directory entry, as returned by [`SdCard::scan_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub name: String,
    pub path: CardPath,
    /// Size in bytes (always 0 for directories)
    pub size: u64,
    pub is_dir: bool,
}

/// Space usage of a mounted volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdStats {
    pub fat_type: FatType,
    /// Cluster size, in bytes
    pub cluster_size: u32,
    pub total_clusters: u32,
    pub free_clusters: u32,
}

impl SdStats {
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.total_clusters) * u64::from(self.cluster_size)
    }

    #[inline]
    pub fn free_bytes(&self) -> u64 {
        u64::from(self.free_clusters) * u64::from(self.cluster_size)
    }

    #[inline]
    pub fn total_kib(&self) -> u64 {
        self.total_bytes() / 1024
    }

    #[inline]
    pub fn free_kib(&self) -> u64 {
        self.free_bytes() / 1024
    }
}

/// A step of [`SdCard::self_test`] that failed
#[derive(Debug)]
pub struct SelfTestFailure<E>
where
    E: fmt::Debug,
{
    pub step: &'static str,
    pub error: SdError<E>,
}

/// Compare two names the way FAT does: case-insensitively, non-ASCII letters included
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_uppercase)
        .eq(b.chars().flat_map(char::to_uppercase))
}

/// An SD card (or any other [`BlockDevice`]) holding a FAT volume
///
/// Operations on files need the card to be [mounted](SdCard::mount) and only borrow it,
/// so files and [`AppendLogger`]s can't outlive a mount: the borrow checker refuses
/// an [`unmount`](SdCard::unmount) or [`format`](SdCard::format) while one is still around.
pub struct SdCard<'d, D, C = DefaultClock>
where
    D: BlockDevice,
    C: Clock + Clone,
{
    device: &'d RefCell<D>,
    clock: C,
    config: SdConfig,
    volume: Option<Volume<'d, D, C>>,
}

impl<'d, D> SdCard<'d, D, DefaultClock>
where
    D: BlockDevice,
{
    /// Wrap a block device. Nothing is read from it until the card is mounted
    pub fn new(device: &'d RefCell<D>) -> Self {
        Self::with_clock(device, DefaultClock)
    }
}

impl<'d, D, C> SdCard<'d, D, C>
where
    D: BlockDevice,
    C: Clock + Clone,
{
    /// Wrap a block device, using `clock` to timestamp files
    pub fn with_clock(device: &'d RefCell<D>, clock: C) -> Self {
        Self {
            device,
            clock,
            config: SdConfig::default(),
            volume: None,
        }
    }

    /// Replace the configuration. Takes effect on the next mount, format or logger
    pub fn with_config(mut self, config: SdConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn config(&self) -> &SdConfig {
        &self.config
    }

    #[inline]
    pub fn set_config(&mut self, config: SdConfig) {
        self.config = config;
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    /// The mounted volume, for anything this driver doesn't wrap
    pub fn volume(&self) -> SdResult<&Volume<'d, D, C>, D::Error> {
        self.volume.as_ref().ok_or(SdError::NotMounted)
    }

    fn root_dir(&self) -> SdResult<Dir<'_, 'd, D, C>, D::Error> {
        Ok(self.volume()?.root_dir())
    }

    fn open_dir(&self, path: &CardPath) -> SdResult<Dir<'_, 'd, D, C>, D::Error> {
        let root = self.root_dir()?;

        if path.is_root() {
            Ok(root)
        } else {
            Ok(root.open_dir(&path.to_fat_path())?)
        }
    }

    /// Parse a path that must name a file or directory (i.e. not the root)
    fn entry_path(path: &str) -> Result<CardPath, PathError> {
        let path = CardPath::parse(path)?;

        if path.is_root() {
            return Err(PathError::IsRoot);
        }

        Ok(path)
    }

    /// Mount the volume
    ///
    /// Mounting an already mounted card flushes and remounts it.
    /// If mounting fails, the card is left unmounted
    pub fn mount(&mut self) -> SdResult<(), D::Error> {
        if self.is_mounted() {
            debug!("SD card already mounted, remounting");
            self.unmount()?;
        }

        let options = FsOptions::new()
            .update_accessed_date(self.config.update_accessed_date)
            .time_provider(ClockTimeProvider::new(self.clock.clone()));

        let volume: Volume<'d, D, C> = FileSystem::new(BlockStorage::new(self.device), options)
            .map_err(|e| {
                error!("mount error ({:?})", e);
                SdError::from(e)
            })?;

        info!("SD card mounted ({:?})", volume.fat_type());
        self.volume = Some(volume);

        Ok(())
    }

    /// Flush everything and unmount the volume
    ///
    /// Unmounting a card that isn't mounted does nothing.
    /// The card counts as unmounted afterwards, even if flushing failed
    pub fn unmount(&mut self) -> SdResult<(), D::Error> {
        match self.volume.take() {
            Some(volume) => {
                volume.unmount().map_err(|e| {
                    error!("unmount error ({:?})", e);
                    SdError::from(e)
                })?;
                info!("SD card unmounted");
            }
            None => debug!("SD card isn't mounted, nothing to unmount"),
        }

        Ok(())
    }

    /// Re-format the whole card with a fresh FAT volume (time consuming)
    ///
    /// A mounted card is unmounted first and stays unmounted afterwards
    pub fn format(&mut self) -> SdResult<(), D::Error> {
        self.unmount()?;

        info!("formatting SD card");

        let mut storage = BlockStorage::new(self.device);
        fatfs::format_volume(&mut storage, self.config.format.to_options()).map_err(|e| {
            error!("format error ({:?})", e);
            SdError::from(e)
        })?;

        info!("SD card formatted");

        Ok(())
    }

    /// Retrieve total and free space on the volume
    pub fn stats(&self) -> SdResult<SdStats, D::Error> {
        let volume = self.volume()?;
        let fs_stats = volume.stats()?;

        let stats = SdStats {
            fat_type: volume.fat_type(),
            cluster_size: fs_stats.cluster_size(),
            total_clusters: fs_stats.total_clusters(),
            free_clusters: fs_stats.free_clusters(),
        };

        info!(
            "SD card stats:\n{:>10} KiB total drive space.\n{:>10} KiB available.",
            stats.total_kib(),
            stats.free_kib()
        );

        Ok(stats)
    }

    /// List the files in the root directory, skipping any directories
    pub fn scan(&self) -> SdResult<Vec<ScanEntry>, D::Error> {
        info!("--- ROOT FILE LIST ---");

        let entries = self.scan_dir("/", ScanFilter::default())?;
        for entry in &entries {
            info!("File: {}", entry.path);
        }

        Ok(entries)
    }

    /// List the entries of a directory that pass `filter`
    pub fn scan_dir(&self, path: &str, filter: ScanFilter) -> SdResult<Vec<ScanEntry>, D::Error> {
        let path = CardPath::parse(path)?;
        let dir = self.open_dir(&path)?;

        let mut entries = Vec::new();
        for entry in dir.iter() {
            let entry = entry?;
            let name = entry.file_name();

            if name == "." || name == ".." || !filter.accepts(entry.attributes()) {
                continue;
            }

            let entry_path = match path.join(&name) {
                Ok(entry_path) => entry_path,
                Err(e) => {
                    warn!("skipping entry with unusable name in {}: {}", path, e);
                    continue;
                }
            };

            entries.push(ScanEntry {
                path: entry_path,
                size: if entry.is_dir() { 0 } else { entry.len() },
                is_dir: entry.is_dir(),
                name,
            });
        }

        debug!("{} entries listed in {}", entries.len(), path);

        Ok(entries)
    }

    fn entry_exists(&self, path: &CardPath) -> SdResult<bool, D::Error> {
        let Some(name) = path.file_name() else {
            return Ok(true);
        };

        let parent = match self.open_dir(&path.parent()) {
            Ok(parent) => parent,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        for entry in parent.iter() {
            let entry = entry?;

            if eq_ignore_case(&entry.file_name(), name)
                || eq_ignore_case(&entry.short_file_name(), name)
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Whether a file or directory exists at `path`
    pub fn exists(&self, path: &str) -> SdResult<bool, D::Error> {
        self.volume()?;

        self.entry_exists(&CardPath::parse(path)?)
    }

    /// Create a new, empty file
    ///
    /// Fails with [`fatfs::Error::AlreadyExists`] if anything already exists under that name
    pub fn create_file(&self, path: &str) -> SdResult<(), D::Error> {
        let path = Self::entry_path(path)?;

        if self.entry_exists(&path)? {
            debug!("not creating {}: it already exists", path);
            return Err(SdError::Fs(fatfs::Error::AlreadyExists));
        }

        let mut file = self.root_dir()?.create_file(&path.to_fat_path())?;
        file.flush()?;

        debug!("created file {}", path);

        Ok(())
    }

    /// Create a new directory
    pub fn create_dir(&self, path: &str) -> SdResult<(), D::Error> {
        let path = Self::entry_path(path)?;

        self.root_dir()?.create_dir(&path.to_fat_path())?;

        debug!("created directory {}", path);

        Ok(())
    }

    /// Delete a file or an empty directory
    pub fn delete_file(&self, path: &str) -> SdResult<(), D::Error> {
        let path = Self::entry_path(path)?;

        self.root_dir()?.remove(&path.to_fat_path())?;

        debug!("deleted {}", path);

        Ok(())
    }

    /// Read a whole file into memory
    pub fn read_file(&self, path: &str) -> SdResult<Vec<u8>, D::Error> {
        let path = Self::entry_path(path)?;
        let mut file = self.root_dir()?.open_file(&path.to_fat_path())?;

        let mut data = Vec::new();
        let mut chunk = [0_u8; READ_CHUNK_SIZE];
        loop {
            let bytes_read = file.read(&mut chunk)?;
            if bytes_read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..bytes_read]);
        }

        debug!("read {} bytes from {}", data.len(), path);

        Ok(data)
    }

    /// Create or truncate a file and write `data` to it
    pub fn write_file(&self, path: &str, data: &[u8]) -> SdResult<(), D::Error> {
        let path = Self::entry_path(path)?;
        let mut file = self.root_dir()?.create_file(&path.to_fat_path())?;

        file.truncate()?;
        file.write_all(data)?;
        file.flush()?;

        debug!("wrote {} bytes to {}", data.len(), path);

        Ok(())
    }

    /// Append `data` to a file (creating it if needed) and close it again
    ///
    /// For repeated appends to the same file, an [`AppendLogger`] avoids
    /// re-opening and syncing the file every time
    pub fn append_file(&self, path: &str, data: &[u8]) -> SdResult<(), D::Error> {
        let path = Self::entry_path(path)?;
        let mut file = self.root_dir()?.create_file(&path.to_fat_path())?;

        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        file.flush()?;

        debug!("appended {} bytes to {}", data.len(), path);

        Ok(())
    }

    /// Start an append logging session on the file at `path`
    ///
    /// The file is opened (and created if needed) on the first append
    pub fn logger(&self, path: &str) -> SdResult<AppendLogger<'_, 'd, D, C>, D::Error> {
        let path = Self::entry_path(path)?;

        Ok(AppendLogger::new(
            self.volume()?,
            path,
            self.config.sync_interval,
        ))
    }

    /// Read the first line (at most [`TEST_READ_LEN`] bytes) of [`TEST_READ_FILE`]
    pub fn test_read(&self) -> SdResult<String, D::Error> {
        info!("--- TEST READ FILE ---");

        let mut file = self.root_dir()?.open_file(TEST_READ_FILE)?;
        info!("**Opened file: '{}'**", TEST_READ_FILE);

        let mut line = Vec::with_capacity(TEST_READ_LEN);
        let mut byte = [0_u8; 1];
        while line.len() < TEST_READ_LEN {
            if file.read(&mut byte)? == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }

        let line = String::from_utf8_lossy(&line).into_owned();
        if line.is_empty() {
            warn!("nothing to read from '{}'", TEST_READ_FILE);
        } else {
            info!(
                "Read {} bytes from '{}': {}",
                line.len(),
                TEST_READ_FILE,
                line
            );
        }

        drop(file);
        info!("**Closed file: '{}'**", TEST_READ_FILE);

        Ok(line)
    }

    /// Create (or truncate) [`TEST_WRITE_FILE`] and write [`TEST_WRITE_CONTENT`] to it
    pub fn test_write(&self) -> SdResult<usize, D::Error> {
        info!("--- TEST WRITE FILE ---");

        let mut file = self.root_dir()?.create_file(TEST_WRITE_FILE)?;
        file.truncate()?;
        info!("**Opened file: '{}'**", TEST_WRITE_FILE);

        file.write_all(TEST_WRITE_CONTENT)?;
        info!(
            "Wrote {} bytes to '{}'",
            TEST_WRITE_CONTENT.len(),
            TEST_WRITE_FILE
        );

        file.flush()?;
        drop(file);
        info!("**Closed file: '{}'**", TEST_WRITE_FILE);

        Ok(TEST_WRITE_CONTENT.len())
    }

    /// Exercise the card: mount, stats, test read, test write, scan and unmount
    ///
    /// Every step runs even if an earlier one failed. Returns the failed steps
    pub fn self_test(&mut self) -> Vec<SelfTestFailure<D::Error>> {
        let mut failures = Vec::new();
        let mut record = |step: &'static str, result: SdResult<(), D::Error>| {
            if let Err(error) = result {
                error!("{} error ({})", step, error);
                failures.push(SelfTestFailure { step, error });
            }
        };

        let mounted = self.mount();
        if mounted.is_ok() {
            info!("SD Mounted");
        }
        record("mount", mounted);
        record("stats", self.stats().map(|_| ()));
        record("test_read", self.test_read().map(|_| ()));
        record("test_write", self.test_write().map(|_| ()));
        record("scan", self.scan().map(|_| ()));

        let unmounted = self.unmount();
        if unmounted.is_ok() {
            info!("SD Unmounted");
        }
        record("unmount", unmounted);

        failures
    }
}

impl<D, C> fmt::Debug for SdCard<'_, D, C>
where
    D: BlockDevice,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdCard")
            .field("mounted", &self.is_mounted())
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D, C> Drop for SdCard<'_, D, C>
where
    D: BlockDevice,
    C: Clock + Clone,
{
    fn drop(&mut self) {
        if let Err(e) = self.unmount() {
            warn!("failed to unmount SD card on drop: {}", e);
        }
    }
}
