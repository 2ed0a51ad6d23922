use core::num::NonZeroU32;

use fatfs::{FatType, FormatVolumeOptions};

use super::consts::*;

/// How [`SdCard::format`](super::SdCard::format) lays out a new volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// Force a FAT type. Picked from the card size when [`None`]
    pub fat_type: Option<FatType>,
    /// Force a cluster size. Picked from the card size when [`None`]
    pub bytes_per_cluster: Option<u32>,
    /// Space-padded, upper-case volume label
    pub volume_label: [u8; 11],
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            fat_type: None,
            bytes_per_cluster: None,
            volume_label: DEFAULT_VOLUME_LABEL,
        }
    }
}

impl FormatConfig {
    pub fn with_fat_type(mut self, fat_type: FatType) -> Self {
        self.fat_type = Some(fat_type);
        self
    }

    pub fn with_bytes_per_cluster(mut self, bytes_per_cluster: u32) -> Self {
        self.bytes_per_cluster = Some(bytes_per_cluster);
        self
    }

    /// Set the volume label
    ///
    /// The label is upper-cased, then truncated or padded with spaces to 11 bytes
    pub fn with_volume_label(mut self, label: &str) -> Self {
        let mut volume_label = [b' '; 11];
        for (dst, src) in volume_label.iter_mut().zip(label.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.volume_label = volume_label;
        self
    }

    pub(crate) fn to_options(&self) -> FormatVolumeOptions {
        let mut options = FormatVolumeOptions::new().volume_label(self.volume_label);

        if let Some(fat_type) = self.fat_type {
            options = options.fat_type(fat_type);
        }
        if let Some(bytes_per_cluster) = self.bytes_per_cluster {
            options = options.bytes_per_cluster(bytes_per_cluster);
        }

        options
    }
}

/// Runtime configuration of an [`SdCard`](super::SdCard)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdConfig {
    /// How many appends an [`AppendLogger`](super::AppendLogger) batches before syncing
    pub sync_interval: NonZeroU32,
    /// Whether reading a file updates its last accessed date (costs a write per read)
    pub update_accessed_date: bool,
    pub format: FormatConfig,
}

impl Default for SdConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            update_accessed_date: false,
            format: FormatConfig::default(),
        }
    }
}

impl SdConfig {
    /// Sync loggers every `interval` appends. `0` is treated as `1` (sync on every append)
    pub fn with_sync_interval(mut self, interval: u32) -> Self {
        self.sync_interval = NonZeroU32::new(interval).unwrap_or(NonZeroU32::MIN);
        self
    }

    pub fn with_update_accessed_date(mut self, update: bool) -> Self {
        self.update_accessed_date = update;
        self
    }

    pub fn with_format(mut self, format: FormatConfig) -> Self {
        self.format = format;
        self
    }
}
