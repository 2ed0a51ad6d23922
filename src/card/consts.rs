use core::num::NonZeroU32;

/// The file read by [`SdCard::test_read`](super::SdCard::test_read)
pub const TEST_READ_FILE: &str = "test.txt";
/// The maximum number of bytes [`SdCard::test_read`](super::SdCard::test_read) reads
pub const TEST_READ_LEN: usize = 44;
/// The file created by [`SdCard::test_write`](super::SdCard::test_write)
pub const TEST_WRITE_FILE: &str = "write.txt";
/// What [`SdCard::test_write`](super::SdCard::test_write) writes
///
/// These are the 19 bytes of the text only, so the file holds no trailing NUL
/// (older firmware wrote 20 bytes, terminator included)
pub const TEST_WRITE_CONTENT: &[u8] = b"a new file is made!";

/// How many [`AppendLogger::append`](super::AppendLogger::append) calls happen between two syncs by default
pub const DEFAULT_SYNC_INTERVAL: NonZeroU32 = match NonZeroU32::new(10) {
    Some(interval) => interval,
    None => unreachable!(),
};

/// The label of freshly formatted volumes, unless configured otherwise
pub const DEFAULT_VOLUME_LABEL: [u8; 11] = *b"NO NAME    ";

/// The size of the chunks files are read in
pub(crate) const READ_CHUNK_SIZE: usize = 512;
