use std::env;
use std::path::PathBuf;
use std::process;

pub const IMAGE_SIZE: u64 = 8 * 1024 * 1024;

/// A disk image path in the temp dir, removed again when dropped
pub struct TempImage {
    path: PathBuf,
}

impl TempImage {
    pub fn new(name: &str) -> Self {
        let mut path = env::temp_dir();
        path.push(format!("simple-sdfat-{}-{}.img", process::id(), name));

        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
