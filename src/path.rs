//! Paths on the card.
//!
//! Paths are Unix-like when converted to [`String`]s (the root directory is `/`, and the directory separator is `/`),
//! but DOS-like paths (`0:/LOGS\DATA.CSV`) are also accepted and converted to Unix-like when parsed

#[cfg(not(feature = "std"))]
use core::*;
#[cfg(feature = "std")]
use std::*;

use ::alloc::{
    collections::vec_deque::VecDeque,
    string::{String, ToString},
    vec::Vec,
};

// A (not yet complete) list of all the forbidden filename/directory name characters
// See https://stackoverflow.com/a/31976060/
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', ',', '?', '*'];
const RESERVED_FILENAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Why a path was rejected
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display)]
pub enum PathError {
    /// The name `{0}` contains a forbidden character
    ForbiddenCharacter(String),
    /// The name `{0}` is reserved
    ReservedName(String),
    /// Expected a path to a file or directory, found the root directory
    IsRoot,
}

/// Check whether a single file or directory name is allowed on the card
pub fn check_name(name: &str) -> Result<(), PathError> {
    if name
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c))
    {
        return Err(PathError::ForbiddenCharacter(name.to_string()));
    }

    // "CON.TXT" is just as reserved as "CON"
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    if RESERVED_FILENAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        return Err(PathError::ReservedName(name.to_string()));
    }

    Ok(())
}

/// Strip a DOS-like logical drive prefix (e.g. `0:`) from the start of a path
fn strip_drive(path: &str) -> &str {
    match path.split_once(':') {
        Some((drive, rest)) if !drive.is_empty() && drive.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => path,
    }
}

/// An absolute, normalized path on the card
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardPath {
    inner: VecDeque<String>,
}

impl CardPath {
    /// The root directory
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path, relative to the root directory
    ///
    /// Separators may be `/` or `\`; repeated separators and `.` are ignored,
    /// `..` goes up a level (but never above the root)
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let mut inner = VecDeque::new();

        for component in strip_drive(path).split(['\\', '/']) {
            match component {
                "" | "." => continue,
                ".." => {
                    inner.pop_back();
                }
                name => {
                    check_name(name)?;
                    inner.push_back(name.to_string());
                }
            }
        }

        Ok(Self { inner })
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// The last component of this path, [`None`] for the root directory
    pub fn file_name(&self) -> Option<&str> {
        self.inner.back().map(String::as_str)
    }

    /// Returns the parent directory of the current [`CardPath`]
    pub fn parent(&self) -> CardPath {
        let mut parent = self.clone();
        parent.inner.pop_back();
        parent
    }

    /// Append a single name to this path
    pub fn join(&self, name: &str) -> Result<CardPath, PathError> {
        check_name(name)?;

        let mut joined = self.clone();
        joined.inner.push_back(name.to_string());
        Ok(joined)
    }

    /// The root-relative form the FAT library expects (`LOGS/DATA.CSV`, or an empty string for the root)
    pub fn to_fat_path(&self) -> String {
        self.inner.iter().cloned().collect::<Vec<_>>().join("/")
    }
}

impl fmt::Display for CardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.to_fat_path())
    }
}

#[test]
fn root_tostring() {
    assert_eq!(CardPath::root().to_string(), "/");
    assert_eq!(CardPath::parse("0:/").unwrap(), CardPath::root());
    assert_eq!(CardPath::parse("").unwrap().to_fat_path(), "");
}

#[test]
fn strips_drive_prefix() {
    let path = CardPath::parse("0:/LOGS/DATA.CSV").unwrap();

    assert_eq!(path.to_fat_path(), "LOGS/DATA.CSV");
    assert_eq!(path.to_string(), "/LOGS/DATA.CSV");
}

#[test]
fn ignore_multiple_separators() {
    let path = CardPath::parse("first/\\second\\\\/third//last/").unwrap();

    assert_eq!(path.to_string(), "/first/second/third/last")
}

#[test]
fn handles_dots() {
    let path = CardPath::parse("foo/./bar/../baz/../../../qux").unwrap();

    assert_eq!(path.to_string(), "/qux")
}

#[test]
fn catch_non_control_forbidden_chars() {
    #[cfg(not(feature = "std"))]
    use ::alloc::format;

    for c in FORBIDDEN_CHARS {
        let name = format!("bad{c}name");
        assert_eq!(
            CardPath::parse(&format!("/dir/{name}")),
            Err(PathError::ForbiddenCharacter(name.clone())),
            "unable to detect character {} (hex: {:#02x}) as forbidden",
            c,
            (*c as usize),
        );
    }

    assert!(CardPath::parse("tab\there").is_err());
}

#[test]
fn catch_reserved_names() {
    assert_eq!(
        CardPath::parse("/com1.txt"),
        Err(PathError::ReservedName("com1.txt".to_string()))
    );
    assert!(CardPath::parse("/NUL").is_err());
    // names merely containing a reserved word are fine
    assert!(CardPath::parse("/CONFIG.TXT").is_ok());
    assert!(CardPath::parse("/AUXILIARY.LOG").is_ok());
}

#[test]
fn parent_and_file_name() {
    let path = CardPath::parse("logs/2024/run.csv").unwrap();

    assert_eq!(path.file_name(), Some("run.csv"));
    assert_eq!(path.parent().to_string(), "/logs/2024");
    assert_eq!(CardPath::root().parent(), CardPath::root());
    assert_eq!(CardPath::root().file_name(), None);
    assert_eq!(
        path.parent().join("other.csv").unwrap().to_fat_path(),
        "logs/2024/other.csv"
    );
}
