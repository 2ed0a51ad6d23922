#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod card;
mod error;
pub mod io;
pub mod path;
mod time;

pub use card::*;
pub use error::*;
pub use self::time::*;

pub use fatfs::FatType;
