pub mod archive;
pub mod catalog;
pub mod console;
pub mod disc;
pub mod disc_image;
pub mod error;
pub mod exe_loader;
pub mod handoff;
pub mod iso_image;
pub mod memory;
pub mod menu;
pub mod sector_reader;
pub mod title;

pub use crate::error::{BootError, Result};

// https://psx-spx.consoledev.net/cdromdrive/
// https://psx-spx.consoledev.net/kernelbios/#bios-file-functions
// - The kernel's LoadExec can't be relied on to load from disc, so executables are loaded by hand
//   and started with Exec semantics.
