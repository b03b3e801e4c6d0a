use libdiscboot::catalog::DEFAULT_CAPACITY;
use libdiscboot::memory::{MemoryMap, MemoryWindow};
use libdiscboot::menu::ROOT_CATALOG_PATH;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "discboot.toml";

/// What to do after showing the missing-file banner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilePolicy {
	/// Leave the banner up forever, like the console does.
	Suspend,
	/// Exit with a failure status.
	Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
	pub load_base: u32,
	pub load_size: u32,
	pub menu_base: u32,
	pub menu_size: u32,
	pub staging_base: u32,
	pub staging_size: u32,
	pub default_stack_top: u32,
}

impl Default for MemoryConfig {
	fn default() -> Self {
		let map = MemoryMap::DEFAULT;
		Self {
			load_base: map.load.base,
			load_size: map.load.size,
			menu_base: map.menu.base,
			menu_size: map.menu.size,
			staging_base: map.staging.base,
			staging_size: map.staging.size,
			default_stack_top: map.default_stack_top,
		}
	}
}

impl MemoryConfig {
	/// The configured map. Checked when main memory is created from it.
	pub fn to_map(&self) -> MemoryMap {
		MemoryMap {
			load: MemoryWindow::new(self.load_base, self.load_size),
			menu: MemoryWindow::new(self.menu_base, self.menu_size),
			staging: MemoryWindow::new(self.staging_base, self.staging_size),
			default_stack_top: self.default_stack_top,
			..MemoryMap::DEFAULT
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// An ISO image (2048 or 2352 bytes per sector) or a directory to present as a disc.
	pub disc: PathBuf,
	pub root_catalog: String,
	pub graphics_archive: String,
	/// Name of the font sub-file inside the graphics archive.
	pub font_entry: String,
	/// Sectors the drive moves per frame.
	pub drive_speed: u32,
	pub transition_frames: u32,
	pub banner_frames: u32,
	pub catalog_capacity: usize,
	pub window_scale: u32,
	/// Run without a window, driven by `script`.
	pub headless: bool,
	/// Inputs for the headless front-end: up, down, page-up, page-down, confirm, reload, quit.
	pub script: Vec<String>,
	pub log_level: String,
	pub missing_file: MissingFilePolicy,
	/// Where to write main RAM when a program is started.
	pub memory_dump: Option<PathBuf>,
	pub memory: MemoryConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			disc: PathBuf::from("disc"),
			root_catalog: ROOT_CATALOG_PATH.to_string(),
			graphics_archive: "\\PSFMENU\\GRAPHICS.QLP".to_string(),
			font_entry: "font.png".to_string(),
			drive_speed: 3,
			transition_frames: 32,
			banner_frames: 64,
			catalog_capacity: DEFAULT_CAPACITY,
			window_scale: 2,
			headless: !cfg!(feature = "window"),
			script: vec![],
			log_level: "info".to_string(),
			missing_file: MissingFilePolicy::Suspend,
			memory_dump: None,
			memory: MemoryConfig::default(),
		}
	}
}

impl Config {
	/// Loads the configuration from `path`, or returns a default if it fails.
	pub fn load(path: &Path) -> Self {
		match std::fs::read_to_string(path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(config) => config,
				Err(e) => {
					eprintln!("Ignoring {}: {}", path.display(), e);
					Self::default()
				}
			},
			Err(_) => Self::default(),
		}
	}

	pub fn log_level(&self) -> log::LevelFilter {
		self.log_level.parse().unwrap_or(log::LevelFilter::Info)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test] fn test_partial_file_keeps_defaults() {
		let config: Config = toml::from_str("disc = \"game.iso\"\nmissing_file = \"exit\"\n[memory]\nstaging_size = 4096\n").unwrap();
		assert_eq!(config.disc, PathBuf::from("game.iso"));
		assert_eq!(config.missing_file, MissingFilePolicy::Exit);
		assert_eq!(config.root_catalog, ROOT_CATALOG_PATH);
		assert_eq!(config.memory.staging_size, 4096);
		assert_eq!(config.memory.load_base, 0x8001_0000);
	}

	#[test] fn test_default_memory_round_trips() {
		assert_eq!(MemoryConfig::default().to_map(), MemoryMap::DEFAULT);
	}

	#[test] fn test_missing_file_gives_defaults() {
		let config = Config::load(Path::new("/nonexistent/discboot.toml"));
		assert_eq!(config, Config::default());
		assert_eq!(config.log_level(), log::LevelFilter::Info);
	}
}
