mod config;
mod headless;
mod logger;
mod session;
mod subsystems;
#[cfg(feature = "window")]
mod window;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::session::{HostConsole, Session};

use libdiscboot::catalog::CatalogLimits;
use libdiscboot::console::Console;
use libdiscboot::disc::DiscImage;
use libdiscboot::disc_image::DirectoryImage;
use libdiscboot::iso_image::IsoImage;
use libdiscboot::menu::{CatalogSource, MenuState};
use libdiscboot::Result;

use log::{error, info, warn};
use std::path::{Path, PathBuf};

fn open_disc(path: &Path) -> Result<Box<dyn DiscImage>> {
	if path.is_dir() {
		let image = DirectoryImage::open(path.to_path_buf())?;
		info!("{}: {} files", path.display(), image.disc_paths().len());
		Ok(Box::new(image))
	} else {
		let image = IsoImage::open_path(path)?;
		info!("{}: {:?} sectors", path.display(), image.format());
		Ok(Box::new(image))
	}
}

fn start(config: &Config) -> Result<Session> {
	let image = open_disc(&config.disc)?;
	let mut console: HostConsole = Console::new(config.memory.to_map(), image, config.drive_speed)?;
	let limits = CatalogLimits { capacity: config.catalog_capacity };
	let mut menu = MenuState::new(CatalogSource::text(&config.root_catalog), limits);
	menu.manual_reload(&mut console)?;
	info!("{} titles", menu.current_catalog().len());
	Ok(Session::new(console, menu, config.clone()))
}

fn main() {
	let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
	let config = Config::load(&config_path);
	if let Err(e) = logger::init(config.log_level()) {
		eprintln!("Logger: {}", e);
	}

	let mut session = match start(&config) {
		Ok(session) => session,
		Err(e) => {
			error!("{}", e);
			std::process::exit(1);
		}
	};
	if let Err(e) = session.load_graphics() {
		warn!("Graphics archive: {}", e);
	}

	if config.headless {
		headless::run(session, &config);
		return;
	}
	#[cfg(feature = "window")]
	{
		if let Err(e) = window::run(session, &config) {
			error!("{}", e);
			std::process::exit(1);
		}
	}
	#[cfg(not(feature = "window"))]
	{
		warn!("Built without the window feature, running headless");
		headless::run(session, &config);
	}
}
