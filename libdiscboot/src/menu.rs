//! Menu state: the current catalog, the selection, and what activating a title means.

use crate::catalog::{load_catalog, CatalogFormat, CatalogLimits, TitleCatalog};
use crate::console::Console;
use crate::disc::DiscImage;
use crate::error::{BootError, Result};
use crate::exe_loader::LoadRequest;
use crate::title::{AudioKind, Target, TitleRecord};

use log::{debug, info, warn};

pub const ROOT_CATALOG_PATH: &str = "\\PSFMENU\\TITLES.TXT";

/// Where a catalog comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSource {
	pub path: String,
	pub format: CatalogFormat,
	pub start_sector: u32,
	pub sector_count: u32,
}

impl CatalogSource {
	pub fn text(path: &str) -> CatalogSource {
		CatalogSource { path: path.to_string(), format: CatalogFormat::Text, start_sector: 0, sector_count: 0 }
	}

	fn from_record(record: &TitleRecord, format: CatalogFormat) -> CatalogSource {
		CatalogSource {
			path: record.path.to_string(),
			format,
			start_sector: record.start_sector,
			sector_count: record.sector_count,
		}
	}
}

/// What the audio engine should play. `resident` means the same archive is already loaded and
/// only the track changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioCue {
	pub kind: AudioKind,
	pub track: Option<u16>,
	pub path: String,
	pub start_sector: u32,
	pub sector_count: u32,
	pub resident: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
	PlayAudio(AudioCue),
	StopAudio,
	ReloadCatalog(CatalogSource),
	LoadProgram(LoadRequest),
	Nothing,
}

/// Identity of the music archive last started, to tell a track switch from a fresh load.
#[derive(Debug, Clone, PartialEq)]
struct MusicKey {
	path: String,
	start_sector: u32,
	sector_count: u32,
}

impl MusicKey {
	fn of(record: &TitleRecord) -> MusicKey {
		MusicKey { path: record.path.to_string(), start_sector: record.start_sector, sector_count: record.sector_count }
	}
}

#[derive(Debug)]
pub struct MenuState {
	catalog: TitleCatalog,
	scratch: TitleCatalog,
	selected: usize,
	root: CatalogSource,
	last_music: Option<MusicKey>,
}

impl MenuState {
	pub fn new(root: CatalogSource, limits: CatalogLimits) -> MenuState {
		MenuState {
			catalog: TitleCatalog::new(limits),
			scratch: TitleCatalog::new(limits),
			selected: 0,
			root,
			last_music: None,
		}
	}

	pub fn current_catalog(&self) -> &TitleCatalog {
		&self.catalog
	}

	pub fn selected_index(&self) -> usize {
		self.selected
	}

	pub fn selected(&self) -> Option<&TitleRecord> {
		self.catalog.get(self.selected)
	}

	/// Moves the selection, stopping at either end of the list.
	pub fn select(&mut self, delta: isize) -> usize {
		let last = self.catalog.len().saturating_sub(1) as isize;
		self.selected = (self.selected as isize).saturating_add(delta).max(0).min(last) as usize;
		self.selected
	}

	/// What selecting title `index` should do. Catalog redirects are returned for the caller to
	/// pass to `reload`, so the disc access happens where the caller can show progress.
	pub fn activate(&mut self, index: usize) -> Result<ActivationOutcome> {
		let record = *self.catalog.get(index).ok_or(BootError::NoSuchTitle(index))?;
		debug!("Activating {} ({}), target {:08x}", index, record.name, record.target.raw());
		let outcome = match record.target {
			Target::Silence => {
				self.last_music = None;
				ActivationOutcome::StopAudio
			}
			Target::Music(kind) => {
				self.last_music = None;
				ActivationOutcome::PlayAudio(AudioCue {
					kind,
					track: None,
					path: record.path.to_string(),
					start_sector: record.start_sector,
					sector_count: record.sector_count,
					resident: false,
				})
			}
			Target::Track(multi_track, track) => {
				let key = MusicKey::of(&record);
				let resident = self.last_music.as_ref() == Some(&key);
				self.last_music = Some(key);
				ActivationOutcome::PlayAudio(AudioCue {
					kind: multi_track.kind(),
					track: Some(track),
					path: record.path.to_string(),
					start_sector: record.start_sector,
					sector_count: record.sector_count,
					resident,
				})
			}
			Target::Reserved(raw) => {
				warn!("Title {} uses unsupported target {:08x}", index, raw);
				ActivationOutcome::Nothing
			}
			Target::TextCatalog => ActivationOutcome::ReloadCatalog(CatalogSource::from_record(&record, CatalogFormat::Text)),
			Target::BinaryCatalog => ActivationOutcome::ReloadCatalog(CatalogSource::from_record(&record, CatalogFormat::Binary)),
			Target::Load { stack } => ActivationOutcome::LoadProgram(LoadRequest {
				path: record.path.to_string(),
				start_sector: record.start_sector,
				sector_count: record.sector_count,
				stack_override: if stack != 0 { Some(stack) } else { None },
			}),
		};
		Ok(outcome)
	}

	/// Replaces the catalog with the one at `source`. On failure the current catalog and
	/// selection are left as they were.
	pub fn reload<I: DiscImage>(&mut self, source: &CatalogSource, console: &mut Console<I>) -> Result<()> {
		let result = load_catalog(
			console,
			&mut self.scratch,
			&source.path,
			source.format,
			source.start_sector,
			source.sector_count,
		);
		if let Err(err) = result {
			warn!("Catalog load failed for {}: {}", source.path, err);
			self.scratch.clear();
			return Err(err);
		}
		std::mem::swap(&mut self.catalog, &mut self.scratch);
		self.scratch.clear();
		self.selected = 0;
		self.last_music = None;
		info!("{} titles in {}", self.catalog.len(), source.path);
		Ok(())
	}

	/// Goes back to the root catalog.
	pub fn manual_reload<I: DiscImage>(&mut self, console: &mut Console<I>) -> Result<()> {
		let root = self.root.clone();
		self.reload(&root, console)
	}
}
