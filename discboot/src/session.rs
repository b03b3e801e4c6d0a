//! Front-end independent menu driving: input handling and the commit sequence that ends in the
//! jump to the chosen program.

use crate::config::{Config, MissingFilePolicy};
use crate::subsystems::{CallbackTable, HostAudio, InterruptMask};

use libdiscboot::archive::ArchiveIndex;
use libdiscboot::console::Console;
use libdiscboot::disc::DiscImage;
use libdiscboot::exe_loader::{begin_load, LoadRequest};
use libdiscboot::handoff::{ProgramEntry, Subsystem};
use libdiscboot::memory::WindowId;
use libdiscboot::menu::{ActivationOutcome, MenuState};
use libdiscboot::sector_reader::{read_range, ReadMode};
use libdiscboot::{BootError, Result};

use log::{error, info, warn};
use std::str::FromStr;

pub type HostConsole = Console<Box<dyn DiscImage>>;

const PAGE: isize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
	Up,
	Down,
	PageUp,
	PageDown,
	Confirm,
	Reload,
	Quit,
}

impl FromStr for Input {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Input, String> {
		match s.trim().to_ascii_lowercase().as_str() {
			"up" => Ok(Input::Up),
			"down" => Ok(Input::Down),
			"page-up" => Ok(Input::PageUp),
			"page-down" => Ok(Input::PageDown),
			"confirm" => Ok(Input::Confirm),
			"reload" => Ok(Input::Reload),
			"quit" => Ok(Input::Quit),
			other => Err(format!("unknown input {:?}", other)),
		}
	}
}

#[derive(Debug, PartialEq)]
pub enum Step {
	Continue,
	Launch(LoadRequest),
	Quit,
}

/// The two lines shown once a title is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
	pub heading: String,
	pub detail: String,
	pub is_error: bool,
}

impl Banner {
	pub fn now_playing(name: &str) -> Banner {
		Banner { heading: "Now Playing".to_string(), detail: name.to_string(), is_error: false }
	}

	pub fn missing_file(path: &str) -> Banner {
		Banner { heading: "ERROR! Cannot find file:".to_string(), detail: path.to_string(), is_error: true }
	}

	pub fn load_failed(error: &BootError) -> Banner {
		Banner { heading: "ERROR! Cannot load file:".to_string(), detail: error.to_string(), is_error: true }
	}
}

/// What a front-end has to provide for the commit sequence.
pub trait Presenter {
	/// Draws the menu with the screen faded to `brightness` (0 black, 255 full).
	fn draw_menu(&mut self, menu: &MenuState, brightness: u8);
	fn draw_banner(&mut self, banner: &Banner, brightness: u8);
	/// Holds the current screen forever.
	fn suspend(&mut self) -> !;
	fn as_subsystem(&mut self) -> &mut dyn Subsystem;
}

pub struct Session {
	pub console: HostConsole,
	pub menu: MenuState,
	pub audio: HostAudio,
	pub graphics: Vec<u8>,
	config: Config,
}

impl Session {
	pub fn new(console: HostConsole, menu: MenuState, config: Config) -> Session {
		Session { console, menu, audio: HostAudio::default(), graphics: vec![], config }
	}

	/// Reads the graphics archive into the staging window and keeps a copy, since staging gets
	/// reused for everything else.
	pub fn load_graphics(&mut self) -> Result<()> {
		let map = self.console.memory.map();
		let staging = map.window_start(WindowId::Staging, map.staging.size)?;
		let read = read_range(&mut self.console, &self.config.graphics_archive, staging, 0, 0, ReadMode::Block)?;
		let bytes = &self.console.memory.slice(&staging)[..read.bytes as usize];
		let index = ArchiveIndex::parse(bytes)?;
		info!("{}: {} sub-files", read.entry.path, index.count());
		self.graphics = bytes.to_vec();
		Ok(())
	}

	/// The font sub-file, if the graphics archive has one.
	pub fn font(&self) -> Option<&[u8]> {
		let index = ArchiveIndex::parse(&self.graphics).ok()?;
		let font = index.find(&self.config.font_entry).unwrap_or(0);
		index.data(font).ok()
	}

	pub fn handle(&mut self, input: Input) -> Step {
		match input {
			Input::Up => { self.menu.select(-1); }
			Input::Down => { self.menu.select(1); }
			Input::PageUp => { self.menu.select(-PAGE); }
			Input::PageDown => { self.menu.select(PAGE); }
			Input::Reload => {
				self.audio.stop();
				if let Err(e) = self.menu.manual_reload(&mut self.console) {
					error!("Reload failed: {}", e);
				}
			}
			Input::Confirm => return self.confirm(),
			Input::Quit => return Step::Quit,
		}
		Step::Continue
	}

	fn confirm(&mut self) -> Step {
		let outcome = match self.menu.activate(self.menu.selected_index()) {
			Ok(outcome) => outcome,
			Err(e) => {
				warn!("{}", e);
				return Step::Continue;
			}
		};
		match outcome {
			ActivationOutcome::PlayAudio(cue) => {
				if let Err(e) = self.audio.play(cue, &mut self.console) {
					warn!("Music failed: {}", e);
				}
			}
			ActivationOutcome::StopAudio => self.audio.stop(),
			ActivationOutcome::ReloadCatalog(source) => {
				self.audio.stop();
				if let Err(e) = self.menu.reload(&source, &mut self.console) {
					error!("Catalog load failed: {}", e);
				}
			}
			ActivationOutcome::LoadProgram(request) => return Step::Launch(request),
			ActivationOutcome::Nothing => {}
		}
		Step::Continue
	}

	/// Loads the program while the screen fades out, shows the banner and jumps into `entry`. Only
	/// comes back through the process exiting.
	pub fn launch<E: ProgramEntry>(mut self, request: LoadRequest, presenter: &mut dyn Presenter, input: &mut dyn Subsystem, entry: E) -> ! {
		let name = self.menu.selected().map(|title| title.name.to_string()).unwrap_or_default();
		self.audio.stop();
		let mut handle = begin_load(&mut self.console, request.clone());

		let frames = self.config.transition_frames.max(1);
		for frame in 0..frames {
			if let Ok(ref mut handle) = handle {
				handle.poll(&mut self.console);
			}
			presenter.draw_menu(&self.menu, 255 - fade_level(frame, frames));
		}

		let handle = match handle {
			Ok(handle) => handle,
			Err(e) => self.fail(&request, e, presenter),
		};
		let banner = Banner::now_playing(&name);
		self.show_banner(&banner, presenter, handle_poll);
		let program = match handle.wait(&mut self.console) {
			Ok(program) => program,
			Err(e) => self.fail(&request, e, presenter),
		};

		let mut callbacks = CallbackTable::new();
		let mut interrupts = InterruptMask::default();
		let Session { console, mut audio, .. } = self;
		let mut subsystems: [&mut dyn Subsystem; 5] = [
			&mut audio,
			presenter.as_subsystem(),
			input,
			&mut callbacks,
			&mut interrupts,
		];
		program.handoff(console, None, &mut subsystems, entry)
	}

	fn show_banner<F: FnMut(&mut HostConsole)>(&mut self, banner: &Banner, presenter: &mut dyn Presenter, mut each_frame: F) {
		let frames = self.config.banner_frames.max(1);
		for frame in 1..=frames {
			each_frame(&mut self.console);
			presenter.draw_banner(banner, fade_level(frame, frames));
		}
	}

	fn fail(&mut self, request: &LoadRequest, error: BootError, presenter: &mut dyn Presenter) -> ! {
		let banner = if error.is_not_found() {
			Banner::missing_file(&request.path)
		} else {
			Banner::load_failed(&error)
		};
		error!("{}", error);
		self.show_banner(&banner, presenter, |_| {});
		match self.config.missing_file {
			MissingFilePolicy::Suspend => {
				info!("Menu suspended.");
				presenter.suspend()
			}
			MissingFilePolicy::Exit => std::process::exit(1),
		}
	}
}

/// Brightness `frame` of `frames` into a fade in.
fn fade_level(frame: u32, frames: u32) -> u8 {
	(frame.min(frames) as u64 * 255 / frames.max(1) as u64) as u8
}

/// The drive keeps streaming the body while the banner fades in.
fn handle_poll(console: &mut HostConsole) {
	if let Err(e) = console.service() {
		warn!("Drive error: {}", e);
	}
}
