//! Host stand-ins for the parts of the console the menu owns besides the loader.

use libdiscboot::console::Console;
use libdiscboot::disc::DiscImage;
use libdiscboot::handoff::{EntryRegisters, ProgramEntry, Subsystem};
use libdiscboot::memory::{MainMemory, WindowId};
use libdiscboot::menu::AudioCue;
use libdiscboot::sector_reader::{read_range, ReadMode};
use libdiscboot::Result;

use log::{debug, info, warn};
use std::path::PathBuf;

/// Background music. Music data is read into the staging window; playing it is left to a real
/// sound engine.
#[derive(Debug, Default)]
pub struct HostAudio {
	playing: Option<AudioCue>,
	loaded_bytes: u32,
}

impl HostAudio {
	pub fn play<I: DiscImage>(&mut self, cue: AudioCue, console: &mut Console<I>) -> Result<()> {
		if cue.resident {
			info!("Switching to track {:?} of {}", cue.track, cue.path);
		} else {
			let map = console.memory.map();
			let staging = map.window_start(WindowId::Staging, map.staging.size)?;
			let read = read_range(console, &cue.path, staging, cue.start_sector, cue.sector_count, ReadMode::Block)?;
			self.loaded_bytes = read.bytes;
			info!("Playing {:?} {} ({} bytes), track {:?}", cue.kind, cue.path, read.bytes, cue.track);
		}
		self.playing = Some(cue);
		Ok(())
	}

	pub fn stop(&mut self) {
		if let Some(cue) = self.playing.take() {
			debug!("Stopping {}", cue.path);
		}
		self.loaded_bytes = 0;
	}

	pub fn playing(&self) -> Option<&AudioCue> {
		self.playing.as_ref()
	}
}

impl Subsystem for HostAudio {
	fn name(&self) -> &str {
		"audio"
	}

	fn shutdown(&mut self) {
		self.stop();
	}
}

/// Vertical blank and disc callbacks the menu installed.
#[derive(Debug)]
pub struct CallbackTable {
	installed: Vec<&'static str>,
}

impl CallbackTable {
	pub fn new() -> CallbackTable {
		CallbackTable { installed: vec!["vsync", "cd-ready"] }
	}
}

impl Subsystem for CallbackTable {
	fn name(&self) -> &str {
		"callbacks"
	}

	fn shutdown(&mut self) {
		for callback in self.installed.drain(..) {
			debug!("Removed {} callback", callback);
		}
	}
}

#[derive(Debug, Default)]
pub struct InterruptMask {
	masked: bool,
}

impl Subsystem for InterruptMask {
	fn name(&self) -> &str {
		"interrupts"
	}

	fn shutdown(&mut self) {
		self.masked = true;
	}
}

/// Takes over once the menu jumps. The host has no CPU to run the program on, so it reports the
/// entry state and optionally saves RAM for an emulator to pick up.
pub struct HostEntry {
	pub memory_dump: Option<PathBuf>,
}

impl ProgramEntry for HostEntry {
	fn enter(self, registers: EntryRegisters, memory: MainMemory) -> ! {
		info!("pc=0x{:08x} gp=0x{:08x} sp=0x{:08x} fp=0x{:08x}", registers.pc, registers.gp, registers.sp, registers.fp);
		if let Some(path) = self.memory_dump {
			let base = memory.map().ram.base;
			match std::fs::write(&path, memory.into_bytes()) {
				Ok(()) => info!("RAM from 0x{:08x} written to {}", base, path.display()),
				Err(e) => warn!("Failed to write {}: {}", path.display(), e),
			}
		}
		std::process::exit(0)
	}
}
