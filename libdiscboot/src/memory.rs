//! Main RAM and the fixed windows the menu carves it into.
//!
//! There is no protection hardware: the only thing keeping an incoming program from overwriting
//! the menu while it is still running is that the windows below never overlap. The default map
//! is checked at compile time, custom maps with `MemoryMap::validate`.
//!
//! Default layout (KSEG0 addresses):
//!
//! | Window  | Start        | End          | Use                                      |
//! |---------|--------------|--------------|------------------------------------------|
//! | kernel  | `0x80000000` | `0x80010000` | BIOS/kernel work area, never touched     |
//! | load    | `0x80010000` | `0x801B2000` | executable images (up to 1672 KiB)       |
//! | menu    | `0x801B2000` | `0x801D0000` | the menu's own resident code and data    |
//! | staging | `0x801D0000` | `0x801F0000` | catalogs, archives and header sectors    |
//! | stack   | `0x801F0000` | `0x80200000` | menu stack, default program stack top    |

use crate::error::{BootError, Result};

pub const RAM_BASE: u32 = 0x8000_0000;
pub const RAM_SIZE: u32 = 0x20_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowId {
	Load,
	Menu,
	Staging,
}

impl WindowId {
	pub fn name(&self) -> &'static str {
		match self {
			WindowId::Load => "load",
			WindowId::Menu => "menu",
			WindowId::Staging => "staging",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
	pub base: u32,
	pub size: u32,
}

impl MemoryWindow {
	pub const fn new(base: u32, size: u32) -> MemoryWindow {
		MemoryWindow { base, size }
	}

	/// One past the last address. Computed in 64 bits so a window touching the top of the address
	/// space doesn't wrap.
	pub const fn end(&self) -> u64 {
		self.base as u64 + self.size as u64
	}

	pub const fn overlaps(&self, other: &MemoryWindow) -> bool {
		(self.base as u64) < other.end() && (other.base as u64) < self.end()
	}

	pub const fn contains(&self, address: u32, length: u32) -> bool {
		address >= self.base && address as u64 + length as u64 <= self.end()
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryMap {
	pub ram: MemoryWindow,
	pub load: MemoryWindow,
	pub menu: MemoryWindow,
	pub staging: MemoryWindow,
	/// Stack pointer handed to programs whose header and title both leave the stack unset.
	pub default_stack_top: u32,
}

impl MemoryMap {
	pub const DEFAULT: MemoryMap = MemoryMap {
		ram: MemoryWindow::new(RAM_BASE, RAM_SIZE),
		load: MemoryWindow::new(0x8001_0000, 0x001A_2000),
		menu: MemoryWindow::new(0x801B_2000, 0x0001_E000),
		staging: MemoryWindow::new(0x801D_0000, 0x0002_0000),
		default_stack_top: 0x801F_FFF0,
	};

	pub fn window(&self, id: WindowId) -> MemoryWindow {
		match id {
			WindowId::Load => self.load,
			WindowId::Menu => self.menu,
			WindowId::Staging => self.staging,
		}
	}

	/// True when every window lies inside RAM, no two windows overlap and the default stack top
	/// is outside the load window.
	pub const fn is_sound(&self) -> bool {
		let windows = [self.load, self.menu, self.staging];
		let mut i = 0;
		while i < windows.len() {
			if !self.ram.contains(windows[i].base, windows[i].size) {
				return false;
			}
			let mut j = i + 1;
			while j < windows.len() {
				if windows[i].overlaps(&windows[j]) {
					return false;
				}
				j += 1;
			}
			i += 1;
		}
		!self.load.contains(self.default_stack_top, 0) && self.ram.contains(self.default_stack_top, 0)
	}

	pub fn validate(&self) -> Result<()> {
		if self.is_sound() {
			Ok(())
		} else {
			Err(BootError::InvalidMemoryMap(format!("{:x?}", self)))
		}
	}

	/// Resolves `length` bytes at `address` to a region of window `id`.
	pub fn region(&self, id: WindowId, address: u32, length: u32) -> Result<Region> {
		if self.window(id).contains(address, length) {
			Ok(Region { window: id, address, length })
		} else {
			Err(BootError::OutsideWindow { window: id.name(), address, length })
		}
	}

	/// The first `length` bytes of window `id`.
	pub fn window_start(&self, id: WindowId, length: u32) -> Result<Region> {
		self.region(id, self.window(id).base, length)
	}
}

const _: () = assert!(MemoryMap::DEFAULT.is_sound());

impl Default for MemoryMap {
	fn default() -> MemoryMap {
		MemoryMap::DEFAULT
	}
}

/// A checked span of one window. Only `MemoryMap::region` hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
	window: WindowId,
	address: u32,
	length: u32,
}

impl Region {
	pub fn window(&self) -> WindowId {
		self.window
	}

	pub fn address(&self) -> u32 {
		self.address
	}

	pub fn len(&self) -> u32 {
		self.length
	}

	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// The sub-region starting `offset` bytes in.
	pub fn skip(&self, offset: u32) -> Region {
		let offset = offset.min(self.length);
		Region { window: self.window, address: self.address + offset, length: self.length - offset }
	}
}

/// Backing store for the whole of main RAM.
#[derive(Debug)]
pub struct MainMemory {
	map: MemoryMap,
	bytes: Vec<u8>,
}

impl MainMemory {
	pub fn new(map: MemoryMap) -> Result<MainMemory> {
		map.validate()?;
		Ok(MainMemory { map, bytes: vec![0; map.ram.size as usize] })
	}

	pub fn map(&self) -> &MemoryMap {
		&self.map
	}

	fn offset(&self, address: u32) -> usize {
		(address - self.map.ram.base) as usize
	}

	pub fn slice(&self, region: &Region) -> &[u8] {
		let start = self.offset(region.address);
		&self.bytes[start..start + region.length as usize]
	}

	pub fn slice_mut(&mut self, region: &Region) -> &mut [u8] {
		let start = self.offset(region.address);
		&mut self.bytes[start..start + region.length as usize]
	}

	pub fn fill(&mut self, region: &Region, value: u8) {
		self.slice_mut(region).iter_mut().for_each(|b| *b = value);
	}

	/// Raw RAM contents, for whoever takes over after the hand-off.
	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}
