//! The one-way jump from the menu into a loaded program.

use crate::console::Console;
use crate::disc::DiscImage;
use crate::exe_loader::LoadedProgram;
use crate::memory::{MainMemory, WindowId};

use log::{debug, info, warn};

/// Something the menu owns that has to be quiet before the program takes over.
pub trait Subsystem {
	fn name(&self) -> &str;
	fn shutdown(&mut self);
}

/// Register state the program starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRegisters {
	pub pc: u32,
	pub gp: u32,
	pub sp: u32,
	pub fp: u32,
}

/// Whatever runs the program once the menu lets go. Never comes back.
pub trait ProgramEntry {
	fn enter(self, registers: EntryRegisters, memory: MainMemory) -> !;
}

impl LoadedProgram {
	/// Stack pointer the program will start with: the override, else the header's stack, else
	/// the platform default.
	pub fn select_stack(&self, stack_override: Option<u32>, default_stack_top: u32) -> u32 {
		stack_override
			.or(self.stack_override)
			.or_else(|| self.header.stack_top())
			.unwrap_or(default_stack_top)
	}

	/// Clears bss and works out the entry registers. Everything `handoff` does short of the jump.
	pub fn prepare(&self, memory: &mut MainMemory, stack_override: Option<u32>) -> EntryRegisters {
		let header = &self.header;
		if header.b_size > 0 {
			match memory.map().region(WindowId::Load, header.b_addr, header.b_size) {
				Ok(bss) => {
					debug!("Clearing bss 0x{:08x}+0x{:x}", header.b_addr, header.b_size);
					memory.fill(&bss, 0);
				}
				Err(err) => warn!("Leaving bss alone: {}", err),
			}
		}
		let sp = self.select_stack(stack_override, memory.map().default_stack_top);
		EntryRegisters { pc: header.pc0, gp: header.gp0, sp, fp: sp }
	}

	/// Shuts every subsystem down in order, then starts the program. The load must have been
	/// waited on first.
	pub fn handoff<I: DiscImage, E: ProgramEntry>(
		self,
		console: Console<I>,
		stack_override: Option<u32>,
		subsystems: &mut [&mut dyn Subsystem],
		entry: E,
	) -> ! {
		for subsystem in subsystems.iter_mut() {
			debug!("Stopping {}", subsystem.name());
			subsystem.shutdown();
		}
		let mut memory = console.memory;
		let registers = self.prepare(&mut memory, stack_override);
		info!("Executing {} at 0x{:08x}, stack 0x{:08x}", self.path, registers.pc, registers.sp);
		entry.enter(registers, memory)
	}
}
