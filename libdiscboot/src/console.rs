use crate::disc::{DiscDrive, DiscImage, TransferStatus};
use crate::error::Result;
use crate::memory::{MainMemory, MemoryMap};

/// The hardware the loader drives: main RAM and the disc drive that writes into it.
#[derive(Debug)]
pub struct Console<I: DiscImage> {
	pub memory: MainMemory,
	pub drive: DiscDrive<I>,
}

impl<I: DiscImage> Console<I> {
	pub fn new(map: MemoryMap, image: I, sectors_per_service: u32) -> Result<Console<I>> {
		Ok(Console {
			memory: MainMemory::new(map)?,
			drive: DiscDrive::new(image, sectors_per_service),
		})
	}

	/// One frame's worth of drive activity.
	pub fn service(&mut self) -> Result<TransferStatus> {
		self.drive.service(&mut self.memory)
	}

	pub fn sync(&mut self) -> Result<()> {
		self.drive.sync(&mut self.memory)
	}
}
