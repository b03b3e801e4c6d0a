//! Indexed archives (`.QLP`): several sub-files packed into one disc file.
//!
//! ```text
//! word 0      reserved
//! word 1      sub-file count
//! word 2..    count x { name: [u8; 16], size: u32 bytes, offset: u32 words from the archive start }
//! ```

use crate::error::{BootError, Result};

use byteorder::{ByteOrder, LittleEndian};

const HEADER_SIZE: usize = 8;
const ENTRY_SIZE: usize = 24;
const NAME_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
	pub name: String,
	pub size: u32,
	pub offset_words: u32,
}

impl ArchiveEntry {
	pub fn byte_offset(&self) -> u64 {
		self.offset_words as u64 * 4
	}
}

/// A view over an archive already resident in memory. Offsets are resolved against whatever
/// buffer the archive was loaded into, so the same archive works at any address.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveIndex<'a> {
	bytes: &'a [u8],
	count: usize,
}

impl<'a> ArchiveIndex<'a> {
	pub fn parse(bytes: &'a [u8]) -> Result<ArchiveIndex<'a>> {
		if bytes.len() < HEADER_SIZE {
			return Err(BootError::InvalidImage("archive shorter than its header".to_string()));
		}
		let count = LittleEndian::read_u32(&bytes[4..8]) as usize;
		let table_end = count.checked_mul(ENTRY_SIZE).and_then(|table| table.checked_add(HEADER_SIZE));
		match table_end {
			Some(end) if end <= bytes.len() => Ok(ArchiveIndex { bytes, count }),
			_ => Err(BootError::InvalidImage(format!("archive index of {} entries runs past the data", count))),
		}
	}

	pub fn count(&self) -> usize {
		self.count
	}

	pub fn entry(&self, index: usize) -> Result<ArchiveEntry> {
		if index >= self.count {
			return Err(BootError::ArchiveIndex { index, count: self.count });
		}
		let record = &self.bytes[HEADER_SIZE + index * ENTRY_SIZE..HEADER_SIZE + (index + 1) * ENTRY_SIZE];
		let name = &record[..NAME_SIZE];
		let name_len = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
		Ok(ArchiveEntry {
			name: String::from_utf8_lossy(&name[..name_len]).into_owned(),
			size: LittleEndian::read_u32(&record[16..20]),
			offset_words: LittleEndian::read_u32(&record[20..24]),
		})
	}

	/// The bytes of sub-file `index`.
	pub fn data(&self, index: usize) -> Result<&'a [u8]> {
		let entry = self.entry(index)?;
		let start = entry.byte_offset();
		let end = start + entry.size as u64;
		if end > self.bytes.len() as u64 {
			return Err(BootError::InvalidImage(format!(
				"sub-file {} ({}) runs past the end of the archive", index, entry.name
			)));
		}
		Ok(&self.bytes[start as usize..end as usize])
	}

	/// Index of the first sub-file called `name`, ignoring case.
	pub fn find(&self, name: &str) -> Option<usize> {
		(0..self.count).find(|&index| match self.entry(index) {
			Ok(entry) => entry.name.eq_ignore_ascii_case(name),
			Err(_) => false,
		})
	}

	pub fn entries(&self) -> impl Iterator<Item = ArchiveEntry> + 'a {
		let index = *self;
		(0..self.count).filter_map(move |i| index.entry(i).ok())
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use byteorder::WriteBytesExt;

	/// Packs `files` the way the archive tool does, each sub-file word aligned.
	pub(crate) fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
		let mut header = vec![];
		header.write_u32::<LittleEndian>(0).unwrap();
		header.write_u32::<LittleEndian>(files.len() as u32).unwrap();
		let mut body = vec![];
		let body_start = HEADER_SIZE + files.len() * ENTRY_SIZE;
		for (name, data) in files {
			let mut raw_name = name.as_bytes().to_vec();
			raw_name.resize(NAME_SIZE, 0);
			header.extend(&raw_name);
			header.write_u32::<LittleEndian>(data.len() as u32).unwrap();
			header.write_u32::<LittleEndian>(((body_start + body.len()) / 4) as u32).unwrap();
			body.extend(*data);
			while body.len() % 4 != 0 {
				body.push(0);
			}
		}
		header.extend(body);
		header
	}

	#[test] fn test_archive_entries() {
		let archive = build_archive(&[("font.tim", &b"FONT!"[..]), ("banner.tim", &b"BANNER"[..])]);
		let index = ArchiveIndex::parse(&archive).unwrap();
		assert_eq!(index.count(), 2);
		let banner = index.entry(1).unwrap();
		assert_eq!(banner.name, "banner.tim");
		assert_eq!(banner.size, 6);
		assert_eq!(banner.offset_words, (8 + 2 * 24 + 8) / 4);
		assert_eq!(index.data(0).unwrap(), b"FONT!");
		assert_eq!(index.data(1).unwrap(), b"BANNER");
		assert_eq!(index.find("FONT.TIM"), Some(0));
		assert_eq!(index.find("missing"), None);
		assert_eq!(index.entries().count(), 2);
	}

	#[test] fn test_offsets_are_relative_to_the_buffer() {
		let archive = build_archive(&[("a", &b"abcd"[..]), ("b", &b"efgh"[..])]);
		// The same bytes resolve identically wherever they sit.
		let mut moved = vec![0xEE; 12];
		moved.extend(&archive);
		let index = ArchiveIndex::parse(&moved[12..]).unwrap();
		assert_eq!(index.data(1).unwrap(), b"efgh");
	}

	#[test] fn test_bad_indices() {
		let archive = build_archive(&[("a", &b"abcd"[..])]);
		let index = ArchiveIndex::parse(&archive).unwrap();
		assert!(matches!(index.entry(1), Err(BootError::ArchiveIndex { index: 1, count: 1 })));

		let mut truncated = archive.clone();
		truncated.truncate(archive.len() - 2);
		let index = ArchiveIndex::parse(&truncated).unwrap();
		assert!(matches!(index.data(0), Err(BootError::InvalidImage(_))));

		let mut lying = archive.clone();
		LittleEndian::write_u32(&mut lying[4..8], 100);
		assert!(ArchiveIndex::parse(&lying).is_err());
		assert!(ArchiveIndex::parse(&[0, 0, 0]).is_err());
	}
}
