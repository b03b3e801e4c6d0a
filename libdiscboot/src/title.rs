//! Title records and the 32-bit target word that says what selecting one does.

use crate::error::CatalogFault;

use std::borrow::Cow;
use std::fmt;

pub const NAME_CAPACITY: usize = 64;
pub const PATH_CAPACITY: usize = 52;

const TARGET_SILENCE: u32 = 0xFFFF_FF00;
const TARGET_MOD: u32 = 0xFFFF_FF01;
const TARGET_XM: u32 = 0xFFFF_FF02;
const TARGET_SEQ: u32 = 0xFFFF_FF03;
const TARGET_SEP: u32 = 0xFFFF_FF04;
const SEP_TRACK_MIN: u32 = 0x0100_0000;
const SEP_TRACK_MAX: u32 = 0x0100_FFFF;
const SEQ_TRACK_MIN: u32 = 0x0101_0000;
const SEQ_TRACK_MAX: u32 = 0x0101_FFFF;
const TARGET_DIRECTORY: u32 = 0xFFFF_FFFB;
const TARGET_BYTE_VFS: u32 = 0xFFFF_FFFC;
const TARGET_TEXT_IN_VFS: u32 = 0xFFFF_FFFD;
const TARGET_BINARY_CATALOG: u32 = 0xFFFF_FFFE;
const TARGET_TEXT_CATALOG: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
	Mod,
	Xm,
	Seq,
	Sep,
}

/// Music formats whose archives hold several tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiTrack {
	Sep,
	Seq,
}

impl MultiTrack {
	pub fn kind(&self) -> AudioKind {
		match self {
			MultiTrack::Sep => AudioKind::Sep,
			MultiTrack::Seq => AudioKind::Seq,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
	/// Stops any music; never loads anything.
	Silence,
	Music(AudioKind),
	Track(MultiTrack, u16),
	/// Sentinels that were allocated but never given a meaning. Selecting one does nothing.
	Reserved(u32),
	TextCatalog,
	BinaryCatalog,
	/// Load the program at the record's path. `stack` of 0 leaves the choice to the header.
	Load { stack: u32 },
}

impl Target {
	pub fn from_raw(raw: u32) -> Target {
		match raw {
			TARGET_SILENCE => Target::Silence,
			TARGET_MOD => Target::Music(AudioKind::Mod),
			TARGET_XM => Target::Music(AudioKind::Xm),
			TARGET_SEQ => Target::Music(AudioKind::Seq),
			TARGET_SEP => Target::Music(AudioKind::Sep),
			SEP_TRACK_MIN..=SEP_TRACK_MAX => Target::Track(MultiTrack::Sep, (raw - SEP_TRACK_MIN) as u16),
			SEQ_TRACK_MIN..=SEQ_TRACK_MAX => Target::Track(MultiTrack::Seq, (raw - SEQ_TRACK_MIN) as u16),
			TARGET_DIRECTORY | TARGET_BYTE_VFS | TARGET_TEXT_IN_VFS => Target::Reserved(raw),
			TARGET_BINARY_CATALOG => Target::BinaryCatalog,
			TARGET_TEXT_CATALOG => Target::TextCatalog,
			stack => Target::Load { stack },
		}
	}

	pub fn raw(&self) -> u32 {
		match *self {
			Target::Silence => TARGET_SILENCE,
			Target::Music(AudioKind::Mod) => TARGET_MOD,
			Target::Music(AudioKind::Xm) => TARGET_XM,
			Target::Music(AudioKind::Seq) => TARGET_SEQ,
			Target::Music(AudioKind::Sep) => TARGET_SEP,
			Target::Track(MultiTrack::Sep, track) => SEP_TRACK_MIN + track as u32,
			Target::Track(MultiTrack::Seq, track) => SEQ_TRACK_MIN + track as u32,
			Target::Reserved(raw) => raw,
			Target::TextCatalog => TARGET_TEXT_CATALOG,
			Target::BinaryCatalog => TARGET_BINARY_CATALOG,
			Target::Load { stack } => stack,
		}
	}
}

/// Decodes exactly eight upper-case hex digits, most significant first.
pub fn decode_hex(text: &[u8]) -> Result<u32, CatalogFault> {
	if text.len() != 8 {
		return Err(CatalogFault::AddressLength(text.len()));
	}
	let mut value = 0u32;
	for &c in text {
		let nibble = match c {
			b'0'..=b'9' => c - b'0',
			b'A'..=b'F' => c - b'A' + 10,
			_ => return Err(CatalogFault::AddressDigit(c)),
		};
		value = (value << 4) | nibble as u32;
	}
	Ok(value)
}

pub fn encode_hex(value: u32) -> String {
	format!("{:08X}", value)
}

/// Text in a fixed buffer of `N` bytes, as the catalog record layout stores it.
#[derive(Clone, Copy)]
pub struct FixedText<const N: usize> {
	bytes: [u8; N],
	len: usize,
}

impl<const N: usize> FixedText<N> {
	pub const CAPACITY: usize = N;

	pub fn new() -> FixedText<N> {
		FixedText { bytes: [0; N], len: 0 }
	}

	/// None when `bytes` doesn't fit.
	pub fn from_bytes(bytes: &[u8]) -> Option<FixedText<N>> {
		let mut text = FixedText::new();
		for &b in bytes {
			if !text.push(b) {
				return None;
			}
		}
		Some(text)
	}

	/// Appends one byte. False, and the text unchanged, when full.
	pub fn push(&mut self, b: u8) -> bool {
		if self.len == N {
			return false;
		}
		self.bytes[self.len] = b;
		self.len += 1;
		true
	}

	pub fn clear(&mut self) {
		self.bytes = [0; N];
		self.len = 0;
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes[..self.len]
	}

	pub fn to_str_lossy(&self) -> Cow<str> {
		String::from_utf8_lossy(self.as_bytes())
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

impl<const N: usize> Default for FixedText<N> {
	fn default() -> Self {
		FixedText::new()
	}
}

impl<const N: usize> PartialEq for FixedText<N> {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes() == other.as_bytes()
	}
}

impl<const N: usize> fmt::Debug for FixedText<N> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:?}", self.to_str_lossy())
	}
}

impl<const N: usize> fmt::Display for FixedText<N> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.to_str_lossy())
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleRecord {
	pub name: FixedText<NAME_CAPACITY>,
	pub path: FixedText<PATH_CAPACITY>,
	pub target: Target,
	/// Sectors into the file where this title's data starts.
	pub start_sector: u32,
	/// 0 means up to the end of the file.
	pub sector_count: u32,
}

impl TitleRecord {
	pub fn empty() -> TitleRecord {
		TitleRecord {
			name: FixedText::new(),
			path: FixedText::new(),
			target: Target::Silence,
			start_sector: 0,
			sector_count: 0,
		}
	}
}
