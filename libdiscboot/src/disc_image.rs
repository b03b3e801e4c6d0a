//! Disc images assembled from loose files: one held in memory, one mapped from a host directory.
//!
//! Both lay their files out back to back from sector 24 onward, each file starting on a fresh
//! sector, which is how a mastering tool would place them.

use crate::disc::{normalise_path, sectors_for_bytes, DiscImage, FileEntry, SECTOR_SIZE};
use crate::error::{BootError, Result};

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// System area plus volume descriptors.
const FIRST_FILE_LBA: u32 = 24;

#[derive(Debug, Clone)]
struct Extent {
	lba: u32,
	sectors: u32,
	size: u32,
}

/// Directory of a laid-out image: path lookup plus the extent list in sector order.
#[derive(Debug, Default)]
struct Layout {
	by_path: BTreeMap<String, usize>,
	extents: Vec<Extent>,
	paths: Vec<String>,
	next_lba: u32,
}

impl Layout {
	fn new() -> Layout {
		Layout { next_lba: FIRST_FILE_LBA, ..Default::default() }
	}

	fn push(&mut self, path: String, size: u32) -> usize {
		let index = self.extents.len();
		let sectors = sectors_for_bytes(size);
		self.extents.push(Extent { lba: self.next_lba, sectors, size });
		self.next_lba += sectors.max(1);
		self.by_path.insert(path.clone(), index);
		self.paths.push(path);
		index
	}

	fn lookup(&self, path: &str) -> Result<FileEntry> {
		match self.by_path.get(path) {
			Some(&index) => {
				let extent = &self.extents[index];
				Ok(FileEntry { path: self.paths[index].clone(), lba: extent.lba, size: extent.size })
			}
			None => Err(BootError::NotFound(path.to_string())),
		}
	}

	/// The file holding `lba`, and how far into it the sector is.
	fn locate(&self, lba: u32) -> Option<(usize, u32)> {
		let index = match self.extents.binary_search_by(|extent| extent.lba.cmp(&lba)) {
			Ok(index) => index,
			Err(0) => return None,
			Err(index) => index - 1,
		};
		let extent = &self.extents[index];
		if lba < extent.lba + extent.sectors {
			Some((index, lba - extent.lba))
		} else {
			None
		}
	}
}

/// Files held in memory. Used by tests and anything that assembles a disc on the fly.
#[derive(Debug)]
pub struct MemoryImage {
	layout: Layout,
	contents: Vec<Vec<u8>>,
}

impl MemoryImage {
	pub fn new() -> MemoryImage {
		MemoryImage { layout: Layout::new(), contents: vec![] }
	}

	/// Adds a file after the ones already on the disc and returns its first sector.
	pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> u32 {
		let index = self.layout.push(normalise_path(path), data.len() as u32);
		self.contents.push(data);
		self.layout.extents[index].lba
	}

	pub fn with_file(mut self, path: &str, data: Vec<u8>) -> MemoryImage {
		self.add_file(path, data);
		self
	}
}

impl DiscImage for MemoryImage {
	fn lookup(&mut self, path: &str) -> Result<FileEntry> {
		self.layout.lookup(path)
	}

	fn read_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()> {
		destination[..SECTOR_SIZE].iter_mut().for_each(|b| *b = 0);
		if let Some((index, sector)) = self.layout.locate(lba) {
			let data = &self.contents[index];
			let start = sector as usize * SECTOR_SIZE;
			let end = (start + SECTOR_SIZE).min(data.len());
			destination[..end - start].copy_from_slice(&data[start..end]);
		} else if lba >= self.sector_count() {
			return Err(BootError::SectorOutOfRange(lba));
		}
		Ok(())
	}

	fn sector_count(&self) -> u32 {
		self.layout.next_lba
	}
}

/// An 8.3 disc identifier. Directories only use the title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShortName {
	title: Vec<u8>,
	ext: Vec<u8>,
}

impl ShortName {
	fn disc_name(&self) -> String {
		let mut result = String::from_utf8_lossy(&self.title).into_owned();
		if !self.ext.is_empty() {
			result.push('.');
			result.push_str(&String::from_utf8_lossy(&self.ext));
		}
		result
	}
}

fn split_filename(filename: &[u8]) -> (&[u8], Option<&[u8]>) {
	if let Some(dot_pos) = filename.iter().rposition(|c| *c == b'.') {
		(&filename[..dot_pos], Some(&filename[dot_pos + 1..]))
	} else {
		(filename, None)
	}
}

/// Squeezes a host file name into 8.3 upper case. `extra_index` adds a `~N` tail to the title for
/// names that collide after truncation.
fn host_to_short_name(filename: &str, extra_index: Option<usize>) -> ShortName {
	let mut ascii_name = vec![];
	for c in filename.chars() {
		if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
			ascii_name.push((c as u8).to_ascii_uppercase());
		} else {
			ascii_name.push(b'_');
		}
	}
	let (file_title, file_ext) = split_filename(&ascii_name);
	let mut short_title = file_title.to_vec();
	short_title.truncate(8);
	let mut short_ext = file_ext.unwrap_or(&[]).to_vec();
	short_ext.truncate(3);

	let mut title_index_text = vec![];
	if let Some(extra_index) = extra_index {
		title_index_text.push(b'~');
		title_index_text.extend(extra_index.to_string().bytes());
	}
	let current_title_len = short_title.len() + title_index_text.len();
	if current_title_len > 8 {
		short_title.truncate(short_title.len() - (current_title_len - 8));
	}
	short_title.extend(&title_index_text);

	ShortName { title: short_title, ext: short_ext }
}

/// Hands out unique short names within one directory.
#[derive(Debug, Default)]
struct NameAllocator {
	taken: HashMap<PathBuf, HashSet<ShortName>>,
}

impl NameAllocator {
	fn allocate(&mut self, parent: &Path, host_name: &str, is_dir: bool) -> ShortName {
		let taken = self.taken.entry(parent.to_path_buf()).or_insert_with(HashSet::new);
		let shorten = |index| {
			let mut name = host_to_short_name(host_name, index);
			if is_dir {
				name.title.extend(name.ext.drain(..).take(8usize.saturating_sub(name.title.len())));
			}
			name
		};
		let mut name = shorten(None);
		let mut name_index = 1;
		while taken.contains(&name) {
			name = shorten(Some(name_index));
			name_index += 1;
		}
		taken.insert(name.clone());
		name
	}
}

/// A host directory presented as a disc. Names are mapped to 8.3 upper case at construction and
/// file contents are read from the host when their sectors are.
#[derive(Debug)]
pub struct DirectoryImage {
	layout: Layout,
	host_paths: Vec<PathBuf>,
	open_file: Option<(usize, std::fs::File)>,
}

impl DirectoryImage {
	pub fn open(root_path: PathBuf) -> Result<DirectoryImage> {
		if !root_path.is_dir() {
			return Err(BootError::InvalidImage(format!("{} is not a directory", root_path.display())));
		}
		let mut layout = Layout::new();
		let mut host_paths = vec![];
		let mut names = NameAllocator::default();
		let mut disc_dirs: HashMap<PathBuf, String> = HashMap::new();
		disc_dirs.insert(root_path.clone(), String::new());

		for entry in walkdir::WalkDir::new(&root_path).min_depth(1).sort_by_file_name() {
			let entry = entry.map_err(|e| BootError::InvalidImage(e.to_string()))?;
			let parent = entry.path().parent().unwrap_or(&root_path).to_path_buf();
			let parent_disc_path = match disc_dirs.get(&parent) {
				Some(path) => path.clone(),
				None => continue,
			};
			let host_name = entry.file_name().to_string_lossy().into_owned();
			let is_dir = entry.file_type().is_dir();
			let short_name = names.allocate(&parent, &host_name, is_dir);
			let disc_path = format!("{}\\{}", parent_disc_path, short_name.disc_name());
			if is_dir {
				disc_dirs.insert(entry.path().to_path_buf(), disc_path);
			} else if entry.file_type().is_file() {
				let size = entry.metadata().map_err(|e| BootError::InvalidImage(e.to_string()))?.len();
				if size > u32::MAX as u64 {
					return Err(BootError::InvalidImage(format!("{} is too large for a disc", entry.path().display())));
				}
				debug!("{} -> {}", entry.path().display(), disc_path);
				layout.push(disc_path, size as u32);
				host_paths.push(entry.path().to_path_buf());
			}
		}

		Ok(DirectoryImage { layout, host_paths, open_file: None })
	}

	/// Disc paths of every file, in sector order.
	pub fn disc_paths(&self) -> &[String] {
		&self.layout.paths
	}
}

impl DiscImage for DirectoryImage {
	fn lookup(&mut self, path: &str) -> Result<FileEntry> {
		self.layout.lookup(path)
	}

	fn read_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()> {
		destination[..SECTOR_SIZE].iter_mut().for_each(|b| *b = 0);
		let (index, sector) = match self.layout.locate(lba) {
			Some(found) => found,
			None if lba < self.sector_count() => return Ok(()),
			None => return Err(BootError::SectorOutOfRange(lba)),
		};
		if !matches!(self.open_file, Some((open_index, _)) if open_index == index) {
			self.open_file = Some((index, std::fs::File::open(&self.host_paths[index])?));
		}
		let file = match self.open_file.as_mut() {
			Some((_, file)) => file,
			None => return Ok(()),
		};
		file.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))?;
		let mut filled = 0;
		while filled < SECTOR_SIZE {
			match file.read(&mut destination[filled..SECTOR_SIZE])? {
				0 => break,
				read_count => filled += read_count,
			}
		}
		Ok(())
	}

	fn sector_count(&self) -> u32 {
		self.layout.next_lba
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test] fn test_short_names() {
		assert_eq!(host_to_short_name("foot.text", None).disc_name(), "FOOT.TEX");
		assert_eq!(host_to_short_name("foot.text2", Some(1)).disc_name(), "FOOT~1.TEX");
		assert_eq!(host_to_short_name("filewithlongname.txt", None).disc_name(), "FILEWITH.TXT");
		assert_eq!(host_to_short_name("filewithlongername.txt", Some(1)).disc_name(), "FILEWI~1.TXT");
		assert_eq!(host_to_short_name("my game.exe", None).disc_name(), "MY_GAME.EXE");
	}

	#[test] fn test_name_collisions() {
		let mut names = NameAllocator::default();
		let root = Path::new("/disc");
		assert_eq!(names.allocate(root, "filewithlongname.txt", false).disc_name(), "FILEWITH.TXT");
		assert_eq!(names.allocate(root, "filewithlongername.txt", false).disc_name(), "FILEWI~1.TXT");
		assert_eq!(names.allocate(root, "filewithlongerername.txt", false).disc_name(), "FILEWI~2.TXT");
		// Other directories have their own namespace.
		assert_eq!(names.allocate(Path::new("/disc/sub"), "filewithlongername.txt", false).disc_name(), "FILEWITH.TXT");
	}

	#[test] fn test_memory_image_layout() {
		let mut image = MemoryImage::new()
			.with_file("\\A.BIN", vec![1; 10])
			.with_file("\\B.BIN", vec![2; SECTOR_SIZE + 1])
			.with_file("\\EMPTY.BIN", vec![]);
		let a = image.lookup("\\A.BIN").unwrap();
		let b = image.lookup("\\B.BIN").unwrap();
		let empty = image.lookup("\\EMPTY.BIN").unwrap();
		assert_eq!(a.lba, FIRST_FILE_LBA);
		assert_eq!(b.lba, FIRST_FILE_LBA + 1);
		assert_eq!(b.sector_count(), 2);
		assert_eq!(empty.lba, FIRST_FILE_LBA + 3);
		assert_eq!(image.sector_count(), FIRST_FILE_LBA + 4);

		let mut sector = vec![0xaa; SECTOR_SIZE];
		image.read_sector(b.lba + 1, &mut sector).unwrap();
		assert_eq!(sector[0], 2);
		assert!(sector[1..].iter().all(|&b| b == 0));
		image.read_sector(0, &mut sector).unwrap();
		assert!(sector.iter().all(|&b| b == 0));
		assert!(matches!(image.read_sector(1000, &mut sector), Err(BootError::SectorOutOfRange(1000))));
	}

	#[test] fn test_directory_image() {
		let root = std::env::temp_dir().join(format!("discboot-dirimage-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&root);
		std::fs::create_dir_all(root.join("psfmenu")).unwrap();
		std::fs::write(root.join("psfmenu").join("titles.txt"), b"\"A\"\"B\"\"00000000\"").unwrap();
		let mut body = vec![0u8; SECTOR_SIZE];
		body.extend(vec![9u8; 100]);
		std::fs::write(root.join("game.exe"), &body).unwrap();

		let mut image = DirectoryImage::open(root.clone()).unwrap();
		assert_eq!(image.disc_paths(), &["\\GAME.EXE".to_string(), "\\PSFMENU\\TITLES.TXT".to_string()]);
		let game = image.lookup("\\GAME.EXE").unwrap();
		assert_eq!(game.size, SECTOR_SIZE as u32 + 100);
		let mut sector = vec![0; SECTOR_SIZE];
		image.read_sector(game.lba + 1, &mut sector).unwrap();
		assert_eq!(&sector[..100], &[9u8; 100][..]);
		assert_eq!(sector[100], 0);
		let titles = image.lookup("\\PSFMENU\\TITLES.TXT").unwrap();
		image.read_sector(titles.lba, &mut sector).unwrap();
		assert_eq!(sector[0], b'"');

		std::fs::remove_dir_all(&root).unwrap();
	}
}
