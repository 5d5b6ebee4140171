use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek};

use log::debug;

use super::attributes::Attributes;
use super::compression::decode_mpq_block;
use super::consts::*;
use super::crypto::*;
use super::error::Error;
use super::locale::Locale;
use super::seeker::*;
use super::signature::verify_weak;
use super::table::*;
use super::util::*;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Header-level facts about an opened archive.
pub struct ArchiveMetadata {
    /// Zero-based format version, `0` meaning a v1 archive.
    pub format_version: u16,
    pub header_offset: u64,
    pub header_size: u32,
    pub archive_size: u64,
    pub sector_size: u32,
    pub raw_chunk_size: u32,
    /// Number of hash table slots, which caps the number of files.
    pub hash_table_size: u32,
    pub block_table_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    None,
    Weak,
    Strong,
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SignatureKind::None => "None",
            SignatureKind::Weak => "Weak",
            SignatureKind::Strong => "Strong",
        };

        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One live hash table entry of an archive, i.e. one (name, locale) variant.
pub struct FileEntry {
    /// File name, if it could be recovered from a list of known names.
    pub name: Option<String>,
    pub locale: Locale,
    pub hash_index: u32,
    pub block_index: u32,
    pub file_pos: u64,
    pub compressed_size: u64,
    pub file_size: u64,
    pub flags: u32,
}

impl FileEntry {
    /// The file name, or a `FileNNNNNNNN.xxx` placeholder for unnamed entries.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("File{:08}.xxx", self.block_index),
        }
    }
}

#[derive(Debug)]
/// Implementation of a MoPaQ archive viewer.
///
/// Will work on any reader that implements `Read + Seek`.
pub struct Archive<R: Read + Seek> {
    seeker: Seeker<R>,
    hash_table: FileHashTable,
    block_table: FileBlockTable,
}

impl<R: Read + Seek> Archive<R> {
    /// Try to open an MPQ archive from the specified `reader`.
    ///
    /// Immediately, this will perform the following:
    ///
    /// 1. Locate an MPQ header.
    /// 2. Locate and read the Hash Table.
    /// 3. Locate and read the Block Table.
    ///
    /// If any of these steps fail, the archive is deemed corrupted and
    /// an appropriate error is returned.
    pub fn open(reader: R) -> Result<Archive<R>, Error> {
        let mut seeker = Seeker::new(reader)?;

        let hash_table = FileHashTable::from_seeker(&mut seeker)?;
        let block_table = FileBlockTable::from_seeker(&mut seeker)?;

        debug!(
            "opened archive with {} hash slots and {} blocks",
            hash_table.len(),
            block_table.len()
        );

        Ok(Archive {
            seeker,
            hash_table,
            block_table,
        })
    }

    pub fn metadata(&self) -> ArchiveMetadata {
        let info = self.seeker.info();

        ArchiveMetadata {
            format_version: info.format_version,
            header_offset: info.header_offset,
            header_size: info.header_size,
            archive_size: info.archive_size,
            sector_size: info.sector_size as u32,
            raw_chunk_size: info.raw_chunk_size,
            hash_table_size: info.hash_table_info.entries as u32,
            block_table_size: info.block_table_info.entries as u32,
        }
    }

    /// Number of live files, counting every locale variant.
    pub fn file_count(&self) -> usize {
        self.live_entries().count()
    }

    fn live_entries(&self) -> impl Iterator<Item = (usize, &HashEntry, &BlockEntry)> {
        let block_table = &self.block_table;

        self.hash_table
            .live_entries()
            .filter_map(move |(index, hash_entry)| {
                block_table
                    .get(hash_entry.block_index as usize)
                    .filter(|block| block.exists())
                    .map(|block| (index, hash_entry, block))
            })
    }

    /// Whether `name` exists for exactly `locale`.
    pub fn has_file(&self, name: &str, locale: Locale) -> bool {
        self.hash_table.find_entry(name, locale.0).is_some()
    }

    /// All locales `name` is stored under, sorted by locale id.
    pub fn locales(&self, name: &str) -> Vec<Locale> {
        unique_locales(
            self.hash_table
                .find_all(name)
                .into_iter()
                .map(|(_, entry)| Locale(entry.locale)),
        )
    }

    /// Read a file's contents.
    ///
    /// Notably, the filename resolution algorithm
    /// is case-insensitive, and will treat backslashes (`\`) and forward slashes (`/`)
    /// as the same character.
    ///
    /// Only the locale-neutral variant of the file is considered.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        self.read_file_locale(name, Locale::NEUTRAL)
    }

    /// Reads the `locale` variant of a file, or the neutral variant when the
    /// file has no such locale.
    pub fn read_file_locale(&mut self, name: &str, locale: Locale) -> Result<Vec<u8>, Error> {
        let hash_entry = *self
            .hash_table
            .find_entry_or_neutral(name, locale.0)
            .ok_or(Error::FileNotFound)?;
        let block_entry = self
            .block_table
            .get(hash_entry.block_index as usize)
            .ok_or(Error::FileNotFound)?
            .clone();

        self.read_block(&block_entry, Some(name))
    }

    /// Reads the file behind an entry returned by [`entries`](#method.entries).
    ///
    /// Encrypted entries can only be read when their name is known.
    pub fn read_entry(&mut self, entry: &FileEntry) -> Result<Vec<u8>, Error> {
        let block_entry = self
            .block_table
            .get(entry.block_index as usize)
            .ok_or(Error::FileNotFound)?
            .clone();

        self.read_block(&block_entry, entry.name.as_ref().map(String::as_str))
    }

    /// Lists every live (name, locale) entry of the archive.
    ///
    /// Names come from the archive's `(listfile)`, the internal file names and
    /// `extra_names`. Entries none of them match are returned without a name.
    pub fn entries(&mut self, extra_names: &[String]) -> Result<Vec<FileEntry>, Error> {
        let mut candidates: Vec<String> = self.files().unwrap_or_default();
        candidates.extend(INTERNAL_FILE_NAMES.iter().map(|name| name.to_string()));
        candidates.extend(extra_names.iter().cloned());

        let mut names: HashMap<usize, String> = HashMap::new();
        for candidate in candidates {
            let candidate = normalize_archive_name(&candidate);
            for (index, _) in self.hash_table.find_all(&candidate) {
                names.entry(index).or_insert_with(|| candidate.clone());
            }
        }

        let entries = self
            .live_entries()
            .map(|(index, hash_entry, block_entry)| FileEntry {
                name: names.get(&index).cloned(),
                locale: Locale(hash_entry.locale),
                hash_index: index as u32,
                block_index: hash_entry.block_index,
                file_pos: block_entry.file_pos,
                compressed_size: block_entry.compressed_size,
                file_size: block_entry.uncompressed_size,
                flags: block_entry.flags,
            })
            .collect();

        Ok(entries)
    }

    /// If the archive contains a `(listfile)`, this will method
    /// parse it and return a `Vec` containing all known filenames.
    pub fn files(&mut self) -> Option<Vec<String>> {
        let listfile = self.read_file(LISTFILE_NAME).ok()?;
        let listfile = String::from_utf8_lossy(&listfile);

        let list = listfile
            .split(|c| c == '\r' || c == '\n' || c == ';')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Some(list)
    }

    /// Parses the archive's `(attributes)`, if it has one.
    pub fn attributes(&mut self) -> Result<Option<Attributes>, Error> {
        let data = match self.read_file(ATTRIBUTES_NAME) {
            Ok(data) => data,
            Err(Error::FileNotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        Attributes::parse(&data, self.block_table.len()).map(Some)
    }

    pub fn signature_kind(&mut self) -> Result<SignatureKind, Error> {
        if self.seeker.strong_signature()?.is_some() {
            Ok(SignatureKind::Strong)
        } else if self.has_file(SIGNATURE_NAME, Locale::NEUTRAL) {
            Ok(SignatureKind::Weak)
        } else {
            Ok(SignatureKind::None)
        }
    }

    /// The raw signature bytes of the kind [`signature_kind`](#method.signature_kind)
    /// reports: the 256-byte strong signature, or the 64 bytes of a weak one.
    pub fn signature(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if let Some(signature) = self.seeker.strong_signature()? {
            return Ok(Some(signature));
        }

        Ok(self
            .weak_signature_file()?
            .map(|(_, data)| data[WEAK_SIGNATURE_OFFSET..].to_vec()))
    }

    /// Checks the weak signature against the archive contents.
    ///
    /// Archives without a `(signature)`, or with an all-zero one, do not pass.
    pub fn verify_weak_signature(&mut self) -> Result<bool, Error> {
        let (block_entry, data) = match self.weak_signature_file()? {
            Some(file) => file,
            None => return Ok(false),
        };

        let signature = &data[WEAK_SIGNATURE_OFFSET..];
        if signature.iter().all(|byte| *byte == 0) {
            debug!("weak signature is empty");
            return Ok(false);
        }

        let digest = self
            .seeker
            .archive_digest(block_entry.file_pos, WEAK_SIGNATURE_FILE_SIZE)?;

        verify_weak(&digest, signature)
    }

    // a weak signature is stored as a plain 72-byte file
    fn weak_signature_file(&mut self) -> Result<Option<(BlockEntry, Vec<u8>)>, Error> {
        let block_entry = match self
            .hash_table
            .find_entry(SIGNATURE_NAME, Locale::NEUTRAL.0)
            .and_then(|entry| self.block_table.get(entry.block_index as usize))
        {
            Some(block_entry) if block_entry.exists() => block_entry.clone(),
            _ => return Ok(None),
        };

        if block_entry.compressed_size != WEAK_SIGNATURE_FILE_SIZE
            || block_entry.is_compressed()
            || block_entry.is_encrypted()
        {
            debug!(
                "(signature) is not a weak signature: {} bytes, flags 0x{:08X}",
                block_entry.compressed_size, block_entry.flags
            );
            return Ok(None);
        }

        let data = self
            .seeker
            .read(block_entry.file_pos, WEAK_SIGNATURE_FILE_SIZE)?;

        Ok(Some((block_entry, data)))
    }

    fn read_block(
        &mut self,
        block_entry: &BlockEntry,
        name: Option<&str>,
    ) -> Result<Vec<u8>, Error> {
        if !block_entry.exists() {
            return Err(Error::FileNotFound);
        }

        if block_entry.is_delete_marker() || block_entry.uncompressed_size == 0 {
            return Ok(Vec::new());
        }

        // calculate the file key
        let encryption_key = if block_entry.is_encrypted() {
            let name = name.ok_or(Error::MissingFileKey)?;
            Some(calculate_file_key(
                name,
                block_entry.file_pos as u32,
                block_entry.uncompressed_size as u32,
                block_entry.is_key_adjusted(),
            ))
        } else {
            None
        };

        if block_entry.is_single_unit() {
            let raw_data = self
                .seeker
                .read(block_entry.file_pos, block_entry.compressed_size)?;

            return decode_mpq_block(
                &raw_data,
                block_entry.uncompressed_size,
                encryption_key,
                block_entry.is_imploded(),
            );
        }

        let sector_size = self.seeker.info().sector_size;
        let sector_count = sector_count_from_size(block_entry.uncompressed_size, sector_size);

        if !block_entry.has_sector_table() {
            return self.read_plain_sectors(block_entry, encryption_key);
        }

        // read the sector offsets
        let sector_offsets = SectorOffsets::from_reader(
            &mut self.seeker,
            block_entry,
            sector_count,
            encryption_key.map(|k| k.wrapping_sub(1)),
        )?;

        // read out all the sectors
        let sector_range = sector_offsets.all();
        let raw_data = self.seeker.read(
            block_entry.file_pos + u64::from(sector_range.0),
            u64::from(sector_range.1),
        )?;

        let mut result = Vec::with_capacity(block_entry.uncompressed_size as usize);

        for i in 0..sector_offsets.count() {
            let (sector_start, sector_length) =
                sector_offsets.one(i).ok_or(Error::Corrupted)?;
            let slice_start = (sector_start - sector_range.0) as usize;
            let slice_end = slice_start + sector_length as usize;

            // the last sector is usually shorter than a full sector
            let remaining = block_entry.uncompressed_size - result.len() as u64;
            let uncompressed_size = remaining.min(sector_size);

            // decode the block and append it to the final result buffer
            let decoded_sector = decode_mpq_block(
                &raw_data[slice_start..slice_end],
                uncompressed_size,
                encryption_key.map(|k| k.wrapping_add(i as u32)),
                block_entry.is_imploded(),
            )?;

            result.extend_from_slice(&decoded_sector);
        }

        Ok(result)
    }

    fn read_plain_sectors(
        &mut self,
        block_entry: &BlockEntry,
        encryption_key: Option<u32>,
    ) -> Result<Vec<u8>, Error> {
        let mut data = self
            .seeker
            .read(block_entry.file_pos, block_entry.uncompressed_size)?;

        if let Some(key) = encryption_key {
            let sector_size = self.seeker.info().sector_size as usize;
            for (i, sector) in data.chunks_mut(sector_size).enumerate() {
                decrypt_mpq_block(sector, key.wrapping_add(i as u32));
            }
        }

        Ok(data)
    }
}

fn unique_locales<I: IntoIterator<Item = Locale>>(locales: I) -> Vec<Locale> {
    let mut locales: Vec<Locale> = locales.into_iter().collect();
    locales.sort();
    locales.dedup();
    locales
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_locales_collapse() {
        let german = Locale(0x407);
        let spanish = Locale(0x40A);

        assert_eq!(
            unique_locales(vec![german, Locale::NEUTRAL, spanish, german, Locale::NEUTRAL]),
            vec![Locale::NEUTRAL, german, spanish]
        );
        assert!(unique_locales(Vec::new()).is_empty());
    }
}
