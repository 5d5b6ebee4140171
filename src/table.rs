use std::io::Error as IoError;
use std::io::{Read, Seek, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use super::consts::*;
use super::crypto::*;
use super::error::Error;
use super::seeker::*;

fn read_table<R>(seeker: &mut Seeker<R>, info: TableInfo, key: u32) -> Result<Vec<u8>, Error>
where
    R: Read + Seek,
{
    let mut data = seeker.read(info.offset, info.size)?;
    decrypt_mpq_block(&mut data, key);

    Ok(data)
}

#[derive(Debug)]
pub(crate) struct FileHashTable {
    entries: Vec<HashEntry>,
}

impl FileHashTable {
    pub fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<FileHashTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.info().hash_table_info;

        if !info.entries.is_power_of_two() {
            return Err(Error::Corrupted);
        }

        let decoded_data = read_table(seeker, info, HASH_TABLE_KEY)?;

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &decoded_data[..];
        for _ in 0..info.entries {
            entries.push(HashEntry::from_reader(&mut slice)?);
        }

        Ok(FileHashTable { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every hash entry that belongs to `name`, together with its index,
    /// in probe order.
    pub fn find_all(&self, name: &str) -> Vec<(usize, &HashEntry)> {
        let mut found = Vec::new();

        let hash_mask = self.entries.len() - 1;
        let part_a = hash_string(name.as_bytes(), MPQ_HASH_NAME_A);
        let part_b = hash_string(name.as_bytes(), MPQ_HASH_NAME_B);
        let index = hash_string(name.as_bytes(), MPQ_HASH_TABLE_INDEX) as usize;

        let start_index = index & hash_mask;
        let mut index = start_index;

        loop {
            let inspected = &self.entries[index];

            if inspected.block_index == HASH_TABLE_EMPTY_ENTRY {
                break;
            }

            if inspected.is_live() && inspected.hash_a == part_a && inspected.hash_b == part_b {
                found.push((index, inspected));
            }

            index = (index + 1) & hash_mask;
            if index == start_index {
                break;
            }
        }

        found
    }

    /// Finds the entry of `name` for exactly `locale`.
    pub fn find_entry(&self, name: &str, locale: u16) -> Option<&HashEntry> {
        self.find_all(name)
            .into_iter()
            .find(|(_, entry)| entry.locale == locale)
            .map(|(_, entry)| entry)
    }

    /// Finds the entry of `name` for `locale`, falling back to the neutral one.
    pub fn find_entry_or_neutral(&self, name: &str, locale: u16) -> Option<&HashEntry> {
        self.find_entry(name, locale)
            .or_else(|| self.find_entry(name, 0))
    }

    /// Iterates over all entries that point at a block, with their index.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &HashEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_live())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HashEntry {
    pub hash_a: u32,
    pub hash_b: u32,
    pub locale: u16,
    pub platform: u16,
    pub block_index: u32,
}

impl HashEntry {
    pub fn new(hash_a: u32, hash_b: u32, locale: u16, block_index: u32) -> HashEntry {
        HashEntry {
            hash_a,
            hash_b,
            locale,
            platform: 0,
            block_index,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<HashEntry, Error> {
        let hash_a = reader.read_u32::<LE>()?;
        let hash_b = reader.read_u32::<LE>()?;
        let locale = reader.read_u16::<LE>()?;
        let platform = reader.read_u16::<LE>()?;
        let block_index = reader.read_u32::<LE>()?;

        Ok(HashEntry {
            hash_a,
            hash_b,
            locale,
            platform,
            block_index,
        })
    }

    pub fn blank() -> HashEntry {
        HashEntry {
            hash_a: 0xFFFF_FFFF,
            hash_b: 0xFFFF_FFFF,
            locale: 0xFFFF,
            platform: 0xFFFF,
            block_index: HASH_TABLE_EMPTY_ENTRY,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.block_index == HASH_TABLE_EMPTY_ENTRY
    }

    pub fn is_live(&self) -> bool {
        self.block_index != HASH_TABLE_EMPTY_ENTRY && self.block_index != HASH_TABLE_DELETED_ENTRY
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        writer.write_u32::<LE>(self.hash_a)?;
        writer.write_u32::<LE>(self.hash_b)?;
        writer.write_u16::<LE>(self.locale)?;
        writer.write_u16::<LE>(self.platform)?;
        writer.write_u32::<LE>(self.block_index)?;

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FileBlockTable {
    entries: Vec<BlockEntry>,
}

impl FileBlockTable {
    pub fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<FileBlockTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.info().block_table_info;
        let decoded_data = read_table(seeker, info, BLOCK_TABLE_KEY)?;

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &decoded_data[..];
        for _ in 0..info.entries {
            entries.push(BlockEntry::from_reader(&mut slice)?);
        }

        Ok(FileBlockTable { entries })
    }

    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BlockEntry {
    pub file_pos: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub flags: u32,
}

impl BlockEntry {
    pub fn new(
        file_pos: u64,
        compressed_size: u64,
        uncompressed_size: u64,
        flags: u32,
    ) -> BlockEntry {
        BlockEntry {
            file_pos,
            compressed_size,
            uncompressed_size,
            flags,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<BlockEntry, Error> {
        let file_pos = u64::from(reader.read_u32::<LE>()?);
        let compressed_size = u64::from(reader.read_u32::<LE>()?);
        let uncompressed_size = u64::from(reader.read_u32::<LE>()?);
        let flags = reader.read_u32::<LE>()?;

        Ok(BlockEntry {
            file_pos,
            compressed_size,
            uncompressed_size,
            flags,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        writer.write_u32::<LE>(self.file_pos as u32)?;
        writer.write_u32::<LE>(self.compressed_size as u32)?;
        writer.write_u32::<LE>(self.uncompressed_size as u32)?;
        writer.write_u32::<LE>(self.flags)?;

        Ok(())
    }

    pub fn exists(&self) -> bool {
        (self.flags & MPQ_FILE_EXISTS) != 0
    }

    pub fn is_imploded(&self) -> bool {
        (self.flags & MPQ_FILE_IMPLODE) != 0
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS) != 0
    }

    /// Whether the file is split into sectors behind an offset table.
    pub fn has_sector_table(&self) -> bool {
        (self.is_compressed() || self.is_imploded()) && !self.is_single_unit()
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & MPQ_FILE_ENCRYPTED) != 0
    }

    pub fn is_key_adjusted(&self) -> bool {
        (self.flags & MPQ_FILE_KEY_V2) != 0
    }

    pub fn is_single_unit(&self) -> bool {
        (self.flags & MPQ_FILE_SINGLE_UNIT) != 0
    }

    pub fn is_delete_marker(&self) -> bool {
        (self.flags & MPQ_FILE_DELETE_MARKER) != 0
    }
}

#[derive(Debug)]
pub(crate) struct SectorOffsets {
    offsets: Vec<u32>,
}

impl SectorOffsets {
    pub fn from_reader<R>(
        seeker: &mut Seeker<R>,
        block_entry: &BlockEntry,
        sector_count: u64,
        encryption_key: Option<u32>,
    ) -> Result<SectorOffsets, Error>
    where
        R: Read + Seek,
    {
        let mut raw_data = seeker.read(block_entry.file_pos, (sector_count + 1) * 4)?;

        if let Some(encryption_key) = encryption_key {
            decrypt_mpq_block(&mut raw_data, encryption_key);
        }

        let mut slice = &raw_data[..];
        let mut offsets = Vec::with_capacity((sector_count + 1) as usize);
        for _ in 0..=sector_count {
            offsets.push(slice.read_u32::<LE>()?);
        }

        let ascending = offsets.windows(2).all(|pair| pair[0] <= pair[1]);
        let in_bounds = offsets
            .last()
            .map_or(false, |last| u64::from(*last) <= block_entry.compressed_size);

        if !ascending || !in_bounds {
            return Err(Error::Corrupted);
        }

        Ok(SectorOffsets { offsets })
    }

    /// Start and length of the sector at `index`, relative to the file start.
    pub fn one(&self, index: usize) -> Option<(u32, u32)> {
        if index + 1 >= self.offsets.len() {
            None
        } else {
            Some((
                self.offsets[index],
                self.offsets[index + 1] - self.offsets[index],
            ))
        }
    }

    /// Start and length of all sectors together.
    pub fn all(&self) -> (u32, u32) {
        let first = self.offsets.first().copied().unwrap_or(0);
        let last = self.offsets.last().copied().unwrap_or(0);

        (first, last - first)
    }

    pub fn count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}
