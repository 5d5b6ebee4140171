use std::io::{Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};
use log::debug;

use super::consts::*;
use super::error::Error;
use super::header::*;
use super::signature::archive_digest;

#[derive(Debug)]
pub(crate) struct Seeker<R: Read + Seek> {
    reader: R,
    archive_info: ArchiveInfo,
}

impl<R: Read + Seek> Seeker<R> {
    pub(crate) fn new(mut reader: R) -> Result<Seeker<R>, Error> {
        let archive_info = find_headers(&mut reader)?;

        Ok(Seeker {
            reader,
            archive_info,
        })
    }

    fn archive_offset(&self, offset: u64) -> u64 {
        offset + self.archive_info.header_offset
    }

    pub(crate) fn info(&self) -> &ArchiveInfo {
        &self.archive_info
    }

    /// Reads `size` bytes at `offset`, relative to the MPQ header.
    pub(crate) fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let offset = self.archive_offset(offset);

        if offset + size > self.archive_info.file_size {
            return Err(Error::Corrupted);
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact(&mut buf)?;

        Ok(buf)
    }

    /// The strong signature block directly following the archive, if any.
    pub(crate) fn strong_signature(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let archive_end = self.archive_offset(self.archive_info.archive_size);
        let block_size = STRONG_SIGNATURE_MAGIC.len() as u64 + STRONG_SIGNATURE_SIZE;

        if archive_end + block_size > self.archive_info.file_size {
            return Ok(None);
        }

        self.reader.seek(SeekFrom::Start(archive_end))?;
        let mut magic = [0u8; 4];
        self.reader.read_exact(&mut magic)?;

        if &magic != STRONG_SIGNATURE_MAGIC {
            return Ok(None);
        }

        let mut signature = vec![0u8; STRONG_SIGNATURE_SIZE as usize];
        self.reader.read_exact(&mut signature)?;

        Ok(Some(signature))
    }

    /// MD5 of the archive from its header to its end, with `excluded_size`
    /// bytes at `excluded_offset` hashed as zeros.
    pub(crate) fn archive_digest(
        &mut self,
        excluded_offset: u64,
        excluded_size: u64,
    ) -> Result<[u8; 16], Error> {
        let archive_start = self.archive_info.header_offset;
        let archive_end = self.archive_offset(self.archive_info.archive_size);

        if archive_end > self.archive_info.file_size {
            return Err(Error::Corrupted);
        }

        let excluded_start = self.archive_offset(excluded_offset);

        archive_digest(
            &mut self.reader,
            archive_start..archive_end,
            excluded_start..excluded_start + excluded_size,
        )
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct TableInfo {
    pub(crate) entries: u64,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct ArchiveInfo {
    pub(crate) hash_table_info: TableInfo,
    pub(crate) block_table_info: TableInfo,

    pub(crate) format_version: u16,
    pub(crate) header_size: u32,
    pub(crate) sector_size: u64,
    pub(crate) raw_chunk_size: u32,
    pub(crate) file_size: u64,
    pub(crate) archive_size: u64,
    pub(crate) header_offset: u64,
}

impl ArchiveInfo {
    fn new(file_size: u64, header_offset: u64, header: &FileHeader) -> ArchiveInfo {
        let hash_table_info = TableInfo {
            entries: u64::from(header.hash_table_entries),
            offset: u64::from(header.hash_table_offset),
            size: u64::from(header.hash_table_entries) * u64::from(HASH_TABLE_ENTRY_SIZE),
        };

        let block_table_info = TableInfo {
            entries: u64::from(header.block_table_entries),
            offset: u64::from(header.block_table_offset),
            size: u64::from(header.block_table_entries) * u64::from(BLOCK_TABLE_ENTRY_SIZE),
        };

        let sector_size = 512u64 << u64::from(header.sector_size_shift.min(23));

        ArchiveInfo {
            hash_table_info,
            block_table_info,
            format_version: header.format_version,
            header_size: header.header_size,
            sector_size,
            raw_chunk_size: header.raw_chunk_size,
            file_size,
            archive_size: header.archive_size,
            header_offset,
        }
    }
}

fn find_headers<R: Read + Seek>(mut reader: R) -> Result<ArchiveInfo, Error> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    let mut header: Option<FileHeader> = None;
    let mut file_header_offset: u64 = 0;
    let mut candidate = 0;
    while candidate + u64::from(HEADER_SIZE_V1) <= file_size {
        reader.seek(SeekFrom::Start(candidate))?;

        let magic = reader.read_u32::<LE>()?;

        if magic == HEADER_USER_MAGIC {
            let user_header = UserHeader::from_reader(&mut reader)?;
            file_header_offset = u64::from(user_header.file_header_offset) + candidate;

            if file_header_offset >= file_size {
                return Err(Error::Corrupted);
            }

            debug!(
                "user data header at 0x{:X} with {} bytes of user data",
                candidate, user_header.user_data_size
            );

            reader.seek(SeekFrom::Start(file_header_offset))?;
            let magic = reader.read_u32::<LE>()?;

            if magic != HEADER_MPQ_MAGIC {
                return Err(Error::Corrupted);
            }

            header = Some(FileHeader::from_reader(&mut reader)?);
            break;
        } else if magic == HEADER_MPQ_MAGIC {
            file_header_offset = candidate;
            header = Some(FileHeader::from_reader(&mut reader)?);
            break;
        }

        candidate += HEADER_BOUNDARY;
    }

    if let Some(header) = header {
        debug!(
            "found MPQ header v{} at 0x{:X}",
            header.format_version + 1,
            file_header_offset
        );

        Ok(ArchiveInfo::new(file_size, file_header_offset, &header))
    } else {
        Err(Error::NoHeader)
    }
}
