use std::io::Error as IoError;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use super::consts::*;
use super::error::Error;

/// Number of leading header bytes covered by the v4 header checksum.
const HEADER_MD5_COVERED: usize = 0xC0;

#[derive(Debug, Clone)]
pub(crate) struct FileHeader {
    pub header_size: u32,
    pub archive_size: u64,
    pub format_version: u16,
    pub sector_size_shift: u16,
    pub hash_table_offset: u32,
    pub block_table_offset: u32,
    pub hash_table_entries: u32,
    pub block_table_entries: u32,
    pub raw_chunk_size: u32,
    pub hash_table_md5: [u8; 16],
    pub block_table_md5: [u8; 16],
}

pub(crate) fn header_size_for_version(format_version: u16) -> Option<u32> {
    match format_version {
        MPQ_FORMAT_VERSION_1 => Some(HEADER_SIZE_V1),
        MPQ_FORMAT_VERSION_2 => Some(HEADER_SIZE_V2),
        MPQ_FORMAT_VERSION_3 => Some(HEADER_SIZE_V3),
        MPQ_FORMAT_VERSION_4 => Some(HEADER_SIZE_V4),
        _ => None,
    }
}

impl FileHeader {
    pub fn new(
        format_version: u16,
        sector_size_shift: u16,
        archive_size: u64,
        (hash_table_offset, hash_table_entries): (u32, u32),
        (block_table_offset, block_table_entries): (u32, u32),
    ) -> Result<FileHeader, Error> {
        let header_size = header_size_for_version(format_version)
            .ok_or(Error::UnsupportedVersion { version: format_version })?;

        Ok(FileHeader {
            header_size,
            archive_size,
            format_version,
            sector_size_shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
            raw_chunk_size: 0,
            hash_table_md5: [0u8; 16],
            block_table_md5: [0u8; 16],
        })
    }

    /// Reads the header that follows an already consumed MPQ magic.
    ///
    /// The high halves of 64-bit table offsets and the HET/BET tables are
    /// read past but not used.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<FileHeader, Error> {
        let header_size = reader.read_u32::<LE>()?;
        let archive_size = reader.read_u32::<LE>()?;
        let format_version = reader.read_u16::<LE>()?;
        let sector_size_shift = reader.read_u16::<LE>()?;
        let hash_table_offset = reader.read_u32::<LE>()?;
        let block_table_offset = reader.read_u32::<LE>()?;
        let hash_table_entries = reader.read_u32::<LE>()?;
        let block_table_entries = reader.read_u32::<LE>()?;

        if format_version > MPQ_FORMAT_VERSION_4 {
            return Err(Error::UnsupportedVersion {
                version: format_version,
            });
        }

        let mut header = FileHeader {
            header_size,
            archive_size: u64::from(archive_size),
            format_version,
            sector_size_shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
            raw_chunk_size: 0,
            hash_table_md5: [0u8; 16],
            block_table_md5: [0u8; 16],
        };

        if format_version >= MPQ_FORMAT_VERSION_2 {
            let _hi_block_table_offset = reader.read_u64::<LE>()?;
            let _hash_table_offset_hi = reader.read_u16::<LE>()?;
            let _block_table_offset_hi = reader.read_u16::<LE>()?;
        }

        if format_version >= MPQ_FORMAT_VERSION_3 {
            let archive_size_64 = reader.read_u64::<LE>()?;
            let _bet_table_offset = reader.read_u64::<LE>()?;
            let _het_table_offset = reader.read_u64::<LE>()?;

            if archive_size_64 != 0 {
                header.archive_size = archive_size_64;
            }
        }

        if format_version >= MPQ_FORMAT_VERSION_4 {
            // hash, block, hi-block, HET and BET table sizes
            for _ in 0..5 {
                reader.read_u64::<LE>()?;
            }
            header.raw_chunk_size = reader.read_u32::<LE>()?;
            reader.read_exact(&mut header.block_table_md5)?;
            reader.read_exact(&mut header.hash_table_md5)?;

            // hi-block, BET, HET and header checksums
            let mut skipped = [0u8; 16 * 4];
            reader.read_exact(&mut skipped)?;
        }

        Ok(header)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), IoError> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.header_size as usize);

        buf.write_u32::<LE>(HEADER_MPQ_MAGIC)?;
        buf.write_u32::<LE>(self.header_size)?;
        buf.write_u32::<LE>(self.archive_size as u32)?;
        buf.write_u16::<LE>(self.format_version)?;
        buf.write_u16::<LE>(self.sector_size_shift)?;
        buf.write_u32::<LE>(self.hash_table_offset)?;
        buf.write_u32::<LE>(self.block_table_offset)?;
        buf.write_u32::<LE>(self.hash_table_entries)?;
        buf.write_u32::<LE>(self.block_table_entries)?;

        if self.format_version >= MPQ_FORMAT_VERSION_2 {
            buf.write_u64::<LE>(0)?;
            buf.write_u16::<LE>(0)?;
            buf.write_u16::<LE>(0)?;
        }

        if self.format_version >= MPQ_FORMAT_VERSION_3 {
            buf.write_u64::<LE>(self.archive_size)?;
            buf.write_u64::<LE>(0)?;
            buf.write_u64::<LE>(0)?;
        }

        if self.format_version >= MPQ_FORMAT_VERSION_4 {
            buf.write_u64::<LE>(u64::from(self.hash_table_entries * HASH_TABLE_ENTRY_SIZE))?;
            buf.write_u64::<LE>(u64::from(self.block_table_entries * BLOCK_TABLE_ENTRY_SIZE))?;
            buf.write_u64::<LE>(0)?;
            buf.write_u64::<LE>(0)?;
            buf.write_u64::<LE>(0)?;
            buf.write_u32::<LE>(self.raw_chunk_size)?;
            buf.write_all(&self.block_table_md5)?;
            buf.write_all(&self.hash_table_md5)?;
            // hi-block, BET and HET tables are never written
            buf.write_all(&[0u8; 16 * 3])?;

            let digest = md5::compute(&buf[..HEADER_MD5_COVERED]);
            buf.write_all(&digest.0)?;
        }

        writer.write_all(&buf)
    }
}

#[derive(Debug)]
pub(crate) struct UserHeader {
    pub user_data_size: u32,
    pub file_header_offset: u32,
}

impl UserHeader {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<UserHeader, Error> {
        let user_data_size = reader.read_u32::<LE>()?;
        let file_header_offset = reader.read_u32::<LE>()?;

        Ok(UserHeader {
            user_data_size,
            file_header_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u16) -> FileHeader {
        FileHeader::new(version, 3, 0x1234, (0x200, 32), (0x400, 5)).unwrap()
    }

    #[test]
    fn written_size_matches_version() {
        for version in MPQ_FORMAT_VERSION_1..=MPQ_FORMAT_VERSION_4 {
            let header = header(version);
            let mut buf = Vec::new();
            header.write(&mut buf).unwrap();

            assert_eq!(buf.len() as u32, header.header_size);
        }
    }

    #[test]
    fn reads_back_what_was_written() {
        let mut original = header(MPQ_FORMAT_VERSION_4);
        original.raw_chunk_size = 0x4000;
        original.hash_table_md5 = [1u8; 16];
        original.block_table_md5 = [2u8; 16];

        let mut buf = Vec::new();
        original.write(&mut buf).unwrap();

        let mut slice = &buf[4..];
        let read = FileHeader::from_reader(&mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(read.format_version, MPQ_FORMAT_VERSION_4);
        assert_eq!(read.archive_size, 0x1234);
        assert_eq!(read.sector_size_shift, 3);
        assert_eq!(read.hash_table_entries, 32);
        assert_eq!(read.block_table_offset, 0x400);
        assert_eq!(read.raw_chunk_size, 0x4000);
        assert_eq!(read.hash_table_md5, [1u8; 16]);
        assert_eq!(read.block_table_md5, [2u8; 16]);
    }

    #[test]
    fn v4_header_checksum_covers_the_header() {
        let mut buf = Vec::new();
        header(MPQ_FORMAT_VERSION_4).write(&mut buf).unwrap();

        let digest = md5::compute(&buf[..HEADER_MD5_COVERED]);
        assert_eq!(&buf[HEADER_MD5_COVERED..], &digest.0[..]);
    }

    #[test]
    fn rejects_unknown_versions() {
        assert!(FileHeader::new(4, 3, 0, (0, 0), (0, 0)).is_err());
    }
}
