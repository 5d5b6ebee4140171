//! The `(attributes)` internal file.
//!
//! It stores, per block table entry, any combination of a CRC32, a Windows
//! FILETIME, an MD5 digest and a patch bit. Which arrays are present is given
//! by the attribute kinds bitset in its header.

use std::io::Error as IoError;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use flate2::Crc;

use super::consts::*;
use super::error::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub version: u32,
    pub kinds: u32,
    pub crc32: Vec<u32>,
    pub file_times: Vec<u64>,
    pub md5: Vec<[u8; 16]>,
    pub patch_bits: Vec<bool>,
}

impl Attributes {
    /// Empty attribute arrays of the given kinds for `block_count` blocks.
    pub fn new(kinds: u32, block_count: usize) -> Attributes {
        let sized = |kind: u32| if kinds & kind != 0 { block_count } else { 0 };

        Attributes {
            version: MPQ_ATTRIBUTES_V1,
            kinds,
            crc32: vec![0; sized(MPQ_ATTRIBUTE_CRC32)],
            file_times: vec![0; sized(MPQ_ATTRIBUTE_FILETIME)],
            md5: vec![[0u8; 16]; sized(MPQ_ATTRIBUTE_MD5)],
            patch_bits: vec![false; sized(MPQ_ATTRIBUTE_PATCH_BIT)],
        }
    }

    /// Parses the file contents for an archive with `block_count` blocks.
    ///
    /// Some writers leave out the slot of the attributes file itself, so
    /// arrays one entry short are accepted as well.
    pub fn parse(data: &[u8], block_count: usize) -> Result<Attributes, Error> {
        parse_with_count(data, block_count).or_else(|err| {
            if block_count > 0 {
                parse_with_count(data, block_count - 1)
            } else {
                Err(err)
            }
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IoError> {
        let mut buf = Vec::new();

        buf.write_u32::<LE>(self.version)?;
        buf.write_u32::<LE>(self.kinds)?;

        if self.kinds & MPQ_ATTRIBUTE_CRC32 != 0 {
            for crc in &self.crc32 {
                buf.write_u32::<LE>(*crc)?;
            }
        }

        if self.kinds & MPQ_ATTRIBUTE_FILETIME != 0 {
            for time in &self.file_times {
                buf.write_u64::<LE>(*time)?;
            }
        }

        if self.kinds & MPQ_ATTRIBUTE_MD5 != 0 {
            for digest in &self.md5 {
                buf.extend_from_slice(digest);
            }
        }

        if self.kinds & MPQ_ATTRIBUTE_PATCH_BIT != 0 {
            let mut bits = vec![0u8; (self.patch_bits.len() + 7) / 8];
            for (i, bit) in self.patch_bits.iter().enumerate() {
                if *bit {
                    bits[i / 8] |= 1 << (i % 8);
                }
            }
            buf.extend_from_slice(&bits);
        }

        Ok(buf)
    }

    pub fn crc32_of(&self, block_index: usize) -> Option<u32> {
        self.crc32.get(block_index).copied()
    }

    pub fn md5_of(&self, block_index: usize) -> Option<[u8; 16]> {
        self.md5.get(block_index).copied()
    }
}

fn parse_with_count(data: &[u8], count: usize) -> Result<Attributes, Error> {
    let mut slice = data;

    let version = slice.read_u32::<LE>()?;
    let kinds = slice.read_u32::<LE>()?;

    if version != MPQ_ATTRIBUTES_V1 {
        return Err(Error::Corrupted);
    }

    let mut attributes = Attributes {
        version,
        kinds,
        ..Attributes::default()
    };

    if kinds & MPQ_ATTRIBUTE_CRC32 != 0 {
        for _ in 0..count {
            attributes.crc32.push(slice.read_u32::<LE>()?);
        }
    }

    if kinds & MPQ_ATTRIBUTE_FILETIME != 0 {
        for _ in 0..count {
            attributes.file_times.push(slice.read_u64::<LE>()?);
        }
    }

    if kinds & MPQ_ATTRIBUTE_MD5 != 0 {
        for _ in 0..count {
            let mut digest = [0u8; 16];
            std::io::Read::read_exact(&mut slice, &mut digest)?;
            attributes.md5.push(digest);
        }
    }

    if kinds & MPQ_ATTRIBUTE_PATCH_BIT != 0 {
        let byte_count = (count + 7) / 8;
        if slice.len() < byte_count {
            return Err(Error::Corrupted);
        }

        attributes.patch_bits = (0..count)
            .map(|i| slice[i / 8] & (1 << (i % 8)) != 0)
            .collect();
        slice = &slice[byte_count..];
    }

    if !slice.is_empty() {
        return Err(Error::Corrupted);
    }

    Ok(attributes)
}

/// CRC32 of file contents as `(attributes)` stores it.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// MD5 digest of file contents as `(attributes)` stores it.
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_checksums() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(
            md5_digest(b""),
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec,
                0xf8, 0x42, 0x7e
            ]
        );
    }

    #[test]
    fn layout_of_all_kinds() {
        let mut attributes = Attributes::new(MPQ_ATTRIBUTE_ALL, 3);
        attributes.crc32[1] = 0xAABB_CCDD;
        attributes.file_times[2] = 0x01D0_0000_0000_0000;
        attributes.md5[0] = [9u8; 16];
        attributes.patch_bits[2] = true;

        let bytes = attributes.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + 3 * 4 + 3 * 8 + 3 * 16 + 1);
        assert_eq!(&bytes[12..16], &0xAABB_CCDDu32.to_le_bytes());
        assert_eq!(bytes[bytes.len() - 1], 0b100);

        let parsed = Attributes::parse(&bytes, 3).unwrap();
        assert_eq!(parsed, attributes);
    }

    #[test]
    fn accepts_arrays_missing_the_last_slot() {
        let attributes = Attributes::new(MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_FILETIME, 4);
        let bytes = attributes.to_bytes().unwrap();

        let parsed = Attributes::parse(&bytes, 5).unwrap();
        assert_eq!(parsed.crc32.len(), 4);
        assert_eq!(parsed.file_times.len(), 4);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Attributes::parse(&[1, 2, 3], 1).is_err());

        let mut bytes = Attributes::new(MPQ_ATTRIBUTE_CRC32, 2).to_bytes().unwrap();
        bytes[0] = 99;
        assert!(Attributes::parse(&bytes, 2).is_err());
    }
}
