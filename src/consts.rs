//! Numeric constants of the MoPaQ format.
//!
//! File flags, compression codec masks and attribute kinds are plain `u32`
//! bitsets, the same values other MPQ tools use, so they can be passed
//! through from the command line untouched.

pub const HEADER_BOUNDARY: u64 = 512;
pub const HEADER_MPQ_MAGIC: u32 = 0x1A51_504D;
pub const HEADER_USER_MAGIC: u32 = 0x1B51_504D;
pub const STRONG_SIGNATURE_MAGIC: &[u8; 4] = b"NGIS";
pub const STRONG_SIGNATURE_SIZE: u64 = 256;

/// Size of a weak `(signature)` file: 8 zero bytes, then the signature.
pub const WEAK_SIGNATURE_FILE_SIZE: u64 = 72;
pub const WEAK_SIGNATURE_OFFSET: usize = 8;
pub const WEAK_SIGNATURE_SIZE: usize = 64;

pub const HEADER_SIZE_V1: u32 = 0x20;
pub const HEADER_SIZE_V2: u32 = 0x2C;
pub const HEADER_SIZE_V3: u32 = 0x44;
pub const HEADER_SIZE_V4: u32 = 0xD0;

pub const MPQ_FORMAT_VERSION_1: u16 = 0;
pub const MPQ_FORMAT_VERSION_2: u16 = 1;
pub const MPQ_FORMAT_VERSION_3: u16 = 2;
pub const MPQ_FORMAT_VERSION_4: u16 = 3;

pub const HASH_TABLE_ENTRY_SIZE: u32 = 16;
pub const BLOCK_TABLE_ENTRY_SIZE: u32 = 16;
pub const HASH_TABLE_KEY: u32 = 0xC3AF_3770;
pub const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;
pub const HASH_TABLE_EMPTY_ENTRY: u32 = 0xFFFF_FFFF;
pub const HASH_TABLE_DELETED_ENTRY: u32 = 0xFFFF_FFFE;

/// Smallest hash table the writer produces, and the floor of capacity growth.
pub const MIN_HASH_TABLE_SIZE: u32 = 32;

pub const MPQ_HASH_TABLE_INDEX: u32 = 0x000;
pub const MPQ_HASH_NAME_A: u32 = 0x100;
pub const MPQ_HASH_NAME_B: u32 = 0x200;
pub const MPQ_HASH_FILE_KEY: u32 = 0x300;
pub const MPQ_HASH_KEY2_MIX: u32 = 0x400;

pub const MPQ_FILE_IMPLODE: u32 = 0x0000_0100;
pub const MPQ_FILE_COMPRESS: u32 = 0x0000_0200;
pub const MPQ_FILE_ENCRYPTED: u32 = 0x0001_0000;
pub const MPQ_FILE_KEY_V2: u32 = 0x0002_0000;
pub const MPQ_FILE_PATCH_FILE: u32 = 0x0010_0000;
pub const MPQ_FILE_SINGLE_UNIT: u32 = 0x0100_0000;
pub const MPQ_FILE_DELETE_MARKER: u32 = 0x0200_0000;
pub const MPQ_FILE_SECTOR_CRC: u32 = 0x0400_0000;
pub const MPQ_FILE_SIGNATURE: u32 = 0x1000_0000;
pub const MPQ_FILE_EXISTS: u32 = 0x8000_0000;

/// Storage flags value meaning "store this internal file the default way".
pub const MPQ_FILE_DEFAULT_INTERNAL: u32 = 0xFFFF_FFFF;

/// Flags the writer knows how to produce. Everything else is dropped on write.
pub const MPQ_FILE_WRITABLE_MASK: u32 = MPQ_FILE_IMPLODE
    | MPQ_FILE_COMPRESS
    | MPQ_FILE_ENCRYPTED
    | MPQ_FILE_KEY_V2
    | MPQ_FILE_SINGLE_UNIT
    | MPQ_FILE_DELETE_MARKER
    | MPQ_FILE_EXISTS;

pub const MPQ_COMPRESSION_HUFFMANN: u32 = 0x01;
pub const MPQ_COMPRESSION_ZLIB: u32 = 0x02;
pub const MPQ_COMPRESSION_PKWARE: u32 = 0x08;
pub const MPQ_COMPRESSION_BZIP2: u32 = 0x10;
pub const MPQ_COMPRESSION_SPARSE: u32 = 0x20;
pub const MPQ_COMPRESSION_ADPCM_MONO: u32 = 0x40;
pub const MPQ_COMPRESSION_ADPCM_STEREO: u32 = 0x80;
pub const MPQ_COMPRESSION_LZMA: u32 = 0x12;
pub const MPQ_COMPRESSION_NEXT_SAME: u32 = 0xFFFF_FFFF;

pub const MPQ_ATTRIBUTE_CRC32: u32 = 0x0000_0001;
pub const MPQ_ATTRIBUTE_FILETIME: u32 = 0x0000_0002;
pub const MPQ_ATTRIBUTE_MD5: u32 = 0x0000_0004;
pub const MPQ_ATTRIBUTE_PATCH_BIT: u32 = 0x0000_0008;
pub const MPQ_ATTRIBUTE_ALL: u32 = 0x0000_000F;
pub const MPQ_ATTRIBUTES_V1: u32 = 100;

pub const STREAM_PROVIDER_FLAT: u32 = 0x0000_0000;
pub const BASE_PROVIDER_FILE: u32 = 0x0000_0000;

pub const LISTFILE_NAME: &str = "(listfile)";
pub const ATTRIBUTES_NAME: &str = "(attributes)";
pub const SIGNATURE_NAME: &str = "(signature)";

/// Names the archive engine manages itself.
pub const INTERNAL_FILE_NAMES: [&str; 3] = [LISTFILE_NAME, ATTRIBUTES_NAME, SIGNATURE_NAME];
