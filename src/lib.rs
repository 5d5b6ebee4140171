//! A library for reading and writing Blizzard's proprietary MoPaQ archive format,
//! and for deciding how each file of an archive should be stored.
//!
//! The archive engine reads archives of format versions 1 to 4 and writes them
//! from memory with [Creator](struct.Creator.html). Files are keyed by name and
//! [Locale](struct.Locale.html), so one path can hold several language variants.
//!
//! On top of it sits the storage policy: every supported game comes with a
//! [GameProfile](enum.GameProfile.html) whose [Ruleset](struct.Ruleset.html)
//! picks flags and codecs per file name and size, plus the archive creation
//! settings the game expects. User overrides are merged in with
//! [ArchiveCreateSettings::merge](struct.ArchiveCreateSettings.html#method.merge).
//!
//! # Supported features
//!
//! Not the whole range of MPQ features is supported for reading archives. Notably:
//!
//! * IMA ADPCM compression is unsupported. This is usually present on `.wav` files.
//! * Huffman coding compression is unsupported. This is usually present on `.wav` files.
//! * PKWare DCL and LZMA compression are unsupported.
//! * HET/BET tables of newer archives are ignored, only the classic hash and block tables are read.
//!
//! When writing, sectors are compressed with bzip2 or DEFLATE. Codec masks
//! naming only codecs the writer cannot produce store the sector uncompressed,
//! which every MPQ reader accepts.
//!
//! Archives can be signed with the weak signature, which is checked with
//! [Archive::verify_weak_signature](struct.Archive.html#method.verify_weak_signature).
//! Strong signatures are detected but not checked.
//!
//! # Protected MPQs
//!
//! In Warcraft III, it is not uncommon to encounter so-called "protected maps" which use various
//! obfuscations and hacks that are designed in such a manner that they can be read by WC3's
//! built-in MPQ implementation, but will trip up other implementations.
//!
//! **No effort is made to work around those "protections"**. In particular,
//! reading is likely to fail on a protected MPQ which has explicitly
//! subverted the MPQ archive structure in some manner.
//!
//! # Example
//!
//! ```
//! # use mpqkit::{Archive, Creator, FileOptions, GameProfile, Locale, Ruleset};
//! # use std::io::{Cursor, Seek, SeekFrom};
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let ruleset = Ruleset::new(GameProfile::Warcraft3Map);
//! let mut creator = Creator::new(*ruleset.create_settings(), 32)?;
//!
//! // store the file the way the game expects it
//! let contents = b"hello world!".to_vec();
//! let settings = ruleset.resolve("hello.txt", contents.len() as u32);
//! creator.add_file(
//!     "hello.txt",
//!     contents,
//!     FileOptions::from_settings(settings, Locale::NEUTRAL),
//! );
//!
//! let mut cursor = Cursor::new(Vec::new());
//! creator.write(&mut cursor)?;
//! cursor.seek(SeekFrom::Start(0))?;
//!
//! // reading an archive
//! let mut archive = Archive::open(&mut cursor)?;
//! let file = archive.read_file("hello.txt")?;
//!
//! assert_eq!(file.as_slice(), b"hello world!");
//! # Ok(())
//! # }
//! ```

pub(crate) mod compression;
pub(crate) mod crypto;
pub(crate) mod header;
pub(crate) mod seeker;
pub(crate) mod signature;
pub(crate) mod table;
pub(crate) mod util;

pub mod archive;
pub mod attributes;
pub mod consts;
pub mod coordinator;
pub mod creator;
pub mod editor;
pub mod error;
pub mod locale;
pub mod profile;
pub mod rules;
pub mod settings;
pub mod wildcard;

pub use archive::{Archive, ArchiveMetadata, FileEntry, SignatureKind};
pub use attributes::Attributes;
pub use coordinator::{AddOutcome, ArchiveStore};
pub use creator::{Creator, FileOptions};
pub use editor::ArchiveFile;
pub use error::Error;
pub use locale::Locale;
pub use profile::GameProfile;
pub use rules::{CompressionRule, Ruleset};
pub use settings::{
    ArchiveCreateSettings, CompressionOverrides, CompressionSettings, CreateSettingsOverrides,
};
