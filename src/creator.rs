use std::cmp::min;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{WriteBytesExt, LE};
use indexmap::IndexMap;
use log::{debug, warn};

use super::archive::{Archive, SignatureKind};
use super::attributes::*;
use super::compression::compress_sector;
use super::consts::*;
use super::coordinator::grown_capacity;
use super::crypto::*;
use super::error::Error;
use super::header::*;
use super::locale::Locale;
use super::settings::*;
use super::signature::write_weak_signature;
use super::table::*;
use super::util::*;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
struct FileKey {
    hash_a: u32,
    hash_b: u32,
    index: u32,
    locale: Locale,
}

impl FileKey {
    fn new(name: &str, locale: Locale) -> FileKey {
        let hash_a = hash_string(name.as_bytes(), MPQ_HASH_NAME_A);
        let hash_b = hash_string(name.as_bytes(), MPQ_HASH_NAME_B);
        let index = hash_string(name.as_bytes(), MPQ_HASH_TABLE_INDEX);

        FileKey {
            hash_a,
            hash_b,
            index,
            locale,
        }
    }
}

#[derive(Debug, Clone)]
struct FileRecord {
    file_name: String,
    contents: Vec<u8>,
    options: FileOptions,
}

impl FileRecord {
    fn new<S: Into<String>, C: Into<Vec<u8>>>(
        name: S,
        contents: C,
        options: FileOptions,
    ) -> FileRecord {
        FileRecord {
            file_name: name.into(),
            contents: contents.into(),
            options,
        }
    }

    fn is_internal(&self) -> bool {
        INTERNAL_FILE_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.file_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Represents various options that can be used when adding a file to an archive.
pub struct FileOptions {
    /// `MPQ_FILE_*` storage flags. Flags the writer cannot produce, such as
    /// sector checksums, are dropped when the archive is written.
    pub flags: u32,
    /// Codec mask for the first sector. Masks containing bzip2 are written
    /// with bzip2, masks containing zlib with zlib, and anything else is
    /// stored uncompressed.
    pub compression: u32,
    /// Codec mask for later sectors, or `MPQ_COMPRESSION_NEXT_SAME`.
    pub compression_next: u32,
    pub locale: Locale,
    /// Windows FILETIME recorded in the `(attributes)`.
    pub file_time: u64,
}

impl Default for FileOptions {
    fn default() -> FileOptions {
        FileOptions {
            flags: MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS,
            compression: MPQ_COMPRESSION_ZLIB,
            compression_next: MPQ_COMPRESSION_NEXT_SAME,
            locale: Locale::NEUTRAL,
            file_time: 0,
        }
    }
}

impl FileOptions {
    pub fn from_settings(settings: CompressionSettings, locale: Locale) -> FileOptions {
        FileOptions {
            flags: settings.flags,
            compression: settings.compression,
            compression_next: settings.compression_next,
            locale,
            file_time: 0,
        }
    }

    fn next_compression(&self) -> u32 {
        if self.compression_next == MPQ_COMPRESSION_NEXT_SAME {
            self.compression
        } else {
            self.compression_next
        }
    }

    /// Storage options for an internal file stored with `flags`.
    fn internal(flags: u32) -> FileOptions {
        let flags = if flags == MPQ_FILE_DEFAULT_INTERNAL {
            MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED | MPQ_FILE_KEY_V2
        } else {
            flags
        };

        FileOptions {
            flags,
            ..FileOptions::default()
        }
    }

    /// The flags that end up in the block table.
    fn written_flags(&self, file_name: &str, file_size: usize) -> u32 {
        let mut flags = self.flags & MPQ_FILE_WRITABLE_MASK;

        if flags != self.flags {
            debug!(
                "{}: dropping unsupported flags 0x{:08X}",
                file_name,
                self.flags & !MPQ_FILE_WRITABLE_MASK
            );
        }

        if flags & MPQ_FILE_DELETE_MARKER != 0 && file_size != 0 {
            debug!("{}: has contents, not writing a delete marker", file_name);
            flags &= !MPQ_FILE_DELETE_MARKER;
        }

        flags | MPQ_FILE_EXISTS
    }
}

#[derive(Debug)]
struct WrittenArchive {
    archive_start: u64,
    archive_end: u64,
    /// Absolute position of the zero-filled `(signature)`, if one was written.
    signature_pos: Option<u64>,
}

#[derive(Debug)]
struct WrittenBlock {
    offset: u64,
    compressed_size: u64,
    file_size: u64,
    flags: u32,
}

#[derive(Debug, Clone)]
/// Creator capable of creating MPQ archives of format versions 1 to 4.
///
/// Will hold all the files in memory until asked to [write](struct.Creator.html#method.write) them
/// to a `writer`.
///
/// Depending on its settings, a `(listfile)` and an `(attributes)` will be
/// generated when writing. Signed archives also get a weak `(signature)`.
pub struct Creator {
    added_files: IndexMap<FileKey, FileRecord>,

    settings: ArchiveCreateSettings,
    format_version: u16,
    sector_size: u64,
    max_file_count: u32,
    weak_signature: bool,
}

impl Default for Creator {
    fn default() -> Creator {
        Creator {
            added_files: IndexMap::new(),
            settings: ArchiveCreateSettings::default(),
            format_version: MPQ_FORMAT_VERSION_1,
            sector_size: 0x1000,
            max_file_count: MIN_HASH_TABLE_SIZE,
            weak_signature: false,
        }
    }
}

impl Creator {
    /// Creates an empty archive with the given settings, able to hold
    /// `max_file_count` files.
    pub fn new(settings: ArchiveCreateSettings, max_file_count: u32) -> Result<Creator, Error> {
        let sector_size_shift = sector_size_shift(settings.sector_size).ok_or(
            Error::InvalidSectorSize {
                size: settings.sector_size,
            },
        )?;

        let format_version = settings.format_version as u16;
        if settings.format_version > u32::from(MPQ_FORMAT_VERSION_4) {
            return Err(Error::UnsupportedVersion {
                version: format_version,
            });
        }

        if settings.raw_chunk_size != 0 {
            warn!(
                "raw chunk checksums are not written, ignoring raw chunk size 0x{:X}",
                settings.raw_chunk_size
            );
        }

        if settings.stream_flags != STREAM_PROVIDER_FLAT | BASE_PROVIDER_FILE {
            debug!("ignoring stream flags 0x{:08X}", settings.stream_flags);
        }

        debug!(
            "new archive v{}, sector size {} (shift {}), capacity {}",
            format_version + 1,
            settings.sector_size,
            sector_size_shift,
            max_file_count
        );

        let mut creator = Creator {
            added_files: IndexMap::new(),
            settings,
            format_version,
            sector_size: u64::from(settings.sector_size),
            max_file_count: MIN_HASH_TABLE_SIZE,
            weak_signature: false,
        };
        creator.set_max_file_count(max_file_count)?;

        Ok(creator)
    }

    /// Loads every file of an existing archive, so it can be changed and
    /// written out again.
    ///
    /// Files are looked up by the names in the archive's `(listfile)` and in
    /// `extra_names`. If any file stays without a name it could not be
    /// written back, so this fails with `Error::UnnamedEntries`. Internal
    /// files are not loaded but regenerated on write, which re-signs weakly
    /// signed archives. Strong signatures are dropped.
    pub fn from_archive<R>(archive: &mut Archive<R>, extra_names: &[String]) -> Result<Creator, Error>
    where
        R: Read + Seek,
    {
        let metadata = archive.metadata();
        let entries = archive.entries(extra_names)?;

        let unnamed = entries.iter().filter(|entry| entry.name.is_none()).count();
        if unnamed > 0 {
            return Err(Error::UnnamedEntries { count: unnamed });
        }

        let signed = archive.has_file(SIGNATURE_NAME, Locale::NEUTRAL);
        if archive.signature_kind()? == SignatureKind::Strong {
            warn!("strong signatures cannot be recreated, dropping it");
        }

        let attributes = archive.attributes().unwrap_or_else(|err| {
            warn!("ignoring unreadable (attributes): {}", err);
            None
        });

        let internal_flags = |name: &str| {
            entries
                .iter()
                .find(|entry| entry.name.as_ref().map(String::as_str) == Some(name))
                .map_or(0, |entry| entry.flags)
        };

        let mut settings = ArchiveCreateSettings {
            format_version: u32::from(metadata.format_version),
            sector_size: metadata.sector_size,
            raw_chunk_size: 0,
            listfile_flags: internal_flags(LISTFILE_NAME),
            attributes_flags: internal_flags(ATTRIBUTES_NAME),
            attribute_kinds: attributes.as_ref().map_or(0, |a| a.kinds),
            ..ArchiveCreateSettings::default()
        };

        if settings.listfile_flags == 0 && !entries.is_empty() {
            // without a listfile the archive could not be reopened
            settings.listfile_flags = MPQ_FILE_DEFAULT_INTERNAL;
        }

        let user_entries = entries
            .iter()
            .filter(|entry| {
                let name = entry.name.as_ref().map_or("", String::as_str);
                !INTERNAL_FILE_NAMES
                    .iter()
                    .any(|internal| internal.eq_ignore_ascii_case(name))
            })
            .count() as u32;

        let required = user_entries + internal_file_count(&settings, signed);
        let capacity = metadata.hash_table_size.max(grown_capacity(required));

        let mut creator = Creator::new(settings, capacity)?;
        creator.set_weak_signature(signed);

        for entry in &entries {
            let name = match &entry.name {
                Some(name) => name,
                None => continue,
            };

            if INTERNAL_FILE_NAMES
                .iter()
                .any(|internal| internal.eq_ignore_ascii_case(name))
            {
                continue;
            }

            let contents = archive.read_entry(entry)?;

            // the codec of existing sectors is not tracked, so pick the one
            // the flags imply
            let compression = if entry.flags & MPQ_FILE_COMPRESS != 0 {
                MPQ_COMPRESSION_ZLIB
            } else if entry.flags & MPQ_FILE_IMPLODE != 0 {
                MPQ_COMPRESSION_PKWARE
            } else {
                0
            };

            let file_time = attributes
                .as_ref()
                .and_then(|a| a.file_times.get(entry.block_index as usize).copied())
                .unwrap_or(0);

            let options = FileOptions {
                flags: entry.flags & MPQ_FILE_WRITABLE_MASK,
                compression,
                compression_next: MPQ_COMPRESSION_NEXT_SAME,
                locale: entry.locale,
                file_time,
            };

            creator.add_file(name, contents, options);
        }

        debug!(
            "loaded {} files from archive, capacity {}",
            creator.added_files.len(),
            creator.max_file_count
        );

        Ok(creator)
    }

    /// Adds a file to be later written to the archive.
    ///
    /// All forward slashes (`/`) in the file path will be auto-converted to backward slashes (`\`)
    ///
    /// A file with the same name and locale is replaced. Capacity is not
    /// checked here but when writing.
    pub fn add_file<C>(&mut self, file_name: &str, contents: C, options: FileOptions)
    where
        C: Into<Vec<u8>>,
    {
        let file_name = normalize_archive_name(file_name);
        let key = FileKey::new(&file_name, options.locale);

        self.added_files
            .insert(key, FileRecord::new(file_name, contents, options));
    }

    /// Removes the `locale` variant of a file. Returns whether it existed.
    pub fn remove_file(&mut self, file_name: &str, locale: Locale) -> bool {
        let key = FileKey::new(&normalize_archive_name(file_name), locale);

        self.added_files.shift_remove(&key).is_some()
    }

    pub fn has_file(&self, file_name: &str, locale: Locale) -> bool {
        let key = FileKey::new(&normalize_archive_name(file_name), locale);

        self.added_files.contains_key(&key)
    }

    /// Number of files the written archive will hold, internal files included.
    pub fn file_count(&self) -> u32 {
        let user_files = self
            .added_files
            .values()
            .filter(|record| !record.is_internal())
            .count() as u32;

        user_files + internal_file_count(&self.settings, self.weak_signature)
    }

    /// Whether to sign the written archive with a weak signature. The
    /// capacity grows when the `(signature)` does not fit.
    pub fn set_weak_signature(&mut self, signed: bool) {
        self.weak_signature = signed;

        let required = self.file_count();
        if required > self.max_file_count {
            let capacity = grown_capacity(required);
            debug!(
                "growing capacity from {} to {} for the (signature)",
                self.max_file_count, capacity
            );
            self.max_file_count = capacity;
        }
    }

    /// Hash table size of the written archive.
    pub fn max_file_count(&self) -> u32 {
        self.max_file_count
    }

    /// Changes the hash table size. It has to be a power of two that holds
    /// every file.
    pub fn set_max_file_count(&mut self, max_file_count: u32) -> Result<(), Error> {
        let required = self.file_count();

        if !max_file_count.is_power_of_two() || max_file_count < required {
            return Err(Error::InvalidCapacity {
                requested: max_file_count,
                required,
            });
        }

        self.max_file_count = max_file_count;
        Ok(())
    }

    /// Writes out the entire archive to the specified writer.
    ///
    /// The archive start position is calculated as follows:
    /// `((current_pos + (HEADER_BOUNDARY - 1)) / HEADER_BOUNDARY) * HEADER_BOUNDARY`
    /// Where `current_pos` is the `writer`'s current seek pos, and `HEADER_BOUNDARY` is 512.
    ///
    /// Will write the following:
    /// - MPQ Header
    /// - All files with their sector offset table
    /// - `(listfile)`, `(attributes)` and `(signature)`, if enabled
    /// - MPQ hash table
    /// - MPQ block table
    ///
    /// A signed archive is assembled and signed in memory before it reaches
    /// `writer`.
    pub fn write<W>(&self, mut writer: W) -> Result<(), Error>
    where
        W: Write + Seek,
    {
        if !self.weak_signature {
            self.write_archive(&mut writer)?;
            return Ok(());
        }

        let current_pos = writer.seek(SeekFrom::Current(0))?;
        let mut buffer = Cursor::new(Vec::new());
        buffer.seek(SeekFrom::Start(current_pos))?;

        let written = self.write_archive(&mut buffer)?;
        let mut data = buffer.into_inner();

        if let Some(signature_pos) = written.signature_pos {
            write_weak_signature(
                &mut data,
                written.archive_start..written.archive_end,
                signature_pos,
            )?;
        }

        writer.write_all(&data[current_pos as usize..])?;

        Ok(())
    }

    fn write_archive<W>(&self, mut writer: W) -> Result<WrittenArchive, Error>
    where
        W: Write + Seek,
    {
        let mut files: Vec<FileRecord> = self
            .added_files
            .values()
            .filter(|record| !record.is_internal())
            .cloned()
            .collect();

        if self.settings.listfile_flags != 0 {
            files.push(FileRecord::new(
                LISTFILE_NAME,
                build_listfile(&files),
                FileOptions::internal(self.settings.listfile_flags),
            ));
        }

        if has_attributes(&self.settings) {
            // one slot per block, the attributes and the signature included
            let block_count = files.len() + 1 + usize::from(self.weak_signature);
            let contents = build_attributes(&files, self.settings.attribute_kinds, block_count)?;
            files.push(FileRecord::new(
                ATTRIBUTES_NAME,
                contents,
                FileOptions::internal(self.settings.attributes_flags),
            ));
        }

        if self.weak_signature {
            let flags = self.settings.signature_flags;
            if flags != MPQ_FILE_DEFAULT_INTERNAL && flags & !MPQ_FILE_EXISTS != 0 {
                debug!(
                    "ignoring (signature) flags 0x{:08X}, weak signatures are stored plain",
                    flags
                );
            }

            files.push(FileRecord::new(
                SIGNATURE_NAME,
                vec![0u8; WEAK_SIGNATURE_FILE_SIZE as usize],
                FileOptions {
                    flags: MPQ_FILE_EXISTS,
                    compression: 0,
                    ..FileOptions::default()
                },
            ));
        }

        if files.len() > self.max_file_count as usize {
            return Err(Error::HashTableFull {
                capacity: self.max_file_count,
                required: files.len() as u32,
            });
        }

        let current_pos = writer.seek(SeekFrom::Current(0))?;
        // starting from the current pos, this will find the closest valid header position
        let archive_start =
            ((current_pos + (HEADER_BOUNDARY - 1)) / HEADER_BOUNDARY) * HEADER_BOUNDARY;
        writer.seek(SeekFrom::Start(archive_start))?;

        // skip writing the header for now
        let header_size = header_size_for_version(self.format_version).ok_or(
            Error::UnsupportedVersion {
                version: self.format_version,
            },
        )?;
        writer.seek(SeekFrom::Current(i64::from(header_size)))?;

        // write out all the files back-to-back
        let mut blocks = Vec::with_capacity(files.len());
        for file in &files {
            blocks.push(write_file(self.sector_size, archive_start, &mut writer, file)?);
        }

        // the signature is always the last block
        let signature_pos = if self.weak_signature {
            blocks.last().map(|block| archive_start + block.offset)
        } else {
            None
        };

        let hashtable_size = self.max_file_count as usize;

        // write hash table and remember its position
        let (hashtable_pos, hashtable_md5) = write_hashtable(&mut writer, hashtable_size, &files)?;

        // write block table and remember its position
        let (blocktable_pos, blocktable_md5) = write_blocktable(&mut writer, &blocks)?;

        // write header
        let archive_end = writer.seek(SeekFrom::Current(0))?;

        let mut header = FileHeader::new(
            self.format_version,
            self.sector_size_shift()?,
            archive_end - archive_start,
            ((hashtable_pos - archive_start) as u32, hashtable_size as u32),
            ((blocktable_pos - archive_start) as u32, blocks.len() as u32),
        )?;
        header.hash_table_md5 = hashtable_md5;
        header.block_table_md5 = blocktable_md5;

        writer.seek(SeekFrom::Start(archive_start))?;
        header.write(&mut writer)?;
        writer.seek(SeekFrom::Start(archive_end))?;

        debug!(
            "wrote {} files, {} bytes, {} hash slots",
            files.len(),
            archive_end - archive_start,
            hashtable_size
        );

        Ok(WrittenArchive {
            archive_start,
            archive_end,
            signature_pos,
        })
    }

    fn sector_size_shift(&self) -> Result<u16, Error> {
        sector_size_shift(self.sector_size as u32).ok_or(Error::InvalidSectorSize {
            size: self.sector_size as u32,
        })
    }
}

fn has_attributes(settings: &ArchiveCreateSettings) -> bool {
    settings.attributes_flags != 0 && settings.attribute_kinds != 0
}

fn internal_file_count(settings: &ArchiveCreateSettings, signed: bool) -> u32 {
    let listfile = if settings.listfile_flags != 0 { 1 } else { 0 };
    let attributes = if has_attributes(settings) { 1 } else { 0 };
    let signature = if signed { 1 } else { 0 };

    listfile + attributes + signature
}

fn build_listfile(files: &[FileRecord]) -> Vec<u8> {
    let mut listfile = String::new();
    let mut written: Vec<String> = Vec::new();

    for file in files {
        let lower = file.file_name.to_lowercase();
        if written.contains(&lower) {
            continue;
        }

        listfile += &file.file_name;
        listfile += "\r\n";
        written.push(lower);
    }

    listfile.into_bytes()
}

/// Builds the `(attributes)` for `files`. Blocks past `files`, such as the
/// attributes file itself, stay zeroed.
fn build_attributes(
    files: &[FileRecord],
    kinds: u32,
    block_count: usize,
) -> Result<Vec<u8>, Error> {
    let mut attributes = Attributes::new(kinds, block_count);

    for (index, file) in files.iter().enumerate() {
        if let Some(slot) = attributes.crc32.get_mut(index) {
            *slot = crc32(&file.contents);
        }

        if let Some(slot) = attributes.file_times.get_mut(index) {
            *slot = file.options.file_time;
        }

        if let Some(slot) = attributes.md5.get_mut(index) {
            *slot = md5_digest(&file.contents);
        }
    }

    Ok(attributes.to_bytes()?)
}

fn write_hashtable<W>(
    mut writer: W,
    hashtable_size: usize,
    files: &[FileRecord],
) -> Result<(u64, [u8; 16]), Error>
where
    W: Write + Seek,
{
    let hashtable_pos = writer.seek(SeekFrom::Current(0))?;
    let mut hashtable = vec![HashEntry::blank(); hashtable_size];
    let hash_index_mask = hashtable_size - 1;

    for (block_index, file) in files.iter().enumerate() {
        let key = FileKey::new(&file.file_name, file.options.locale);
        let mut hash_index = (key.index as usize) & hash_index_mask;
        let hash_entry = HashEntry::new(key.hash_a, key.hash_b, key.locale.0, block_index as u32);

        while !hashtable[hash_index].is_blank() {
            hash_index = (hash_index + 1) & hash_index_mask;
        }

        hashtable[hash_index] = hash_entry;
    }

    let mut buf = vec![0u8; hashtable_size * HASH_TABLE_ENTRY_SIZE as usize];

    let mut cursor = buf.as_mut_slice();
    for entry in hashtable {
        entry.write(&mut cursor)?;
    }
    encrypt_mpq_block(&mut buf, HASH_TABLE_KEY);

    writer.write_all(&buf)?;

    Ok((hashtable_pos, md5_digest(&buf)))
}

fn write_blocktable<W>(mut writer: W, blocks: &[WrittenBlock]) -> Result<(u64, [u8; 16]), Error>
where
    W: Write + Seek,
{
    let blocktable_pos = writer.seek(SeekFrom::Current(0))?;

    let mut buf = vec![0u8; blocks.len() * BLOCK_TABLE_ENTRY_SIZE as usize];

    let mut cursor = buf.as_mut_slice();
    for block in blocks {
        let block_entry = BlockEntry::new(
            block.offset,
            block.compressed_size,
            block.file_size,
            block.flags,
        );

        block_entry.write(&mut cursor)?;
    }

    encrypt_mpq_block(&mut buf, BLOCK_TABLE_KEY);
    writer.write_all(&buf)?;

    Ok((blocktable_pos, md5_digest(&buf)))
}

/// Writes out the specified file starting at the writer's current position.
/// If the file is marked for compression or implosion, a Sector Offset Table (SOT) will be written,
/// and all sectors will attempt compression.
/// Single-unit files are compressed as one block without a SOT.
/// If the file is marked for encryption, it will also be encrypted after compression.
fn write_file<W>(
    sector_size: u64,
    archive_start: u64,
    mut writer: W,
    file: &FileRecord,
) -> Result<WrittenBlock, Error>
where
    W: Write + Seek,
{
    let options = file.options;
    let file_size = file.contents.len() as u64;
    let flags = options.written_flags(&file.file_name, file.contents.len());
    let file_start = writer.seek(SeekFrom::Current(0))?;

    let written = |file_end: u64| WrittenBlock {
        offset: file_start - archive_start,
        compressed_size: file_end - file_start,
        file_size,
        flags,
    };

    if file_size == 0 {
        return Ok(written(file_start));
    }

    // calculate the encryption key if encryption was requested
    let encryption_key = if flags & MPQ_FILE_ENCRYPTED != 0 {
        Some(calculate_file_key(
            &file.file_name,
            (file_start - archive_start) as u32,
            file_size as u32,
            flags & MPQ_FILE_KEY_V2 != 0,
        ))
    } else {
        None
    };

    let compressed = flags & MPQ_FILE_COMPRESS != 0;
    let imploded = flags & MPQ_FILE_IMPLODE != 0;

    if imploded && !compressed {
        debug!("{}: imploding is not supported, storing sectors", file.file_name);
    }

    if flags & MPQ_FILE_SINGLE_UNIT != 0 {
        let mut data = if compressed {
            compress_sector(&file.contents, options.compression)?
        } else {
            file.contents.clone()
        };

        if let Some(key) = encryption_key {
            encrypt_mpq_block(&mut data, key);
        }

        writer.write_all(&data)?;

        let file_end = writer.seek(SeekFrom::Current(0))?;
        return Ok(written(file_end));
    }

    let sector_count = sector_count_from_size(file_size, sector_size);

    if compressed || imploded {
        let mut offsets: Vec<u32> = Vec::new();

        // store the start of the first sector and prepare to write there
        let first_sector_start = ((sector_count + 1) * 4) as u32;
        writer.seek(SeekFrom::Current(i64::from(first_sector_start)))?;
        offsets.push(first_sector_start);
        // write each sector and the offset of its end
        for i in 0..sector_count {
            let sector_start = i * sector_size;
            let sector_end = min((i + 1) * sector_size, file_size);
            let data = &file.contents[sector_start as usize..sector_end as usize];

            let mut sector = if !compressed {
                data.to_vec()
            } else if i == 0 {
                compress_sector(data, options.compression)?
            } else {
                compress_sector(data, options.next_compression())?
            };

            // encrypt the block if encryption was requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_add(i as u32)) {
                encrypt_mpq_block(&mut sector, key);
            }

            writer.write_all(&sector)?;

            // store the end of the current sector
            // which is also the start of the next sector if there is one
            let current_offset = writer.seek(SeekFrom::Current(0))?;
            offsets.push((current_offset - file_start) as u32);
        }

        let file_end = writer.seek(SeekFrom::Current(0))?;

        // write the sector offset table
        {
            let mut buf = vec![0u8; offsets.len() * 4];
            let mut cursor = buf.as_mut_slice();
            for offset in &offsets {
                cursor.write_u32::<LE>(*offset)?;
            }

            // encrypt the SOT if requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_sub(1)) {
                encrypt_mpq_block(&mut buf, key);
            }

            writer.seek(SeekFrom::Start(file_start))?;
            writer.write_all(&buf)?;
        }

        // put the writer at the file end, so that we don't overwrite this file with subsequent writes
        writer.seek(SeekFrom::Start(file_end))?;

        Ok(written(file_end))
    } else {
        // write each sector
        for i in 0..sector_count {
            let sector_start = i * sector_size;
            let sector_end = min((i + 1) * sector_size, file_size);
            let mut data = file.contents[sector_start as usize..sector_end as usize].to_vec();

            // encrypt the block if encryption was requested
            if let Some(key) = encryption_key.map(|k| k.wrapping_add(i as u32)) {
                encrypt_mpq_block(&mut data, key);
            }

            writer.write_all(&data)?;
        }

        let file_end = writer.seek(SeekFrom::Current(0))?;

        Ok(written(file_end))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn settings() -> ArchiveCreateSettings {
        ArchiveCreateSettings {
            listfile_flags: MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS,
            ..ArchiveCreateSettings::default()
        }
    }

    fn reopen(creator: &Creator) -> Archive<Cursor<Vec<u8>>> {
        let mut cursor = Cursor::new(Vec::new());
        creator.write(&mut cursor).unwrap();
        Archive::open(cursor).unwrap()
    }

    #[test]
    fn rejects_bad_sector_sizes() {
        let settings = ArchiveCreateSettings {
            sector_size: 1000,
            ..ArchiveCreateSettings::default()
        };

        match Creator::new(settings, 32) {
            Err(Error::InvalidSectorSize { size }) => assert_eq!(size, 1000),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_versions() {
        let settings = ArchiveCreateSettings {
            format_version: 4,
            ..ArchiveCreateSettings::default()
        };

        assert!(Creator::new(settings, 32).is_err());
    }

    #[test]
    fn capacity_has_to_fit() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        assert!(creator.set_max_file_count(48).is_err());
        assert!(creator.set_max_file_count(64).is_ok());
        assert_eq!(creator.max_file_count(), 64);
    }

    #[test]
    fn internal_files_count_towards_capacity() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        assert_eq!(creator.file_count(), 1);

        creator.add_file("a.txt", "a", FileOptions::default());
        assert_eq!(creator.file_count(), 2);

        let no_listfile = ArchiveCreateSettings {
            listfile_flags: 0,
            ..ArchiveCreateSettings::default()
        };
        assert_eq!(Creator::new(no_listfile, 32).unwrap().file_count(), 0);
    }

    #[test]
    fn full_hash_table_is_an_error() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        for i in 0..32 {
            creator.add_file(&format!("file{}.txt", i), "x", FileOptions::default());
        }

        match creator.write(Cursor::new(Vec::new())) {
            Err(Error::HashTableFull { capacity, required }) => {
                assert_eq!(capacity, 32);
                assert_eq!(required, 33);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn locales_are_separate_files() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        let german = Locale(0x407);

        creator.add_file("greeting.txt", "hello", FileOptions::default());
        creator.add_file(
            "greeting.txt",
            "hallo",
            FileOptions {
                locale: german,
                ..FileOptions::default()
            },
        );
        assert!(creator.has_file("greeting.txt", german));
        assert_eq!(creator.file_count(), 3);

        let mut archive = reopen(&creator);
        assert_eq!(archive.read_file("greeting.txt").unwrap(), b"hello");
        assert_eq!(archive.read_file_locale("greeting.txt", german).unwrap(), b"hallo");

        // listed once
        assert_eq!(archive.files().unwrap(), vec!["greeting.txt".to_string()]);

        assert!(creator.remove_file("greeting.txt", german));
        assert!(!creator.remove_file("greeting.txt", german));
        assert!(creator.has_file("greeting.txt", Locale::NEUTRAL));
    }

    #[test]
    fn every_storage_mode_reads_back() {
        let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let modes = [
            0,
            MPQ_FILE_ENCRYPTED,
            MPQ_FILE_COMPRESS,
            MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED | MPQ_FILE_KEY_V2,
            MPQ_FILE_IMPLODE | MPQ_FILE_ENCRYPTED,
            MPQ_FILE_COMPRESS | MPQ_FILE_SINGLE_UNIT,
            MPQ_FILE_COMPRESS | MPQ_FILE_SINGLE_UNIT | MPQ_FILE_ENCRYPTED,
            MPQ_FILE_COMPRESS | MPQ_FILE_SECTOR_CRC,
        ];

        let mut creator = Creator::new(settings(), 32).unwrap();
        for (i, flags) in modes.iter().enumerate() {
            let options = FileOptions {
                flags: *flags,
                compression: MPQ_COMPRESSION_BZIP2,
                compression_next: MPQ_COMPRESSION_ZLIB,
                ..FileOptions::default()
            };
            creator.add_file(&format!("dir/mode{}.bin", i), contents.clone(), options);
        }

        let mut archive = reopen(&creator);
        for i in 0..modes.len() {
            let name = format!("dir\\mode{}.bin", i);
            assert_eq!(archive.read_file(&name).unwrap(), contents, "{}", name);
        }
    }

    #[test]
    fn empty_files_and_delete_markers() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        creator.add_file(
            "gone.txt",
            Vec::new(),
            FileOptions {
                flags: MPQ_FILE_DELETE_MARKER,
                ..FileOptions::default()
            },
        );
        creator.add_file("empty.txt", Vec::new(), FileOptions::default());

        let mut archive = reopen(&creator);
        assert!(archive.read_file("gone.txt").unwrap().is_empty());
        assert!(archive.read_file("empty.txt").unwrap().is_empty());

        let entries = archive.entries(&[]).unwrap();
        let gone = entries
            .iter()
            .find(|e| e.name.as_ref().map(String::as_str) == Some("gone.txt"))
            .unwrap();
        assert_ne!(gone.flags & MPQ_FILE_DELETE_MARKER, 0);
    }

    #[test]
    fn attributes_cover_every_block() {
        let settings = ArchiveCreateSettings {
            attributes_flags: MPQ_FILE_DEFAULT_INTERNAL,
            attribute_kinds: MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5 | MPQ_ATTRIBUTE_FILETIME,
            ..settings()
        };

        let mut creator = Creator::new(settings, 32).unwrap();
        creator.add_file(
            "a.txt",
            "first",
            FileOptions {
                file_time: 0x01D0_1234_5678_9ABC,
                ..FileOptions::default()
            },
        );
        creator.add_file("b.txt", "second", FileOptions::default());
        assert_eq!(creator.file_count(), 4);

        let mut archive = reopen(&creator);
        let attributes = archive.attributes().unwrap().unwrap();

        assert_eq!(attributes.crc32.len(), 4);
        assert_eq!(attributes.crc32_of(0), Some(crc32(b"first")));
        assert_eq!(attributes.md5_of(1), Some(md5_digest(b"second")));
        assert_eq!(attributes.file_times[0], 0x01D0_1234_5678_9ABC);
        // its own slot is left empty
        assert_eq!(attributes.crc32_of(3), Some(0));
    }

    #[test]
    fn signed_archives_verify() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        creator.add_file("a.txt", "signed contents", FileOptions::default());
        creator.set_weak_signature(true);
        assert_eq!(creator.file_count(), 3);

        let mut cursor = Cursor::new(Vec::new());
        creator.write(&mut cursor).unwrap();
        let mut data = cursor.into_inner();

        let mut archive = Archive::open(Cursor::new(data.clone())).unwrap();
        assert_eq!(archive.signature_kind().unwrap(), SignatureKind::Weak);
        assert!(archive.verify_weak_signature().unwrap());
        assert_eq!(archive.signature().unwrap().unwrap().len(), WEAK_SIGNATURE_SIZE);
        assert_eq!(archive.read_file("a.txt").unwrap(), b"signed contents");

        // the first file's data is covered
        data[HEADER_SIZE_V1 as usize] ^= 0xFF;
        let mut archive = Archive::open(Cursor::new(data)).unwrap();
        assert!(!archive.verify_weak_signature().unwrap());
    }

    #[test]
    fn unsigned_archives_do_not_verify() {
        let creator = Creator::new(settings(), 32).unwrap();
        let mut archive = reopen(&creator);

        assert_eq!(archive.signature_kind().unwrap(), SignatureKind::None);
        assert!(archive.signature().unwrap().is_none());
        assert!(!archive.verify_weak_signature().unwrap());
    }

    #[test]
    fn signatures_start_at_the_header() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        creator.add_file("a.txt", "a", FileOptions::default());
        creator.set_weak_signature(true);

        let mut cursor = Cursor::new(vec![0x55u8; 700]);
        cursor.seek(SeekFrom::End(0)).unwrap();
        creator.write(&mut cursor).unwrap();

        let data = cursor.into_inner();
        assert_eq!(&data[..700], &[0x55u8; 700][..]);

        let mut archive = Archive::open(Cursor::new(data)).unwrap();
        assert_eq!(archive.metadata().header_offset, 1024);
        assert!(archive.verify_weak_signature().unwrap());
    }

    #[test]
    fn signing_grows_a_full_table() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        for i in 0..31 {
            creator.add_file(&format!("file{}.txt", i), "x", FileOptions::default());
        }
        assert_eq!(creator.file_count(), 32);

        creator.set_weak_signature(true);
        assert_eq!(creator.max_file_count(), 64);
        assert!(reopen(&creator).verify_weak_signature().unwrap());
    }

    #[test]
    fn attributes_leave_the_signature_slot_empty() {
        let settings = ArchiveCreateSettings {
            attributes_flags: MPQ_FILE_DEFAULT_INTERNAL,
            attribute_kinds: MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5,
            ..settings()
        };

        let mut creator = Creator::new(settings, 32).unwrap();
        creator.add_file("a.txt", "first", FileOptions::default());
        creator.set_weak_signature(true);

        let mut archive = reopen(&creator);
        let attributes = archive.attributes().unwrap().unwrap();

        assert_eq!(attributes.crc32.len(), 4);
        assert_eq!(attributes.crc32_of(0), Some(crc32(b"first")));
        assert_eq!(attributes.crc32_of(3), Some(0));
        assert!(archive.verify_weak_signature().unwrap());
    }

    #[test]
    fn rewriting_keeps_the_signature() {
        let mut creator = Creator::new(settings(), 32).unwrap();
        creator.add_file("a.txt", "a", FileOptions::default());
        creator.set_weak_signature(true);
        let mut archive = reopen(&creator);

        let mut edited = Creator::from_archive(&mut archive, &[]).unwrap();
        edited.add_file("b.txt", "b", FileOptions::default());

        let mut archive = reopen(&edited);
        assert!(archive.verify_weak_signature().unwrap());
        assert_eq!(archive.read_file("a.txt").unwrap(), b"a");
        assert_eq!(archive.read_file("b.txt").unwrap(), b"b");
    }

    #[test]
    fn default_internal_storage_is_encrypted() {
        let settings = ArchiveCreateSettings::default();
        let mut creator = Creator::new(settings, 32).unwrap();
        creator.add_file("a.txt", "a", FileOptions::default());

        let mut archive = reopen(&creator);
        let entries = archive.entries(&[]).unwrap();
        let listfile = entries
            .iter()
            .find(|e| e.name.as_ref().map(String::as_str) == Some(LISTFILE_NAME))
            .unwrap();

        let expected = MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED | MPQ_FILE_KEY_V2;
        assert_eq!(listfile.flags, expected);
    }
}
