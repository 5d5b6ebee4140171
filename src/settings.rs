//! Archive creation and per-file storage settings, and how user overrides
//! are merged into them.
//!
//! Overrides carry every field as an `Option`: `None` leaves the field as the
//! game profile set it, while `Some(0)` is an explicit zero. Values are not
//! validated here; the archive engine reports whatever it cannot honour.

use super::consts::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Parameters an archive is created with.
pub struct ArchiveCreateSettings {
    /// Zero-based format version, `0` to `3` for MPQ v1 to v4.
    pub format_version: u32,
    pub stream_flags: u32,
    /// Storage flags of the `(listfile)`, `0` to leave it out.
    pub listfile_flags: u32,
    /// Storage flags of the `(attributes)`, `0` to leave it out.
    pub attributes_flags: u32,
    /// Storage flags of the `(signature)`.
    pub signature_flags: u32,
    /// Which `MPQ_ATTRIBUTE_*` arrays the `(attributes)` holds.
    pub attribute_kinds: u32,
    pub sector_size: u32,
    pub raw_chunk_size: u32,
}

impl Default for ArchiveCreateSettings {
    fn default() -> ArchiveCreateSettings {
        ArchiveCreateSettings {
            format_version: u32::from(MPQ_FORMAT_VERSION_1),
            stream_flags: STREAM_PROVIDER_FLAT | BASE_PROVIDER_FILE,
            listfile_flags: MPQ_FILE_DEFAULT_INTERNAL,
            attributes_flags: 0,
            signature_flags: MPQ_FILE_DEFAULT_INTERNAL,
            attribute_kinds: 0,
            sector_size: 0x1000,
            raw_chunk_size: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateSettingsOverrides {
    pub format_version: Option<u32>,
    pub stream_flags: Option<u32>,
    pub listfile_flags: Option<u32>,
    pub attributes_flags: Option<u32>,
    pub signature_flags: Option<u32>,
    pub attribute_kinds: Option<u32>,
    pub sector_size: Option<u32>,
    pub raw_chunk_size: Option<u32>,
}

impl ArchiveCreateSettings {
    /// Returns these settings with every present override applied.
    ///
    /// An `(attributes)` file is only written when both its storage flags and
    /// its attribute kinds are non-zero. So when kinds end up set but the
    /// storage flags are zero and the override did not set them, the storage
    /// flags become `MPQ_FILE_DEFAULT_INTERNAL`.
    pub fn merge(&self, overrides: &CreateSettingsOverrides) -> ArchiveCreateSettings {
        let mut merged = *self;

        apply(&mut merged.format_version, overrides.format_version);
        apply(&mut merged.stream_flags, overrides.stream_flags);
        apply(&mut merged.sector_size, overrides.sector_size);
        apply(&mut merged.raw_chunk_size, overrides.raw_chunk_size);
        apply(&mut merged.listfile_flags, overrides.listfile_flags);
        apply(&mut merged.attributes_flags, overrides.attributes_flags);
        apply(&mut merged.signature_flags, overrides.signature_flags);
        apply(&mut merged.attribute_kinds, overrides.attribute_kinds);

        if overrides.attributes_flags.is_none()
            && merged.attributes_flags == 0
            && merged.attribute_kinds != 0
        {
            merged.attributes_flags = MPQ_FILE_DEFAULT_INTERNAL;
        }

        merged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a single file is stored.
pub struct CompressionSettings {
    /// `MPQ_FILE_*` flags.
    pub flags: u32,
    /// Codec mask of the first sector.
    pub compression: u32,
    /// Codec mask of every later sector, or `MPQ_COMPRESSION_NEXT_SAME`.
    pub compression_next: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionOverrides {
    pub flags: Option<u32>,
    pub compression: Option<u32>,
    pub compression_next: Option<u32>,
}

impl CompressionSettings {
    pub fn new(flags: u32, compression: u32) -> CompressionSettings {
        CompressionSettings {
            flags,
            compression,
            compression_next: MPQ_COMPRESSION_NEXT_SAME,
        }
    }

    pub fn with_next(mut self, compression_next: u32) -> CompressionSettings {
        self.compression_next = compression_next;
        self
    }

    /// Returns these settings with every present override applied.
    pub fn merge(&self, overrides: &CompressionOverrides) -> CompressionSettings {
        let mut merged = *self;

        apply(&mut merged.flags, overrides.flags);
        apply(&mut merged.compression, overrides.compression);
        apply(&mut merged.compression_next, overrides.compression_next);

        merged
    }

    /// Codec mask used for sectors after the first.
    pub fn next_compression(&self) -> u32 {
        if self.compression_next == MPQ_COMPRESSION_NEXT_SAME {
            self.compression
        } else {
            self.compression_next
        }
    }
}

fn apply(field: &mut u32, value: Option<u32>) {
    if let Some(value) = value {
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_attributes() -> ArchiveCreateSettings {
        ArchiveCreateSettings {
            listfile_flags: MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS,
            attributes_flags: MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS,
            attribute_kinds: MPQ_ATTRIBUTE_CRC32,
            ..ArchiveCreateSettings::default()
        }
    }

    #[test]
    fn absent_fields_are_untouched() {
        let base = with_attributes();
        assert_eq!(base.merge(&CreateSettingsOverrides::default()), base);

        let overrides = CreateSettingsOverrides {
            sector_size: Some(0x4000),
            ..CreateSettingsOverrides::default()
        };
        let merged = base.merge(&overrides);
        assert_eq!(merged.sector_size, 0x4000);
        assert_eq!(merged.listfile_flags, base.listfile_flags);
        // the original stays as it was
        assert_eq!(base.sector_size, 0x1000);
    }

    #[test]
    fn values_are_not_validated() {
        let overrides = CreateSettingsOverrides {
            format_version: Some(17),
            sector_size: Some(3),
            ..CreateSettingsOverrides::default()
        };
        let merged = ArchiveCreateSettings::default().merge(&overrides);

        assert_eq!(merged.format_version, 17);
        assert_eq!(merged.sector_size, 3);
    }

    #[test]
    fn attribute_kinds_enable_attributes_file() {
        let overrides = CreateSettingsOverrides {
            attribute_kinds: Some(MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5),
            ..CreateSettingsOverrides::default()
        };
        let merged = ArchiveCreateSettings::default().merge(&overrides);

        assert_eq!(merged.attribute_kinds, MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5);
        assert_eq!(merged.attributes_flags, MPQ_FILE_DEFAULT_INTERNAL);
    }

    #[test]
    fn explicit_zero_attribute_storage_is_respected() {
        let overrides = CreateSettingsOverrides {
            attributes_flags: Some(0),
            attribute_kinds: Some(MPQ_ATTRIBUTE_CRC32),
            ..CreateSettingsOverrides::default()
        };
        let merged = ArchiveCreateSettings::default().merge(&overrides);

        assert_eq!(merged.attributes_flags, 0);
        assert_eq!(merged.attribute_kinds, MPQ_ATTRIBUTE_CRC32);
    }

    #[test]
    fn existing_attribute_storage_is_kept() {
        let merged = with_attributes().merge(&CreateSettingsOverrides::default());
        assert_eq!(merged.attributes_flags, MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS);
    }

    #[test]
    fn merging_is_idempotent() {
        let overrides = CreateSettingsOverrides {
            format_version: Some(1),
            attribute_kinds: Some(MPQ_ATTRIBUTE_FILETIME),
            ..CreateSettingsOverrides::default()
        };
        let once = ArchiveCreateSettings::default().merge(&overrides);
        assert_eq!(once.merge(&overrides), once);

        let file_overrides = CompressionOverrides {
            compression: Some(MPQ_COMPRESSION_BZIP2),
            ..CompressionOverrides::default()
        };
        let settings = CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_ZLIB);
        let once = settings.merge(&file_overrides);
        assert_eq!(once.merge(&file_overrides), once);
    }

    #[test]
    fn compression_overrides() {
        let settings = CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_ZLIB)
            .with_next(MPQ_COMPRESSION_HUFFMANN);

        let merged = settings.merge(&CompressionOverrides {
            flags: Some(0),
            ..CompressionOverrides::default()
        });
        assert_eq!(merged.flags, 0);
        assert_eq!(merged.compression, MPQ_COMPRESSION_ZLIB);
        assert_eq!(merged.compression_next, MPQ_COMPRESSION_HUFFMANN);
    }

    #[test]
    fn next_same_follows_the_first_sector() {
        let settings = CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_BZIP2);
        assert_eq!(settings.next_compression(), MPQ_COMPRESSION_BZIP2);

        let settings = settings.with_next(MPQ_COMPRESSION_ZLIB);
        assert_eq!(settings.next_compression(), MPQ_COMPRESSION_ZLIB);
    }
}
