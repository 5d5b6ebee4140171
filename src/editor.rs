use std::fs;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::archive::Archive;
use super::coordinator::ArchiveStore;
use super::creator::{Creator, FileOptions};
use super::error::Error;
use super::locale::Locale;
use super::settings::*;

#[derive(Debug)]
/// An archive on disk, opened for editing.
///
/// The whole archive is held in memory. Changes reach the disk only when
/// [`close`](#method.close) is called. Dropping an archive with unsaved
/// changes leaves the file untouched.
pub struct ArchiveFile {
    path: PathBuf,
    creator: Creator,
    dirty: bool,
}

impl ArchiveFile {
    /// Starts a new, empty archive at `path`. Nothing is written until
    /// the archive is closed.
    pub fn create<P: AsRef<Path>>(
        path: P,
        settings: ArchiveCreateSettings,
        max_file_count: u32,
    ) -> Result<ArchiveFile, Error> {
        let creator = Creator::new(settings, max_file_count)?;

        Ok(ArchiveFile {
            path: path.as_ref().to_path_buf(),
            creator,
            dirty: true,
        })
    }

    /// Loads an existing archive. `extra_names` name files missing from its
    /// `(listfile)`.
    pub fn open<P: AsRef<Path>>(path: P, extra_names: &[String]) -> Result<ArchiveFile, Error> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        let mut archive = Archive::open(BufReader::new(file))?;
        let creator = Creator::from_archive(&mut archive, extra_names)?;

        debug!("opened {} for editing", path.display());

        Ok(ArchiveFile {
            path: path.to_path_buf(),
            creator,
            dirty: false,
        })
    }

    /// Signs the archive with a weak signature when it is saved, or stops
    /// signing it.
    pub fn set_weak_signature(&mut self, signed: bool) {
        self.creator.set_weak_signature(signed);
        self.dirty = true;
    }

    /// Writes the archive back to its path, if anything changed.
    pub fn close(mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let mut cursor = Cursor::new(Vec::new());
        self.creator.write(&mut cursor)?;
        fs::write(&self.path, cursor.into_inner())?;

        debug!("saved {}", self.path.display());
        self.dirty = false;

        Ok(())
    }
}

impl Drop for ArchiveFile {
    fn drop(&mut self) {
        if self.dirty {
            warn!("{} was not saved, discarding changes", self.path.display());
        }
    }
}

impl ArchiveStore for ArchiveFile {
    fn file_count(&self) -> u32 {
        self.creator.file_count()
    }

    fn max_file_count(&self) -> u32 {
        self.creator.max_file_count()
    }

    fn set_max_file_count(&mut self, max_file_count: u32) -> Result<(), Error> {
        self.creator.set_max_file_count(max_file_count)?;
        self.dirty = true;

        Ok(())
    }

    fn has_file(&self, name: &str, locale: Locale) -> bool {
        self.creator.has_file(name, locale)
    }

    fn add_file(
        &mut self,
        name: &str,
        locale: Locale,
        contents: Vec<u8>,
        settings: CompressionSettings,
    ) -> Result<(), Error> {
        self.creator
            .add_file(name, contents, FileOptions::from_settings(settings, locale));
        self.dirty = true;

        Ok(())
    }

    fn remove_file(&mut self, name: &str, locale: Locale) -> Result<bool, Error> {
        let removed = self.creator.remove_file(name, locale);
        self.dirty |= removed;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::coordinator;

    fn zlib() -> CompressionSettings {
        CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_ZLIB)
    }

    #[test]
    fn changes_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mpq");

        let mut archive = ArchiveFile::create(&path, ArchiveCreateSettings::default(), 32).unwrap();
        archive
            .add_file("a.txt", Locale::NEUTRAL, b"alpha".to_vec(), zlib())
            .unwrap();
        archive
            .add_file("a.txt", Locale(0x407), b"alfa".to_vec(), zlib())
            .unwrap();
        archive.close().unwrap();

        let mut archive = ArchiveFile::open(&path, &[]).unwrap();
        assert!(archive.has_file("a.txt", Locale(0x407)));
        assert!(archive.remove_file("a.txt", Locale(0x407)).unwrap());
        archive.close().unwrap();

        let mut reader = Archive::open(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.read_file("a.txt").unwrap(), b"alpha");
        assert_eq!(reader.locales("a.txt"), vec![Locale::NEUTRAL]);
    }

    #[test]
    fn unsaved_changes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mpq");

        ArchiveFile::create(&path, ArchiveCreateSettings::default(), 32)
            .unwrap()
            .close()
            .unwrap();
        let before = fs::read(&path).unwrap();

        {
            let mut archive = ArchiveFile::open(&path, &[]).unwrap();
            archive
                .add_file("a.txt", Locale::NEUTRAL, b"alpha".to_vec(), zlib())
                .unwrap();
        }

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn signed_archives_stay_signed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signed.mpq");

        let mut archive = ArchiveFile::create(&path, ArchiveCreateSettings::default(), 32).unwrap();
        archive.set_weak_signature(true);
        archive
            .add_file("a.txt", Locale::NEUTRAL, b"alpha".to_vec(), zlib())
            .unwrap();
        archive.close().unwrap();

        let mut archive = ArchiveFile::open(&path, &[]).unwrap();
        archive
            .add_file("b.txt", Locale::NEUTRAL, b"beta".to_vec(), zlib())
            .unwrap();
        archive.close().unwrap();

        let mut reader = Archive::open(fs::File::open(&path).unwrap()).unwrap();
        assert!(reader.verify_weak_signature().unwrap());
        assert_eq!(reader.read_file("b.txt").unwrap(), b"beta");
    }

    #[test]
    fn capacity_grows_past_the_initial_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.mpq");

        let mut archive = ArchiveFile::create(&path, ArchiveCreateSettings::default(), 32).unwrap();
        for i in 0..40 {
            let name = format!("file{}.txt", i);
            coordinator::add_file(&mut archive, &name, Locale::NEUTRAL, vec![i as u8], zlib())
                .unwrap();
        }
        assert_eq!(archive.max_file_count(), 64);
        archive.close().unwrap();

        let mut reader = Archive::open(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.metadata().hash_table_size, 64);
        assert_eq!(reader.read_file("file39.txt").unwrap(), vec![39]);
    }
}
