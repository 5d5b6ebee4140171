//! Adding and removing locale variants of archive files.
//!
//! An archive may hold the same path once per locale. The functions here
//! keep those variants apart and grow the archive's capacity before it runs
//! out of hash table slots.

use std::collections::HashSet;

use log::{debug, warn};

use super::archive::FileEntry;
use super::consts::*;
use super::error::Error;
use super::locale::Locale;
use super::settings::CompressionSettings;

/// The archive operations locale-aware editing needs.
pub trait ArchiveStore {
    /// Number of files in the archive, including internal ones.
    fn file_count(&self) -> u32;

    /// Number of files the archive can hold.
    fn max_file_count(&self) -> u32;

    fn set_max_file_count(&mut self, max_file_count: u32) -> Result<(), Error>;

    /// Whether `name` exists for exactly `locale`.
    fn has_file(&self, name: &str, locale: Locale) -> bool;

    fn add_file(
        &mut self,
        name: &str,
        locale: Locale,
        contents: Vec<u8>,
        settings: CompressionSettings,
    ) -> Result<(), Error>;

    /// Removes `name` for exactly `locale`. Returns `false` if there was no
    /// such variant.
    fn remove_file(&mut self, name: &str, locale: Locale) -> Result<bool, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The (name, locale) pair already existed and nothing was written.
    Duplicate,
}

/// Capacity an archive needs to hold `required` files.
pub fn grown_capacity(required: u32) -> u32 {
    required
        .checked_next_power_of_two()
        .unwrap_or(1 << 31)
        .max(MIN_HASH_TABLE_SIZE)
}

/// Adds one locale variant of a file.
///
/// An existing variant with the same name and locale is left alone. The
/// archive's capacity is grown before adding when it is full.
pub fn add_file<S: ArchiveStore>(
    store: &mut S,
    name: &str,
    locale: Locale,
    contents: Vec<u8>,
    settings: CompressionSettings,
) -> Result<AddOutcome, Error> {
    if store.has_file(name, locale) {
        warn!("{} already exists for locale {}, skipping", name, locale);
        return Ok(AddOutcome::Duplicate);
    }

    let required = store.file_count().saturating_add(1);
    if required > store.max_file_count() {
        let capacity = grown_capacity(required);
        debug!(
            "growing archive capacity from {} to {}",
            store.max_file_count(),
            capacity
        );
        store.set_max_file_count(capacity)?;
    }

    store.add_file(name, locale, contents, settings)?;

    Ok(AddOutcome::Added)
}

/// Removes the `locale` variant of a file, leaving other locales untouched.
pub fn remove_file<S: ArchiveStore>(
    store: &mut S,
    name: &str,
    locale: Locale,
) -> Result<bool, Error> {
    store.remove_file(name, locale)
}

/// Keeps the first entry of every (name, locale) pair, in order.
pub fn variants(entries: &[FileEntry]) -> Vec<&FileEntry> {
    let mut seen = HashSet::new();

    entries
        .iter()
        .filter(|entry| seen.insert((entry.display_name().to_lowercase(), entry.locale)))
        .collect()
}
