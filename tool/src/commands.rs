use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{crate_description, crate_name, crate_version, ArgMatches};
use log::{debug, info};
use walkdir::WalkDir;

use mpqkit::consts::*;
use mpqkit::coordinator::{self, grown_capacity};
use mpqkit::*;

use crate::error::CliError;

/// Parses a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(value: &str) -> Result<u32, CliError> {
    let invalid = || CliError::InvalidNumber {
        value: value.to_string(),
    };

    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|_| invalid())
    } else {
        value.parse().map_err(|_| invalid())
    }
}

fn number_of(matches: &ArgMatches, name: &str) -> Result<Option<u32>, CliError> {
    matches.value_of(name).map(parse_number).transpose()
}

fn game_of(matches: &ArgMatches) -> GameProfile {
    GameProfile::from_name(matches.value_of("game").unwrap_or("default"))
}

/// The locale argument. Unknown locales are an error.
fn locale_of(matches: &ArgMatches) -> Result<Locale, CliError> {
    match matches.value_of("locale") {
        None => Ok(Locale::NEUTRAL),
        Some(locale) => Locale::parse(locale).ok_or_else(|| CliError::UnknownLocale {
            locale: locale.to_string(),
            known: Locale::all_langs().join(", "),
        }),
    }
}

/// The locale argument. Unknown locales select the neutral locale.
fn locale_or_neutral(matches: &ArgMatches) -> Locale {
    match matches.value_of("locale") {
        None => Locale::NEUTRAL,
        Some(locale) => Locale::parse(locale).unwrap_or_else(|| {
            println!(
                "[!] Warning: The locale '{}' is unknown. Will use default locale instead.",
                locale
            );
            Locale::NEUTRAL
        }),
    }
}

fn compression_overrides(matches: &ArgMatches) -> Result<CompressionOverrides, CliError> {
    Ok(CompressionOverrides {
        flags: number_of(matches, "flags")?,
        compression: number_of(matches, "compression")?,
        compression_next: number_of(matches, "compression-next")?,
    })
}

/// Names from a listfile given on the command line.
fn extra_names(matches: &ArgMatches) -> Result<Vec<String>, CliError> {
    let path = match matches.value_of("listfile") {
        Some(path) => path,
        None => return Ok(Vec::new()),
    };

    let contents = fs::read(path)?;
    let names = String::from_utf8_lossy(&contents)
        .split(|c| c == '\r' || c == '\n' || c == ';')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(names)
}

fn open_archive(path: &str) -> Result<Archive<io::BufReader<fs::File>>, CliError> {
    let file = fs::File::open(path)?;
    Ok(Archive::open(io::BufReader::new(file))?)
}

pub fn version() -> Result<(), CliError> {
    println!("{} {}", crate_name!(), crate_version!());
    Ok(())
}

pub fn about() -> Result<(), CliError> {
    println!("{} {}", crate_name!(), crate_version!());
    println!("{}", crate_description!());
    println!();
    println!("Libraries used:");
    println!("mpqkit - MIT");
    println!("clap - MIT");
    println!("walkdir - MIT");
    println!("simplelog - MIT");
    Ok(())
}

pub fn info(matches: &ArgMatches) -> Result<(), CliError> {
    let mut archive = open_archive(matches.value_of("archive").unwrap_or_default())?;
    let metadata = archive.metadata();
    let signature = archive.signature_kind()?;

    let properties = [
        ("format-version", "Format version", (metadata.format_version + 1).to_string()),
        ("header-offset", "Header offset", metadata.header_offset.to_string()),
        ("header-size", "Header size", metadata.header_size.to_string()),
        ("archive-size", "Archive size", metadata.archive_size.to_string()),
        ("file-count", "File count", archive.file_count().to_string()),
        ("max-files", "Max files", metadata.hash_table_size.to_string()),
        ("sector-size", "Sector size", metadata.sector_size.to_string()),
        ("signature-type", "Signature type", signature.to_string()),
    ];

    match matches.value_of("property") {
        Some(property) => {
            for (key, _, value) in properties.iter() {
                if *key == property {
                    println!("{}", value);
                }
            }
        }
        None => {
            for (_, label, value) in properties.iter() {
                println!("{}: {}", label, value);
            }
        }
    }

    Ok(())
}

/// Files to put into a new archive, as (name in archive, path on disk).
fn collect_files(target: &Path, name_in_archive: Option<&str>) -> Result<Vec<(String, PathBuf)>, CliError> {
    if target.is_file() {
        let name = match name_in_archive {
            Some(name) => name.to_string(),
            None => target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        return Ok(vec![(name, target.to_path_buf())]);
    }

    if name_in_archive.is_some() {
        return Err(CliError::Usage {
            message: "--name-in-archive can only be used with a single file".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(target).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(target)
            .unwrap_or_else(|_| entry.path());
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\\");

        files.push((name, entry.path().to_path_buf()));
    }

    Ok(files)
}

pub fn create(matches: &ArgMatches) -> Result<(), CliError> {
    let target = Path::new(matches.value_of("target").unwrap_or_default());
    let output = match matches.value_of("output") {
        Some(output) => PathBuf::from(output),
        None => target.with_extension("mpq"),
    };

    if output.exists() {
        return Err(CliError::OutputExists {
            path: output.display().to_string(),
        });
    }

    let locale = locale_of(matches)?;
    let files = collect_files(target, matches.value_of("name-in-archive"))?;

    let mut ruleset = Ruleset::new(game_of(matches));
    ruleset.apply_create_overrides(&CreateSettingsOverrides {
        format_version: number_of(matches, "format-version")?.map(|v| v.saturating_sub(1)),
        stream_flags: number_of(matches, "stream-flags")?,
        listfile_flags: number_of(matches, "file-flags1")?,
        attributes_flags: number_of(matches, "file-flags2")?,
        signature_flags: number_of(matches, "file-flags3")?,
        attribute_kinds: number_of(matches, "attr-flags")?,
        sector_size: number_of(matches, "sector-size")?,
        raw_chunk_size: number_of(matches, "raw-chunk-size")?,
    });
    let overrides = compression_overrides(matches)?;

    info!(
        "creating {} for {} with {} files",
        output.display(),
        ruleset.profile(),
        files.len()
    );

    let capacity = grown_capacity(files.len() as u32);
    let mut archive = ArchiveFile::create(&output, *ruleset.create_settings(), capacity)?;
    if matches.is_present("sign") {
        archive.set_weak_signature(true);
    }

    for (name, path) in files {
        let contents = fs::read(&path)?;
        let settings = ruleset
            .resolve(&name, contents.len() as u32)
            .merge(&overrides);

        add_one(&mut archive, &name, locale, contents, settings)?;
    }

    archive.close()?;

    Ok(())
}

fn add_one(
    archive: &mut ArchiveFile,
    name: &str,
    locale: Locale,
    contents: Vec<u8>,
    settings: CompressionSettings,
) -> Result<(), CliError> {
    debug!(
        "{}: flags 0x{:08X}, compression 0x{:02X}",
        name, settings.flags, settings.compression
    );

    println!("[+] Adding file for locale {}: {}", locale, name);
    if coordinator::add_file(archive, name, locale, contents, settings)? == AddOutcome::Duplicate {
        eprintln!(
            "[!] File for locale {} already exists in MPQ archive: {}",
            locale, name
        );
    }

    Ok(())
}

pub fn add(matches: &ArgMatches) -> Result<(), CliError> {
    let file = Path::new(matches.value_of("file").unwrap_or_default());
    let locale = locale_of(matches)?;

    let mut name = match matches.value_of("name-in-archive") {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    if let Some(dir) = matches.value_of("path") {
        let dir = dir.trim_end_matches(|c| c == '\\' || c == '/');
        if !dir.is_empty() {
            name = format!("{}\\{}", dir, name);
        }
    }
    let name = name.replace('/', "\\");

    let contents = fs::read(file)?;
    let ruleset = Ruleset::new(game_of(matches));
    let settings = ruleset
        .resolve(&name, contents.len() as u32)
        .merge(&compression_overrides(matches)?);

    let mut archive = ArchiveFile::open(matches.value_of("archive").unwrap_or_default(), &[])?;
    add_one(&mut archive, &name, locale, contents, settings)?;
    archive.close()?;

    Ok(())
}

pub fn remove(matches: &ArgMatches) -> Result<(), CliError> {
    let name = matches.value_of("file").unwrap_or_default();
    let locale = locale_of(matches)?;

    let mut archive = ArchiveFile::open(matches.value_of("archive").unwrap_or_default(), &[])?;

    println!("[-] Removing file for locale {}: {}", locale, name);
    if !coordinator::remove_file(&mut archive, name, locale)? {
        eprintln!(
            "[!] Failed: File doesn't exist for locale {}: {}",
            locale, name
        );
    }

    archive.close()?;

    Ok(())
}

fn list_property(entry: &FileEntry, property: &str) -> String {
    match property {
        "hash-index" => entry.hash_index.to_string(),
        "file-index" => entry.block_index.to_string(),
        "byte-offset" => format!("0x{:08X}", entry.file_pos),
        "file-size" => entry.file_size.to_string(),
        "compressed-size" => entry.compressed_size.to_string(),
        "flags" => format!("0x{:08X}", entry.flags),
        "locale" => entry
            .locale
            .lang()
            .map_or_else(|| entry.locale.to_string(), str::to_string),
        _ => String::new(),
    }
}

pub fn list(matches: &ArgMatches) -> Result<(), CliError> {
    let mut archive = open_archive(matches.value_of("archive").unwrap_or_default())?;
    let entries = archive.entries(&extra_names(matches)?)?;

    let properties: Vec<&str> = match matches.values_of("property") {
        Some(values) => values.collect(),
        None if matches.is_present("detailed") => {
            vec!["file-size", "compressed-size", "flags", "locale"]
        }
        None => Vec::new(),
    };

    for entry in coordinator::variants(&entries) {
        let mut columns: Vec<String> = properties
            .iter()
            .map(|property| list_property(entry, property))
            .collect();
        columns.push(entry.display_name());

        println!("{}", columns.join("  "));
    }

    Ok(())
}

fn output_path(dir: &Path, name: &str) -> PathBuf {
    name.split(|c| c == '\\' || c == '/')
        .filter(|part| !part.is_empty() && *part != "..")
        .fold(dir.to_path_buf(), |path, part| path.join(part))
}

fn write_extracted(dir: &Path, name: &str, contents: &[u8]) -> Result<(), CliError> {
    let path = output_path(dir, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&path, contents)?;
    println!("[*] Extracted: {}", name);

    Ok(())
}

pub fn extract(matches: &ArgMatches) -> Result<(), CliError> {
    let archive_path = matches.value_of("archive").unwrap_or_default();
    let output = match matches.value_of("output") {
        Some(output) => PathBuf::from(output),
        None => Path::new(archive_path).with_extension(""),
    };
    let locale = locale_or_neutral(matches);

    let mut archive = open_archive(archive_path)?;
    fs::create_dir_all(&output)?;

    if let Some(name) = matches.value_of("file") {
        match archive.read_file_locale(name, locale) {
            Ok(contents) => write_extracted(&output, name, &contents)?,
            Err(Error::FileNotFound) => eprintln!("[!] Failed: File doesn't exist: {}", name),
            Err(err) => return Err(err.into()),
        }

        return Ok(());
    }

    let entries = archive.entries(&extra_names(matches)?)?;

    // one variant per name: the requested locale, else neutral, else the first
    let mut chosen: Vec<&FileEntry> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for entry in &entries {
        let key = entry.display_name().to_lowercase();
        match positions.get(&key) {
            None => {
                positions.insert(key, chosen.len());
                chosen.push(entry);
            }
            Some(&position) => {
                let current = chosen[position].locale;
                let better = entry.locale == locale
                    || (current != locale && entry.locale.is_neutral() && !current.is_neutral());
                if better && current != entry.locale {
                    chosen[position] = entry;
                }
            }
        }
    }

    for entry in chosen {
        let name = entry.display_name();
        match archive.read_entry(entry) {
            Ok(contents) => write_extracted(&output, &name, &contents)?,
            Err(err) => eprintln!("[!] Failed: {}: {}", name, err),
        }
    }

    Ok(())
}

pub fn read(matches: &ArgMatches) -> Result<(), CliError> {
    let name = matches.value_of("file").unwrap_or_default();
    let locale = locale_or_neutral(matches);
    let mut archive = open_archive(matches.value_of("archive").unwrap_or_default())?;

    match archive.read_file_locale(name, locale) {
        Ok(contents) => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            stdout.write_all(&contents)?;
            stdout.flush()?;
        }
        Err(Error::FileNotFound) => eprintln!("[!] Failed: File doesn't exist: {}", name),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

/// Checks the archive signature, then every file against its `(attributes)`
/// checksums if the archive has any.
pub fn verify(matches: &ArgMatches) -> Result<bool, CliError> {
    let mut archive = open_archive(matches.value_of("archive").unwrap_or_default())?;

    if matches.is_present("print") {
        return match archive.signature()? {
            Some(signature) => {
                let stdout = io::stdout();
                let mut stdout = stdout.lock();
                stdout.write_all(&signature)?;
                stdout.flush()?;
                Ok(true)
            }
            None => {
                eprintln!("[!] Archive is not signed");
                Ok(false)
            }
        };
    }

    let mut ok = match archive.signature_kind()? {
        SignatureKind::None => {
            eprintln!("[!] Archive is not signed");
            false
        }
        SignatureKind::Weak => {
            let valid = archive.verify_weak_signature()?;
            if !valid {
                eprintln!("[!] Weak signature does not match");
            }
            valid
        }
        SignatureKind::Strong => {
            eprintln!("[!] Strong signatures cannot be checked");
            false
        }
    };

    if let Some(attributes) = archive.attributes()? {
        let names = extra_names(matches)?;
        ok &= verify_entries(&mut archive, &attributes, &names)?;
    }

    if ok {
        println!("[*] Verify success");
    } else {
        println!("[!] Verify failed");
    }

    Ok(ok)
}

fn verify_entries<R>(
    archive: &mut Archive<R>,
    attributes: &Attributes,
    extra_names: &[String],
) -> Result<bool, CliError>
where
    R: io::Read + io::Seek,
{
    let mut ok = true;

    for entry in archive.entries(extra_names)? {
        let name = match &entry.name {
            Some(name) if name == ATTRIBUTES_NAME || name == SIGNATURE_NAME => continue,
            Some(name) => name.clone(),
            None => {
                eprintln!("[!] Cannot check unnamed file: {}", entry.display_name());
                ok = false;
                continue;
            }
        };

        let contents = match archive.read_entry(&entry) {
            Ok(contents) => contents,
            Err(err) => {
                eprintln!("[!] {}: {}", name, err);
                ok = false;
                continue;
            }
        };

        let index = entry.block_index as usize;

        if let Some(expected) = attributes.crc32_of(index) {
            if expected != attributes::crc32(&contents) {
                eprintln!("[!] {}: CRC32 mismatch", name);
                ok = false;
            }
        }

        if let Some(expected) = attributes.md5_of(index) {
            if expected != attributes::md5_digest(&contents) {
                eprintln!("[!] {}: MD5 mismatch", name);
                ok = false;
            }
        }
    }

    Ok(ok)
}
