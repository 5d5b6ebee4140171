//! Per-game storage rules.
//!
//! A [`Ruleset`](struct.Ruleset.html) is an ordered list of rules that
//! decides how each file is stored. Rules are tried in order and the first
//! one that matches wins, so specific masks have to come before general ones.
//! Every list ends with a default rule that matches everything.

use log::trace;

use super::consts::*;
use super::error::Error;
use super::profile::GameProfile;
use super::settings::*;
use super::wildcard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionRule {
    /// Matches file names against a glob, see [`wildcard::matches`](../wildcard/fn.matches.html).
    NameMask {
        pattern: String,
        settings: CompressionSettings,
    },
    /// Matches file sizes in `min..=max`. A `max` of `u32::MAX` has no upper bound.
    SizeRange {
        min: u32,
        max: u32,
        settings: CompressionSettings,
    },
    Default {
        settings: CompressionSettings,
    },
}

impl CompressionRule {
    pub fn matches(&self, name: &str, size: u32) -> bool {
        match self {
            CompressionRule::NameMask { pattern, .. } => wildcard::matches(name, pattern),
            CompressionRule::SizeRange { min, max, .. } => {
                size >= *min && (*max == u32::MAX || size <= *max)
            }
            CompressionRule::Default { .. } => true,
        }
    }

    pub fn settings(&self) -> CompressionSettings {
        match self {
            CompressionRule::NameMask { settings, .. }
            | CompressionRule::SizeRange { settings, .. }
            | CompressionRule::Default { settings } => *settings,
        }
    }

    pub fn is_default(&self) -> bool {
        match self {
            CompressionRule::Default { .. } => true,
            _ => false,
        }
    }
}

/// A rule list that is known to end with a default rule.
///
/// Only [`RulesetBuilder::fallback`](struct.RulesetBuilder.html#method.fallback)
/// produces one.
#[derive(Debug, Clone)]
pub struct RuleList(Vec<CompressionRule>);

#[derive(Debug, Default)]
/// Builds a rule list in order. Finishing it requires the default rule.
pub struct RulesetBuilder {
    rules: Vec<CompressionRule>,
}

impl RulesetBuilder {
    pub fn new() -> RulesetBuilder {
        RulesetBuilder::default()
    }

    pub fn mask(mut self, pattern: &str, flags: u32, compression: u32) -> RulesetBuilder {
        self.rules.push(CompressionRule::NameMask {
            pattern: pattern.to_string(),
            settings: CompressionSettings::new(flags, compression),
        });
        self
    }

    pub fn size(mut self, min: u32, max: u32, flags: u32, compression: u32) -> RulesetBuilder {
        self.rules.push(CompressionRule::SizeRange {
            min,
            max,
            settings: CompressionSettings::new(flags, compression),
        });
        self
    }

    /// Sets the codec of later sectors for the rule added last.
    pub fn next(mut self, compression_next: u32) -> RulesetBuilder {
        if let Some(rule) = self.rules.last_mut() {
            match rule {
                CompressionRule::NameMask { settings, .. }
                | CompressionRule::SizeRange { settings, .. }
                | CompressionRule::Default { settings } => {
                    *settings = settings.with_next(compression_next)
                }
            }
        }
        self
    }

    /// Appends the default rule and finishes the list.
    pub fn fallback(mut self, flags: u32, compression: u32) -> RuleList {
        self.rules.push(CompressionRule::Default {
            settings: CompressionSettings::new(flags, compression),
        });
        RuleList(self.rules)
    }
}

#[derive(Debug, Clone)]
/// Storage rules and archive creation settings of one game profile.
pub struct Ruleset {
    profile: GameProfile,
    rules: Vec<CompressionRule>,
    create_settings: ArchiveCreateSettings,
}

impl Ruleset {
    /// Builds the rules and creation settings of a game profile.
    pub fn new(profile: GameProfile) -> Ruleset {
        let (rules, create_settings) = profile_rules(profile);

        Ruleset {
            profile,
            rules: rules.0,
            create_settings,
        }
    }

    /// Builds a ruleset from a caller-supplied rule list.
    ///
    /// Fails with `Error::MissingDefaultRule` unless the last rule is a
    /// default rule.
    pub fn with_rules(
        profile: GameProfile,
        rules: Vec<CompressionRule>,
        create_settings: ArchiveCreateSettings,
    ) -> Result<Ruleset, Error> {
        match rules.last() {
            Some(rule) if rule.is_default() => Ok(Ruleset {
                profile,
                rules,
                create_settings,
            }),
            _ => Err(Error::MissingDefaultRule),
        }
    }

    pub fn profile(&self) -> GameProfile {
        self.profile
    }

    pub fn rules(&self) -> &[CompressionRule] {
        &self.rules
    }

    pub fn create_settings(&self) -> &ArchiveCreateSettings {
        &self.create_settings
    }

    /// Replaces creation settings with the given overrides, see
    /// [`ArchiveCreateSettings::merge`](../settings/struct.ArchiveCreateSettings.html#method.merge).
    pub fn apply_create_overrides(&mut self, overrides: &CreateSettingsOverrides) {
        self.create_settings = self.create_settings.merge(overrides);
    }

    /// Decides how to store a file, using the first rule that matches.
    pub fn resolve(&self, name: &str, size: u32) -> CompressionSettings {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(name, size) {
                trace!(
                    "{}: rule #{} of {} matched {} ({} bytes)",
                    self.profile,
                    index,
                    self.rules.len(),
                    name,
                    size
                );
                return rule.settings();
            }
        }

        CompressionSettings::new(MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED, MPQ_COMPRESSION_PKWARE)
    }
}

fn profile_rules(profile: GameProfile) -> (RuleList, ArchiveCreateSettings) {
    const C: u32 = MPQ_FILE_COMPRESS;
    const E: u32 = MPQ_FILE_ENCRYPTED;
    const K: u32 = MPQ_FILE_KEY_V2;
    const I: u32 = MPQ_FILE_IMPLODE;
    const S: u32 = MPQ_FILE_SECTOR_CRC;
    const U: u32 = MPQ_FILE_SINGLE_UNIT;
    const D: u32 = MPQ_FILE_DELETE_MARKER;
    const X: u32 = MPQ_FILE_EXISTS;

    const ZLIB: u32 = MPQ_COMPRESSION_ZLIB;
    const PKWARE: u32 = MPQ_COMPRESSION_PKWARE;
    const HUFFMANN: u32 = MPQ_COMPRESSION_HUFFMANN;
    const ADPCM_MONO: u32 = MPQ_COMPRESSION_ADPCM_MONO;
    const ADPCM_STEREO: u32 = MPQ_COMPRESSION_ADPCM_STEREO;

    let mut settings = ArchiveCreateSettings::default();

    let rules = match profile {
        GameProfile::Diablo1 | GameProfile::LordsOfMagic => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.sector_size = 0x1000;

            RulesetBuilder::new()
                .mask("*.wav", E, 0)
                .next(0)
                .mask("*.smk", 0, 0)
                .next(0)
                .mask("*.bik", 0, 0)
                .next(0)
                .mask("*.mpq", E, 0)
                .next(0)
                .mask("game", I, 0)
                .next(0)
                .mask("hero", I, 0)
                .next(0)
                .fallback(I | E, PKWARE)
        }
        GameProfile::Warcraft2 | GameProfile::StarCraft1 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.listfile_flags = X | C | S;
            settings.attributes_flags = X | C | S;
            settings.sector_size = 0x1000;

            RulesetBuilder::new()
                .mask("*.wav", C | E | K, PKWARE)
                .next(HUFFMANN | ADPCM_STEREO)
                .mask("*.smk", 0, 0)
                .next(0)
                .mask("*.bik", 0, 0)
                .next(0)
                .mask("*.mpq", 0, 0)
                .next(0)
                .fallback(C | E | K, PKWARE)
        }
        GameProfile::Diablo2 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.sector_size = 0x1000;

            RulesetBuilder::new()
                .mask("*.wav", C | E | K, PKWARE)
                .next(HUFFMANN | ADPCM_STEREO)
                .mask("*.d2", C, PKWARE)
                .mask("*.txt", C, PKWARE)
                .mask("*.dc6", C, PKWARE)
                .mask("*.tbl", C, PKWARE)
                .mask("*.map", C, PKWARE)
                .mask("*.key", C, PKWARE)
                .mask("*.dat", C, PKWARE)
                .mask("*.ds1", C, PKWARE)
                .mask("*.dcc", C, PKWARE)
                .mask("*.cof", C, PKWARE)
                .mask("*.dt1", C, PKWARE)
                .mask("*.pl2", C, PKWARE)
                .mask("*.dn1", C, PKWARE)
                .mask("*.ico", C, PKWARE)
                .fallback(C | E | K, PKWARE)
        }
        GameProfile::Warcraft3 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.sector_size = 0x1000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds = MPQ_ATTRIBUTE_FILETIME | MPQ_ATTRIBUTE_CRC32;

            RulesetBuilder::new()
                .mask("Abilities\\*.wav", C, ZLIB)
                .next(HUFFMANN | ADPCM_MONO)
                .mask("Buildings\\*.wav", C, ZLIB)
                .next(HUFFMANN | ADPCM_MONO)
                .mask("*.wav", C | E | K, ZLIB)
                .next(HUFFMANN | ADPCM_MONO)
                .mask("ReplaceableTextures\\WorldEditUI\\*.blp", C, ZLIB)
                .mask("ReplaceableTextures\\Selection\\*.blp", C, ZLIB)
                .mask("ReplaceableTextures\\Shadows\\*.blp", C, ZLIB)
                .mask("UI\\Glues\\Loading\\Backgrounds\\*.blp", 0, 0)
                .mask("UI\\Glues\\Loading\\Multiplayer\\*.blp", 0, 0)
                .mask("UI\\*.blp", C, ZLIB)
                .mask("*.blp", 0, 0)
                .mask("Maps\\Campaign\\*.w3m", 0, 0)
                .mask("*.w3m", C | E | K, PKWARE)
                .mask("*.toc", C, ZLIB)
                .mask("*.ifl", C, ZLIB)
                .mask("*.mdx", C, ZLIB)
                .mask("*.tga", C, ZLIB)
                .mask("*.slk", C, ZLIB)
                .mask("*.ai", C, ZLIB)
                .mask("*.j", C, ZLIB)
                .mask("*.txt", C | E | K, ZLIB)
                .mask("*.fdf", C | E | K, ZLIB)
                .mask("*.pld", C | E | K, ZLIB)
                .mask("*.mid", C | E | K, ZLIB)
                .mask("*.dls", C | E | K, ZLIB)
                .mask("*.mpq", 0, 0)
                .mask("*.mp3", 0, 0)
                .fallback(C | E | K, PKWARE)
        }
        GameProfile::Warcraft3Map => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.sector_size = 0x1000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds = MPQ_ATTRIBUTE_FILETIME | MPQ_ATTRIBUTE_CRC32;

            RulesetBuilder::new().fallback(C, ZLIB)
        }
        GameProfile::Wow1 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_1);
            settings.sector_size = 0x1000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds =
                MPQ_ATTRIBUTE_FILETIME | MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5;

            RulesetBuilder::new()
                .mask("*.mp3", 0, 0)
                .fallback(C, ZLIB)
        }
        GameProfile::Wow2 | GameProfile::Wow3 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_2);
            settings.sector_size = 0x1000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds =
                MPQ_ATTRIBUTE_FILETIME | MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5;

            RulesetBuilder::new()
                .mask("*.mp3", 0, 0)
                .fallback(C | S, ZLIB)
        }
        GameProfile::Wow4 | GameProfile::Wow5 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_4);
            settings.raw_chunk_size = 0x4000;
            settings.sector_size = 0x4000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds = MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5;

            RulesetBuilder::new()
                .size(0, 0, D, 0)
                .mask("*.mp3", 0, 0)
                .mask("*.ogg", 0, 0)
                .mask("*.ogv", 0, 0)
                .size(0, 0x4000, C | U, ZLIB)
                .fallback(C | S, ZLIB)
        }
        GameProfile::StarCraft2 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_2);
            settings.sector_size = 0x4000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds = MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5;

            RulesetBuilder::new()
                .size(0, 0, D, 0)
                .mask("*.mp3", 0, 0)
                .mask("*.ogg", 0, 0)
                .mask("*.ogv", 0, 0)
                .size(0, 0x4000, C | U, ZLIB)
                .mask("*.wav", C, ZLIB)
                .fallback(C | S, ZLIB)
        }
        GameProfile::Diablo3 => {
            settings.format_version = u32::from(MPQ_FORMAT_VERSION_4);
            settings.raw_chunk_size = 0x4000;
            settings.sector_size = 0x4000;
            settings.listfile_flags = X | C;
            settings.attributes_flags = X | C;
            settings.attribute_kinds = MPQ_ATTRIBUTE_CRC32 | MPQ_ATTRIBUTE_MD5;

            RulesetBuilder::new()
                .size(0, 0, D, 0)
                .mask("*.mp3", 0, 0)
                .mask("*.ogg", 0, 0)
                .mask("*.ogv", 0, 0)
                .size(0, 0x4000, C | U, ZLIB)
                .fallback(C, ZLIB)
        }
        GameProfile::Generic => RulesetBuilder::new().fallback(C | E, PKWARE),
    };

    (rules, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEK: u32 = MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED | MPQ_FILE_KEY_V2;

    #[test]
    fn every_profile_ends_with_a_default_rule() {
        for profile in GameProfile::ALL.iter() {
            let ruleset = Ruleset::new(*profile);
            assert_eq!(ruleset.profile(), *profile);
            assert!(ruleset.rules().last().map_or(false, CompressionRule::is_default));
            assert_eq!(ruleset.rules().iter().filter(|r| r.is_default()).count(), 1);
        }
    }

    #[test]
    fn first_match_wins() {
        let ruleset = Ruleset::new(GameProfile::Warcraft3);

        // also matches the later `*.wav` rule, which would encrypt it
        let settings = ruleset.resolve("Abilities\\Spells\\spell.wav", 100);
        assert_eq!(settings.flags, MPQ_FILE_COMPRESS);
        assert_eq!(settings.compression, MPQ_COMPRESSION_ZLIB);
        assert_eq!(
            settings.compression_next,
            MPQ_COMPRESSION_HUFFMANN | MPQ_COMPRESSION_ADPCM_MONO
        );

        let settings = ruleset.resolve("UI\\Glues\\Loading\\Backgrounds\\Human.blp", 100);
        assert_eq!(settings, CompressionSettings::new(0, 0));

        let settings = ruleset.resolve("UI\\Widgets\\Console.blp", 100);
        assert_eq!(settings, CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_ZLIB));
    }

    #[test]
    fn warcraft3_end_to_end() {
        let ruleset = Ruleset::new(GameProfile::from_name("wc3"));

        let settings = ruleset.resolve("sound/test.wav", 1234);
        assert_eq!(settings.flags, CEK);
        assert_eq!(settings.compression, MPQ_COMPRESSION_ZLIB);
        assert_eq!(
            settings.compression_next,
            MPQ_COMPRESSION_HUFFMANN | MPQ_COMPRESSION_ADPCM_MONO
        );

        let settings = ruleset.resolve("data.unknown", 1234);
        assert_eq!(settings.flags, CEK);
        assert_eq!(settings.compression, MPQ_COMPRESSION_PKWARE);
        assert_eq!(settings.compression_next, MPQ_COMPRESSION_NEXT_SAME);

        let create = ruleset.create_settings();
        assert_eq!(create.attribute_kinds, MPQ_ATTRIBUTE_FILETIME | MPQ_ATTRIBUTE_CRC32);
        assert_eq!(create.attributes_flags, MPQ_FILE_EXISTS | MPQ_FILE_COMPRESS);
    }

    #[test]
    fn size_ranges_are_inclusive() {
        let ruleset = Ruleset::new(GameProfile::Wow4);

        let empty = ruleset.resolve("empty.bin", 0);
        assert_eq!(empty.flags, MPQ_FILE_DELETE_MARKER);

        let small = ruleset.resolve("small.bin", 0x4000);
        assert_eq!(small.flags, MPQ_FILE_COMPRESS | MPQ_FILE_SINGLE_UNIT);

        let large = ruleset.resolve("large.bin", 0x4001);
        assert_eq!(large.flags, MPQ_FILE_COMPRESS | MPQ_FILE_SECTOR_CRC);

        // name rules before the size rule still apply to small files
        let music = ruleset.resolve("music.ogg", 0x100);
        assert_eq!(music.flags, 0);
    }

    #[test]
    fn unbounded_size_range() {
        let rules = RulesetBuilder::new()
            .size(0x4000, u32::MAX, MPQ_FILE_COMPRESS, MPQ_COMPRESSION_BZIP2)
            .fallback(0, 0);
        let ruleset = Ruleset {
            profile: GameProfile::Generic,
            rules: rules.0,
            create_settings: ArchiveCreateSettings::default(),
        };

        assert_eq!(ruleset.resolve("a", u32::MAX).compression, MPQ_COMPRESSION_BZIP2);
        assert_eq!(ruleset.resolve("a", 0x4000).compression, MPQ_COMPRESSION_BZIP2);
        assert_eq!(ruleset.resolve("a", 0x3FFF).compression, 0);
    }

    #[test]
    fn exhausted_rules_fail_safe() {
        let ruleset = Ruleset {
            profile: GameProfile::Generic,
            rules: vec![CompressionRule::NameMask {
                pattern: "*.txt".to_string(),
                settings: CompressionSettings::new(0, 0),
            }],
            create_settings: ArchiveCreateSettings::default(),
        };

        let settings = ruleset.resolve("image.png", 10);
        assert_eq!(settings.flags, MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED);
        assert_eq!(settings.compression, MPQ_COMPRESSION_PKWARE);
        assert_eq!(settings.compression_next, MPQ_COMPRESSION_NEXT_SAME);
    }

    #[test]
    fn custom_rules_need_a_default() {
        let rules = vec![CompressionRule::NameMask {
            pattern: "*.txt".to_string(),
            settings: CompressionSettings::new(0, 0),
        }];
        let result = Ruleset::with_rules(GameProfile::Generic, rules, ArchiveCreateSettings::default());
        assert!(matches!(result, Err(Error::MissingDefaultRule)));

        let result = Ruleset::with_rules(GameProfile::Generic, vec![], ArchiveCreateSettings::default());
        assert!(matches!(result, Err(Error::MissingDefaultRule)));

        let rules = vec![CompressionRule::Default {
            settings: CompressionSettings::new(MPQ_FILE_COMPRESS, MPQ_COMPRESSION_ZLIB),
        }];
        let ruleset =
            Ruleset::with_rules(GameProfile::Generic, rules, ArchiveCreateSettings::default())
                .unwrap();
        assert_eq!(ruleset.resolve("x", 1).compression, MPQ_COMPRESSION_ZLIB);
    }

    #[test]
    fn generic_profile_uses_library_defaults() {
        let ruleset = Ruleset::new(GameProfile::Generic);
        assert_eq!(*ruleset.create_settings(), ArchiveCreateSettings::default());
        assert_eq!(
            ruleset.resolve("anything", 5),
            CompressionSettings::new(MPQ_FILE_COMPRESS | MPQ_FILE_ENCRYPTED, MPQ_COMPRESSION_PKWARE)
        );
    }

    #[test]
    fn create_overrides_go_through_the_merger() {
        let mut ruleset = Ruleset::new(GameProfile::Generic);
        ruleset.apply_create_overrides(&CreateSettingsOverrides {
            attribute_kinds: Some(MPQ_ATTRIBUTE_CRC32),
            ..CreateSettingsOverrides::default()
        });

        assert_eq!(ruleset.create_settings().attributes_flags, MPQ_FILE_DEFAULT_INTERNAL);
    }
}
