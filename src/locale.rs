use std::fmt;

/// Windows LCIDs that MPQ archives use to tag file variants, with their
/// language tags.
const LANGUAGES: [(u16, &str); 16] = [
    (0x404, "zhTW"),
    (0x405, "csCZ"),
    (0x407, "deDE"),
    (0x409, "enUS"),
    (0x40A, "esES"),
    (0x40C, "frFR"),
    (0x410, "itIT"),
    (0x411, "jaJP"),
    (0x412, "koKR"),
    (0x413, "nlNL"),
    (0x415, "plPL"),
    (0x416, "ptPT"),
    (0x419, "ruRU"),
    (0x804, "zhCN"),
    (0x809, "enGB"),
    (0x80A, "esMX"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
/// Locale of a file inside an archive.
///
/// The same path may be stored once per locale. Locale `0` is the neutral
/// variant that readers fall back to.
pub struct Locale(pub u16);

impl Locale {
    pub const NEUTRAL: Locale = Locale(0);

    pub fn is_neutral(self) -> bool {
        self == Locale::NEUTRAL
    }

    /// Looks up a language tag such as `deDE`.
    pub fn from_lang(lang: &str) -> Option<Locale> {
        LANGUAGES
            .iter()
            .find(|(_, tag)| *tag == lang)
            .map(|(id, _)| Locale(*id))
    }

    /// Language tag of this locale. The neutral locale reads as `enUS`.
    pub fn lang(self) -> Option<&'static str> {
        if self.is_neutral() {
            return Some("enUS");
        }

        LANGUAGES
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, tag)| *tag)
    }

    /// Parses the command-line locale syntax: nothing or `default` for the
    /// neutral locale, a language tag, or a 4-digit hexadecimal id.
    pub fn parse(input: &str) -> Option<Locale> {
        if input.is_empty() || input == "default" {
            return Some(Locale::NEUTRAL);
        }

        if let Some(locale) = Locale::from_lang(input) {
            return Some(locale);
        }

        if input.len() == 4 && input.chars().all(|c| c.is_ascii_hexdigit()) {
            return u16::from_str_radix(input, 16).ok().map(Locale);
        }

        None
    }

    /// All known language tags, sorted.
    pub fn all_langs() -> Vec<&'static str> {
        let mut langs: Vec<&'static str> = LANGUAGES.iter().map(|(_, tag)| *tag).collect();
        langs.sort();
        langs
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Locale {
    fn from(id: u16) -> Locale {
        Locale(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_and_ids() {
        assert_eq!(Locale::from_lang("deDE"), Some(Locale(0x407)));
        assert_eq!(Locale::from_lang("esMX"), Some(Locale(0x80A)));
        assert_eq!(Locale::from_lang("xxXX"), None);

        assert_eq!(Locale(0x40C).lang(), Some("frFR"));
        assert_eq!(Locale::NEUTRAL.lang(), Some("enUS"));
        assert_eq!(Locale(0x1234).lang(), None);
    }

    #[test]
    fn parsing() {
        assert_eq!(Locale::parse(""), Some(Locale::NEUTRAL));
        assert_eq!(Locale::parse("default"), Some(Locale::NEUTRAL));
        assert_eq!(Locale::parse("esES"), Some(Locale(0x40A)));
        assert_eq!(Locale::parse("0407"), Some(Locale(0x407)));
        assert_eq!(Locale::parse("407"), None);
        assert_eq!(Locale::parse("german"), None);
    }

    #[test]
    fn langs_are_sorted() {
        let langs = Locale::all_langs();
        assert_eq!(langs.len(), 16);
        assert_eq!(langs.first(), Some(&"csCZ"));
        assert_eq!(langs.last(), Some(&"zhTW"));
    }

    #[test]
    fn displays_the_numeric_id() {
        assert_eq!(Locale::NEUTRAL.to_string(), "0");
        assert_eq!(Locale(0x40A).to_string(), "1034");
    }
}
