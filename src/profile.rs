use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The game an archive is built for. Each one comes with its own storage
/// rules and archive creation settings.
pub enum GameProfile {
    Generic,
    Diablo1,
    LordsOfMagic,
    StarCraft1,
    Warcraft2,
    Diablo2,
    Warcraft3,
    Warcraft3Map,
    /// World of Warcraft: Vanilla
    Wow1,
    /// World of Warcraft: The Burning Crusade
    Wow2,
    /// World of Warcraft: Wrath of the Lich King
    Wow3,
    /// World of Warcraft: Cataclysm
    Wow4,
    /// World of Warcraft: Mists of Pandaria
    Wow5,
    StarCraft2,
    Diablo3,
}

lazy_static! {
    static ref PROFILE_ALIASES: HashMap<&'static str, GameProfile> = {
        let mut aliases = HashMap::new();

        aliases.insert("generic", GameProfile::Generic);
        aliases.insert("diablo1", GameProfile::Diablo1);
        aliases.insert("diablo", GameProfile::Diablo1);
        aliases.insert("d1", GameProfile::Diablo1);
        aliases.insert("lordsofmagic", GameProfile::LordsOfMagic);
        aliases.insert("lomse", GameProfile::LordsOfMagic);
        aliases.insert("starcraft", GameProfile::StarCraft1);
        aliases.insert("starcraft1", GameProfile::StarCraft1);
        aliases.insert("sc", GameProfile::StarCraft1);
        aliases.insert("sc1", GameProfile::StarCraft1);
        aliases.insert("warcraft2", GameProfile::Warcraft2);
        aliases.insert("wc2", GameProfile::Warcraft2);
        aliases.insert("war2", GameProfile::Warcraft2);
        aliases.insert("diablo2", GameProfile::Diablo2);
        aliases.insert("d2", GameProfile::Diablo2);
        aliases.insert("warcraft3", GameProfile::Warcraft3);
        aliases.insert("wc3", GameProfile::Warcraft3);
        aliases.insert("war3", GameProfile::Warcraft3);
        aliases.insert("warcraft3-map", GameProfile::Warcraft3Map);
        aliases.insert("wc3-map", GameProfile::Warcraft3Map);
        aliases.insert("war3-map", GameProfile::Warcraft3Map);
        aliases.insert("wow1", GameProfile::Wow1);
        aliases.insert("wow-vanilla", GameProfile::Wow1);
        aliases.insert("wow2", GameProfile::Wow2);
        aliases.insert("wow-tbc", GameProfile::Wow2);
        aliases.insert("wow3", GameProfile::Wow3);
        aliases.insert("wow-wotlk", GameProfile::Wow3);
        aliases.insert("wow4", GameProfile::Wow4);
        aliases.insert("wow-cataclysm", GameProfile::Wow4);
        aliases.insert("wow5", GameProfile::Wow5);
        aliases.insert("wow-mop", GameProfile::Wow5);
        aliases.insert("starcraft2", GameProfile::StarCraft2);
        aliases.insert("sc2", GameProfile::StarCraft2);
        aliases.insert("diablo3", GameProfile::Diablo3);
        aliases.insert("d3", GameProfile::Diablo3);

        aliases
    };
}

impl GameProfile {
    /// Every profile, in declaration order.
    pub const ALL: [GameProfile; 15] = [
        GameProfile::Generic,
        GameProfile::Diablo1,
        GameProfile::LordsOfMagic,
        GameProfile::StarCraft1,
        GameProfile::Warcraft2,
        GameProfile::Diablo2,
        GameProfile::Warcraft3,
        GameProfile::Warcraft3Map,
        GameProfile::Wow1,
        GameProfile::Wow2,
        GameProfile::Wow3,
        GameProfile::Wow4,
        GameProfile::Wow5,
        GameProfile::StarCraft2,
        GameProfile::Diablo3,
    ];

    /// Looks up a profile by any of its names, ignoring case.
    pub fn lookup(name: &str) -> Option<GameProfile> {
        PROFILE_ALIASES.get(name.to_lowercase().as_str()).copied()
    }

    /// Like [`lookup`](#method.lookup), but unknown names select the generic profile.
    pub fn from_name(name: &str) -> GameProfile {
        GameProfile::lookup(name).unwrap_or(GameProfile::Generic)
    }

    /// The canonical name of the profile.
    pub fn name(self) -> &'static str {
        match self {
            GameProfile::Generic => "generic",
            GameProfile::Diablo1 => "diablo1",
            GameProfile::LordsOfMagic => "lordsofmagic",
            GameProfile::StarCraft1 => "starcraft1",
            GameProfile::Warcraft2 => "warcraft2",
            GameProfile::Diablo2 => "diablo2",
            GameProfile::Warcraft3 => "warcraft3",
            GameProfile::Warcraft3Map => "warcraft3-map",
            GameProfile::Wow1 => "wow-vanilla",
            GameProfile::Wow2 => "wow-tbc",
            GameProfile::Wow3 => "wow-wotlk",
            GameProfile::Wow4 => "wow-cataclysm",
            GameProfile::Wow5 => "wow-mop",
            GameProfile::StarCraft2 => "starcraft2",
            GameProfile::Diablo3 => "diablo3",
        }
    }

    pub fn canonical_names() -> Vec<&'static str> {
        GameProfile::ALL.iter().map(|profile| profile.name()).collect()
    }
}

impl Default for GameProfile {
    fn default() -> GameProfile {
        GameProfile::Generic
    }
}

impl fmt::Display for GameProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for profile in GameProfile::ALL.iter() {
            assert_eq!(GameProfile::from_name(profile.name()), *profile);
        }
    }

    #[test]
    fn aliases_ignore_case() {
        assert_eq!(GameProfile::from_name("WC3"), GameProfile::Warcraft3);
        assert_eq!(GameProfile::from_name("War3-Map"), GameProfile::Warcraft3Map);
        assert_eq!(GameProfile::from_name("sc"), GameProfile::StarCraft1);
        assert_eq!(GameProfile::from_name("wow4"), GameProfile::Wow4);
        assert_eq!(GameProfile::from_name("lomse"), GameProfile::LordsOfMagic);
    }

    #[test]
    fn unknown_names_fall_back_to_generic() {
        assert_eq!(GameProfile::from_name("quake"), GameProfile::Generic);
        assert_eq!(GameProfile::from_name(""), GameProfile::Generic);
        assert_eq!(GameProfile::lookup("quake"), None);
    }

    #[test]
    fn canonical_names_follow_declaration_order() {
        let names = GameProfile::canonical_names();
        assert_eq!(names.len(), 15);
        assert_eq!(&names[..4], &["generic", "diablo1", "lordsofmagic", "starcraft1"]);
        assert_eq!(names[7], "warcraft3-map");
        assert_eq!(names.last(), Some(&"diablo3"));
    }
}
