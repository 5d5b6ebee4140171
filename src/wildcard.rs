//! Glob matching of archive paths against rule masks.

fn normalize(input: &str) -> Vec<char> {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .collect()
}

/// Matches `candidate` against a `*`/`?` glob `pattern`.
///
/// Matching ignores case and treats `\` and `/` as the same separator. `*`
/// matches any run of characters, separators included, and `?` matches
/// exactly one character.
pub fn matches(candidate: &str, pattern: &str) -> bool {
    let name = normalize(candidate);
    let mask = normalize(pattern);

    let mut mask_pos = 0;
    let mut name_pos = 0;
    // position of the last `*` seen and of the name char it currently absorbs up to
    let mut star: Option<(usize, usize)> = None;

    while name_pos < name.len() {
        if mask_pos < mask.len() && (mask[mask_pos] == '?' || mask[mask_pos] == name[name_pos]) {
            mask_pos += 1;
            name_pos += 1;
        } else if mask_pos < mask.len() && mask[mask_pos] == '*' {
            star = Some((mask_pos, name_pos));
            mask_pos += 1;
        } else if let Some((star_pos, matched)) = star {
            mask_pos = star_pos + 1;
            name_pos = matched + 1;
            star = Some((star_pos, name_pos));
        } else {
            return false;
        }
    }

    while mask_pos < mask.len() && mask[mask_pos] == '*' {
        mask_pos += 1;
    }

    mask_pos == mask.len()
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn extension_masks() {
        assert!(matches("sound.WAV", "*.wav"));
        assert!(matches("Sound\\Music\\intro.wav", "*.wav"));
        assert!(!matches("sound.wave", "*.wav"));
        assert!(!matches("wav", "*.wav"));
    }

    #[test]
    fn separators_are_interchangeable() {
        assert!(matches("Abilities/Spells/cast.wav", "Abilities\\*.wav"));
        assert!(matches("abilities\\spells\\cast.wav", "ABILITIES/*.WAV"));
        assert!(!matches("Units\\cast.wav", "Abilities\\*.wav"));
    }

    #[test]
    fn question_mark_takes_one_char() {
        assert!(matches("file1.txt", "file?.txt"));
        assert!(!matches("file12.txt", "file?.txt"));
        assert!(!matches("file.txt", "file?.txt"));
    }

    #[test]
    fn exact_and_empty() {
        assert!(matches("game", "game"));
        assert!(matches("GAME", "game"));
        assert!(!matches("game.exe", "game"));
        assert!(matches("", ""));
        assert!(matches("", "*"));
        assert!(matches("", "***"));
        assert!(!matches("", "?"));
        assert!(!matches("a", ""));
    }

    #[test]
    fn backtracking() {
        assert!(matches("a.b.c.wav", "*.wav"));
        assert!(matches("abcabd", "*abd"));
        assert!(matches("UI\\Glues\\Loading\\Backgrounds\\x.blp", "UI\\*\\Backgrounds\\*.blp"));
        assert!(!matches("abcabe", "*abd"));
        assert!(matches("trailing", "trail*"));
        assert!(matches("trailing", "trail**"));
    }
}
