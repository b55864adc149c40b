//! German street-name compounds.
//!
//! "Goethestraße" and "Goethe Straße" name the same street. Given one
//! form, produce the other so both end up searchable.

/// Shape of a name with respect to the known street suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundState {
    /// "Goethestraße"
    Concatenated,
    /// "Goethe Straße" or "Goethe-Straße"
    Separated,
    NotApplicable,
}

/// Longest first so "strasse" wins over shorter overlapping suffixes.
const SUFFIXES: &[&str] = &[
    "chaussee", "strasse", "straße", "bruecke", "brücke", "graben", "allee", "gasse", "markt",
    "platz", "steig", "damm", "pfad", "ring", "steg", "ufer", "weg",
];

/// Shortest stem a concatenated name may have, so "Spring" is not "Sp" + "ring".
const MIN_STEM_CHARS: usize = 3;

fn ends_with_ignore_case(chars: &[char], suffix: &str) -> bool {
    let suffix: Vec<char> = suffix.chars().collect();
    if chars.len() < suffix.len() {
        return false;
    }
    chars[chars.len() - suffix.len()..]
        .iter()
        .zip(&suffix)
        .all(|(c, s)| c.to_lowercase().eq(std::iter::once(*s)))
}

/// Returns the matched suffix length (in chars) along with the state.
fn analyze(name: &str) -> (CompoundState, usize) {
    let chars: Vec<char> = name.trim().chars().collect();
    for suffix in SUFFIXES {
        if !ends_with_ignore_case(&chars, suffix) {
            continue;
        }
        let suffix_len = suffix.chars().count();
        let stem = &chars[..chars.len() - suffix_len];
        match stem.last() {
            Some(' ') | Some('-') => {
                let stem_len = stem.iter().filter(|c| c.is_alphabetic()).count();
                if stem_len >= MIN_STEM_CHARS {
                    return (CompoundState::Separated, suffix_len);
                }
            }
            Some(c) if c.is_alphabetic() && stem.len() >= MIN_STEM_CHARS => {
                return (CompoundState::Concatenated, suffix_len);
            }
            _ => {}
        }
    }
    (CompoundState::NotApplicable, 0)
}

pub fn state(name: &str) -> CompoundState {
    analyze(name).0
}

pub fn is_decompound_name(name: &str) -> bool {
    state(name) != CompoundState::NotApplicable
}

/// The other spelling of a compound street name, `None` when not applicable.
pub fn other_format(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let (state, suffix_len) = analyze(trimmed);
    let chars: Vec<char> = trimmed.chars().collect();
    let split = chars.len() - suffix_len;
    let suffix: String = chars[split..].iter().collect();

    match state {
        CompoundState::Concatenated => {
            let stem: String = chars[..split].iter().collect();
            let mut suffix_chars = suffix.chars();
            let capitalized: String = match suffix_chars.next() {
                Some(first) => first.to_uppercase().chain(suffix_chars).collect(),
                None => return None,
            };
            Some(format!("{} {}", stem, capitalized))
        }
        CompoundState::Separated => {
            let stem: String = chars[..split - 1].iter().collect();
            Some(format!("{}{}", stem.trim_end(), suffix.to_lowercase()))
        }
        CompoundState::NotApplicable => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenated() {
        assert_eq!(state("Goethestraße"), CompoundState::Concatenated);
        assert_eq!(other_format("Goethestraße").as_deref(), Some("Goethe Straße"));
        assert_eq!(other_format("Lindenweg").as_deref(), Some("Linden Weg"));
    }

    #[test]
    fn test_separated() {
        assert_eq!(state("Goethe Straße"), CompoundState::Separated);
        assert_eq!(other_format("Goethe Straße").as_deref(), Some("Goethestraße"));
        assert_eq!(other_format("Karl-Marx-Allee").as_deref(), Some("Karl-Marxallee"));
    }

    #[test]
    fn test_not_applicable() {
        assert!(!is_decompound_name("Springfield"));
        assert!(!is_decompound_name("Spring"));
        assert!(!is_decompound_name("Weg"));
        assert_eq!(other_format("Main Street"), None);
    }
}
