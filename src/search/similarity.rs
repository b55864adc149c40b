//! Name similarity rule used to decide whether a hit is the same entity.

/// Lower-case, strip common diacritics and punctuation, expand "st"/"ste".
pub fn fold(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
            'ç' | 'č' | 'ć' => 'c',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
            'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
            'ñ' | 'ń' | 'ň' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
            'ý' | 'ÿ' => 'y',
            'š' | 'ś' => 's',
            'ž' | 'ź' | 'ż' => 'z',
            'ß' => {
                out.push_str("ss");
                continue;
            }
            c if c.is_alphanumeric() => c,
            _ => ' ',
        };
        out.push(folded);
    }

    out.split_whitespace()
        .map(|token| match token {
            "st" => "saint",
            "ste" => "sainte",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Folded names are equal, or close enough under Jaro-Winkler.
pub fn is_same_name(a: &str, b: &str, threshold: f64) -> bool {
    let (a, b) = (fold(a), fold(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || strsim::jaro_winkler(&a, &b) >= threshold
}

/// Any of the candidate's alternate names matches `name`.
pub fn is_same_alternate_names<S: AsRef<str>>(name: &str, alternate_names: &[S], threshold: f64) -> bool {
    alternate_names
        .iter()
        .any(|an| is_same_name(name, an.as_ref(), threshold))
}

/// Similarity in [0, 1] between folded names.
pub fn score(a: &str, b: &str) -> f64 {
    let (a, b) = (fold(a), fold(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::jaro_winkler(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold() {
        assert_eq!(fold("Saint-Étienne"), "saint etienne");
        assert_eq!(fold("St. Louis"), "saint louis");
        assert_eq!(fold("  Köln  "), "koln");
        assert_eq!(fold("Straße"), "strasse");
    }

    #[test]
    fn test_same_name() {
        assert!(is_same_name("St Louis", "Saint-Louis", 0.95));
        assert!(is_same_name("Springfield", "SPRINGFIELD", 0.95));
        assert!(!is_same_name("Springfield", "Springdale", 0.95));
        assert!(!is_same_name("", "", 0.95));
    }

    #[test]
    fn test_alternate_names() {
        let names = vec!["Colonia".to_string(), "Cologne".to_string()];
        assert!(is_same_alternate_names("cologne", &names, 0.95));
        assert!(!is_same_alternate_names("Bonn", &names, 0.95));
    }
}
