//! Postal code filtering and selection.

use std::sync::LazyLock;

use regex::Regex;

/// CEDEX business codes and French "NNNNN SP N" military sector codes.
static UNWANTED_ZIP_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:.*CEDEX.*|\d{5}\sSP\s\d+)$").expect("static regex")
});

/// Empty and missing codes are unwanted too.
pub fn is_unwanted_zip_code(code: Option<&str>) -> bool {
    match code.map(str::trim) {
        None | Some("") => true,
        Some(code) => UNWANTED_ZIP_CODE.is_match(code),
    }
}

/// Split a postal column holding several codes.
pub fn split_postal(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([';', '|', ','])
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

fn trailing_zeros(code: &str) -> usize {
    code.chars().rev().take_while(|c| *c == '0').count()
}

/// The code that best stands for the whole place.
///
/// General codes of a city end in zeros (75000 over 75012), so the code with
/// the most trailing zeros wins, then the shortest, then the smallest.
pub fn best_zip_code<'a, I>(codes: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    codes.into_iter().min_by(|a, b| {
        trailing_zeros(b)
            .cmp(&trailing_zeros(a))
            .then(a.len().cmp(&b.len()))
            .then(a.cmp(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwanted() {
        assert!(is_unwanted_zip_code(Some("75001 CEDEX")));
        assert!(is_unwanted_zip_code(Some("75001 cedex 01")));
        assert!(is_unwanted_zip_code(Some("12345 SP 3")));
        assert!(is_unwanted_zip_code(Some("")));
        assert!(is_unwanted_zip_code(None));
        assert!(!is_unwanted_zip_code(Some("75001")));
        assert!(!is_unwanted_zip_code(Some("SW1A 1AA")));
    }

    #[test]
    fn test_split() {
        let codes: Vec<&str> = split_postal("62701;62702| 62703,,").collect();
        assert_eq!(codes, vec!["62701", "62702", "62703"]);
    }

    #[test]
    fn test_best() {
        assert_eq!(best_zip_code(["75012", "75000", "75001"]), Some("75000"));
        assert_eq!(best_zip_code(["62702", "62701"]), Some("62701"));
        assert_eq!(best_zip_code(["1010", "10"]), Some("10"));
        assert_eq!(best_zip_code(Vec::<&str>::new()), None);
    }
}
