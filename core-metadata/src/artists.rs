//! Credited-name splitting.
//!
//! Taggers store several artists either as separate tag items or as one
//! value joined by a separator. Both end up as one name per artist here.

/// Collapse runs of whitespace and drop control characters.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Split every value on `separators`, trim, drop empties and remove
/// case-insensitive duplicates. First spelling and first position win.
pub fn split_artists<'a, I>(values: I, separators: &[char]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for value in values {
        for part in value.split(|c: char| separators.contains(&c)) {
            let name = normalize_text(part);
            if name.is_empty() {
                continue;
            }
            let folded = name.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            names.push(name);
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::config::DEFAULT_ARTIST_SEPARATORS;

    fn split(values: &[&str]) -> Vec<String> {
        split_artists(values.iter().copied(), DEFAULT_ARTIST_SEPARATORS)
    }

    #[test]
    fn test_semicolon_list() {
        assert_eq!(split(&["A; B; C"]), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_nul_separated_id3_value() {
        assert_eq!(split(&["Alpha\0Beta"]), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_slash_and_comma_survive() {
        assert_eq!(split(&["AC/DC"]), vec!["AC/DC"]);
        assert_eq!(
            split(&["Earth, Wind & Fire"]),
            vec!["Earth, Wind & Fire"]
        );
    }

    #[test]
    fn test_multiple_items_and_duplicates() {
        assert_eq!(
            split(&["Daft Punk", "Pharrell; daft punk", " ; ", "Nile  Rodgers"]),
            vec!["Daft Punk", "Pharrell", "Nile Rodgers"]
        );
    }

    #[test]
    fn test_custom_separators() {
        assert_eq!(split_artists(["A/B"], &['/']), vec!["A", "B"]);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello\t  World \n"), "Hello World");
        assert_eq!(normalize_text("Bad\u{7}Char"), "BadChar");
    }
}
