//! Movie edition extraction (Director's Cut, Extended, IMAX, ...).

use super::patterns as re;

/// Extract the edition from a normalized title.
pub fn parse_edition(title: &str) -> Option<String> {
    let caps = re::EDITION.captures_iter(title).last()?;
    let matched = caps.get(1)?;

    let edition = matched.as_str().replace('.', " ").trim().to_string();
    if edition.is_empty() {
        return None;
    }

    if starts_title(title, &edition) {
        return None;
    }

    let lower = edition.to_ascii_lowercase();
    let has_suffix = lower.contains("cut") || lower.contains("edition") || lower.contains("version");
    if !has_suffix {
        let after = &title[matched.end()..];
        let before = &title[..matched.start()];
        // "Movie.Holiday.Special.1978": the word belongs to the title.
        if re::FOLLOWED_BY_YEAR.is_match(after) && re::DOT_JOINED_WORD.is_match(before) {
            return None;
        }
    }

    Some(edition)
}

/// Whether the edition words are the leading words of the title itself.
fn starts_title(title: &str, edition: &str) -> bool {
    let title = title.trim();
    let head = &title[..floor_char_boundary(title, edition.len() + 5)];
    let head = head.replace(['.', ' '], "").to_lowercase();
    let edition = edition.replace(' ', "").to_lowercase();
    head.starts_with(&edition)
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_editions() {
        assert_eq!(parse_edition("Movie Title 2012 Extended").as_deref(), Some("Extended"));
        assert_eq!(
            parse_edition("Movie Title 2012 Director's Cut").as_deref(),
            Some("Director's Cut")
        );
        assert_eq!(
            parse_edition("Movie.1997.Open.Matte.1080p.BluRay.x264.DTS-FGT").as_deref(),
            Some("Open Matte")
        );
    }

    #[test]
    fn test_edition_at_title_start_rejected() {
        assert_eq!(parse_edition("Directors.Cut.German.2006.COMPLETE.PAL.DVDR-LoD"), None);
        assert_eq!(parse_edition("Uncut.Movie.2019.720p.BluRay.x264-YOL0W"), None);
    }

    #[test]
    fn test_dot_joined_word_before_year_rejected() {
        assert_eq!(
            parse_edition("Movie.Holiday.Special.1978.DVD.REMUX.DD.2.0-ViETNAM"),
            None
        );
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "aØb";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 10), s.len());
    }
}
