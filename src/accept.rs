//! Accept and Accept-Language parsing with quality-value ordering.
//!
//! Ranges are ordered by descending `q`, ties broken by specificity (an
//! exact type beats `type/*`, which beats `*/*`; an exact language tag beats
//! `*`), remaining ties keep the declaration order. Malformed `q` values
//! (outside `[0,1]`, more than three fractional digits) and malformed
//! language tags are rejected outright.

use crate::error::BatchError;

/// Quality value in thousandths, 0..=1000. Integer form keeps the sort free
/// of float comparisons.
fn parse_quality(token: &str) -> Option<u16> {
    let mut chars = token.chars();
    let lead = chars.next()?;
    if lead != '0' && lead != '1' {
        return None;
    }
    let rest = chars.as_str();
    let fraction = match rest.strip_prefix('.') {
        None if rest.is_empty() => "",
        Some(f) => f,
        None => return None,
    };
    if fraction.len() > 3 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut millis: u16 = 0;
    for (i, c) in fraction.bytes().enumerate() {
        millis += u16::from(c - b'0') * 10u16.pow(2 - i as u32);
    }
    let value = if lead == '1' { 1000 + millis } else { millis };
    if value > 1000 { None } else { Some(value) }
}

struct Range {
    /// The range text with any q parameter removed.
    text: String,
    quality: u16,
    specificity: u8,
}

/// Splits one comma-separated element into its range text and quality,
/// dropping the q parameter but keeping every other parameter.
fn split_element(element: &str) -> Result<(String, u16), BatchError> {
    let mut segments = element.split(';');
    let range = segments.next().unwrap_or("").trim().to_string();
    let mut kept = vec![range.clone()];
    let mut quality = 1000u16;

    for segment in segments {
        let segment = segment.trim();
        match segment.split_once('=') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("q") => {
                quality = parse_quality(value.trim())
                    .ok_or_else(|| BatchError::InvalidAcceptHeader(element.to_string()))?;
            }
            _ => kept.push(segment.to_string()),
        }
    }

    Ok((kept.join(";"), quality))
}

fn media_range_specificity(range: &str) -> Result<u8, BatchError> {
    let base = range.split(';').next().unwrap_or("").trim();
    let Some((main_type, sub_type)) = base.split_once('/') else {
        return Err(BatchError::InvalidAcceptHeader(range.to_string()));
    };
    if main_type.is_empty() || sub_type.is_empty() {
        return Err(BatchError::InvalidAcceptHeader(range.to_string()));
    }
    match (main_type, sub_type) {
        ("*", "*") => Ok(1),
        ("*", _) => Err(BatchError::InvalidAcceptHeader(range.to_string())),
        (_, "*") => Ok(2),
        _ => Ok(3),
    }
}

fn order(mut ranges: Vec<Range>) -> Vec<String> {
    // Stable sort keeps declaration order for full ties.
    ranges.sort_by(|a, b| {
        b.quality
            .cmp(&a.quality)
            .then(b.specificity.cmp(&a.specificity))
    });
    ranges.into_iter().map(|r| r.text).collect()
}

/// Parses a raw Accept header value into media ranges ordered by quality
/// and specificity.
pub fn parse_accept_headers(raw: &str) -> Result<Vec<String>, BatchError> {
    let mut ranges = Vec::new();
    for element in raw.split(',') {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        let (text, quality) = split_element(element)?;
        let specificity = media_range_specificity(&text)?;
        ranges.push(Range {
            text,
            quality,
            specificity,
        });
    }
    Ok(order(ranges))
}

/// Longest tag the parser accepts; generous against RFC 5646 while still
/// bounding pathological input.
const MAX_LANGUAGE_TAG_LENGTH: usize = 42;

fn validate_language_tag(tag: &str) -> Result<(), BatchError> {
    let err = || BatchError::InvalidAcceptLanguage(tag.to_string());

    if tag == "*" {
        return Ok(());
    }
    if tag.len() > MAX_LANGUAGE_TAG_LENGTH {
        return Err(err());
    }

    let mut subtags = tag.split('-');
    let primary = subtags.next().ok_or_else(err)?;

    if primary.eq_ignore_ascii_case("x") {
        // Private-use singleton: at least one subtag must follow.
        let mut any = false;
        for subtag in subtags {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(err());
            }
            any = true;
        }
        return if any { Ok(()) } else { Err(err()) };
    }

    if primary.len() < 2 || primary.len() > 8 || !primary.chars().all(|c| c.is_ascii_alphabetic())
    {
        return Err(err());
    }
    for subtag in subtags {
        if subtag.is_empty()
            || subtag.len() > 8
            || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(err());
        }
    }
    Ok(())
}

/// Parses a raw Accept-Language header value into tags ordered by quality;
/// an exact tag outranks the `*` wildcard at equal quality.
pub fn parse_accept_languages(raw: &str) -> Result<Vec<String>, BatchError> {
    let mut ranges = Vec::new();
    for element in raw.split(',') {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        let (text, quality) = split_element(element)
            .map_err(|_| BatchError::InvalidAcceptLanguage(element.to_string()))?;
        validate_language_tag(&text)?;
        let specificity = if text == "*" { 1 } else { 2 };
        ranges.push(Range {
            text,
            quality,
            specificity,
        });
    }
    Ok(order(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_accept_ordering() {
        let ordered = parse_accept_headers(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .unwrap();
        assert_eq!(
            ordered,
            vec!["text/html", "application/xhtml+xml", "application/xml", "*/*"]
        );
    }

    #[test]
    fn test_specificity_breaks_quality_ties() {
        let ordered = parse_accept_headers("application/*, application/xml").unwrap();
        assert_eq!(ordered, vec!["application/xml", "application/*"]);

        let ordered = parse_accept_headers("*/*, application/*, application/json").unwrap();
        assert_eq!(ordered, vec!["application/json", "application/*", "*/*"]);
    }

    #[test]
    fn test_non_q_parameters_are_kept() {
        let ordered =
            parse_accept_headers("application/json;odata=verbose;q=0.5, application/atom+xml")
                .unwrap();
        assert_eq!(
            ordered,
            vec!["application/atom+xml", "application/json;odata=verbose"]
        );
    }

    #[test]
    fn test_malformed_quality_is_fatal() {
        assert!(parse_accept_headers("text/html;q=1.5").is_err());
        assert!(parse_accept_headers("text/html;q=0.8888").is_err());
        assert!(parse_accept_headers("text/html;q=-0.1").is_err());
        assert!(parse_accept_headers("text/html;q=abc").is_err());
    }

    #[test]
    fn test_malformed_media_range_is_fatal() {
        assert!(parse_accept_headers("texthtml").is_err());
        assert!(parse_accept_headers("*/xml").is_err());
        assert!(parse_accept_headers("/xml").is_err());
    }

    #[test]
    fn test_quality_boundaries() {
        assert_eq!(parse_quality("1"), Some(1000));
        assert_eq!(parse_quality("1.000"), Some(1000));
        assert_eq!(parse_quality("0"), Some(0));
        assert_eq!(parse_quality("0.9"), Some(900));
        assert_eq!(parse_quality("0.05"), Some(50));
        assert_eq!(parse_quality("1.001"), None);
        assert_eq!(parse_quality("2"), None);
        assert_eq!(parse_quality(""), None);
    }

    #[test]
    fn test_language_ordering() {
        let ordered = parse_accept_languages("da, en-gb;q=0.8, en;q=0.7").unwrap();
        assert_eq!(ordered, vec!["da", "en-gb", "en"]);

        let ordered = parse_accept_languages("*, de").unwrap();
        assert_eq!(ordered, vec!["de", "*"]);
    }

    #[test]
    fn test_language_tag_validation() {
        assert!(parse_accept_languages("en-US").is_ok());
        assert!(parse_accept_languages("x-pig-latin").is_ok());
        assert!(parse_accept_languages("zh-Hant-TW").is_ok());

        assert!(parse_accept_languages("a").is_err());
        assert!(parse_accept_languages("toolongprimary9").is_err());
        assert!(parse_accept_languages("en-").is_err());
        assert!(parse_accept_languages("en_US").is_err());
        assert!(parse_accept_languages("x-").is_err());
        let long = format!("en-{}", "a1-".repeat(20));
        assert!(parse_accept_languages(&long).is_err());
    }
}
