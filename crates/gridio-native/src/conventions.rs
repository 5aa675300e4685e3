//! Parsing of the global `Conventions` attribute.

use gridio_core::{Convention, ConventionInfo};

/// Global attribute naming the conventions a file follows.
pub const CONVENTIONS_ATTRIBUTE: &str = "Conventions";

fn parse_version(text: &str) -> f64 {
    text.trim_matches(|c: char| !c.is_ascii_digit() && c != '.')
        .parse()
        .unwrap_or(0.0)
}

/// Interpret a `Conventions` attribute value.
///
/// `UGRID-x.y` and the older `Deltares-x.y` tag both report UGRID at the
/// stated version. `SGRID-x.y` reports SGRID. A bare `CF-x.y` reports CF.
/// Unrecognized text reports `Other`; a missing attribute reports `Null`.
pub fn parse_conventions(value: Option<&str>) -> ConventionInfo {
    let Some(text) = value else {
        return ConventionInfo::NULL;
    };
    let mut cf = None;
    for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        if let Some(version) = token.strip_prefix("UGRID-") {
            return ConventionInfo::new(Convention::Ugrid, parse_version(version));
        }
        if let Some(version) = token.strip_prefix("Deltares-") {
            return ConventionInfo::new(Convention::Ugrid, parse_version(version));
        }
        if let Some(version) = token.strip_prefix("SGRID-") {
            return ConventionInfo::new(Convention::Sgrid, parse_version(version));
        }
        if let Some(version) = token.strip_prefix("CF-") {
            cf.get_or_insert(parse_version(version));
        }
    }
    match cf {
        Some(version) => ConventionInfo::new(Convention::Cf, version),
        None => ConventionInfo::new(Convention::Other, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ugrid_with_cf_prefix() {
        let info = parse_conventions(Some("CF-1.6 UGRID-1.0"));
        assert_eq!(info, ConventionInfo::new(Convention::Ugrid, 1.0));
    }

    #[test]
    fn legacy_tag_is_ugrid_below_minimum() {
        let info = parse_conventions(Some("CF-1.5 Deltares-0.8"));
        assert_eq!(info.convention, Convention::Ugrid);
        assert_eq!(info.version, 0.8);
        assert!(!info.is_supported_ugrid());
    }

    #[test]
    fn cf_only_and_unknown() {
        assert_eq!(
            parse_conventions(Some("CF-1.8")),
            ConventionInfo::new(Convention::Cf, 1.8)
        );
        assert_eq!(parse_conventions(Some("COARDS")).convention, Convention::Other);
        assert_eq!(parse_conventions(None), ConventionInfo::NULL);
    }

    #[test]
    fn sgrid_and_separators() {
        let info = parse_conventions(Some("CF-1.6,SGRID-0.3"));
        assert_eq!(info, ConventionInfo::new(Convention::Sgrid, 0.3));
    }

    #[test]
    fn unparsable_version_is_zero() {
        assert_eq!(parse_conventions(Some("UGRID-x")).version, 0.0);
    }
}
