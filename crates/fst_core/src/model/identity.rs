//! URI construction and identifier normalization shared by all documents.

use std::cmp::Ordering;

/// Root of the national legal-information URI space.
pub const RINFO_BASE: &str = "http://rinfo.lagrummet.se";
/// Prefix of every published document URI.
pub const RINFO_PUBL_BASE: &str = "http://rinfo.lagrummet.se/publ/";
/// Prefix of collection ("författningssamling") URIs.
pub const RINFO_SERIES_BASE: &str = "http://rinfo.lagrummet.se/serier/fs/";
/// Prefix of organization URIs.
pub const RINFO_ORG_BASE: &str = "http://rinfo.lagrummet.se/org/";

/// Transliterates a Swedish identifier for URI use.
///
/// Lower-cases, then maps `å`→`aa`, `ä`→`ae`, `ö`→`oe` and space→`_`.
pub fn to_slug(tag: &str) -> String {
    let lowered = tag.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        match ch {
            'å' => slug.push_str("aa"),
            'ä' => slug.push_str("ae"),
            'ö' => slug.push_str("oe"),
            ' ' => slug.push('_'),
            other => slug.push(other),
        }
    }
    slug
}

/// Builds the canonical document URI from a document slug.
pub fn publ_uri(slug: &str) -> String {
    format!("{RINFO_PUBL_BASE}{slug}")
}

/// Builds an organization URI from its display name.
pub fn organization_uri(name: &str) -> String {
    format!("{RINFO_ORG_BASE}{}", to_slug(name))
}

/// Builds the URI of a statute in the SFS series, e.g. `1991:446`.
pub fn sfs_uri(sfs_number: &str) -> String {
    format!("{RINFO_BASE}/publ/sfs/{sfs_number}")
}

/// Builds the URI of an EU legal act from its CELEX number.
pub fn eur_lex_uri(celex_number: &str) -> String {
    format!("{RINFO_BASE}/ext/eur-lex/{celex_number}")
}

/// Pads an old-style short CELEX number to the modern format.
///
/// `392L0049` (8 chars, two-digit year) becomes `31992L0049`; anything else
/// is returned trimmed but otherwise unchanged.
pub fn normalize_celex(celex_number: &str) -> String {
    let trimmed = celex_number.trim();
    if trimmed.len() == 8 && trimmed.is_ascii() {
        let (sector, rest) = trimmed.split_at(1);
        return format!("{sector}19{rest}");
    }
    trimmed.to_string()
}

/// Compares two sequence numbers (`"2"`, `"10"`, `"12a"`) by leading integer,
/// then by the remaining text.
pub fn compare_sequence(left: &str, right: &str) -> Ordering {
    let (left_num, left_rest) = split_sequence(left);
    let (right_num, right_rest) = split_sequence(right);
    left_num
        .cmp(&right_num)
        .then_with(|| left_rest.cmp(right_rest))
}

fn split_sequence(value: &str) -> (u64, &str) {
    let trimmed = value.trim();
    let digits_end = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(trimmed.len(), |(index, _)| index);
    let number = trimmed[..digits_end].parse::<u64>().unwrap_or(0);
    (number, &trimmed[digits_end..])
}

#[cfg(test)]
mod tests {
    use super::{compare_sequence, normalize_celex, organization_uri, to_slug};
    use std::cmp::Ordering;

    #[test]
    fn to_slug_transliterates_swedish_letters() {
        assert_eq!(to_slug("Exempelmyndigheten"), "exempelmyndigheten");
        assert_eq!(to_slug("Åklagarmyndighetens Föreskrifter"), "aaklagarmyndighetens_foereskrifter");
        assert_eq!(to_slug("Jämställdhet"), "jaemstaelldhet");
    }

    #[test]
    fn organization_uri_uses_slug() {
        assert_eq!(
            organization_uri("Statens Växtskyddsnämnd"),
            "http://rinfo.lagrummet.se/org/statens_vaextskyddsnaemnd"
        );
    }

    #[test]
    fn normalize_celex_pads_short_form_only() {
        assert_eq!(normalize_celex("392L0049"), "31992L0049");
        assert_eq!(normalize_celex("31979L0409"), "31979L0409");
        assert_eq!(normalize_celex(" 32010L0076 "), "32010L0076");
    }

    #[test]
    fn compare_sequence_orders_numerically() {
        assert_eq!(compare_sequence("2", "10"), Ordering::Less);
        assert_eq!(compare_sequence("12a", "12"), Ordering::Greater);
        assert_eq!(compare_sequence("7", "7"), Ordering::Equal);
    }
}
