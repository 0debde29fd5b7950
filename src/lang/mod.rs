//! BCP-47-aware language tag handling.
//!
//! Media containers carry a mix of ISO 639-1 two-letter codes, ISO 639-2
//! bibliographic/terminology three-letter codes, and occasionally full
//! BCP-47 tags with script or region subtags. Tags are compared
//! structurally here, never by raw string equality.

/// A parsed language tag: primary subtag plus optional script and region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag {
    /// Normalized primary subtag (ISO 639-1 where one exists).
    pub primary: String,
    /// Title-case four-letter script subtag, e.g. `Hant`.
    pub script: Option<String>,
    /// Upper-case region subtag, e.g. `BR`, or a three-digit UN M.49 code.
    pub region: Option<String>,
}

impl LanguageTag {
    /// Parse a raw tag. Returns `None` for empty or undetermined tags.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_undetermined(trimmed) {
            return None;
        }

        let mut parts = trimmed.split(|c| c == '-' || c == '_');
        let primary_raw = parts.next()?.to_ascii_lowercase();
        if primary_raw.is_empty() || !primary_raw.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let primary = normalize_primary(&primary_raw);

        let mut script = None;
        let mut region = None;
        for part in parts {
            if part.len() == 4 && part.chars().all(|c| c.is_ascii_alphabetic()) && script.is_none() {
                let mut s = part.to_ascii_lowercase();
                if let Some(first) = s.get_mut(..1) {
                    first.make_ascii_uppercase();
                }
                script = Some(s);
            } else if region.is_none()
                && ((part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
                    || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit())))
            {
                region = Some(part.to_ascii_uppercase());
            }
            // Extension/variant subtags are ignored for matching purposes.
        }

        Some(Self { primary, script, region })
    }

    /// Structural match: primary subtags must be equal; a script or region
    /// specified on both sides must agree, absence is a wildcard.
    pub fn matches(&self, other: &Self) -> bool {
        if self.primary != other.primary {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.script, &other.script) {
            if a != b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (&self.region, &other.region) {
            if a != b {
                return false;
            }
        }
        true
    }

    /// Canonical `primary[-Script][-REGION]` rendering.
    pub fn canonical(&self) -> String {
        let mut out = self.primary.clone();
        if let Some(script) = &self.script {
            out.push('-');
            out.push_str(script);
        }
        if let Some(region) = &self.region {
            out.push('-');
            out.push_str(region);
        }
        out
    }

    /// True when the tag carries a script or region refinement.
    pub fn is_refined(&self) -> bool {
        self.script.is_some() || self.region.is_some()
    }
}

/// Compare a track's language tag against a requested language.
pub fn matches(track_language: &str, requested_language: &str) -> bool {
    match (LanguageTag::parse(track_language), LanguageTag::parse(requested_language)) {
        (Some(track), Some(requested)) => track.matches(&requested),
        _ => false,
    }
}

/// Tags that mark a track as having no usable language metadata.
pub fn is_undetermined(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "und" | "undefined" | "undetermined" | "unknown" | "mis" | "zxx"
    )
}

/// Map ISO 639-2 bibliographic/terminology codes to their 639-1
/// equivalent so `jpn` and `ja` land in the same bucket.
fn normalize_primary(code: &str) -> String {
    let mapped = match code {
        "jpn" => "ja",
        "eng" => "en",
        "chi" | "zho" => "zh",
        "ger" | "deu" => "de",
        "fre" | "fra" => "fr",
        "spa" => "es",
        "ita" => "it",
        "kor" => "ko",
        "rus" => "ru",
        "por" => "pt",
        "dut" | "nld" => "nl",
        "pol" => "pl",
        "ara" => "ar",
        "hin" => "hi",
        "tur" => "tr",
        "vie" => "vi",
        "tha" => "th",
        "swe" => "sv",
        "nor" => "no",
        "dan" => "da",
        "fin" => "fi",
        "cze" | "ces" => "cs",
        "hun" => "hu",
        "gre" | "ell" => "el",
        "heb" => "he",
        "ind" => "id",
        "ukr" => "uk",
        "rum" | "ron" => "ro",
        "cat" => "ca",
        "may" | "msa" => "ms",
        "per" | "fas" => "fa",
        other => other,
    };
    mapped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_letter_codes_normalize() {
        assert!(matches("jpn", "ja"));
        assert!(matches("eng", "en"));
        assert!(matches("zho", "chi"));
        assert!(!matches("jpn", "en"));
    }

    #[test]
    fn absent_script_and_region_are_wildcards() {
        assert!(matches("pt", "pt-BR"));
        assert!(matches("pt-BR", "pt"));
        assert!(matches("zh", "zh-Hant"));
    }

    #[test]
    fn conflicting_refinements_do_not_match() {
        assert!(!matches("pt-BR", "pt-PT"));
        assert!(!matches("zh-Hant", "zh-Hans"));
        assert!(!matches("zh-Hant-TW", "zh-Hans-CN"));
    }

    #[test]
    fn compatible_refinements_match() {
        assert!(matches("zh-Hant-TW", "zh-Hant"));
        assert!(matches("zh-TW", "zh-Hant-TW"));
    }

    #[test]
    fn underscore_separators_parse() {
        let tag = LanguageTag::parse("pt_BR").unwrap();
        assert_eq!(tag.primary, "pt");
        assert_eq!(tag.region.as_deref(), Some("BR"));
        assert_eq!(tag.canonical(), "pt-BR");
    }

    #[test]
    fn undetermined_tags_are_rejected() {
        assert!(LanguageTag::parse("und").is_none());
        assert!(LanguageTag::parse("").is_none());
        assert!(LanguageTag::parse("  unknown ").is_none());
        assert!(is_undetermined("UND"));
        assert!(!is_undetermined("en"));
    }

    #[test]
    fn canonical_rendering() {
        assert_eq!(LanguageTag::parse("ZH-hant-tw").unwrap().canonical(), "zh-Hant-TW");
        assert_eq!(LanguageTag::parse("jpn").unwrap().canonical(), "ja");
    }
}
