//! Deterministic fallback images for failed or unavailable generation.
//!
//! When the provider cannot be reached (missing key, HTTP failure,
//! malformed response), the image path substitutes a bundled illustration
//! chosen by keyword-matching the prompt. Rules are an ordered list of
//! `(pattern, url)` pairs evaluated by substring containment, first match
//! wins; a generic illustration covers everything else.

use once_cell::sync::Lazy;

/// A single keyword → asset rule.
#[derive(Debug, Clone, Copy)]
pub struct FallbackRule {
    /// Substring searched for in the prompt.
    pub pattern: &'static str,
    /// Bundled asset served when the pattern matches.
    pub url: &'static str,
}

/// Served when no rule matches.
pub const DEFAULT_FALLBACK_URL: &str = "/assets/fallback/hanguk-history.png";

/// Built-in rule table for the Korean-history quiz domain.
///
/// Order matters: longer, more specific patterns come before the era
/// names that would otherwise shadow them.
static FALLBACK_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        rule("세종대왕", "/assets/fallback/sejong.png"),
        rule("세종", "/assets/fallback/sejong.png"),
        rule("한글", "/assets/fallback/hunminjeongeum.png"),
        rule("훈민정음", "/assets/fallback/hunminjeongeum.png"),
        rule("이순신", "/assets/fallback/yi-sunsin.png"),
        rule("거북선", "/assets/fallback/geobukseon.png"),
        rule("경복궁", "/assets/fallback/gyeongbokgung.png"),
        rule("첨성대", "/assets/fallback/cheomseongdae.png"),
        rule("팔만대장경", "/assets/fallback/tripitaka.png"),
        rule("석굴암", "/assets/fallback/seokguram.png"),
        rule("태극기", "/assets/fallback/taegeukgi.png"),
        rule("독립", "/assets/fallback/independence.png"),
        rule("고구려", "/assets/fallback/goguryeo.png"),
        rule("백제", "/assets/fallback/baekje.png"),
        rule("신라", "/assets/fallback/silla.png"),
        rule("고려", "/assets/fallback/goryeo.png"),
        rule("조선", "/assets/fallback/joseon.png"),
    ]
});

const fn rule(pattern: &'static str, url: &'static str) -> FallbackRule {
    FallbackRule { pattern, url }
}

/// Pick the fallback image for `prompt`.
///
/// First matching rule wins; [`DEFAULT_FALLBACK_URL`] otherwise. Pure and
/// deterministic — the same prompt always maps to the same asset.
pub fn fallback_image(prompt: &str) -> &'static str {
    FALLBACK_RULES
        .iter()
        .find(|r| prompt.contains(r.pattern))
        .map(|r| r.url)
        .unwrap_or(DEFAULT_FALLBACK_URL)
}
