//! Keyword lookup from query text to a profession code.

/// Checked in order; the first profession with a matching keyword wins.
const PROFESSION_KEYWORDS: &[(&str, &[&str])] = &[
    ("PLUMBER", &["plomero", "fontanero", "gasfiter", "tubería", "fuga"]),
    ("ELECTRICIAN", &["electricista", "luz", "electricidad", "cableado"]),
    ("MASON", &["albañil", "construcción", "mampostería", "obra"]),
    ("PAINTER", &["pintor", "pintura", "barniz"]),
    ("CARPENTER", &["carpintero", "carpintería", "madera", "mueble"]),
];

/// Profession named by preprocessed query tokens, if any. Keywords match as
/// substrings so inflections like "fugas" or "muebles" are caught.
pub fn detect_profession(query_tokens: &[String]) -> Option<&'static str> {
    PROFESSION_KEYWORDS
        .iter()
        .find(|(_, keywords)| query_tokens.iter().any(|t| keywords.iter().any(|k| t.contains(k))))
        .map(|(code, _)| *code)
}
