use tantivy::tokenizer::{
    Language as StemLanguage, LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream,
};

use matcher_core::{Error, Language, Result};

/// Tokens shorter than this (in chars) are dropped.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Filler words of worker bios that carry no signal for matching.
const DOMAIN_STOPWORDS_ES: &[&str] = &[
    "trabajo", "servicio", "experiencia", "años", "profesional", "atención", "calidad", "garantía", "cliente",
    "ofrezco", "brindo", "realizo", "hacer", "ofrecer", "brindar", "tengo", "soy", "estoy", "puedo", "hago", "mi",
    "mis", "yo", "nosotros", "nuestro", "nuestra", "cuenta", "dispone", "además", "también",
];

/// Normalizes bios and queries into the token stream the vectorizer sees.
///
/// Lowercases, splits on anything that is not alphanumeric (accented letters
/// survive), removes the language's generic stopwords plus the domain list,
/// and drops one-char tokens. Pure and deterministic.
#[derive(Clone)]
pub struct Preprocessor {
    analyzer: TextAnalyzer,
    language: Language,
}

impl Preprocessor {
    pub fn new(language: Language) -> Result<Self> {
        let (stem_language, domain) = match language {
            Language::Spanish => (StemLanguage::Spanish, DOMAIN_STOPWORDS_ES),
        };
        let generic = require_stopwords(StopWordFilter::new(stem_language), language)?;
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(generic)
            .filter(StopWordFilter::remove(domain.iter().map(|s| s.to_string())))
            .build();
        Ok(Self { analyzer, language })
    }

    pub fn language(&self) -> Language { self.language }

    pub fn preprocess(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            let token = &stream.token().text;
            if token.chars().count() >= MIN_TOKEN_CHARS {
                tokens.push(token.clone());
            }
        }
        tokens
    }

    /// Tokens joined by single spaces, as echoed in responses and logs.
    pub fn processed_text(&self, text: &str) -> String { self.preprocess(text).join(" ") }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor").field("language", &self.language).finish_non_exhaustive()
    }
}

fn require_stopwords(filter: Option<StopWordFilter>, language: Language) -> Result<StopWordFilter> {
    filter.ok_or_else(|| Error::ResourceUnavailable(format!("stopword list for language '{}'", language.code())))
}
