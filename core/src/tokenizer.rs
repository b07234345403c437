use crate::traits::TextNormalizer;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref ENGLISH_STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref FRENCH_STEMMER: Stemmer = Stemmer::create(Algorithm::French);
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
    static ref FRENCH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","à","ai","aie","ainsi","alors","as","au","aucun","aucune","aupres","auquel","aussi","autre","autres","aux","auxquelles","auxquels","avait","avant","avec","avoir",
            "c","ce","ceci","cela","celle","celles","celui","cependant","ces","cet","cette","ceux","chacun","chaque","chez","comme","comment",
            "d","dans","de","des","donc","dont","du","elle","elles","en","encore","entre","est","et","été","étaient","était","être","eu","eux",
            "il","ils","j","je","l","la","le","les","leur","leurs","lui","m","ma","mais","me","même","mes","moi","mon",
            "n","ne","ni","nos","notre","nous","on","ont","or","ou","où","par","parce","pas","peu","peut","plus","pour","pourquoi","qu","quand","que","quel","quelle","quelles","quels","qui","quoi",
            "s","sa","sans","se","selon","ses","si","son","sont","sous","sur","t","ta","te","tes","toi","ton","tous","tout","toute","toutes","très","tu",
            "un","une","vos","votre","vous","y"
        ];
        words.iter().copied().collect()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    French,
}

impl Language {
    fn stemmer(self) -> &'static Stemmer {
        match self {
            Language::English => &ENGLISH_STEMMER,
            Language::French => &FRENCH_STEMMER,
        }
    }

    fn is_stopword(self, token: &str) -> bool {
        match self {
            Language::English => ENGLISH_STOPWORDS.contains(token),
            Language::French => FRENCH_STOPWORDS.contains(token),
        }
    }
}

/// Default [`TextNormalizer`]: NFKC normalization, lowercase, stopword removal and Snowball stemming.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexNormalizer {
    language: Language,
}

impl RegexNormalizer {
    pub fn new(language: Language) -> Self { Self { language } }
    pub fn language(&self) -> Language { self.language }
}

impl TextNormalizer for RegexNormalizer {
    fn normalize(&self, text: &str) -> Vec<String> {
        tokenize(text, self.language).into_iter().map(|(term, _)| term).collect()
    }
}

/// Tokenize text into (term, position).
pub fn tokenize(text: &str, language: Language) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().replace('\u{2019}', "'").to_lowercase();
    let stemmer = language.stemmer();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let mut token = mat.as_str();
        // French elision: "l'entreprise" -> "entreprise"
        if language == Language::French {
            if let Some((_, rest)) = token.rsplit_once('\'') {
                token = rest;
            }
        }
        if token.is_empty() || language.is_stopword(token) { continue; }
        let stem = stemmer.stem(token).to_string();
        tokens.push((stem, pos));
    }
    tokens
}
