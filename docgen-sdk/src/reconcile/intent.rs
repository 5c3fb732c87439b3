//! Instruction intent classification
//!
//! Decides whether an instruction edits the active version in place, asks
//! for a new copy, or asks for a translated copy. Detection is table driven
//! so the vocabulary can be audited and extended in one place. A language
//! name only counts once something marks it as the target.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Target language of a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// English display name
    pub name: &'static str,
    /// ISO 639-1 code
    pub code: &'static str,
}

impl Language {
    pub fn is_english(&self) -> bool {
        self.code == "en"
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// What the caller wants done with the generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Replace the active version in place
    Edit,
    /// Append the result as a new version
    AppendCopy,
    /// Append the result as a new version in another language
    AppendTranslate(Language),
}

impl Intent {
    /// Whether the result is appended rather than applied in place
    pub fn is_append(&self) -> bool {
        !matches!(self, Intent::Edit)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Edit => write!(f, "edit"),
            Intent::AppendCopy => write!(f, "append copy"),
            Intent::AppendTranslate(lang) => write!(f, "append translation to {}", lang),
        }
    }
}

/// Language names (English and native) mapped to the canonical language
const LANGUAGES: &[(&[&str], Language)] = &[
    (&["english", "inglés", "anglais"], Language { name: "English", code: "en" }),
    (&["french", "français", "francais"], Language { name: "French", code: "fr" }),
    (&["spanish", "español", "espanol", "castellano"], Language { name: "Spanish", code: "es" }),
    (&["german", "deutsch"], Language { name: "German", code: "de" }),
    (&["italian", "italiano"], Language { name: "Italian", code: "it" }),
    (&["portuguese", "português", "portugues"], Language { name: "Portuguese", code: "pt" }),
    (&["dutch", "nederlands"], Language { name: "Dutch", code: "nl" }),
    (&["russian", "русский"], Language { name: "Russian", code: "ru" }),
    (&["turkish", "türkçe", "turkce"], Language { name: "Turkish", code: "tr" }),
    (&["arabic", "العربية"], Language { name: "Arabic", code: "ar" }),
    (&["chinese", "mandarin", "中文"], Language { name: "Chinese", code: "zh" }),
    (&["japanese", "日本語"], Language { name: "Japanese", code: "ja" }),
    (&["korean", "한국어"], Language { name: "Korean", code: "ko" }),
    (&["hindi", "हिंदी", "हिन्दी"], Language { name: "Hindi", code: "hi" }),
    (&["bengali", "bangla", "বাংলা"], Language { name: "Bengali", code: "bn" }),
    (&["tamil", "தமிழ்"], Language { name: "Tamil", code: "ta" }),
    (&["telugu", "తెలుగు"], Language { name: "Telugu", code: "te" }),
    (&["marathi", "मराठी"], Language { name: "Marathi", code: "mr" }),
    (&["urdu", "اردو"], Language { name: "Urdu", code: "ur" }),
    (&["gujarati", "ગુજરાતી"], Language { name: "Gujarati", code: "gu" }),
    (&["kannada", "ಕನ್ನಡ"], Language { name: "Kannada", code: "kn" }),
    (&["malayalam", "മലയാളം"], Language { name: "Malayalam", code: "ml" }),
    (&["punjabi", "ਪੰਜਾਬੀ"], Language { name: "Punjabi", code: "pa" }),
];

/// Translate verbs in English and in the native languages of the table above
const TRANSLATE_WORDS: &[&str] = &[
    "translate",
    "translated",
    "translating",
    "translation",
    "convert",
    "converted",
    "traduire",
    "traduis",
    "traduction",
    "traducir",
    "traduce",
    "traducción",
    "traduzir",
    "tradução",
    "traduci",
    "übersetzen",
    "übersetzung",
    "अनुवाद",
];

const COPY_WORDS: &[&str] = &["copy", "duplicate", "clone", "replicate"];

/// Words that, placed right before a language name, make it a target
const TARGET_PREPOSITIONS: &[&str] = &["in", "into", "to", "en", "auf"];

static VERSION_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:new|another|second|separate|additional|extra|alternate)\s+(?:\S+\s+)?version\b
        | \b(?:create|make|add|generate|produce)\s+(?:a|an)\s+(?:\S+\s+)?version\b
        ",
    )
    .expect("version phrase pattern")
});

/// Find the first language named in the instruction
pub fn detect_language(instruction: &str) -> Option<Language> {
    let lowered = instruction.to_lowercase();
    tokenize(&lowered).into_iter().find_map(language_named)
}

fn tokenize(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric() && !is_combining(c))
        .filter(|token| !token.is_empty())
        .collect()
}

// Indic scripts use combining vowel signs that are not alphanumeric
fn is_combining(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x0900..=0x0DFF)
}

fn language_named(token: &str) -> Option<Language> {
    LANGUAGES
        .iter()
        .find(|(names, _)| names.contains(&token))
        .map(|(_, lang)| *lang)
}

/// First language named as a target: "into French", "a French version",
/// or a Hindi postposition after the name ("हिंदी में")
fn targeted_language(words: &[&str]) -> Option<Language> {
    words.iter().enumerate().find_map(|(i, word)| {
        let language = language_named(word)?;
        let before = i.checked_sub(1).and_then(|j| words.get(j));
        let after = words.get(i + 1);
        let cued = before.map_or(false, |w| TARGET_PREPOSITIONS.contains(w))
            || after.map_or(false, |w| *w == "version" || *w == "में");
        cued.then_some(language)
    })
}

/// Classify an instruction
///
/// A language name on its own never makes a translation: "fix the English
/// grammar" stays an edit and "make a copy and fix the English grammar" stays
/// a copy. The name must come with a translate word, or be placed as a target.
pub fn classify(instruction: &str) -> Intent {
    let lowered = instruction.to_lowercase();
    let words = tokenize(&lowered);

    let has_any = |table: &[&str]| words.iter().any(|w| table.contains(w));
    let wants_copy = has_any(COPY_WORDS) || VERSION_PHRASE.is_match(&lowered);
    let wants_translation = has_any(TRANSLATE_WORDS);
    let mentions_version = words.contains(&"version");
    let target = targeted_language(&words);

    if wants_translation {
        if let Some(language) = target.or_else(|| words.iter().copied().find_map(language_named)) {
            return Intent::AppendTranslate(language);
        }
    }
    if let Some(language) = target {
        if wants_copy || mentions_version {
            return Intent::AppendTranslate(language);
        }
    }

    if wants_copy {
        Intent::AppendCopy
    } else {
        Intent::Edit
    }
}
