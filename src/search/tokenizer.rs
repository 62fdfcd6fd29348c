use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum number of words extracted from a single text.
pub const MAX_WORDS: usize = 50;

/// Maximum byte length of a single word. Characters past this bound are dropped.
pub const MAX_WORD_BYTES: usize = 62;

/// Words with this many characters or fewer are kept even if they are stop words.
const SHORT_WORD_CHARS: usize = 2;

#[rustfmt::skip]
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "the",
    "in", "on", "at", "to", "for", "with", "from", "of", "by", "about",
    "into", "through", "during", "before", "after", "above", "below",
    "and", "or", "but", "nor", "yet", "so",
    "i", "you", "he", "she", "it", "we", "they",
    "me", "him", "her", "us", "them",
    "my", "your", "his", "its", "our", "their",
    "is", "am", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did",
    "as", "if", "that", "this", "these", "those",
    "what", "which", "who", "when", "where", "why", "how",
    // Spanish
    "el", "la", "los", "las", "un", "una", "unos", "unas",
    "de", "del", "en", "al", "con", "por", "para", "sin", "sobre",
    "entre", "desde", "hasta", "hacia", "bajo", "tras",
    "y", "e", "o", "u", "pero", "sino", "ni",
    "yo", "tu", "tú", "él", "ella", "nosotros", "nosotras",
    "vosotros", "vosotras", "ellos", "ellas",
    "te", "se", "le", "lo", "nos", "os", "les",
    "mi", "mis", "tus", "su", "sus", "nuestro", "nuestra",
    "es", "soy", "eres", "somos", "sois", "son",
    "era", "eras", "éramos", "erais", "eran",
    "ha", "hemos", "habéis", "han",
    "que", "como", "cual", "cuál", "cuando", "donde", "dónde",
    "quien", "quién", "porque", "si", "esto", "eso", "aquello",
    // Japanese particles
    "の", "は", "が", "を", "に", "へ", "と", "で", "から", "まで",
    "や", "も", "か", "ね", "よ", "わ", "な",
    // Korean particles
    "은", "는", "이", "가", "을", "를", "의", "에", "에서", "로", "으로",
    "와", "과", "도", "만", "까지", "부터",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

fn is_word_char(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_alphanumeric()
    } else {
        c.is_alphanumeric()
    }
}

/// Splits `text` into normalized words, in order of appearance.
///
/// ASCII letters are lowercased; other scripts pass through unchanged.
/// Stop words are dropped unless they are short enough to be acronyms or
/// particles. Duplicates are preserved.
pub fn extract(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if words.len() >= MAX_WORDS {
            return words;
        }
        if is_word_char(c) {
            if current.len() + c.len_utf8() <= MAX_WORD_BYTES {
                current.push(c.to_ascii_lowercase());
            }
        } else {
            flush_word(&mut current, &mut words);
        }
    }

    if words.len() < MAX_WORDS {
        flush_word(&mut current, &mut words);
    }
    words
}

fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let word = std::mem::take(current);
    if !is_stop_word(&word) || word.chars().count() <= SHORT_WORD_CHARS {
        words.push(word);
    }
}
