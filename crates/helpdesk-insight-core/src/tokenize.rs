//! Text normalization and term extraction.
//!
//! Both the index and the query path go through [`tokenize`], so a term
//! produced here is exactly what postings and IDF entries are keyed by.
//!
//! Pipeline: lowercase → strip punctuation → split on whitespace →
//! drop tokens of two characters or fewer → drop stop words. There is no
//! stemming; `"printers"` and `"printer"` are different terms.

/// Common English function words shared by both stop lists.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "could", "did", "does",
    "doing", "for", "from", "get", "gets", "got", "had", "has", "have", "having", "her", "here",
    "him", "his", "how", "into", "its", "just", "may", "more", "most", "our", "out", "over",
    "she", "should", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "too", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Helpdesk filler words that carry no signal for matching tickets.
const DOMAIN_STOP_WORDS: &[&str] = &[
    "issue", "problem", "error", "not", "working", "cannot", "unable", "access", "the",
];

/// Returns `true` if `word` is dropped by [`tokenize`].
pub fn is_stop_word(word: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(&word) || DOMAIN_STOP_WORDS.contains(&word)
}

/// Returns `true` if `word` is dropped by the word-cloud stop list.
///
/// The word-cloud list keeps domain words such as `"access"` or `"error"`
/// because a per-cause keyword view is more useful with them.
pub fn is_wordcloud_stop_word(word: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(&word)
}

/// Tokenize text with the search stop list.
///
/// ```rust
/// use helpdesk_insight_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("VPN login error!!"), vec!["vpn", "login"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with(text, is_stop_word)
}

/// Tokenize text, dropping every token for which `is_stop` returns `true`.
pub fn tokenize_with(text: &str, is_stop: impl Fn(&str) -> bool) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !is_stop(t))
        .map(str::to_string)
        .collect()
}

/// Lowercase and drop every character that is not a letter, digit, or whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// [`normalize`] with runs of whitespace collapsed to a single space.
///
/// Used for phrase matching, where `"vpn  timeout"` and `"vpn timeout"`
/// must compare equal.
pub fn normalize_spaced(text: &str) -> String {
    normalize(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_domain_filler() {
        assert_eq!(tokenize("VPN login error!!"), vec!["vpn", "login"]);
    }

    #[test]
    fn test_order_preserved_and_duplicates_kept() {
        assert_eq!(
            tokenize("Printer jam, printer offline"),
            vec!["printer", "jam", "printer", "offline"]
        );
    }

    #[test]
    fn test_short_tokens_dropped() {
        assert!(tokenize("an ok it pc").is_empty());
    }

    #[test]
    fn test_punctuation_is_removed_not_split() {
        // "wi-fi" becomes one token; "e-mail" likewise.
        assert_eq!(tokenize("Wi-Fi drops; e-mail slow"), vec!["wifi", "drops", "email", "slow"]);
    }

    #[test]
    fn test_every_term_is_significant() {
        let samples = [
            "The user cannot access the shared drive!",
            "Outlook crashes when opening attachments (error 0x800)",
            "   ",
            "Not working :( unable to print",
            "Ünïcode Größe prüfen",
        ];
        for s in samples {
            for term in tokenize(s) {
                assert!(term.chars().count() > 2, "short term {:?} from {:?}", term, s);
                assert!(!is_stop_word(&term), "stop word {:?} from {:?}", term, s);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Laptop battery drains overnight after BIOS update";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn test_wordcloud_list_keeps_domain_words() {
        let terms = tokenize_with("access error on the portal", is_wordcloud_stop_word);
        assert_eq!(terms, vec!["access", "error", "portal"]);
    }

    #[test]
    fn test_normalize_spaced() {
        assert_eq!(normalize_spaced("  VPN,   Timeout!\n again "), "vpn timeout again");
    }
}
