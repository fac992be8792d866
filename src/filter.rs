//! Content cleaning for scraped article text.
//!
//! [`clean_text`] is a pure transformation applied to article bodies when
//! `clean_content` is enabled. Rules run in this order:
//!
//! 1. URLs (`http://`, `https://`, `www.`)
//! 2. Mentions (`@handle`)
//! 3. Hashtags (`#tag`)
//! 4. Emoji and pictograph runs, with their variation selectors and joiners
//! 5. ASCII word runs (Latin-script words inside non-Latin text)
//! 6. Clusters of two or more quote or dash characters
//! 7. Whitespace collapsed to single spaces, ends trimmed
//!
//! Each removal leaves a space behind so neighbouring words never fuse.

use once_cell::sync::Lazy;
use regex::Regex;

static URLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").unwrap());
static MENTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static HASHTAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").unwrap());
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    // Joiners and variation selectors only go when they trail a pictograph,
    // so Indic conjuncts that use ZWJ survive.
    Regex::new(concat!(
        r"(?:[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}]",
        r"[\x{FE00}-\x{FE0F}\x{20E3}]*\x{200D}?)+"
    ))
    .unwrap()
});
static ASCII_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").unwrap());
static QUOTE_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'`“”‘’«»\-–—_]{2,}"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip noise from article text. See the module docs for the rule order.
pub fn clean_text(input: &str) -> String {
    let text = URLS.replace_all(input, " ");
    let text = MENTIONS.replace_all(&text, " ");
    let text = HASHTAGS.replace_all(&text, " ");
    let text = EMOJI.replace_all(&text, " ");
    let text = ASCII_WORDS.replace_all(&text, " ");
    let text = QUOTE_DASH.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_urls_mentions_hashtags() {
        assert_eq!(
            clean_text("వార్త https://t.co/abc @reporter #breaking ముగింపు"),
            "వార్త ముగింపు"
        );
        assert_eq!(clean_text("చూడండి www.example.com/x"), "చూడండి");
    }

    #[test]
    fn test_strips_emoji() {
        assert_eq!(clean_text("శుభవార్త 🎉🔥 ఈరోజు ☀️"), "శుభవార్త ఈరోజు");
    }

    #[test]
    fn test_strips_ascii_word_runs() {
        assert_eq!(clean_text("హైదరాబాద్ Hyderabad నగరం City"), "హైదరాబాద్ నగరం");
    }

    #[test]
    fn test_keeps_digits_and_single_punctuation() {
        assert_eq!(clean_text("2024 లో 5 మంది - ఒక 'మాట'"), "2024 లో 5 మంది - ఒక 'మాట'");
    }

    #[test]
    fn test_strips_quote_dash_clusters() {
        assert_eq!(clean_text("మొదట ---- తర్వాత “” ముగింపు"), "మొదట తర్వాత ముగింపు");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(clean_text("  ఒకటి\n\n  రెండు\tమూడు  "), "ఒకటి రెండు మూడు");
    }

    #[test]
    fn test_empty_and_all_noise() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("Hello World #tag @me"), "");
    }
}
