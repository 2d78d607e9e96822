// File: src/core/tokenizer.rs

/// Characters deleted outright before tokenizing.
const STRIPPED: &[char] = &[',', '/', '\'', '(', ')', '.', '^', '[', ']', '!', '"', '\n', '\t', '\r'];

/// Placeholder substituted for every run of digits.
const NUMBER: char = '#';

/// A stateless text normalizer. The same processor must be used for the
/// stream, the reference word list and any initialization data.
#[derive(Debug, Clone, Default)]
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes a raw comment into lowercase word tokens.
    pub fn clean_text(&self, text: &str) -> Vec<String> {
        let without_urls = text
            .split_whitespace()
            .filter(|chunk| !Self::is_url(chunk))
            .collect::<Vec<_>>()
            .join(" ");
        self.tokenize(&without_urls)
    }

    /// First token of `text`, used by the word-list loader.
    pub fn first_token(&self, text: &str) -> Option<String> {
        self.clean_text(text).into_iter().next()
    }

    fn is_url(chunk: &str) -> bool {
        chunk.contains("http") || chunk.starts_with("www.")
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut normalized = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                c if STRIPPED.contains(&c) => {}
                '0'..='9' => {
                    while matches!(chars.peek(), Some('0'..='9')) {
                        chars.next();
                    }
                    normalized.push(NUMBER);
                }
                '-' => {
                    while chars.peek() == Some(&'-') {
                        chars.next();
                    }
                    normalized.push('-');
                }
                _ => normalized.push(c),
            }
        }

        normalized
            .split(|c: char| !Self::is_token_char(c))
            .map(|raw| raw.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_')))
            .filter(|word| !word.is_empty())
            .map(|word| word.to_ascii_lowercase())
            .collect()
    }

    fn is_token_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '$' | '-' | '_' | '&' | '.' | NUMBER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        let tp = TextProcessor::new();
        assert_eq!(
            tp.clean_text("Hello, World! (It's) \"fine\"."),
            vec!["hello", "world", "its", "fine"]
        );
    }

    #[test]
    fn drops_urls() {
        let tp = TextProcessor::new();
        assert_eq!(
            tp.clean_text("see https://example.com/x and www.example.org now"),
            vec!["see", "and", "now"]
        );
    }

    #[test]
    fn digits_collapse_into_placeholder() {
        let tp = TextProcessor::new();
        assert_eq!(tp.clean_text("covid19 in 2020"), vec!["covid", "in"]);
        assert_eq!(tp.clean_text("h4x0r"), vec!["h#x#r"]);
    }

    #[test]
    fn dashes_are_collapsed_inside_words() {
        let tp = TextProcessor::new();
        assert_eq!(tp.clean_text("well---known -- thing"), vec!["well-known", "thing"]);
    }

    #[test]
    fn empty_and_symbol_only_lines_produce_nothing() {
        let tp = TextProcessor::new();
        assert!(tp.clean_text("").is_empty());
        assert_eq!(tp.first_token("  ?!  "), None);
        assert_eq!(tp.first_token("Pizza place"), Some("pizza".to_string()));
    }
}
