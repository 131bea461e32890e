//! Fuzzy topic matching for prioritising crawled pages.

/// Share of topic words that must appear for a word-level match.
const MIN_WORD_COVERAGE: f64 = 0.5;

/// Matches page text against a topic.
///
/// A page matches when its words contain the topic's words as a consecutive
/// run, or when at least half of the topic's words appear in it. Only whole
/// words count. An empty topic matches nothing.
#[derive(Debug, Clone)]
pub struct TopicMatcher {
    phrase: String,
    words: Vec<String>,
}

/// Lower-cased alphanumeric words.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl TopicMatcher {
    pub fn new(topic: &str) -> Self {
        let words = words(topic);
        Self {
            phrase: words.join(" "),
            words,
        }
    }

    pub fn topic(&self) -> &str {
        &self.phrase
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.is_empty() {
            return false;
        }

        let haystack = words(text);
        if haystack.is_empty() {
            return false;
        }

        if haystack.windows(self.words.len()).any(|w| w == self.words.as_slice()) {
            return true;
        }

        let present = self
            .words
            .iter()
            .filter(|w| haystack.iter().any(|h| h == *w))
            .count();
        present as f64 / self.words.len() as f64 >= MIN_WORD_COVERAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_match_ignores_case_and_punctuation() {
        let matcher = TopicMatcher::new("Church Planting");
        assert!(matcher.matches("A guide to church-planting in cities"));
    }

    #[test]
    fn half_of_the_words_is_enough() {
        let matcher = TopicMatcher::new("leadership pipeline coaching retreat");
        assert!(matcher.matches("Coaching notes on pipeline health"));
        assert!(!matcher.matches("Retreat schedule"));
    }

    #[test]
    fn empty_topic_never_matches() {
        let matcher = TopicMatcher::new("  ... ");
        assert!(matcher.is_empty());
        assert!(!matcher.matches("anything at all"));
    }

    #[test]
    fn empty_text_never_matches() {
        assert!(!TopicMatcher::new("vision").matches(""));
    }

    #[test]
    fn words_must_match_whole() {
        let matcher = TopicMatcher::new("art");
        assert!(!matcher.matches("Starting a partnership"));
        assert!(matcher.matches("Art direction"));
    }

    #[test]
    fn phrase_inside_longer_words_does_not_match() {
        let matcher = TopicMatcher::new("team lead");
        assert!(!matcher.matches("Steam leader notes"));
        assert!(matcher.matches("Notes for the team lead"));
    }
}
