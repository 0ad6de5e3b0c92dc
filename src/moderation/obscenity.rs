use std::collections::HashSet;

use crate::error::TypeError;

pub const OBSCENITY_MESSAGE: &str = "Use of forbidden words is not allowed.";

/// Lower-cased forbidden word list the free-text validators compare against
#[derive(Debug, Clone, Default)]
pub struct ForbiddenWords {
    words: HashSet<String>,
    threshold: usize,
}

impl ForbiddenWords {
    pub fn new<I, S>(words: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            threshold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whole value check, used for usernames, personal names and recipe names
    pub fn validate_no_obscenities(&self, value: &str) -> Result<(), TypeError> {
        if is_forbidden(&value.to_lowercase(), &self.words, self.threshold) {
            return Err(TypeError::new(OBSCENITY_MESSAGE));
        }
        Ok(())
    }

    /// Word by word check, used for recipe text
    pub fn validate_text(&self, value: &str) -> Result<(), TypeError> {
        let words = words_from_text(value);
        if text_has_forbidden_words(&words, &self.words, self.threshold) {
            return Err(TypeError::new(OBSCENITY_MESSAGE));
        }
        Ok(())
    }
}

pub fn words_from_text(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.to_owned())
        .collect()
}

pub fn is_forbidden(word: &str, forbidden_words: &HashSet<String>, threshold: usize) -> bool {
    forbidden_words
        .iter()
        .any(|forbidden| strsim::levenshtein(word, forbidden) <= threshold)
}

pub fn text_has_forbidden_words(
    words: &HashSet<String>,
    forbidden_words: &HashSet<String>,
    threshold: usize,
) -> bool {
    words
        .iter()
        .any(|word| is_forbidden(word, forbidden_words, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ForbiddenWords {
        ForbiddenWords::new(["Scoundrel", "villainous"], 2)
    }

    #[test]
    fn exact_and_near_matches_are_rejected() {
        let filter = filter();

        assert!(filter.validate_no_obscenities("scoundrel").is_err());
        assert!(filter.validate_no_obscenities("SCOUNDREL").is_err());
        assert!(filter.validate_no_obscenities("scoundrle").is_err());
        assert!(filter.validate_no_obscenities("skoundrel").is_err());
        assert!(filter.validate_no_obscenities("villainus").is_err());
    }

    #[test]
    fn distant_values_pass() {
        let filter = filter();

        assert!(filter.validate_no_obscenities("gordon_ramsay").is_ok());
        assert_eq!(
            filter.validate_no_obscenities("scoundrel").unwrap_err().info,
            OBSCENITY_MESSAGE
        );
    }

    #[test]
    fn whole_value_check_does_not_split_words() {
        let filter = filter();

        assert!(filter.validate_no_obscenities("a scoundrel indeed").is_ok());
        assert!(filter.validate_text("a scoundrel indeed").is_err());
    }

    #[test]
    fn text_is_checked_word_by_word() {
        let filter = filter();

        assert!(filter
            .validate_text("Stir the soup and add salt to taste")
            .is_ok());
        assert!(filter
            .validate_text("Only a Scoundrell would overcook pasta")
            .is_err());
    }

    #[test]
    fn empty_list_never_rejects() {
        let filter = ForbiddenWords::new(Vec::<String>::new(), 2);

        assert!(filter.is_empty());
        assert!(filter.validate_text("anything goes").is_ok());
        assert!(filter.validate_no_obscenities("x").is_ok());
    }

    #[test]
    fn threshold_bounds_the_distance() {
        let words: HashSet<String> = ["pasta".to_string()].into_iter().collect();

        assert!(is_forbidden("pasta", &words, 0));
        assert!(!is_forbidden("paste", &words, 0));
        assert!(is_forbidden("paste", &words, 1));
        assert!(!is_forbidden("pistol", &words, 2));
    }

    #[test]
    fn words_are_lowercased_and_deduplicated() {
        let words = words_from_text("Salt salt\tPEPPER\n");
        assert_eq!(words.len(), 2);
        assert!(words.contains("salt") && words.contains("pepper"));
    }
}
