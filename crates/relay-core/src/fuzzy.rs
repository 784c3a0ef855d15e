//! Nearest-name lookup for mistyped shortcuts.

/// Similarity ratio in `0.0..=1.0` between two names, ignoring case.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// The candidate most similar to `word`, if it reaches `threshold`.
/// Ties keep the earliest candidate.
pub fn closest<T, I, F>(word: &str, candidates: I, name_of: F, threshold: f64) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &str,
{
    let mut best: Option<(T, f64)> = None;
    for candidate in candidates {
        let score = similarity(word, name_of(&candidate));
        if score < threshold {
            continue;
        }
        if best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick<'a>(word: &str, names: &[&'a str], threshold: f64) -> Option<&'a str> {
        closest(word, names.iter().copied(), |n| *n, threshold)
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("deploy", "deploy"), 1.0);
        assert_eq!(similarity("Deploy", "deploy"), 1.0);
        assert!(similarity("abc", "xyz") < 0.1);
    }

    #[test]
    fn test_single_typo_is_found() {
        assert_eq!(pick("dploy", &["list", "deploy", "exit"], 0.6), Some("deploy"));
        assert_eq!(pick("lsit", &["list", "exit"], 0.5), Some("list"));
    }

    #[test]
    fn test_nothing_close_returns_none() {
        assert_eq!(pick("frobnicate", &["run", "addcmd", "list", "clear", "exit"], 0.6), None);
    }

    #[test]
    fn test_tie_keeps_first() {
        assert_eq!(pick("cat", &["bat", "hat"], 0.6), Some("bat"));
    }

    #[test]
    fn test_threshold_cuts_off() {
        // "abcde" vs "abcxy": 2 edits over 5 chars
        assert_eq!(pick("abcde", &["abcxy"], 0.59), Some("abcxy"));
        assert_eq!(pick("abcde", &["abcxy"], 0.61), None);
    }
}
