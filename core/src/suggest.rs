//! "Did you mean ...?" suggestions
//!
//! Bounded Levenshtein search over known names. Comparison is
//! case-insensitive because variable and function names are.

/// Levenshtein distance between two strings, compared case-insensitively.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// How far to look for a replacement name.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionSearch {
    pub max_distance: usize,
    /// Also accept candidates that contain the target (or vice versa),
    /// e.g. `Missing` → `MissingNode`.
    pub allow_containment: bool,
}

impl Default for SuggestionSearch {
    fn default() -> Self {
        Self {
            max_distance: 2,
            allow_containment: false,
        }
    }
}

impl SuggestionSearch {
    pub fn within(max_distance: usize) -> Self {
        Self {
            max_distance,
            allow_containment: false,
        }
    }

    pub fn with_containment(mut self) -> Self {
        self.allow_containment = true;
        self
    }

    /// Find the closest candidate, ties broken by candidate order.
    ///
    /// An exact (case-insensitive) match is never suggested: the caller is
    /// looking for a *different* name.
    pub fn nearest<'a, I>(&self, target: &str, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let lowered = target.to_lowercase();
        let mut best: Option<(usize, &'a str)> = None;

        for candidate in candidates {
            let candidate_lower = candidate.to_lowercase();
            if candidate_lower == lowered {
                continue;
            }

            let distance = edit_distance(target, candidate);
            let contained = self.allow_containment
                && !lowered.is_empty()
                && (candidate_lower.contains(&lowered) || lowered.contains(&candidate_lower));

            if distance > self.max_distance && !contained {
                continue;
            }

            match best {
                Some((best_distance, _)) if best_distance <= distance => {}
                _ => best = Some((distance, candidate)),
            }
        }

        best.map(|(_, name)| name.to_string())
    }
}

/// Render a suggestion message for the nearest name, if any.
pub fn did_you_mean<'a, I>(target: &str, candidates: I, search: SuggestionSearch) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    search
        .nearest(target, candidates)
        .map(|name| format!("did you mean '{}'?", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("Gold", "gold"), 0);
        assert_eq!(edit_distance("gold", "glod"), 2);
    }

    #[test]
    fn test_nearest_within_distance() {
        let names = ["gold", "health", "name"];
        let search = SuggestionSearch::within(2);
        assert_eq!(search.nearest("gld", names), Some("gold".to_string()));
        assert_eq!(search.nearest("nmae", names), Some("name".to_string()));
        // Three edits away from "name"
        assert_eq!(search.nearest("mana", names), None);
        assert_eq!(search.nearest("experience", names), None);
    }

    #[test]
    fn test_exact_match_is_not_suggested() {
        let search = SuggestionSearch::within(2);
        assert_eq!(search.nearest("Gold", ["gold"]), None);
    }

    #[test]
    fn test_containment() {
        let names = ["Start", "MissingNode"];
        assert_eq!(SuggestionSearch::within(2).nearest("Missing", names), None);
        assert_eq!(
            SuggestionSearch::within(2)
                .with_containment()
                .nearest("Missing", names),
            Some("MissingNode".to_string())
        );
    }

    #[test]
    fn test_did_you_mean_message() {
        let message = did_you_mean("helth", ["health"], SuggestionSearch::default());
        assert_eq!(message.as_deref(), Some("did you mean 'health'?"));
    }
}
