//! Levenshtein edit distance.
//!
//! Used to point at the paragraph an unmatched edit most likely meant, so a
//! target computed against a slightly different extraction can be diagnosed.

/// Maximum character count for Levenshtein inputs.
///
/// Longer inputs get a pessimistic distance without building the matrix.
/// A resume paragraph is far below this.
const MAX_LEVENSHTEIN_INPUT: usize = 10_000;

/// Compute the Levenshtein edit distance between two strings, in chars.
///
/// If either input exceeds [`MAX_LEVENSHTEIN_INPUT`] characters, returns
/// `max(m, n)` as a pessimistic upper bound. Also returns `max(m, n)` at once
/// when `|m - n| > max(m, n) / 3`: strings that different in length are not
/// candidates for the same text.
pub fn distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let max_len = m.max(n);

    if m > MAX_LEVENSHTEIN_INPUT || n > MAX_LEVENSHTEIN_INPUT {
        return max_len;
    }

    // Quick reject: length difference alone implies high distance.
    if m.abs_diff(n) > max_len / 3 {
        return max_len;
    }

    // Two rows instead of the full matrix.
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity ratio between two strings: 0.0 is unrelated, 1.0 identical.
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (distance(a, b) as f64 / max_len as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(distance("Jane Doe", "Jane Doe"), 0);
        assert!((similarity("Jane Doe", "Jane Doe") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty() {
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("", ""), 0);
    }

    #[test]
    fn test_single_edit() {
        assert_eq!(distance("kitten", "sitten"), 1);
        assert_eq!(distance("cat", "cats"), 1);
        assert_eq!(distance("cats", "cat"), 1);
    }

    #[test]
    fn test_classic() {
        assert_eq!(distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert_eq!(distance("café", "cafe"), 1);
        assert!((similarity("café", "cafe") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_length_quick_reject() {
        assert_eq!(distance("Rust", "Rust, Go, Python, TypeScript"), 28);
    }

    #[test]
    fn test_similarity_range() {
        let s = similarity("Managed a team", "Managed the team");
        assert!(s > 0.5 && s < 1.0);
    }
}
