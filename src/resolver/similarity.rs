//! String similarity for surface-name matching
//!
//! Names are short runs of ideographs, so edit distance is computed over
//! `char`s rather than bytes.

/// Levenshtein edit distance over chars
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
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
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity `1 - distance / max(len)`, in [0.0, 1.0]
///
/// Two empty strings are identical (1.0).
///
/// ```
/// use castcore::resolver::similarity::normalized_levenshtein;
///
/// assert_eq!(normalized_levenshtein("莫凡", "莫凡"), 1.0);
/// assert_eq!(normalized_levenshtein("叶心夏", "叶心霞"), 1.0 - 1.0 / 3.0);
/// ```
#[must_use]
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}
