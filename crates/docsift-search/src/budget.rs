//! Token estimates and the context budget applied to fused results.

use crate::fusion::FusedHit;

/// Estimate the token count of `text` as `ceil(chars / chars_per_token)`.
///
/// # Examples
///
/// ```
/// use docsift_search::budget::estimate_tokens;
///
/// assert_eq!(estimate_tokens("abcd", 4), 1);
/// assert_eq!(estimate_tokens("abcde", 4), 2);
/// assert_eq!(estimate_tokens("", 4), 0);
/// ```
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count().div_ceil(chars_per_token.max(1))
}

/// Select hits in fused order until the token budget or the result cap is hit.
///
/// Greedy: accumulate each hit's estimated cost and stop at the first hit
/// that would push the total past `max_tokens`. The first hit is always kept,
/// even when it alone exceeds the budget.
pub fn fit_to_budget(
    hits: Vec<FusedHit>,
    max_tokens: usize,
    max_results: usize,
    chars_per_token: usize,
) -> Vec<FusedHit> {
    let mut selected = Vec::with_capacity(max_results.min(hits.len()));
    let mut used = 0usize;

    for hit in hits {
        if selected.len() >= max_results {
            break;
        }
        let cost = estimate_tokens(&hit.chunk.content, chars_per_token);
        if !selected.is_empty() && used + cost > max_tokens {
            break;
        }
        used += cost;
        selected.push(hit);
    }

    tracing::debug!(selected = selected.len(), used, max_tokens, "fit results to budget");
    selected
}
