use std::collections::BTreeSet;

use common::storage::types::canonical_object::CanonicalObject;

/// Minimum title-token length that counts as a keyword.
const TITLE_TOKEN_MIN_CHARS: usize = 4;

/// Keyword profile of an object: declared keywords, labels, and the longer
/// title tokens, all lowercased. A `BTreeSet` keeps shared-keyword output
/// deterministic.
pub fn keyword_set(object: &CanonicalObject) -> BTreeSet<String> {
    let mut set = BTreeSet::new();

    for keyword in object.keywords() {
        set.insert(keyword.to_lowercase());
    }
    for label in object.labels() {
        set.insert(label.to_lowercase());
    }
    if let Some(title) = object.title.as_deref() {
        for token in title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| token.chars().count() >= TITLE_TOKEN_MIN_CHARS)
        {
            set.insert(token.to_lowercase());
        }
    }

    set
}

/// Jaccard overlap `|A∩B| / |A∪B|`; 0 when either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        intersection as f64 / union as f64
    }
}

pub fn shared_keywords(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<String> {
    a.intersection(b).cloned().collect()
}
