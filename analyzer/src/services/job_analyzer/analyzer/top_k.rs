//! Bounded top-k selection
//!
//! Keeps at most `k` items sorted by key, descending. Ties keep input order,
//! so the same input always yields the same ranking.

/// Select the `k` items with the largest keys
///
/// Items whose key does not compare (NaN) never displace anything.
pub fn top_k<T, K, I>(items: I, k: usize) -> Vec<(T, K)>
where
    I: IntoIterator<Item = (T, K)>,
    K: PartialOrd,
{
    let mut selected: Vec<(T, K)> = Vec::with_capacity(k);
    if k == 0 {
        return selected;
    }

    for (item, key) in items {
        // First slot holding a strictly smaller key; equal keys stay ahead
        let position = selected.iter().position(|(_, existing)| *existing < key);
        match position {
            Some(pos) => {
                selected.insert(pos, (item, key));
                selected.truncate(k);
            },
            None if selected.len() < k => selected.push((item, key)),
            None => {},
        }
    }

    selected
}
