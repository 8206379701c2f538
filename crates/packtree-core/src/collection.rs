//! Small helpers over slices and iterators of records.

/// Default slice/batch size for bulk work.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Split `items` into consecutive slices of at most `size` elements.
///
/// A `size` of 0 yields the whole slice at once.
pub fn sliced<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    let size = if size == 0 { items.len().max(1) } else { size };
    items.chunks(size)
}

/// Group `items` by `key`, ordered by key. Items keep their relative order
/// inside a group.
pub fn group_by<T, K, F>(items: &[T], key: F) -> Vec<(K, Vec<&T>)>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut keyed: Vec<(K, &T)> = items.iter().map(|item| (key(item), item)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out: Vec<(K, Vec<&T>)> = Vec::new();
    for (k, item) in keyed {
        match out.last_mut() {
            Some((last, group)) if *last == k => group.push(item),
            _ => out.push((k, vec![item])),
        }
    }
    out
}
