//! Minibatch construction with a compounding size schedule.

/// Infinite batch-size schedule growing multiplicatively from `start`
/// toward `stop`.
///
/// Each yielded size is `start * factor^n` clipped to `stop` and truncated
/// to a whole number. The training default `compounding(4.0, 32.0, 1.001)`
/// starts at 4 and saturates at 32.
pub fn compounding(start: f64, stop: f64, factor: f64) -> impl Iterator<Item = usize> {
    let mut current = start;
    std::iter::from_fn(move || {
        let size = current.min(stop).max(1.0) as usize;
        current *= factor;
        Some(size)
    })
}

/// Split `items` into consecutive chunks whose lengths follow `sizes`. The
/// final chunk may be shorter than its scheduled size.
pub fn minibatch<'a, T>(
    items: &'a [T],
    mut sizes: impl Iterator<Item = usize> + 'a,
) -> impl Iterator<Item = &'a [T]> + 'a {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        if pos >= items.len() {
            return None;
        }
        let size = sizes.next().unwrap_or(1).max(1);
        let end = (pos + size).min(items.len());
        let batch = &items[pos..end];
        pos = end;
        Some(batch)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compounding_starts_at_floor_and_saturates_at_cap() {
        let sizes: Vec<usize> = compounding(4.0, 32.0, 1.001).take(10_000).collect();
        assert_eq!(sizes[0], 4);
        assert_eq!(*sizes.last().unwrap(), 32);
        assert!(sizes.iter().all(|&s| (4..=32).contains(&s)));
    }

    #[test]
    fn test_compounding_is_monotonically_nondecreasing() {
        let sizes: Vec<usize> = compounding(4.0, 32.0, 1.001).take(10_000).collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_minibatch_partitions_everything_in_order() {
        let items: Vec<usize> = (0..100).collect();
        let batches: Vec<&[usize]> = minibatch(&items, compounding(4.0, 32.0, 1.001)).collect();

        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, items.len());

        let rejoined: Vec<usize> = batches.iter().flat_map(|b| b.iter().copied()).collect();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn test_minibatch_follows_the_schedule() {
        let items: Vec<usize> = (0..10).collect();
        let batches: Vec<&[usize]> = minibatch(&items, [3, 3, 3, 3].into_iter()).collect();
        let lens: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(lens, [3, 3, 3, 1]);
    }

    #[test]
    fn test_minibatch_on_empty_slice() {
        let items: Vec<usize> = Vec::new();
        assert_eq!(minibatch(&items, compounding(4.0, 32.0, 1.001)).count(), 0);
    }
}
