//! Chunk codec: split a string into size-capped fragments and rejoin them.
//!
//! Backends store each fragment in its own physical slot, index 0 upward
//! with no gaps. Reading stops at the first missing index, so a partially
//! expired or partially deleted value reads back as absent instead of
//! truncated.

/// Splits `value` into fragments of at most `max_len` characters each, in
/// order, such that concatenating them reproduces `value` exactly.
///
/// Splitting happens on `char` boundaries, so every fragment is valid
/// UTF-8 on its own. A `max_len` of `0` means the value cannot be
/// represented and yields an empty sequence.
///
/// Note: the empty string also yields zero fragments, which makes it
/// indistinguishable from an absent key on read. This mirrors the
/// behavior of sessions persisted by the other SDKs.
#[must_use]
pub fn split_value(value: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return Vec::new();
    }

    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in value.chars() {
        if count == max_len {
            fragments.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

/// Rejoins a fragmented value by reading indices `0, 1, 2, ...` until the
/// first missing one.
///
/// Returns `None` if index 0 is missing (the logical key is absent),
/// otherwise the concatenation of every fragment read before the first
/// gap. A fragment that exists after a gap is unreachable by design; it is
/// cleaned up by removal, never surfaced by a read.
pub fn join_value<F>(mut read_fragment: F) -> Option<String>
where
    F: FnMut(usize) -> Option<String>,
{
    let mut joined = String::new();
    let mut index = 0;
    loop {
        match read_fragment(index) {
            Some(fragment) => {
                joined.push_str(&fragment);
                index += 1;
            }
            None => break,
        }
    }
    if index == 0 { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(fragments: Vec<String>) -> impl FnMut(usize) -> Option<String> {
        move |index| fragments.get(index).cloned()
    }

    #[test]
    fn test_split_join_round_trip() {
        for value in ["a", "hello world", "0123456789abcdefghij", "x".repeat(5001).as_str()] {
            for max_len in [1, 3, 10, 2000] {
                let fragments = split_value(value, max_len);
                assert_eq!(join_value(reader(fragments)).as_deref(), Some(value));
            }
        }
    }

    #[test]
    fn test_fragment_count_is_ceil() {
        let value = "0123456789abcdefghij"; // 20 chars
        assert_eq!(split_value(value, 10).len(), 2);
        assert_eq!(split_value(value, 7).len(), 3);
        assert_eq!(split_value(value, 20).len(), 1);
        assert_eq!(split_value(value, 21).len(), 1);
    }

    #[test]
    fn test_split_short_value_is_single_fragment() {
        assert_eq!(split_value("abc", 2000), vec!["abc".to_string()]);
    }

    #[test]
    fn test_zero_cap_yields_no_fragments() {
        assert!(split_value("anything", 0).is_empty());
    }

    #[test]
    fn test_empty_string_yields_no_fragments() {
        assert!(split_value("", 10).is_empty());
        // ...which reads back as absent.
        assert_eq!(join_value(reader(Vec::new())), None);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let value = "héllo wörld émoji 🦀🦀🦀";
        let fragments = split_value(value, 3);
        for fragment in &fragments {
            assert!(fragment.chars().count() <= 3);
        }
        assert_eq!(join_value(reader(fragments)).as_deref(), Some(value));
    }

    #[test]
    fn test_join_stops_at_first_gap() {
        // Index 2 exists after a gap at index 1; it must stay unreachable.
        let fragments = vec![
            (0, "abc".to_string()),
            (2, "orphan".to_string()),
        ];
        let read = move |index: usize| {
            fragments
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, f)| f.clone())
        };
        assert_eq!(join_value(read).as_deref(), Some("abc"));
    }

    #[test]
    fn test_join_missing_index_zero_is_absent() {
        assert_eq!(join_value(|_| None), None);
    }
}
