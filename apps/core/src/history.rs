use crate::storage::{self, Store};

pub const HISTORY_KEY: &str = "basesHistory";

/// Appends `entry` as the most recent item, dropping any earlier occurrence.
pub fn record(list: &mut Vec<String>, entry: &str) {
    list.retain(|existing| existing != entry);
    list.push(entry.to_string());
}

pub fn is_recordable(entry: &str) -> bool {
    storage::is_representable(entry)
}

/// Oldest first, most recent last.
pub fn entries(store: &Store) -> Vec<String> {
    store.get_array(HISTORY_KEY)
}

#[cfg(test)]
mod tests {
    use super::record;

    #[test]
    fn reinserting_moves_entry_to_end() {
        let mut list = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        record(&mut list, "a");
        assert_eq!(list, vec!["b", "c", "a"]);
    }

    #[test]
    fn repeated_insert_keeps_single_copy() {
        let mut list = Vec::new();
        record(&mut list, "x");
        record(&mut list, "x");
        assert_eq!(list, vec!["x"]);
    }
}
