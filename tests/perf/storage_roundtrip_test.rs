use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::history::{record, HISTORY_KEY};
use crate::storage::Store;

#[test]
fn large_history_round_trips_within_budget() {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("run1c-perf-{}-{unique}", std::process::id()));
    let path = dir.join("run1c_storage.ini");

    let mut store = Store::open(&path);
    {
        let history = store.array_mut(HISTORY_KEY);
        for i in 0..5_000 {
            record(history, &format!("File=\"D:\\Bases\\Company_{i:05}\";"));
        }
        record(history, "File=\"D:\\Bases\\Company_00000\";");
    }

    let started = Instant::now();
    store.save().unwrap();
    let mut reloaded = Store::open(&path);
    let errors = reloaded.load();
    let elapsed = started.elapsed();

    let entries = reloaded.get_array(HISTORY_KEY);
    std::fs::remove_dir_all(&dir).unwrap();

    assert!(errors.is_empty());
    assert_eq!(entries.len(), 5_000);
    assert_eq!(entries[0], "File=\"D:\\Bases\\Company_00001\";");
    assert_eq!(
        entries.last().map(String::as_str),
        Some("File=\"D:\\Bases\\Company_00000\";")
    );
    assert!(
        elapsed.as_millis() < 2_000,
        "save+load took {}ms",
        elapsed.as_millis()
    );
}
