pub mod action_executor;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod extract;
pub mod history;
pub mod logging;
pub mod runtime;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests {
    mod storage_roundtrip_test {
        include!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../tests/perf/storage_roundtrip_test.rs"
        ));
    }
}
