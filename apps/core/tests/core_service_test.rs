use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use run1c_core::action_executor::{LaunchError, MockLauncher};
use run1c_core::config::Config;
use run1c_core::core_service::{CoreService, LaunchMode, LaunchRequest, ServiceError};
use run1c_core::history::HISTORY_KEY;
use run1c_core::storage::Store;

fn unique(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    format!("run1c-{label}-{}-{nanos}", std::process::id())
}

struct Fixture {
    root: PathBuf,
    starter: PathBuf,
    storage: PathBuf,
    launcher: Rc<RefCell<MockLauncher>>,
}

impl Fixture {
    fn new(label: &str) -> Self {
        Self::with_launcher(label, MockLauncher::default())
    }

    fn with_launcher(label: &str, launcher: MockLauncher) -> Self {
        let root = std::env::temp_dir().join(unique(label));
        let starter_dir = root.join("1cv8").join("common");
        std::fs::create_dir_all(&starter_dir).unwrap();
        let starter = starter_dir.join("1cestart.exe");
        std::fs::write(&starter, b"stub").unwrap();

        Self {
            storage: root.join("profile").join("run1c_storage.ini"),
            root,
            starter,
            launcher: Rc::new(RefCell::new(launcher)),
        }
    }

    fn config(&self) -> Config {
        Config {
            starter_path: Some(self.starter.clone()),
            storage_path: Some(self.storage.clone()),
            ..Default::default()
        }
    }

    fn service(&self) -> CoreService {
        let mut store = Store::open(&self.storage);
        store.load();
        CoreService::with_parts(self.config(), store, Box::new(self.launcher.clone())).unwrap()
    }

    fn invocations(&self) -> Vec<Vec<String>> {
        self.launcher
            .borrow()
            .invocations()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// A directory named like `C:name` in the working directory, so the extracted
/// drive-rooted text resolves to something that exists on every platform.
struct DriveDir {
    name: String,
}

impl DriveDir {
    fn new(label: &str) -> Self {
        let name = format!("C:{}", unique(label));
        std::fs::create_dir_all(&name).unwrap();
        Self { name }
    }
}

impl Drop for DriveDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.name);
    }
}

#[test]
fn successful_launch_records_history_and_persists() {
    let fixture = Fixture::new("e2e");
    let base = DriveDir::new("base");
    let input = format!("File=\"{}\";", base.name);
    let mut service = fixture.service();

    let outcome = service.submit(&input, false);

    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(service.history(), vec![input.clone()]);
    assert_eq!(
        fixture.invocations(),
        vec![vec![
            "ENTERPRISE".to_string(),
            "/F".to_string(),
            format!("\"{}\"", base.name),
        ]]
    );

    let on_disk = std::fs::read_to_string(&fixture.storage).unwrap();
    assert_eq!(on_disk, format!("[array:{HISTORY_KEY}]\n{input}\n"));
}

#[test]
fn config_mode_passes_config_argument() {
    let fixture = Fixture::new("config-mode");
    let base = DriveDir::new("config-base");
    let mut service = fixture.service();

    service
        .launch(LaunchRequest {
            input: &base.name,
            mode: LaunchMode::Configurator,
        })
        .unwrap();

    assert_eq!(fixture.invocations()[0][0], "CONFIG");
}

#[test]
fn resubmitting_moves_entry_to_end_without_duplicates() {
    let fixture = Fixture::new("dedup");
    let first = DriveDir::new("first");
    let second = DriveDir::new("second");
    let mut service = fixture.service();

    assert!(service.submit(&first.name, false).ok);
    assert!(service.submit(&second.name, false).ok);
    assert!(service.submit(&first.name, true).ok);

    assert_eq!(
        service.history(),
        vec![second.name.clone(), first.name.clone()]
    );

    let mut reloaded = Store::open(&fixture.storage);
    reloaded.load();
    assert_eq!(
        reloaded.get_array(HISTORY_KEY),
        vec![second.name.clone(), first.name.clone()]
    );
}

#[test]
fn empty_input_is_rejected_first() {
    let fixture = Fixture::new("empty");
    let mut service = fixture.service();

    let result = service.launch(LaunchRequest {
        input: "",
        mode: LaunchMode::Enterprise,
    });

    assert!(matches!(result, Err(ServiceError::InvalidInput)));
    assert!(fixture.invocations().is_empty());
}

#[test]
fn missing_starter_is_reported_before_extraction() {
    let fixture = Fixture::new("no-starter");
    let mut service = fixture.service();
    std::fs::remove_file(&fixture.starter).unwrap();

    let result = service.launch(LaunchRequest {
        input: "no drive letter here",
        mode: LaunchMode::Enterprise,
    });

    assert!(matches!(result, Err(ServiceError::ExecutableNotFound(_))));
}

#[test]
fn text_without_drive_path_reports_no_path_found() {
    let fixture = Fixture::new("no-path");
    let mut service = fixture.service();

    let result = service.launch(LaunchRequest {
        input: "no drive letter here",
        mode: LaunchMode::Enterprise,
    });

    match result {
        Err(ServiceError::NoPathFound(input)) => assert_eq!(input, "no drive letter here"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(service.history().is_empty());
    assert!(fixture.invocations().is_empty());
    assert_eq!(std::fs::read_to_string(&fixture.storage).unwrap(), "");
}

#[test]
fn extracted_path_must_exist() {
    let fixture = Fixture::new("missing-base");
    let mut service = fixture.service();
    let input = format!("File=\"C:{}\";", unique("absent"));

    let outcome = service.submit(&input, false);

    assert!(!outcome.ok);
    assert!(outcome.message.contains("database path does not exist"));
    assert!(service.history().is_empty());
    assert!(fixture.invocations().is_empty());
}

#[test]
fn launcher_failure_leaves_history_untouched() {
    let fixture = Fixture::with_launcher(
        "launch-failed",
        MockLauncher::failing(LaunchError::LaunchFailed {
            message: "Access is denied.".to_string(),
            code: Some(5),
        }),
    );
    let base = DriveDir::new("fail-base");
    let mut service = fixture.service();

    let result = service.launch(LaunchRequest {
        input: &base.name,
        mode: LaunchMode::Enterprise,
    });

    assert!(matches!(
        result,
        Err(ServiceError::Launch(LaunchError::LaunchFailed { code: Some(5), .. }))
    ));
    assert!(service.history().is_empty());
}

#[test]
fn failed_submit_keeps_existing_history() {
    let fixture = Fixture::new("keep-history");
    let base = DriveDir::new("kept");
    let mut service = fixture.service();
    assert!(service.submit(&base.name, false).ok);

    let outcome = service.submit("still no drive letter", false);

    assert!(!outcome.ok);
    assert_eq!(service.history(), vec![base.name.clone()]);
}

#[test]
fn history_loaded_from_existing_store() {
    let fixture = Fixture::new("preloaded");
    std::fs::create_dir_all(fixture.storage.parent().unwrap()).unwrap();
    std::fs::write(
        &fixture.storage,
        format!("[array:{HISTORY_KEY}]\nC:\\old\\one\nC:\\old\\two\n"),
    )
    .unwrap();

    let service = fixture.service();

    assert_eq!(service.history(), vec!["C:\\old\\one", "C:\\old\\two"]);
    assert_eq!(service.store().path(), fixture.storage.as_path());
    assert!(service.store().contains(HISTORY_KEY));
    assert_eq!(
        service.config().resolved_starter_path(),
        fixture.starter.clone()
    );
}
