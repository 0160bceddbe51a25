use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use super::debouncer::Debouncer;
use super::{ChangeWatcher, watch_dir};

const WINDOW: Duration = Duration::from_millis(50);

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn rename_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Name(
        notify::event::RenameMode::To,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn debouncer() -> Debouncer {
    Debouncer::new(Path::new("/srv/data/data.json"), WINDOW)
}

#[test]
fn test_debouncer_empty() {
    let debouncer = debouncer();
    assert!(!debouncer.is_ready());
    assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
}

#[test]
fn test_target_events_counted() {
    let mut debouncer = debouncer();

    assert!(debouncer.add_event(&make_event(vec!["/srv/data/data.json"], modify_kind())));
    assert!(debouncer.add_event(&make_event(vec!["/srv/data/data.json"], create_kind())));
    assert!(debouncer.add_event(&make_event(vec!["/srv/data/data.json"], rename_kind())));

    assert_eq!(debouncer.pending, 3);
}

#[test]
fn test_sibling_files_ignored() {
    let mut debouncer = debouncer();

    assert!(!debouncer.add_event(&make_event(vec!["/srv/data/other.json"], modify_kind())));
    assert!(!debouncer.add_event(&make_event(vec!["/srv/data/.data.json.tmp"], create_kind())));
    assert!(!debouncer.add_event(&make_event(vec!["/srv/data/data.json.swp"], modify_kind())));

    assert_eq!(debouncer.pending, 0);
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_rename_event_with_both_paths() {
    // Temp file renamed over the document
    let mut debouncer = debouncer();
    let event = make_event(
        vec!["/srv/data/.data.json.tmp", "/srv/data/data.json"],
        rename_kind(),
    );
    assert!(debouncer.add_event(&event));
}

#[test]
fn test_metadata_and_remove_ignored() {
    let mut debouncer = debouncer();

    assert!(!debouncer.add_event(&make_event(vec!["/srv/data/data.json"], metadata_kind())));
    assert!(!debouncer.add_event(&make_event(vec!["/srv/data/data.json"], remove_kind())));
    assert_eq!(debouncer.pending, 0);
}

#[test]
fn test_burst_collapses_to_one() {
    let mut debouncer = debouncer();
    for _ in 0..5 {
        debouncer.add_event(&make_event(vec!["/srv/data/data.json"], modify_kind()));
    }

    assert!(!debouncer.is_ready());
    std::thread::sleep(WINDOW + Duration::from_millis(10));

    assert!(debouncer.take_if_ready());
    assert!(!debouncer.take_if_ready());
    assert_eq!(debouncer.pending, 0);
}

#[test]
fn test_sleep_duration_after_event() {
    let mut debouncer = debouncer();
    debouncer.add_event(&make_event(vec!["/srv/data/data.json"], modify_kind()));

    let dur = debouncer.sleep_duration();
    assert!(dur <= WINDOW);
    assert!(dur >= WINDOW - Duration::from_millis(20));
}

#[test]
fn test_watch_dir() {
    assert_eq!(watch_dir(Path::new("data/data.json")), PathBuf::from("data"));
    assert_eq!(watch_dir(Path::new("data.json")), PathBuf::from("."));
    assert_eq!(watch_dir(Path::new("/srv/data.json")), PathBuf::from("/srv"));
}

async fn start(file: &Path) -> (mpsc::UnboundedReceiver<()>, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let watcher = ChangeWatcher::new(file, WINDOW).unwrap();
    let (hit_tx, hit_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(watcher.run(
        move || {
            let _ = hit_tx.send(());
        },
        stop_rx,
    ));
    (hit_rx, stop_tx, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_reports_external_write() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("data.json");
    std::fs::write(&file, "[]").unwrap();

    let (mut hits, stop, handle) = start(&file).await;

    std::fs::write(&file, r#"["x"]"#).unwrap();
    let hit = tokio::time::timeout(Duration::from_secs(5), hits.recv()).await;
    assert!(matches!(hit, Ok(Some(()))));

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_ignores_sibling_files() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("data.json");
    std::fs::write(&file, "[]").unwrap();

    let (mut hits, stop, handle) = start(&file).await;

    std::fs::write(temp.path().join("notes.txt"), "unrelated").unwrap();
    let hit = tokio::time::timeout(Duration::from_millis(400), hits.recv()).await;
    assert!(hit.is_err(), "sibling write must not trigger a reload");

    drop(stop);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
