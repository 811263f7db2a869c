//! Log directory watching against real files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use nparse::watcher::LogDirectoryWatcher;
use nparse::{Event, EventBus, Topic};

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// Collects every published log line and active file switch.
#[derive(Default, Clone)]
struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
    switches: Arc<Mutex<Vec<PathBuf>>>,
}

impl Recorder {
    fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        let lines = Arc::clone(&recorder.lines);
        bus.subscribe(Topic::LogLine, move |event| {
            if let Event::LogLine(line) = event {
                lines.lock().unwrap().push(line.text.clone());
            }
        });
        let switches = Arc::clone(&recorder.switches);
        bus.subscribe(Topic::ActiveFileChanged, move |event| {
            if let Event::ActiveFileChanged(path) = event {
                switches.lock().unwrap().push(path.clone());
            }
        });
        recorder
    }

    fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }

    fn switches(&self) -> Vec<PathBuf> {
        self.switches.lock().unwrap().clone()
    }
}

fn setup(files: &[&str]) -> (TempDir, EventBus, Recorder, LogDirectoryWatcher) {
    let dir = TempDir::new().unwrap();
    for name in files {
        fs::write(dir.path().join(name), "[Mon Jan 01 00:00:00 2024] old line\r\n").unwrap();
    }
    let bus = EventBus::new();
    let recorder = Recorder::attach(&bus);
    let watcher = LogDirectoryWatcher::open(dir.path(), None, bus.clone()).unwrap();
    (dir, bus, recorder, watcher)
}

#[test]
fn location_line_is_emitted_once() {
    let (_dir, _bus, recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let path = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(
        &path,
        "[Mon Jan 01 00:00:01 2024] Your Location is 100.00, 200.00, 0.00\r\n",
    );
    assert_eq!(watcher.file_written(&path), 1);
    assert_eq!(
        recorder.take_lines(),
        vec!["Your Location is 100.00, 200.00, 0.00"]
    );

    assert_eq!(watcher.file_written(&path), 0);
    assert!(recorder.take_lines().is_empty());
}

#[test]
fn existing_content_is_not_replayed() {
    let (_dir, _bus, recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let path = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(&path, "[Mon Jan 01 00:00:02 2024] fresh\n");
    watcher.file_written(&path);
    assert_eq!(recorder.take_lines(), vec!["fresh"]);
    assert_eq!(recorder.switches(), vec![path]);
}

#[test]
fn switching_characters_keeps_offsets() {
    let (_dir, _bus, recorder, mut watcher) =
        setup(&["eqlog_Alice_server.txt", "eqlog_Bob_server.txt"]);
    let alice = watcher.log_dir().join("eqlog_Alice_server.txt");
    let bob = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(&alice, "[Mon Jan 01 00:00:01 2024] alice one\n");
    watcher.file_written(&alice);
    assert_eq!(recorder.take_lines(), vec!["alice one"]);

    append(&bob, "[Mon Jan 01 00:00:02 2024] bob one\n");
    watcher.file_written(&bob);
    assert_eq!(recorder.take_lines(), vec!["bob one"]);
    assert_eq!(watcher.active_path(), Some(bob.as_path()));

    append(&alice, "[Mon Jan 01 00:00:03 2024] alice two\n");
    watcher.file_written(&alice);
    assert_eq!(recorder.take_lines(), vec!["alice two"]);
    assert_eq!(recorder.switches(), vec![alice.clone(), bob, alice]);
}

#[test]
fn truncation_does_not_replay_old_content() {
    let (_dir, _bus, recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let path = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(&path, "[Mon Jan 01 00:00:01 2024] before\n");
    watcher.file_written(&path);
    assert_eq!(recorder.take_lines(), vec!["before"]);

    fs::write(&path, "x\n").unwrap();
    assert_eq!(watcher.file_written(&path), 0);

    append(&path, "[Mon Jan 01 00:00:02 2024] after\n");
    watcher.file_written(&path);
    assert_eq!(recorder.take_lines(), vec!["after"]);
}

#[test]
fn recreated_file_is_not_replayed() {
    let (_dir, _bus, recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let path = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(&path, "[Mon Jan 01 00:00:01 2024] first life\n");
    watcher.file_written(&path);
    assert_eq!(recorder.take_lines(), vec!["first life"]);
    let old_offset = watcher.offset_of(&path).unwrap();

    fs::remove_file(&path).unwrap();
    watcher.refresh();
    assert!(watcher.active_path().is_none());

    let mut history = String::new();
    for n in 0..5 {
        history.push_str(&format!("[Mon Jan 01 00:00:0{n} 2024] second life {n}\n"));
    }
    fs::write(&path, &history).unwrap();
    assert!(history.len() as u64 > old_offset);
    watcher.refresh();
    assert_eq!(watcher.offset_of(&path), Some(history.len() as u64));

    append(&path, "[Mon Jan 01 00:00:09 2024] appended\n");
    watcher.file_written(&path);
    assert_eq!(recorder.take_lines(), vec!["appended"]);
}

#[test]
fn new_file_is_picked_up_on_write() {
    let (_dir, _bus, recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let carol = watcher.log_dir().join("eqlog_Carol_server.txt");

    fs::write(&carol, "[Mon Jan 01 00:00:00 2024] created\n").unwrap();
    watcher.refresh();
    assert!(watcher.known_files().any(|p| p == carol.as_path()));

    append(&carol, "[Mon Jan 01 00:00:01 2024] hello\n");
    watcher.file_written(&carol);
    assert_eq!(recorder.take_lines(), vec!["hello"]);
}

#[test]
fn removed_active_file_is_dropped() {
    let (_dir, _bus, _recorder, mut watcher) = setup(&["eqlog_Bob_server.txt"]);
    let path = watcher.log_dir().join("eqlog_Bob_server.txt");

    append(&path, "[Mon Jan 01 00:00:01 2024] x\n");
    watcher.file_written(&path);
    assert!(watcher.active_path().is_some());

    fs::remove_file(&path).unwrap();
    watcher.refresh();
    assert!(watcher.active_path().is_none());
    assert_eq!(watcher.known_files().count(), 0);
}

#[test]
fn last_profile_starts_active() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("eqlog_Bob_server.txt"), "old\n").unwrap();
    fs::write(dir.path().join("eqlog_Alice_server.txt"), "old\n").unwrap();

    let watcher =
        LogDirectoryWatcher::open(dir.path(), Some("eqlog_Alice_server.txt"), EventBus::new())
            .unwrap();
    let active = watcher.active_path().unwrap();
    assert_eq!(active.file_name().unwrap(), "eqlog_Alice_server.txt");
    assert_eq!(watcher.offset_of(active), Some(4));
}

#[test]
fn missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = LogDirectoryWatcher::open(&dir.path().join("Logs"), None, EventBus::new());
    assert!(matches!(result, Err(nparse::Error::LogDirNotFound(_))));
}
