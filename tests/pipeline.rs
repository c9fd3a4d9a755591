//! Library-level properties of a pipeline run

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use treepack::test_utils::TestTree;
use treepack::{
    CancelToken, EntryOrder, FileRecord, FilterConfig, Format, Observer, PackError, Pipeline,
    SkipReason,
};

#[derive(Debug, Deserialize)]
struct Entry {
    path: String,
    content: Option<String>,
    error: Option<String>,
}

fn parse(format: Format, output: &[u8]) -> Vec<Entry> {
    match format {
        Format::Json => serde_json::from_slice(output).expect("invalid JSON document"),
        Format::Yaml => serde_yaml::from_slice(output).expect("invalid YAML document"),
        Format::Markdown => panic!("markdown does not round-trip"),
    }
}

fn by_path(entries: Vec<Entry>) -> BTreeMap<String, Entry> {
    entries.into_iter().map(|e| (e.path.clone(), e)).collect()
}

#[test]
fn test_entry_count_matches_collected_files_at_any_concurrency() {
    let tree = TestTree::new();
    tree.populate(57);

    for workers in [1, 2, 8, 64] {
        let outcome = tree.pack(Format::Json, workers);
        let entries = parse(Format::Json, &outcome.output);
        assert_eq!(entries.len(), 57, "workers = {workers}");
        assert_eq!(outcome.dispatched, 57);
        assert_eq!(outcome.ledger.len(), 57);
    }
}

#[test]
fn test_repeated_runs_yield_same_entries() {
    let tree = TestTree::new();
    tree.populate(30);
    tree.add_bytes("blob.bin", &[1, 0, 2]);

    let first = by_path(parse(Format::Json, &tree.pack(Format::Json, 4).output));
    let second = by_path(parse(Format::Json, &tree.pack(Format::Json, 4).output));

    assert_eq!(first.len(), second.len());
    for (path, entry) in &first {
        let other = &second[path];
        assert_eq!(entry.content, other.content);
        assert_eq!(entry.error, other.error);
    }
}

#[test]
fn test_round_trip_preserves_content() {
    let tree = TestTree::new();
    let files = [
        ("plain.txt", "hello\n"),
        ("quotes.json", "{\"a\": \"b\\\"c\"}"),
        ("yaml/looking.yml", "- a\n- b: c\n---\n...\n"),
        ("unicode.md", "# Über 🦀\n\ttab\r\nwindows line\n"),
        ("empty.txt", ""),
    ];
    for (path, content) in files {
        tree.add_file(path, content);
    }

    for format in [Format::Json, Format::Yaml] {
        let outcome = tree.pack(format, 3);
        let entries = by_path(parse(format, &outcome.output));
        assert_eq!(entries.len(), files.len(), "{format}");
        for (path, content) in files {
            assert_eq!(
                entries[path].content.as_deref(),
                Some(content),
                "{format}: {path}"
            );
        }
    }
}

#[test]
fn test_empty_tree_is_valid_in_every_format() {
    let tree = TestTree::new();

    let json = tree.pack(Format::Json, 2);
    assert_eq!(json.output, b"[]\n");

    let yaml = tree.pack(Format::Yaml, 2);
    assert!(parse(Format::Yaml, &yaml.output).is_empty());

    let md = tree.pack(Format::Markdown, 2);
    let text = String::from_utf8(md.output).unwrap();
    assert!(text.starts_with("# "));
    assert!(text.ends_with("*0 files, 0 skipped*\n"));
}

#[test]
fn test_oversize_file_is_recorded_and_run_continues() {
    let tree = TestTree::new();
    tree.add_sized("a.txt", 100);
    tree.add_sized("huge.txt", 5000);
    tree.add_sized("b.txt", 100);

    let filter = FilterConfig {
        max_file_size: 1000,
        ..Default::default()
    };
    let outcome = tree.pack_with(tree.context(Format::Json, 2), filter);
    let entries = by_path(parse(Format::Json, &outcome.output));

    assert_eq!(entries.len(), 3);
    assert!(entries["huge.txt"].content.is_none());
    assert!(entries["huge.txt"].error.is_some());
    assert_eq!(entries["a.txt"].content.as_deref().map(str::len), Some(100));

    let huge = outcome
        .ledger
        .records()
        .iter()
        .find(|r| r.path == "huge.txt")
        .unwrap();
    assert!(!huge.included);
    assert_eq!(huge.bytes, 5000);
    assert_eq!(
        huge.skip_reason,
        Some(SkipReason::TooLarge {
            size: 5000,
            limit: 1000
        })
    );
}

#[test]
fn test_three_files_two_workers_json() {
    let tree = TestTree::new();
    tree.add_sized("ten.txt", 10);
    tree.add_sized("nested/twenty.txt", 20);
    tree.add_sized("nested/deeper/thirty.txt", 30);

    let outcome = tree.pack(Format::Json, 2);
    let entries = by_path(parse(Format::Json, &outcome.output));

    let lengths: Vec<(&str, usize)> = entries
        .iter()
        .map(|(p, e)| (p.as_str(), e.content.as_ref().unwrap().len()))
        .collect();
    assert_eq!(
        lengths,
        vec![
            ("nested/deeper/thirty.txt", 30),
            ("nested/twenty.txt", 20),
            ("ten.txt", 10)
        ]
    );
}

#[test]
fn test_markdown_document_structure() {
    let tree = TestTree::new();
    tree.add_file("README.md", "Use it like:\n```sh\ntreepack .\n```\n");
    tree.add_file("src/lib.rs", "pub fn f() {}\n");
    tree.add_bytes("logo.png", &[0x89, b'P', b'N', b'G', 0]);

    let ctx = tree
        .context(Format::Markdown, 2)
        .with_order(EntryOrder::Collection);
    let outcome = tree.pack_with(ctx, FilterConfig::default());
    let text = String::from_utf8(outcome.output).unwrap();

    assert!(text.contains("## `README.md`\n\n````markdown\n"));
    assert!(text.contains("## `logo.png`\n\n> skipped: binary file\n"));
    assert!(text.contains("## `src/lib.rs`\n\n```rust\npub fn f() {}\n```\n"));
    assert!(text.ends_with("*2 files, 1 skipped*\n"));

    let headings: Vec<&str> = text.lines().filter(|l| l.starts_with("## ")).collect();
    assert_eq!(headings, vec!["## `README.md`", "## `logo.png`", "## `src/lib.rs`"]);
}

#[cfg(unix)]
#[test]
fn test_markdown_file_name_with_newline_keeps_one_heading() {
    let tree = TestTree::new();
    tree.add_file("evil\n## `fake.rs`", "a\n");
    tree.add_file("ok.rs", "b\n");

    let ctx = tree
        .context(Format::Markdown, 2)
        .with_order(EntryOrder::Collection);
    let outcome = tree.pack_with(ctx, FilterConfig::default());
    let text = String::from_utf8(outcome.output).unwrap();

    let headings: Vec<&str> = text.lines().filter(|l| l.starts_with("## ")).collect();
    assert_eq!(headings.len(), 2);
    assert!(!headings.contains(&"## `fake.rs`"));
}

#[test]
fn test_invalid_utf8_recorded() {
    let tree = TestTree::new();
    tree.add_bytes("latin1.txt", &[b'c', b'a', b'f', 0xE9]);

    let outcome = tree.pack(Format::Yaml, 1);
    let entries = parse(Format::Yaml, &outcome.output);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].error.as_deref(), Some("not valid UTF-8"));
}

struct CancelAfter {
    limit: usize,
    seen: usize,
    token: CancelToken,
}

impl Observer for CancelAfter {
    fn on_file(&mut self, _record: &FileRecord) {
        self.seen += 1;
        if self.seen == self.limit {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancellation_mid_run() {
    let tree = TestTree::new();
    tree.populate(500);

    let token = CancelToken::new();
    let ctx = tree.context(Format::Json, 2).with_cancel(token.clone());
    let pipeline = Pipeline::new(ctx, FilterConfig::default()).unwrap();

    let observer = CancelAfter {
        limit: 5,
        seen: 0,
        token,
    };
    let err = pipeline
        .run_with_observer(Vec::new(), Box::new(observer))
        .err()
        .expect("run should be cancelled");

    match err {
        PackError::Cancelled {
            dispatched,
            written,
        } => {
            assert!(written >= 5);
            assert!(written <= dispatched);
            assert!(dispatched < 500);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

/// Accepts `limit` writes, then fails every one after
struct FailAfter(usize);

impl Write for FailAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.0 == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
        }
        self.0 -= 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failing_output_stops_the_run() {
    let tree = TestTree::new();
    for i in 0..300 {
        tree.add_sized(&format!("dir{}/file{:03}.txt", i % 7, i), 20 * 1024);
    }

    for order in [EntryOrder::Arrival, EntryOrder::Collection] {
        let ctx = tree.context(Format::Json, 2).with_order(order);
        let pipeline = Pipeline::new(ctx, FilterConfig::default()).unwrap();
        let err = pipeline
            .run(FailAfter(2))
            .err()
            .expect("run should fail on the output stream");
        assert!(
            matches!(err, PackError::Output { .. }),
            "{order:?}: expected Output, got {err:?}"
        );
    }
}

#[test]
fn test_observer_sees_every_record() {
    let tree = TestTree::new();
    tree.populate(12);

    struct Collect(Arc<Mutex<Vec<FileRecord>>>);
    impl Observer for Collect {
        fn on_file(&mut self, record: &FileRecord) {
            self.0.lock().unwrap().push(record.clone());
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new(tree.context(Format::Json, 3), FilterConfig::default()).unwrap();
    let outcome = pipeline
        .run_with_observer(Vec::new(), Box::new(Collect(Arc::clone(&seen))))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 12);
    assert!(seen.iter().all(|r| r.included));
    assert_eq!(outcome.ledger.len(), 12);

    let report = pipeline.report(&outcome);
    assert_eq!(report.files, 12);
    assert_eq!(report.workers, 3);
}
