//! Integration tests for tailing and fan-in of session logs.

mod common;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use common::{PROMPT, append, new_log, watch_config};
use proptest::prelude::*;
use tempfile::TempDir;
use texpect::{Aggregator, Line};
use tokio::time::timeout;

async fn collect(aggregator: &Aggregator, n: usize) -> Vec<Line> {
    let mut lines = Vec::with_capacity(n);
    for _ in 0..n {
        let line = timeout(PROMPT, aggregator.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("aggregator shut down");
        lines.push(line);
    }
    lines
}

fn by_source(lines: &[Line]) -> HashMap<PathBuf, Vec<String>> {
    let mut map: HashMap<PathBuf, Vec<String>> = HashMap::new();
    for line in lines {
        map.entry(line.source().to_path_buf())
            .or_default()
            .push(line.text().to_string());
    }
    map
}

#[tokio::test]
async fn single_source_delivers_appended_lines_in_order() {
    let dir = TempDir::new().unwrap();
    let log = new_log(dir.path(), "a.log");
    append(&log, "before registration\n");

    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&log).unwrap();

    let expected: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
    for chunk in expected.chunks(7) {
        append(&log, &(chunk.join("\n") + "\n"));
    }

    let lines = collect(&aggregator, expected.len()).await;
    let texts: Vec<_> = lines.iter().map(|l| l.text().to_string()).collect();
    assert_eq!(texts, expected);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(aggregator.try_next_line().is_none(), "no duplicates");
}

#[tokio::test]
async fn escape_sequences_are_stripped() {
    let dir = TempDir::new().unwrap();
    let log = new_log(dir.path(), "a.log");
    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&log).unwrap();

    append(&log, "\x1b[31mHELLO\x1b[0m\n");
    let lines = collect(&aggregator, 1).await;
    assert_eq!(lines[0].text(), "HELLO");
}

#[tokio::test]
async fn partial_line_waits_for_its_delimiter() {
    let dir = TempDir::new().unwrap();
    let log = new_log(dir.path(), "a.log");
    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&log).unwrap();

    append(&log, "prompt> ");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(aggregator.try_next_line().is_none());

    append(&log, "ls\n");
    let lines = collect(&aggregator, 1).await;
    assert_eq!(lines[0].text(), "prompt> ls");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn many_sources_keep_per_source_order() {
    let dir = TempDir::new().unwrap();
    let aggregator = Aggregator::with_config(watch_config());

    let logs: Vec<PathBuf> = (0..4)
        .map(|i| new_log(dir.path(), &format!("s{i}.log")))
        .collect();
    for log in &logs {
        aggregator.register(log).unwrap();
    }

    let writers: Vec<_> = logs
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, log)| {
            std::thread::spawn(move || {
                for n in 0..50 {
                    append(&log, &format!("s{i}-{n}\n"));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let lines = collect(&aggregator, 200).await;
    let grouped = by_source(&lines);
    assert_eq!(grouped.len(), 4);
    for (i, log) in logs.iter().enumerate() {
        let key = std::fs::canonicalize(log).unwrap();
        let expected: Vec<String> = (0..50).map(|n| format!("s{i}-{n}")).collect();
        assert_eq!(grouped[&key], expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registering_while_a_consumer_is_blocked() {
    let dir = TempDir::new().unwrap();
    let a = new_log(dir.path(), "a.log");
    let b = new_log(dir.path(), "b.log");

    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&a).unwrap();

    let consumer = {
        let aggregator = aggregator.clone();
        tokio::spawn(async move { collect(&aggregator, 20).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    aggregator.register(&b).unwrap();
    for n in 0..10 {
        append(&a, &format!("a{n}\n"));
        append(&b, &format!("b{n}\n"));
    }

    let lines = timeout(PROMPT, consumer).await.unwrap().unwrap();
    let grouped = by_source(&lines);
    let a_key = std::fs::canonicalize(&a).unwrap();
    let b_key = std::fs::canonicalize(&b).unwrap();
    assert_eq!(grouped[&a_key], (0..10).map(|n| format!("a{n}")).collect::<Vec<_>>());
    assert_eq!(grouped[&b_key], (0..10).map(|n| format!("b{n}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn deleted_source_does_not_affect_others() {
    let dir = TempDir::new().unwrap();
    let a = new_log(dir.path(), "a.log");
    let b = new_log(dir.path(), "b.log");

    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&a).unwrap();
    aggregator.register(&b).unwrap();

    std::fs::remove_file(&a).unwrap();
    append(&b, "still here\n");

    let lines = collect(&aggregator, 1).await;
    assert_eq!(lines[0].text(), "still here");
    assert!(aggregator.is_active(&b));
}

#[tokio::test]
async fn shutdown_ends_the_stream() {
    let dir = TempDir::new().unwrap();
    let log = new_log(dir.path(), "a.log");
    let aggregator = Aggregator::with_config(watch_config());
    aggregator.register(&log).unwrap();

    append(&log, "buffered\n");
    aggregator.shutdown();

    assert!(aggregator.is_shutdown());
    assert!(aggregator.next_line().await.is_none());
    assert!(aggregator.register(&log).unwrap_err().is_shutdown());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn delivered_lines_equal_written_lines(
        lines in prop::collection::vec("[a-zA-Z0-9 .:-]{0,40}", 1..30),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let delivered = runtime.block_on(async {
            let dir = TempDir::new().unwrap();
            let log = new_log(dir.path(), "p.log");
            let aggregator = Aggregator::with_config(watch_config());
            aggregator.register(&log).unwrap();

            for line in &lines {
                append(&log, &format!("\x1b[2K{line}\r\n"));
            }
            let delivered = collect(&aggregator, lines.len()).await;
            aggregator.shutdown();
            delivered
        });

        let texts: Vec<_> = delivered.into_iter().map(Line::into_text).collect();
        prop_assert_eq!(texts, lines);
    }
}
