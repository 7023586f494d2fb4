//! End-to-end tests for the storage engine lifecycle: open, write, flush,
//! close, reopen and replay.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hourglass::storage::*;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::tempdir;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap()
}

fn environment(minutes: i64, location: &str, sensor: &str) -> Measurement {
    Measurement::new("environment")
        .at(base() + Duration::minutes(minutes))
        .dimension("temperature", 18.0 + (minutes % 7) as f64)
        .dimension("humidity", 40.0 + (minutes % 11) as f64)
        .index("location", location)
        .index("sensor", sensor)
        .label("firmware", "v1.0.1")
}

fn power(minutes: i64, circuit: &str) -> Measurement {
    Measurement::new("power")
        .at(base() + Duration::minutes(minutes) + Duration::nanoseconds(minutes * 13))
        .dimension("watts", (minutes * 3) as f64)
        .index("circuit", circuit)
}

/// Every stored record, reached through every series and every index value
async fn snapshot(engine: &StorageEngine) -> Vec<(String, Vec<Measurement>)> {
    let mut out = Vec::new();

    for series in engine.series().await {
        let all = engine.query_all(&series, None).await.unwrap();
        out.push((series.clone(), all.iter().map(|m| (**m).clone()).collect()));

        for key in engine.index_keys(&series).await {
            for value in engine.index_values(&series, &key).await {
                let found = engine
                    .query_all_by_index(&series, &key, &value, None)
                    .await
                    .unwrap();
                out.push((
                    format!("{}/{}={}", series, key, value),
                    found.iter().map(|m| (**m).clone()).collect(),
                ));
            }
        }
    }

    out
}

#[tokio::test]
async fn test_reopen_reproduces_every_query() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("store.log")).flush_max_size(37);

    let engine = StorageEngine::open(config.clone()).await.unwrap();

    // Out of order, across several hours
    for i in (0..300).rev() {
        let location = ["kitchen", "bedroom", "garage"][(i % 3) as usize];
        engine
            .insert(environment(i * 3, location, &format!("s{}", i % 5)))
            .await
            .unwrap();
    }
    for i in 0..150 {
        engine
            .insert(power((i * 17) % 600, if i % 2 == 0 { "a" } else { "b" }))
            .await
            .unwrap_or(());
    }

    let before = snapshot(&engine).await;
    engine.close().await.unwrap();

    let reopened = StorageEngine::open(config).await.unwrap();
    let after = snapshot(&reopened).await;

    assert_eq!(before.len(), after.len());
    for ((name_a, a), (name_b, b)) in before.iter().zip(&after) {
        assert_eq!(name_a, name_b);
        assert_eq!(a, b, "{} differs after reopen", name_a);
    }

    assert_eq!(
        reopened.query_fields("environment").await.unwrap(),
        vec!["firmware", "humidity", "location", "sensor", "temperature"]
    );
}

#[tokio::test]
async fn test_identity_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("store.log"));

    {
        let engine = StorageEngine::open(config.clone()).await.unwrap();
        engine.insert(power(0, "a")).await.unwrap();
        engine.upsert(power(0, "a").dimension("watts", 99.0)).await.unwrap();
        engine.close().await.unwrap();
    }

    let engine = StorageEngine::open(config).await.unwrap();

    // Both physical copies come back; the later one is canonical
    let all = engine.query_all("power", None).await.unwrap();
    assert_eq!(all.len(), 2);

    let options = QueryOptions::new().deduplicate(true);
    let live = engine.query_all("power", Some(&options)).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].dimensions["watts"], 99.0);

    assert!(matches!(
        engine.insert(power(0, "a")).await,
        Err(StorageError::DuplicateMeasurement)
    ));
}

#[tokio::test]
async fn test_window_boundaries_are_inclusive() {
    let dir = tempdir().unwrap();
    let engine = StorageEngine::open(StorageConfig::new(dir.path().join("store.log")))
        .await
        .unwrap();

    for minutes in [0, 59, 60, 61, 119, 120, 180] {
        engine
            .insert(environment(minutes, "kitchen", "s1"))
            .await
            .unwrap();
    }

    let options = QueryOptions::new()
        .from(base() + Duration::minutes(60))
        .to(base() + Duration::minutes(120));
    let results = engine.query_all("environment", Some(&options)).await.unwrap();

    let minutes: Vec<_> = results
        .iter()
        .map(|m| (m.when - base()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![60, 61, 119, 120]);

    // An empty window matches nothing
    let options = QueryOptions::new()
        .from(base() + Duration::minutes(30))
        .to(base() + Duration::minutes(45));
    assert!(engine
        .query_all("environment", Some(&options))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_since_relative_to_now() {
    let dir = tempdir().unwrap();
    let engine = StorageEngine::open(StorageConfig::new(dir.path().join("store.log")))
        .await
        .unwrap();

    let now = Utc::now();
    for hours in 0..10 {
        engine
            .insert(
                Measurement::new("recent")
                    .at(now - Duration::hours(hours))
                    .dimension("value", hours as f64),
            )
            .await
            .unwrap();
    }

    let options = QueryOptions::new().since(Duration::minutes(150));
    let results = engine.query_all("recent", Some(&options)).await.unwrap();
    let values: Vec<_> = results.iter().map(|m| m.dimensions["value"]).collect();
    assert_eq!(values, vec![2.0, 1.0, 0.0]);
}

#[tokio::test]
async fn test_corrupt_log_refuses_to_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    {
        let engine = StorageEngine::open(StorageConfig::new(&path)).await.unwrap();
        engine.insert(power(0, "a")).await.unwrap();
        engine.insert(power(1, "a")).await.unwrap();
        engine.close().await.unwrap();
    }

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"name\": \"not base64\"}\n");
    std::fs::write(&path, content).unwrap();

    match StorageEngine::open(StorageConfig::new(&path)).await {
        Err(StorageError::Corruption { line, .. }) => assert_eq!(line, 3),
        Err(e) => panic!("expected corruption, got {}", e),
        Ok(_) => panic!("corrupt log opened"),
    }
}

#[tokio::test]
async fn test_log_is_one_line_per_measurement() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.log");

    let engine = StorageEngine::open(StorageConfig::new(&path)).await.unwrap();
    engine
        .insert(
            Measurement::new("notes")
                .at(base())
                .dimension("n", 1.0)
                .label("text", "line one\nline two\n"),
        )
        .await
        .unwrap();
    engine.insert(power(5, "b")).await.unwrap();
    engine.close().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content
        .lines()
        .all(|l| l.bytes().all(|b| b.is_ascii_alphanumeric() || b"+/=".contains(&b))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_readers() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("store.log")).flush_max_size(64);
    let engine = Arc::new(StorageEngine::open(config.clone()).await.unwrap());

    let mut handles = Vec::new();
    for writer in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            for i in 0..250 {
                engine
                    .insert(environment(
                        i,
                        &format!("room{}", writer),
                        &format!("w{}", writer),
                    ))
                    .await
                    .unwrap();
            }
        }));
    }
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                if let Ok(results) = engine.query_all("environment", None).await {
                    assert!(results.windows(2).all(|w| w[0].when <= w[1].when));
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let results = engine.query_all("environment", None).await.unwrap();
    assert_eq!(results.len(), 1000);
    assert!(results.windows(2).all(|w| w[0].when <= w[1].when));
    let writers: HashSet<_> = results.iter().map(|m| m.indices["sensor"].clone()).collect();
    assert_eq!(writers.len(), 4);

    engine.close().await.unwrap();

    let reopened = StorageEngine::open(config).await.unwrap();
    assert_eq!(reopened.query_all("environment", None).await.unwrap().len(), 1000);
}
