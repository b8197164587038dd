use crate::common::{TestApp, routes};

#[tokio::test]
async fn empty_store_reports_zeroes() {
    let app = TestApp::spawn().await;

    let res = app.get(routes::STATS).await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body["total_files"].as_i64().unwrap(), 0);
    assert_eq!(res.body["unique_files"].as_i64().unwrap(), 0);
    assert_eq!(res.body["duplicate_files"].as_i64().unwrap(), 0);
    assert_eq!(res.body["total_size"].as_i64().unwrap(), 0);
    assert_eq!(res.body["actual_size"].as_i64().unwrap(), 0);
    assert_eq!(res.body["storage_saved"].as_i64().unwrap(), 0);
    assert_eq!(res.body["storage_saved_percentage"].as_f64().unwrap(), 0.0);
    assert!(res.body["file_types"].as_array().unwrap().is_empty());
    assert_eq!(res.body["size_range"]["min"].as_i64().unwrap(), 0);
    assert_eq!(res.body["size_range"]["max"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn dedup_savings_are_reported() {
    let app = TestApp::spawn().await;

    // 10-byte content stored once, referenced three times.
    let data = b"ten  bytes".to_vec();
    app.upload("one.txt", data.clone(), "text/plain").await;
    app.upload("two.txt", data.clone(), "text/plain").await;
    app.upload("three.txt", data, "text/plain").await;
    // 4-byte unique file.
    app.upload("small.png", b"tiny".to_vec(), "image/png").await;

    let res = app.get(routes::STATS).await;

    assert_eq!(res.body["total_files"].as_i64().unwrap(), 4);
    assert_eq!(res.body["unique_files"].as_i64().unwrap(), 2);
    assert_eq!(res.body["duplicate_files"].as_i64().unwrap(), 2);
    assert_eq!(res.body["total_size"].as_i64().unwrap(), 34);
    assert_eq!(res.body["actual_size"].as_i64().unwrap(), 14);
    assert_eq!(res.body["storage_saved"].as_i64().unwrap(), 20);
    let pct = res.body["storage_saved_percentage"].as_f64().unwrap();
    assert!((pct - 20.0 / 34.0 * 100.0).abs() < 1e-9);

    assert_eq!(res.body["size_range"]["min"].as_i64().unwrap(), 4);
    assert_eq!(res.body["size_range"]["max"].as_i64().unwrap(), 10);

    let file_types = res.body["file_types"].as_array().unwrap();
    assert_eq!(file_types.len(), 2);
    assert_eq!(file_types[0]["file_type"].as_str().unwrap(), "text/plain");
    assert_eq!(file_types[0]["count"].as_i64().unwrap(), 3);
    assert_eq!(file_types[1]["file_type"].as_str().unwrap(), "image/png");
    assert_eq!(file_types[1]["count"].as_i64().unwrap(), 1);
}

#[tokio::test]
async fn invariants_hold_under_mixed_operations() {
    let app = TestApp::spawn().await;

    let mut ids = Vec::new();
    for (name, content) in [
        ("a.txt", &b"first"[..]),
        ("b.txt", &b"first"[..]),
        ("c.txt", &b"second"[..]),
        ("d.txt", &b"third!!"[..]),
        ("e.txt", &b"third!!"[..]),
        ("f.txt", &b"third!!"[..]),
    ] {
        let res = app.upload(name, content.to_vec(), "text/plain").await;
        ids.push(res.body["id"].as_str().unwrap().to_string());
    }

    // Delete one duplicate and one unique file.
    app.delete(&routes::file(&ids[1])).await;
    app.delete(&routes::file(&ids[2])).await;

    let res = app.get(routes::STATS).await;
    let total = res.body["total_files"].as_i64().unwrap();
    let unique = res.body["unique_files"].as_i64().unwrap();
    let duplicates = res.body["duplicate_files"].as_i64().unwrap();
    let total_size = res.body["total_size"].as_i64().unwrap();
    let actual_size = res.body["actual_size"].as_i64().unwrap();
    let saved = res.body["storage_saved"].as_i64().unwrap();

    assert_eq!(total, 4);
    assert_eq!(unique, 2);
    // total_files - unique_files == duplicate_files, always.
    assert_eq!(duplicates, total - unique);
    // storage_saved == total_size - actual_size, and never negative.
    assert_eq!(saved, total_size - actual_size);
    assert!(saved >= 0);
}

#[tokio::test]
async fn stats_return_to_zero_after_all_deletes() {
    let app = TestApp::spawn().await;

    let a = app.upload("x.txt", b"payload".to_vec(), "text/plain").await;
    let b = app.upload("y.txt", b"payload".to_vec(), "text/plain").await;

    app.delete(&routes::file(a.body["id"].as_str().unwrap()))
        .await;
    app.delete(&routes::file(b.body["id"].as_str().unwrap()))
        .await;

    let res = app.get(routes::STATS).await;
    assert_eq!(res.body["total_files"].as_i64().unwrap(), 0);
    assert_eq!(res.body["unique_files"].as_i64().unwrap(), 0);
    assert_eq!(res.body["actual_size"].as_i64().unwrap(), 0);
    assert_eq!(res.body["storage_saved"].as_i64().unwrap(), 0);
    assert_eq!(res.body["storage_saved_percentage"].as_f64().unwrap(), 0.0);
}
