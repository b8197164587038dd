use crate::common::{TestApp, routes};

async fn seed(app: &TestApp) {
    for (name, content, mime) in [
        ("alpha.txt", &b"a"[..], "text/plain"),
        ("beta.txt", &b"bb"[..], "text/plain"),
        ("gamma.png", &b"ccc"[..], "image/png"),
        ("delta.png", &b"dddd"[..], "image/png"),
        ("epsilon.pdf", &b"eeeee"[..], "application/pdf"),
    ] {
        let res = app.upload(name, content.to_vec(), mime).await;
        assert_eq!(res.status, 201);
    }
}

#[tokio::test]
async fn lists_newest_first_by_default() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app.get(routes::FILES).await;

    assert_eq!(res.status, 200);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(res.body["pagination"]["total"].as_u64().unwrap(), 5);
    let timestamps: Vec<chrono::DateTime<chrono::Utc>> = data
        .iter()
        .map(|f| {
            chrono::DateTime::parse_from_rfc3339(f["uploaded_at"].as_str().unwrap())
                .unwrap()
                .with_timezone(&chrono::Utc)
        })
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn paginates_results() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app.get(&format!("{}?page=2&per_page=2", routes::FILES)).await;

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(res.body["pagination"]["page"].as_u64().unwrap(), 2);
    assert_eq!(res.body["pagination"]["per_page"].as_u64().unwrap(), 2);
    assert_eq!(res.body["pagination"]["total"].as_u64().unwrap(), 5);
    assert_eq!(res.body["pagination"]["total_pages"].as_u64().unwrap(), 3);
}

#[tokio::test]
async fn filters_by_file_type_case_insensitively() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app
        .get(&format!("{}?file_type=IMAGE/PNG", routes::FILES))
        .await;

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(
        data.iter()
            .all(|f| f["file_type"].as_str().unwrap() == "image/png")
    );
}

#[tokio::test]
async fn filters_by_size_range() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app
        .get(&format!("{}?min_size=2&max_size=4", routes::FILES))
        .await;

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|f| {
        let size = f["size"].as_i64().unwrap();
        (2..=4).contains(&size)
    }));
}

#[tokio::test]
async fn filters_by_upload_time_range() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app
        .get(&format!(
            "{}?uploaded_after=2000-01-01T00:00:00Z",
            routes::FILES
        ))
        .await;
    assert_eq!(res.body["pagination"]["total"].as_u64().unwrap(), 5);

    let res = app
        .get(&format!(
            "{}?uploaded_before=2000-01-01T00:00:00Z",
            routes::FILES
        ))
        .await;
    assert_eq!(res.body["pagination"]["total"].as_u64().unwrap(), 0);
}

#[tokio::test]
async fn searches_filenames_case_insensitively() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app.get(&format!("{}?search=ALPHA", routes::FILES)).await;

    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["original_filename"].as_str().unwrap(), "alpha.txt");
}

#[tokio::test]
async fn search_escapes_like_wildcards() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    // `%` must not match everything.
    let res = app.get(&format!("{}?search=%25", routes::FILES)).await;
    assert_eq!(res.body["pagination"]["total"].as_u64().unwrap(), 0);
}

#[tokio::test]
async fn sorts_by_size_ascending() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app
        .get(&format!("{}?sort_by=size&sort_order=asc", routes::FILES))
        .await;

    let sizes: Vec<i64> = res.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["size"].as_i64().unwrap())
        .collect();
    assert_eq!(sizes, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn sorts_by_filename() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app
        .get(&format!(
            "{}?sort_by=original_filename&sort_order=asc",
            routes::FILES
        ))
        .await;

    let names: Vec<&str> = res.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["original_filename"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "alpha.txt",
            "beta.txt",
            "delta.png",
            "epsilon.pdf",
            "gamma.png"
        ]
    );
}

#[tokio::test]
async fn rejects_unknown_sort_key() {
    let app = TestApp::spawn().await;

    let res = app.get(&format!("{}?sort_by=nonsense", routes::FILES)).await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"].as_str().unwrap(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn rejects_inverted_size_range() {
    let app = TestApp::spawn().await;

    let res = app
        .get(&format!("{}?min_size=10&max_size=1", routes::FILES))
        .await;

    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn distinct_types_endpoint() {
    let app = TestApp::spawn().await;
    seed(&app).await;

    let res = app.get(routes::TYPES).await;

    assert_eq!(res.status, 200);
    let types: Vec<&str> = res.body["file_types"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["application/pdf", "image/png", "text/plain"]);
}
