use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use tempfile::TempDir;

use yolo_upload::{
    AppState, Config, Detector, UnavailableDetector, UploadOutcome, UploadedFile, build_router,
    ensure_dirs, process_upload,
};

/// 记录调用的检测器；`writes_output` 为真时把源图复制到结果目录
#[derive(Default)]
struct RecordingDetector {
    writes_output: bool,
    calls: Mutex<Vec<(PathBuf, PathBuf, String)>>,
}

impl RecordingDetector {
    fn writing() -> Self {
        Self { writes_output: true, ..Default::default() }
    }

    fn silent() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<(PathBuf, PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Detector for RecordingDetector {
    fn predict(&self, source: &Path, project: &Path, name: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), project.to_path_buf(), name.to_string()));

        if self.writes_output {
            let dir = project.join(name);
            std::fs::create_dir_all(&dir)?;
            std::fs::copy(source, dir.join(source.file_name().unwrap()))?;
        }
        Ok(())
    }
}

fn setup(detector: Arc<dyn Detector>) -> (TempDir, AppState) {
    let root = TempDir::new().unwrap();
    let config = Config::with_root(root.path().join("static"));
    ensure_dirs(&config).unwrap();
    (root, AppState::new(config, detector))
}

fn server(state: &AppState) -> TestServer {
    TestServer::new(build_router(state.clone())).unwrap()
}

fn image_form(filename: &str, bytes: &'static [u8]) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(filename))
}

fn uploaded_files(state: &AppState) -> Vec<PathBuf> {
    std::fs::read_dir(&state.config.upload_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[tokio::test]
async fn test_get_renders_bare_form() {
    let (_root, state) = setup(Arc::new(RecordingDetector::silent()));
    let response = server(&state).get("/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(r#"name="file""#));
    assert!(!html.contains("<img"));
}

#[tokio::test]
async fn test_post_without_file_field_redirects() {
    let detector = Arc::new(RecordingDetector::writing());
    let (_root, state) = setup(detector.clone());

    let response = server(&state)
        .post("/")
        .multipart(MultipartForm::new().add_text("comment", "no file here"))
        .await;

    response.assert_status(StatusCode::FOUND);
    let location = response.header("location");
    assert!(location.to_str().unwrap().ends_with('/'));
    assert!(uploaded_files(&state).is_empty());
    assert!(detector.calls().is_empty());
}

#[tokio::test]
async fn test_post_without_body_redirects() {
    let detector = Arc::new(RecordingDetector::writing());
    let (_root, state) = setup(detector.clone());
    let server = server(&state);

    let empty = server.post("/").await;
    empty.assert_status(StatusCode::FOUND);
    assert!(empty.header("location").to_str().unwrap().ends_with('/'));

    let urlencoded = server.post("/").form(&[("file", "cat.jpg")]).await;
    urlencoded.assert_status(StatusCode::FOUND);

    assert!(uploaded_files(&state).is_empty());
    assert!(detector.calls().is_empty());
}

#[tokio::test]
async fn test_post_with_empty_filename_redirects() {
    let detector = Arc::new(RecordingDetector::writing());
    let (_root, state) = setup(detector.clone());

    let response = server(&state).post("/").multipart(image_form("", b"")).await;

    response.assert_status(StatusCode::FOUND);
    assert!(uploaded_files(&state).is_empty());
    assert!(detector.calls().is_empty());
}

#[tokio::test]
async fn test_disallowed_extension_rerenders_form() {
    let detector = Arc::new(RecordingDetector::writing());
    let (_root, state) = setup(detector.clone());

    let response = server(&state).post("/").multipart(image_form("notes.txt", b"hello")).await;

    response.assert_status_ok();
    assert!(!response.text().contains("<img"));
    assert!(uploaded_files(&state).is_empty());
    assert!(detector.calls().is_empty());
}

#[tokio::test]
async fn test_disallowed_extension_is_tagged_rejected() {
    let (_root, state) = setup(Arc::new(RecordingDetector::writing()));

    let outcome = process_upload(&state, Some(UploadedFile::new("cat.gif", b"GIF89a".to_vec())))
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Rejected { filename: "cat.gif".to_string() });
    assert!(uploaded_files(&state).is_empty());
}

#[tokio::test]
async fn test_missing_file_is_tagged_redirect() {
    let (_root, state) = setup(Arc::new(RecordingDetector::writing()));
    assert_eq!(process_upload(&state, None).await.unwrap(), UploadOutcome::Redirect);
}

#[tokio::test]
async fn test_valid_upload_uses_detector_output() {
    let detector = Arc::new(RecordingDetector::writing());
    let (_root, state) = setup(detector.clone());

    let response = server(&state).post("/").multipart(image_form("cat.jpg", b"jpeg bytes")).await;
    response.assert_status_ok();

    let original = state.config.upload_dir.join("cat.jpg");
    let result = state.config.prediction_dir().join("cat.jpg");
    assert_eq!(std::fs::read(&original).unwrap(), b"jpeg bytes");
    assert!(result.exists());

    let html = response.text();
    assert!(html.contains("static/uploads/cat.jpg"));
    assert!(html.contains("static/results/prediction/cat.jpg"));

    let calls = detector.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, original);
    assert_eq!(calls[0].1, state.config.results_dir);
    assert_eq!(calls[0].2, "prediction");
}

#[tokio::test]
async fn test_missing_detector_output_falls_back_to_original() {
    let (_root, state) = setup(Arc::new(RecordingDetector::silent()));

    let outcome = process_upload(&state, Some(UploadedFile::new("cat.jpg", b"jpeg bytes".to_vec())))
        .await
        .unwrap();

    let UploadOutcome::Processed(context) = outcome else {
        panic!("应为 Processed: {:?}", outcome);
    };
    assert_eq!(context.result_image, context.original_image);
    assert!(context.original_image.ends_with("static/uploads/cat.jpg"));
}

#[tokio::test]
async fn test_rendered_paths_use_forward_slashes() {
    let (_root, state) = setup(Arc::new(RecordingDetector::writing()));

    let outcome = process_upload(&state, Some(UploadedFile::new("dog.PNG", b"png".to_vec())))
        .await
        .unwrap();

    let UploadOutcome::Processed(context) = outcome else {
        panic!("应为 Processed: {:?}", outcome);
    };
    assert!(!context.original_image.contains('\\'));
    assert!(!context.result_image.contains('\\'));
    assert!(context.result_image.ends_with("static/results/prediction/dog.PNG"));
}

#[tokio::test]
async fn test_image_urls_are_relative_to_static_dir() {
    let (root, state) = setup(Arc::new(RecordingDetector::writing()));
    assert!(state.config.upload_dir.is_absolute());

    let response = server(&state).post("/").multipart(image_form("cat.jpg", b"jpeg bytes")).await;
    response.assert_status_ok();

    let html = response.text();
    assert!(html.contains(r#"src="/static/uploads/cat.jpg""#));
    assert!(html.contains(r#"src="/static/results/prediction/cat.jpg""#));
    assert!(!html.contains(r#"src="//"#));
    assert!(!html.contains(root.path().to_str().unwrap()));
}

#[tokio::test]
async fn test_upload_dir_outside_static_dir_fails_before_writing() {
    let root = TempDir::new().unwrap();
    let mut config = Config::with_root(root.path().join("static"));
    config.upload_dir = root.path().join("elsewhere");
    ensure_dirs(&config).unwrap();
    assert!(config.validate().is_err());

    let detector = Arc::new(RecordingDetector::writing());
    let state = AppState::new(config, detector.clone());

    let response = server(&state).post("/").multipart(image_form("cat.jpg", b"jpeg bytes")).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(uploaded_files(&state).is_empty());
    assert!(detector.calls().is_empty());
}

#[tokio::test]
async fn test_traversal_filename_stays_in_upload_dir() {
    let (root, state) = setup(Arc::new(RecordingDetector::writing()));

    let response = server(&state)
        .post("/")
        .multipart(image_form("../../etc/passwd.png", b"not really a png"))
        .await;
    response.assert_status_ok();

    let files = uploaded_files(&state);
    assert_eq!(files, vec![state.config.upload_dir.join("etc_passwd.png")]);
    for file in &files {
        assert_eq!(file.parent().unwrap(), state.config.upload_dir);
    }
    assert!(!root.path().join("etc").exists());
}

#[tokio::test]
async fn test_same_filename_overwrites() {
    let (_root, state) = setup(Arc::new(RecordingDetector::writing()));
    let server = server(&state);

    server.post("/").multipart(image_form("cat.jpg", b"first")).await.assert_status_ok();
    server.post("/").multipart(image_form("cat.jpg", b"second")).await.assert_status_ok();

    assert_eq!(uploaded_files(&state).len(), 1);
    assert_eq!(std::fs::read(state.config.upload_dir.join("cat.jpg")).unwrap(), b"second");
}

#[tokio::test]
async fn test_unavailable_detector_returns_500_after_saving() {
    let (_root, state) = setup(Arc::new(UnavailableDetector::new("weights missing")));

    let response = server(&state).post("/").multipart(image_form("cat.jpg", b"jpeg bytes")).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(state.config.upload_dir.join("cat.jpg").exists());
}

#[tokio::test]
async fn test_uploaded_images_are_served_under_static() {
    let (_root, state) = setup(Arc::new(RecordingDetector::writing()));
    let server = server(&state);

    server.post("/").multipart(image_form("cat.jpg", b"jpeg bytes")).await.assert_status_ok();

    let original = server.get("/static/uploads/cat.jpg").await;
    original.assert_status_ok();
    assert_eq!(original.as_bytes().as_ref(), b"jpeg bytes");
    server.get("/static/results/prediction/cat.jpg").await.assert_status_ok();
}
