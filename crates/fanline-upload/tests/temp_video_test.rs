mod helpers;

use helpers::StubContentApi;

use std::sync::{Arc, Mutex};

use fanline_core::error::{SubmitError, TrimError, UploadError};
use fanline_core::models::LocalFile;
use fanline_core::UploadConfig;
use fanline_upload::TempVideoUploadCoordinator;

fn coordinator(api: Arc<StubContentApi>) -> TempVideoUploadCoordinator {
    let config = UploadConfig {
        max_video_size_bytes: 1024,
        max_sample_duration_secs: 60.0,
        ..UploadConfig::default()
    };
    TempVideoUploadCoordinator::new(api, &config)
}

#[tokio::test]
async fn test_stages_video_and_returns_playback_session() {
    let api = StubContentApi::new();
    let coordinator = coordinator(api.clone());

    let file = LocalFile::from_bytes("main.mp4", "video/mp4", vec![0u8; 512]);
    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_cb = Arc::clone(&seen);

    let session = coordinator
        .upload_main_video(
            &file,
            Arc::new(move |pct| seen_in_cb.lock().unwrap().push(pct)),
        )
        .await
        .unwrap();

    assert_eq!(session.temp_storage_key, "tmp/main.mp4");
    assert_eq!(session.playback_url, "https://play.test/tmp/main.mp4");
    assert_eq!(session.duration_seconds, 120.0);
    assert_eq!(session.trim_range, None);

    // Monotonic 0 -> 100
    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(api.count_calls("request_temp_video_upload"), 1);
    assert_eq!(api.count_calls("upload_bytes"), 1);
    assert_eq!(api.count_calls("get_temp_video_playback"), 1);
}

#[tokio::test]
async fn test_size_limit_checked_before_any_transfer() {
    let api = StubContentApi::new();
    let coordinator = coordinator(api.clone());

    let file = LocalFile::from_bytes("huge.mp4", "video/mp4", vec![0u8; 4096]);
    let err = coordinator
        .upload_main_video(&file, Arc::new(|_| {}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Upload(UploadError::FileTooLarge { size: 4096, max: 1024 })
    ));
    assert!(api.call_names().is_empty());
}

#[tokio::test]
async fn test_transfer_failure_surfaces_as_upload_error() {
    let api = StubContentApi::new();
    *api.fail_upload_of.lock().unwrap() = Some("main.mp4".to_string());
    let coordinator = coordinator(api.clone());

    let file = LocalFile::from_bytes("main.mp4", "video/mp4", vec![0u8; 512]);
    let err = coordinator
        .upload_main_video(&file, Arc::new(|_| {}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Upload(UploadError::Network(_))
    ));
    // No playback reference was requested for a failed transfer
    assert_eq!(api.count_calls("get_temp_video_playback"), 0);
}

#[tokio::test]
async fn test_trim_selection_validates_against_config_cap() {
    let api = StubContentApi::new();
    let coordinator = coordinator(api.clone());

    let file = LocalFile::from_bytes("main.mp4", "video/mp4", vec![0u8; 512]);
    let mut session = coordinator
        .upload_main_video(&file, Arc::new(|_| {}))
        .await
        .unwrap();

    coordinator
        .select_trim_range(&mut session, 10.0, 40.0)
        .unwrap();
    assert!(session.trim_range.is_some());

    // 90 s span exceeds the configured 60 s cap
    assert!(matches!(
        coordinator.select_trim_range(&mut session, 0.0, 90.0),
        Err(TrimError::TooLong { .. })
    ));
    // The previous selection is untouched by the rejected one
    assert_eq!(session.trim_range.unwrap().start_seconds, 10.0);

    coordinator.discard(session);
}
