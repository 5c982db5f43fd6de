//! Orientation classification for local media files.
//!
//! Classification happens before any byte leaves the machine: the Content
//! API needs coarse geometry to pick encode targets when issuing upload
//! grants. Results are cached by the file's stat identity and concurrent
//! callers for the same file share one in-flight decode. Classification
//! never fails the submission: corrupt input, probe errors, and timeouts
//! all degrade to square.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::ImageReader;
use tokio::process::Command;
use tokio::sync::watch;

use fanline_core::models::{LocalFile, Orientation};
use fanline_core::UploadConfig;

/// Pixel dimensions and duration read from a video container's metadata.
#[derive(Debug, Clone, Copy)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

/// Metadata-only video probe. Implementations must not decode frames.
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, file: &LocalFile) -> Result<VideoDimensions>;
}

/// Probe backed by the ffprobe binary.
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: String) -> Result<Self> {
        if !ffprobe_path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        }) {
            return Err(anyhow!("Invalid ffprobe path: contains unsafe characters"));
        }
        Ok(Self { ffprobe_path })
    }
}

#[derive(Debug, serde::Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, serde::Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[async_trait]
impl VideoProbe for FfprobeProbe {
    async fn probe(&self, file: &LocalFile) -> Result<VideoDimensions> {
        // In-memory sources go through a temp file; it is removed on drop on
        // every exit path, including errors below.
        let mut _temp_guard = None;
        let path: PathBuf = match file.path() {
            Some(p) => p.to_path_buf(),
            None => {
                let temp = tempfile::NamedTempFile::new()?;
                tokio::fs::write(temp.path(), &file.read().await?).await?;
                let p = temp.path().to_path_buf();
                _temp_guard = Some(temp);
                p
            }
        };

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe exited with {}", output.status));
        }

        let parsed: FfprobeOutput =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")?;

        let stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .context("No video stream found")?;

        let width = stream.width.context("Video stream missing width")?;
        let height = stream.height.context("Video stream missing height")?;
        let duration_seconds = parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(VideoDimensions {
            width,
            height,
            duration_seconds,
        })
    }
}

/// Cache key: file objects with identical name, size, mtime, and content
/// type are treated as the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClassifyKey {
    name: String,
    size: u64,
    modified_unix_ms: Option<i64>,
    content_type: String,
}

impl ClassifyKey {
    fn for_file(file: &LocalFile) -> Self {
        Self {
            name: file.name().to_string(),
            size: file.size(),
            modified_unix_ms: file.modified_at().map(|t| t.timestamp_millis()),
            content_type: file.content_type().to_string(),
        }
    }
}

#[derive(Default)]
struct ClassifierState {
    cache: HashMap<ClassifyKey, Orientation>,
    /// Pending decodes; entries are removed when the leader completes, so a
    /// failed leader does not leave stale receivers behind.
    in_flight: HashMap<ClassifyKey, watch::Receiver<Option<Orientation>>>,
}

/// Classifies local media geometry with caching and in-flight
/// de-duplication. Owned by the saga (or injected), not process-global, so
/// tests can reset it between cases.
pub struct OrientationClassifier {
    probe: Arc<dyn VideoProbe>,
    timeout: Duration,
    state: Mutex<ClassifierState>,
}

impl OrientationClassifier {
    pub fn new(probe: Arc<dyn VideoProbe>, timeout: Duration) -> Self {
        Self {
            probe,
            timeout,
            state: Mutex::new(ClassifierState::default()),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let probe = FfprobeProbe::new(config.ffprobe_path.clone())?;
        Ok(Self::new(
            Arc::new(probe),
            Duration::from_secs(config.classify_timeout_secs),
        ))
    }

    /// Classify a file's geometry. Never fails and never blocks beyond the
    /// probe timeout; undecodable input is classified square and the result
    /// is cached like any other.
    pub async fn classify(&self, file: &LocalFile) -> Orientation {
        let key = ClassifyKey::for_file(file);

        let sender = {
            let mut state = self.state.lock().unwrap();
            if let Some(orientation) = state.cache.get(&key) {
                return *orientation;
            }
            if let Some(receiver) = state.in_flight.get(&key) {
                let mut receiver = receiver.clone();
                drop(state);
                return Self::await_pending(&mut receiver).await;
            }
            let (sender, receiver) = watch::channel(None);
            state.in_flight.insert(key.clone(), receiver);
            sender
        };

        let orientation = match tokio::time::timeout(self.timeout, self.decode(file)).await {
            Ok(Ok(orientation)) => orientation,
            Ok(Err(e)) => {
                tracing::warn!(
                    file = %file.name(),
                    error = %e,
                    "Classification failed, defaulting to square"
                );
                Orientation::Square
            }
            Err(_) => {
                tracing::warn!(
                    file = %file.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Classification timed out, defaulting to square"
                );
                Orientation::Square
            }
        };

        let mut state = self.state.lock().unwrap();
        state.cache.insert(key.clone(), orientation);
        state.in_flight.remove(&key);
        let _ = sender.send(Some(orientation));
        orientation
    }

    async fn await_pending(receiver: &mut watch::Receiver<Option<Orientation>>) -> Orientation {
        loop {
            if let Some(orientation) = *receiver.borrow() {
                return orientation;
            }
            // Sender dropped without a result (leader panicked): degrade.
            if receiver.changed().await.is_err() {
                return Orientation::Square;
            }
        }
    }

    async fn decode(&self, file: &LocalFile) -> Result<Orientation> {
        if file.content_type().starts_with("video/") {
            let dims = self.probe.probe(file).await?;
            Ok(Orientation::from_dimensions(dims.width, dims.height))
        } else {
            let data = file.read().await?;
            let reader = ImageReader::new(Cursor::new(data.as_ref())).with_guessed_format()?;
            let (width, height) = reader.into_dimensions()?;
            Ok(Orientation::from_dimensions(width, height))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    struct CountingProbe {
        calls: AtomicUsize,
        dims: VideoDimensions,
        delay: Duration,
    }

    impl CountingProbe {
        fn new(width: u32, height: u32, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                dims: VideoDimensions {
                    width,
                    height,
                    duration_seconds: 60.0,
                },
                delay,
            }
        }
    }

    #[async_trait]
    impl VideoProbe for CountingProbe {
        async fn probe(&self, _file: &LocalFile) -> Result<VideoDimensions> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.dims)
        }
    }

    fn classifier_with(probe: Arc<CountingProbe>, timeout: Duration) -> OrientationClassifier {
        OrientationClassifier::new(probe, timeout)
    }

    #[tokio::test]
    async fn test_classifies_image_dimensions() {
        let probe = Arc::new(CountingProbe::new(0, 0, Duration::ZERO));
        let classifier = classifier_with(probe, Duration::from_secs(4));

        let landscape = LocalFile::from_bytes("wide.png", "image/png", png_bytes(200, 100));
        assert_eq!(classifier.classify(&landscape).await, Orientation::Landscape);

        let portrait = LocalFile::from_bytes("tall.png", "image/png", png_bytes(100, 200));
        assert_eq!(classifier.classify(&portrait).await, Orientation::Portrait);

        let square = LocalFile::from_bytes("square.png", "image/png", png_bytes(128, 128));
        assert_eq!(classifier.classify(&square).await, Orientation::Square);
    }

    #[tokio::test]
    async fn test_corrupt_image_degrades_to_square() {
        let probe = Arc::new(CountingProbe::new(0, 0, Duration::ZERO));
        let classifier = classifier_with(probe, Duration::from_secs(4));

        let corrupt = LocalFile::from_bytes("bad.png", "image/png", b"not an image".to_vec());
        assert_eq!(classifier.classify(&corrupt).await, Orientation::Square);
    }

    #[tokio::test]
    async fn test_video_probe_feeds_thresholds() {
        let probe = Arc::new(CountingProbe::new(1080, 1920, Duration::ZERO));
        let classifier = classifier_with(Arc::clone(&probe), Duration::from_secs(4));

        let video = LocalFile::from_bytes("clip.mp4", "video/mp4", vec![0u8; 32]);
        assert_eq!(classifier.classify(&video).await, Orientation::Portrait);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_prevents_second_decode() {
        let probe = Arc::new(CountingProbe::new(1920, 1080, Duration::ZERO));
        let classifier = classifier_with(Arc::clone(&probe), Duration::from_secs(4));

        let video = LocalFile::from_bytes("clip.mp4", "video/mp4", vec![0u8; 32]);
        assert_eq!(classifier.classify(&video).await, Orientation::Landscape);
        assert_eq!(classifier.classify(&video).await, Orientation::Landscape);
        // Same identity through a clone as well
        assert_eq!(classifier.classify(&video.clone()).await, Orientation::Landscape);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_probe() {
        let probe = Arc::new(CountingProbe::new(1920, 1080, Duration::from_millis(50)));
        let classifier = Arc::new(classifier_with(Arc::clone(&probe), Duration::from_secs(4)));

        let video = LocalFile::from_bytes("clip.mp4", "video/mp4", vec![0u8; 32]);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let classifier = Arc::clone(&classifier);
            let video = video.clone();
            handles.push(tokio::spawn(
                async move { classifier.classify(&video).await },
            ));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Orientation::Landscape);
        }
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_timeout_degrades_to_square_and_caches() {
        let probe = Arc::new(CountingProbe::new(1920, 1080, Duration::from_secs(30)));
        let classifier = classifier_with(Arc::clone(&probe), Duration::from_millis(50));

        let video = LocalFile::from_bytes("slow.mp4", "video/mp4", vec![0u8; 32]);
        assert_eq!(classifier.classify(&video).await, Orientation::Square);
        // Timeout result is cached; the probe is not retried.
        assert_eq!(classifier.classify(&video).await, Orientation::Square);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ffprobe_path_charset_check() {
        assert!(FfprobeProbe::new("ffprobe".to_string()).is_ok());
        assert!(FfprobeProbe::new("/usr/bin/ffprobe".to_string()).is_ok());
        assert!(FfprobeProbe::new("ffprobe; rm -rf /".to_string()).is_err());
    }
}
