//! Fanline CLI — publish creator posts from the command line.
//!
//! Set FANLINE_API_KEY and FANLINE_API_URL (or API_URL). Uses Bearer auth.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use fanline_api_client::{ApiClient, ContentApi};
use fanline_cli::{content_type_for_path, init_tracing};
use fanline_core::models::{LocalFile, MediaFileDescriptor, MediaKind, PostMetadata, SubmissionMode};
use fanline_core::UploadConfig;
use fanline_upload::{
    MainVideoAttachment, OrientationClassifier, PostSubmissionSaga, ProgressSink,
    SubmissionRequest, TempVideoUploadCoordinator,
};

#[derive(Parser)]
#[command(name = "fanline", about = "Fanline post publishing CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a post (or update one with --update)
    Publish {
        /// Post title
        #[arg(long)]
        title: String,
        /// Post body text
        #[arg(long, default_value = "")]
        body: String,
        /// Tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Update an existing post instead of creating one
        #[arg(long)]
        update: Option<Uuid>,
        /// Main video file
        #[arg(long)]
        video: Option<PathBuf>,
        /// Sample clip file (omit and use --trim-start/--trim-end to derive
        /// the sample from the main video instead)
        #[arg(long)]
        sample: Option<PathBuf>,
        /// Thumbnail image
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// OGP image (generated server-side when omitted)
        #[arg(long)]
        ogp: Option<PathBuf>,
        /// Gallery images, in display order (repeatable)
        #[arg(long = "gallery")]
        gallery: Vec<PathBuf>,
        /// Sample trim start, in seconds of the main video
        #[arg(long)]
        trim_start: Option<f64>,
        /// Sample trim end, in seconds of the main video
        #[arg(long)]
        trim_end: Option<f64>,
    },
    /// Classify a media file's orientation without uploading it
    Classify {
        /// Files to classify
        files: Vec<PathBuf>,
    },
}

async fn descriptor_for(kind: MediaKind, path: &PathBuf) -> anyhow::Result<MediaFileDescriptor> {
    let content_type = content_type_for_path(path)?;
    let file = LocalFile::from_path(path, content_type)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(MediaFileDescriptor::new(kind, file))
}

#[allow(clippy::too_many_arguments)]
async fn publish(
    api: Arc<dyn ContentApi>,
    config: &UploadConfig,
    metadata: PostMetadata,
    mode: SubmissionMode,
    video: Option<PathBuf>,
    sample: Option<PathBuf>,
    thumbnail: Option<PathBuf>,
    ogp: Option<PathBuf>,
    gallery: Vec<PathBuf>,
    trim: Option<(f64, f64)>,
) -> anyhow::Result<()> {
    let classifier = Arc::new(OrientationClassifier::from_config(config)?);

    // Stage the main video first, the way the editing UI does before submit.
    let main_video = match &video {
        Some(path) => {
            let content_type = content_type_for_path(path)?;
            let file = LocalFile::from_path(path, content_type)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let coordinator = TempVideoUploadCoordinator::new(Arc::clone(&api), config);
            let name = file.name().to_string();
            let mut session = coordinator
                .upload_main_video(
                    &file,
                    Arc::new(move |pct| eprintln!("[staging] {} {}%", name, pct)),
                )
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            if let Some((start, end)) = trim {
                coordinator.select_trim_range(&mut session, start, end)?;
            }
            Some(MainVideoAttachment { file, session })
        }
        None => {
            if trim.is_some() {
                anyhow::bail!("--trim-start/--trim-end require --video");
            }
            None
        }
    };

    let mut files = Vec::new();
    if let Some(path) = &sample {
        files.push(descriptor_for(MediaKind::SampleVideo, path).await?);
    }
    if let Some(path) = &thumbnail {
        files.push(descriptor_for(MediaKind::Thumbnail, path).await?);
    }
    if let Some(path) = &ogp {
        files.push(descriptor_for(MediaKind::Ogp, path).await?);
    }
    for path in &gallery {
        files.push(descriptor_for(MediaKind::GalleryImage, path).await?);
    }

    let saga = PostSubmissionSaga::new(api, classifier);
    let (sink, mut rx) = ProgressSink::channel();

    let printer = tokio::spawn(async move {
        loop {
            let update = rx.borrow_and_update().clone();
            if !update.message.is_empty() {
                println!(
                    "[{:>3.0}%] {:<16} {}",
                    update.overall_progress,
                    update.phase.as_str(),
                    update.message
                );
            }
            if update.phase.is_terminal() || rx.changed().await.is_err() {
                break;
            }
        }
    });

    let result = saga
        .submit(
            SubmissionRequest {
                mode,
                metadata,
                files,
                main_video,
            },
            &sink,
        )
        .await;
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            println!("Published post {}", outcome.post_id);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Submission failed");
            Err(anyhow::anyhow!(e.user_message()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Publish {
            title,
            body,
            tags,
            update,
            video,
            sample,
            thumbnail,
            ogp,
            gallery,
            trim_start,
            trim_end,
        } => {
            let trim = match (trim_start, trim_end) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => anyhow::bail!("--trim-start and --trim-end must be given together"),
            };
            if sample.is_some() && trim.is_some() {
                anyhow::bail!("--sample and --trim-start/--trim-end are mutually exclusive");
            }

            let api: Arc<dyn ContentApi> = Arc::new(ApiClient::from_env()?);
            let config = UploadConfig::from_env()?;
            let metadata = PostMetadata { title, body, tags };
            let mode = match update {
                Some(post_id) => SubmissionMode::Update { post_id },
                None => SubmissionMode::Create,
            };

            publish(
                api, &config, metadata, mode, video, sample, thumbnail, ogp, gallery, trim,
            )
            .await
        }
        Commands::Classify { files } => {
            let config = UploadConfig::from_env()?;
            let classifier = OrientationClassifier::from_config(&config)?;
            for path in files {
                let content_type = content_type_for_path(&path)?;
                let file = LocalFile::from_path(&path, content_type)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let orientation = classifier.classify(&file).await;
                println!("{}\t{}", path.display(), orientation.as_str());
            }
            Ok(())
        }
    }
}
