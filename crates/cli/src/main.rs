use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;

use facerec_core::annotation::domain::display_surface::DisplaySurface;
use facerec_core::annotation::infrastructure::headless_display::HeadlessDisplay;
use facerec_core::annotation::infrastructure::image_sequence_display::ImageSequenceDisplay;
use facerec_core::annotation::infrastructure::imageproc_annotator::ImageprocAnnotator;
use facerec_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facerec_core::pipeline::pipeline_logger::LogPipelineLogger;
use facerec_core::pipeline::recognition_config::RecognitionConfig;
use facerec_core::pipeline::recognize_faces_use_case::{
    PipelineComponents, PipelineSettings, RecognizeFacesUseCase,
};
use facerec_core::recognition::domain::classifier::Classifier;
use facerec_core::recognition::infrastructure::classifier_bundle::BundleClassifier;
use facerec_core::recognition::infrastructure::onnx_embedding_extractor::OnnxEmbeddingExtractor;
use facerec_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, QUIT_COMMAND, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facerec_core::shared::model_resolver::{resolve_model, ModelSpec, ProgressFn};
use facerec_core::video::domain::video_source::VideoSource;
use facerec_core::video::infrastructure::frame_source_factory::{open_frame_source, SourceOptions};

/// Live face recognition on a camera or video file.
///
/// Type "q" and press Enter to stop.
#[derive(Parser)]
#[command(name = "facerec")]
struct Cli {
    /// Camera index (e.g. 0) or video file path.
    source: Option<VideoSource>,

    /// JSON configuration file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum classifier probability to accept an identity (0.0-1.0).
    #[arg(long)]
    confidence_threshold: Option<f64>,

    /// Minimum face height as a fraction of frame height (0.0-1.0).
    #[arg(long)]
    min_face_ratio: Option<f64>,

    /// Width frames are resized to before detection.
    #[arg(long)]
    resize_width: Option<u32>,

    /// Classifier bundle (JSON).
    #[arg(long)]
    classifier: Option<PathBuf>,

    /// Embedding model (ONNX). Downloaded to the cache if omitted.
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    /// Face detection model (ONNX). Downloaded to the cache if omitted.
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    detector_confidence: Option<f64>,

    /// Directory for annotated frames (latest.jpg is refreshed every frame).
    /// Defaults to a preview directory in the user cache.
    #[arg(long, conflicts_with = "headless")]
    output_dir: Option<PathBuf>,

    /// Discard annotated frames; only the log and summary are produced.
    #[arg(long)]
    headless: bool,

    /// TTF font for labels. Defaults to the bundled DejaVu Sans Mono.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Do not mirror frames horizontally.
    #[arg(long)]
    no_mirror: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(cli)?;
    config.validate()?;

    let components = build_components(&config)?;
    let stop = Arc::new(AtomicBool::new(false));
    if config.source.is_live() {
        spawn_quit_listener(Arc::clone(&stop));
        log::info!("Type \"{QUIT_COMMAND}\" and press Enter to stop");
    }

    let mut use_case = RecognizeFacesUseCase::new(
        components,
        PipelineSettings::from(&config),
        Some(stop),
        Box::new(LogPipelineLogger::default()),
    );
    use_case.run()?;
    Ok(())
}

fn build_config(cli: Cli) -> Result<RecognitionConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => RecognitionConfig::load(path)?,
        None => RecognitionConfig::default(),
    };

    if let Some(source) = cli.source {
        config.source = source;
    }
    if let Some(v) = cli.confidence_threshold {
        config.confidence_threshold = v;
    }
    if let Some(v) = cli.min_face_ratio {
        config.min_face_ratio = v;
    }
    if let Some(v) = cli.resize_width {
        config.resize_width = v;
    }
    if let Some(path) = cli.classifier {
        config.classifier_path = path;
    }
    if cli.embedding_model.is_some() {
        config.embedding.model_path = cli.embedding_model;
    }
    if cli.detector_model.is_some() {
        config.detector.model_path = cli.detector_model;
    }
    if let Some(v) = cli.detector_confidence {
        config.detector.confidence = v;
    }
    if cli.output_dir.is_some() {
        config.display.output_dir = cli.output_dir;
    }
    if cli.headless {
        config.display.headless = true;
    }
    if cli.font.is_some() {
        config.display.font_path = cli.font;
    }
    if cli.no_mirror {
        config.mirror = false;
    }

    if let VideoSource::File(path) = &config.source {
        if !path.exists() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
    }
    Ok(config)
}

fn build_components(
    config: &RecognitionConfig,
) -> Result<PipelineComponents, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let detector_path = resolve_model(
        config.detector.model_path.as_deref(),
        ModelSpec {
            name: YOLO_MODEL_NAME,
            url: YOLO_MODEL_URL,
        },
        Some(download_progress("face detection")),
    )?;
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let embedding_path = resolve_model(
        config.embedding.model_path.as_deref(),
        ModelSpec {
            name: EMBEDDING_MODEL_NAME,
            url: EMBEDDING_MODEL_URL,
        },
        Some(download_progress("face embedding")),
    )?;

    let detector = OnnxYoloDetector::new(&detector_path, config.detector.confidence)?;
    let extractor = OnnxEmbeddingExtractor::new(&embedding_path)?;
    let classifier = BundleClassifier::load(&config.classifier_path)?;
    log::info!(
        "Loaded classifier with {} identities from {}",
        classifier.labels().len(),
        config.classifier_path.display()
    );

    let annotator = ImageprocAnnotator::new(
        config.display.font_path.as_deref(),
        config.display.font_scale,
    )?;
    let display: Box<dyn DisplaySurface> = match config.display.resolved_output_dir() {
        Some(dir) => Box::new(ImageSequenceDisplay::new(&dir, config.display.keep_history)?),
        None => {
            log::info!("Running headless; annotated frames are discarded");
            Box::new(HeadlessDisplay::new())
        }
    };

    // Opened last so a camera isn't held while models load.
    let source = open_frame_source(
        &config.source,
        SourceOptions {
            resize_width: config.resize_width,
            mirror: config.mirror,
            max_consecutive_read_errors: config.max_consecutive_read_errors,
        },
    )?;

    Ok(PipelineComponents {
        source,
        detector: Box::new(detector),
        extractor: Box::new(extractor),
        classifier: Box::new(classifier),
        annotator: Box::new(annotator),
        display,
    })
}

/// Raises `stop` when a quit line arrives on stdin. The thread is left
/// blocked on stdin when the run ends for another reason.
fn spawn_quit_listener(stop: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("quit-listener".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case(QUIT_COMMAND) => {
                        log::info!("Quit requested");
                        stop.store(true, Ordering::Relaxed);
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => return,
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Could not listen for quit on stdin: {e}");
    }
}

fn download_progress(what: &'static str) -> ProgressFn {
    Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {what} model... {pct}%");
            if downloaded >= total {
                eprintln!();
            }
        } else {
            eprint!("\rDownloading {what} model... {downloaded} bytes");
        }
    })
}
