use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::annotation::domain::display_surface::DisplaySurface;
use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::detection::domain::face_detector::FaceDetector;
use crate::recognition::domain::classifier::Classifier;
use crate::recognition::domain::decision_policy::DecisionPolicy;
use crate::recognition::domain::embedding_extractor::EmbeddingExtractor;
use crate::recognition::domain::face_filter::{Admission, FaceFilter, RejectionReason};
use crate::recognition::domain::face_preprocessor::FacePreprocessor;
use crate::recognition::domain::recognition_tally::RecognitionTally;
use crate::shared::constants::DEFAULT_MAX_CONSECUTIVE_READ_ERRORS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

use super::frame_outcome::{FrameOutcome, OutcomeCounts, Stage, StageFailure};
use super::pipeline_logger::PipelineLogger;
use super::recognition_config::RecognitionConfig;

/// The collaborators a run consumes. Released when the run stops.
pub struct PipelineComponents {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn FaceDetector>,
    pub extractor: Box<dyn EmbeddingExtractor>,
    pub classifier: Box<dyn Classifier>,
    pub annotator: Box<dyn FrameAnnotator>,
    pub display: Box<dyn DisplaySurface>,
}

/// The in-process stages' parameters.
#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    pub filter: FaceFilter,
    pub preprocessor: FacePreprocessor,
    pub policy: DecisionPolicy,
    pub max_consecutive_read_errors: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            filter: FaceFilter::default(),
            preprocessor: FacePreprocessor::default(),
            policy: DecisionPolicy::default(),
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

impl From<&RecognitionConfig> for PipelineSettings {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            filter: FaceFilter::new(config.min_face_ratio),
            preprocessor: FacePreprocessor::new(config.embedding.preprocessor()),
            policy: DecisionPolicy::new(config.confidence_threshold),
            max_consecutive_read_errors: config.max_consecutive_read_errors,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    /// Too many consecutive read failures; treated like exhaustion.
    ReadErrors(usize),
    StopRequested,
    DisplayFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::SourceExhausted => write!(f, "source exhausted"),
            StopReason::ReadErrors(n) => write!(f, "{n} consecutive read errors"),
            StopReason::StopRequested => write!(f, "stop requested"),
            StopReason::DisplayFailed(e) => write!(f, "display failed: {e}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub frames: usize,
    pub read_errors: usize,
    pub outcomes: OutcomeCounts,
    pub stop_reason: StopReason,
    pub tally: RecognitionTally,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunError {
    #[error("the pipeline has already run")]
    AlreadyRun,
}

/// Drives the per-frame recognition loop:
/// acquire → detect → filter → preprocess → embed → classify → decide →
/// annotate/tally → display → check stop.
///
/// Single use. Every inference failure, panics included, is confined to its
/// frame; only source exhaustion, a stop request or a display failure end the
/// run. The source and display are released exactly once.
pub struct RecognizeFacesUseCase {
    components: Option<PipelineComponents>,
    settings: PipelineSettings,
    stop: Arc<AtomicBool>,
    logger: Box<dyn PipelineLogger>,
    state: PipelineState,
    tally: RecognitionTally,
    embedding_len: Option<usize>,
}

impl RecognizeFacesUseCase {
    pub fn new(
        components: PipelineComponents,
        settings: PipelineSettings,
        stop: Option<Arc<AtomicBool>>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            components: Some(components),
            settings,
            stop: stop.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            logger,
            state: PipelineState::Init,
            tally: RecognitionTally::new(),
            embedding_len: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn tally(&self) -> &RecognitionTally {
        &self.tally
    }

    pub fn run(&mut self) -> Result<RunReport, RunError> {
        let mut components = self.components.take().ok_or(RunError::AlreadyRun)?;
        self.state = PipelineState::Running;
        self.logger.info("Recognition started");

        let (frames, read_errors, outcomes, stop_reason) = self.drive(&mut components);

        release(components);
        self.state = PipelineState::Stopped;

        let report = RunReport {
            frames,
            read_errors,
            outcomes,
            stop_reason,
            tally: self.tally.clone(),
        };
        self.logger.summary(&report);
        Ok(report)
    }

    fn drive(&mut self, c: &mut PipelineComponents) -> (usize, usize, OutcomeCounts, StopReason) {
        let mut frames = 0;
        let mut read_errors = 0;
        let mut consecutive_errors = 0;
        let mut outcomes = OutcomeCounts::default();

        let stop_reason = loop {
            if self.stop.load(Ordering::Relaxed) {
                break StopReason::StopRequested;
            }

            let mut frame = match guarded("read", || c.source.next_frame()) {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frame
                }
                Ok(None) => break StopReason::SourceExhausted,
                Err(e) => {
                    read_errors += 1;
                    consecutive_errors += 1;
                    log::warn!(
                        "Frame read failed ({consecutive_errors}/{}): {e}",
                        self.settings.max_consecutive_read_errors
                    );
                    if consecutive_errors >= self.settings.max_consecutive_read_errors {
                        break StopReason::ReadErrors(consecutive_errors);
                    }
                    continue;
                }
            };
            frames += 1;
            self.logger.frame(frame.index());

            let outcome = self.process_frame(c, &frame);
            outcomes.record(&outcome);
            report_outcome(frame.index(), &outcome);

            let overlays = self.apply(&outcome);
            if !overlays.is_empty() {
                let annotator = &c.annotator;
                if let Err(e) = guarded("annotate", || annotator.annotate(&mut frame, &overlays)) {
                    log::warn!("Frame {}: annotation failed: {e}", frame.index());
                }
            }

            let started = Instant::now();
            let shown = guarded("display", || c.display.show(&frame));
            self.logger.timing("display", elapsed_ms(started));
            if let Err(e) = shown {
                log::error!("Display failed, stopping: {e}");
                break StopReason::DisplayFailed(e);
            }
        };

        log::info!("Recognition stopped: {stop_reason}");
        (frames, read_errors, outcomes, stop_reason)
    }

    fn process_frame(&mut self, c: &mut PipelineComponents, frame: &Frame) -> FrameOutcome {
        match self.infer(c, frame) {
            Ok(outcome) => outcome,
            Err(failure) => FrameOutcome::Failed(failure),
        }
    }

    fn infer(
        &mut self,
        c: &mut PipelineComponents,
        frame: &Frame,
    ) -> Result<FrameOutcome, StageFailure> {
        let boxes = self
            .timed(Stage::Detect, || guarded("detect", || c.detector.detect(frame)))
            .map_err(StageFailure::Detection)?;
        self.logger.metric("detections", boxes.len() as f64);

        let filter = self.settings.filter;
        let face = match contained(Stage::Filter, || filter.admit(frame, &boxes))? {
            Admission::Admitted(face) => face,
            Admission::Rejected(reason) => return Ok(FrameOutcome::Rejected(reason)),
        };

        let preprocessor = self.settings.preprocessor;
        let tensor = self.timed(Stage::Preprocess, || {
            contained(Stage::Preprocess, || preprocessor.prepare(frame, &face))
        })??;

        let mut embeddings = self
            .timed(Stage::Embed, || {
                guarded("embed", || c.extractor.embed(std::slice::from_ref(&tensor)))
            })
            .map_err(StageFailure::Embedding)?;
        if embeddings.len() != 1 {
            return Err(StageFailure::Embedding(format!(
                "expected 1 embedding, got {}",
                embeddings.len()
            )));
        }
        let embedding = embeddings.remove(0);
        match self.embedding_len {
            Some(expected) if expected != embedding.len() => {
                return Err(StageFailure::EmbeddingLengthMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
            None => self.embedding_len = Some(embedding.len()),
        }

        let classifier = &c.classifier;
        let proba = self
            .timed(Stage::Classify, || {
                guarded("classify", || {
                    classifier.predict_proba(std::slice::from_ref(&embedding))
                })
            })
            .map_err(StageFailure::Classification)?;
        if proba.nrows() != 1 {
            return Err(StageFailure::Classification(format!(
                "expected 1 probability row, got {}",
                proba.nrows()
            )));
        }
        let distribution = proba.row(0).to_vec();

        let policy = self.settings.policy;
        let decision = self.timed(Stage::Decide, || {
            contained(Stage::Decide, || policy.decide(&distribution, classifier.labels()))
        })??;
        self.logger
            .metric("top_probability", decision.prediction.probability);

        Ok(FrameOutcome::Decided { face, decision })
    }

    /// Tallies a confident decision and returns what to draw for it.
    fn apply(&mut self, outcome: &FrameOutcome) -> Vec<Overlay> {
        match outcome {
            FrameOutcome::Rejected(RejectionReason::MultipleFaces { .. }) => {
                vec![Overlay::multiple_faces()]
            }
            FrameOutcome::Decided { face, decision } if decision.is_confident() => {
                self.tally.record(&decision.label);
                vec![Overlay::FaceBox {
                    bbox: face.bbox,
                    label: decision.label.clone(),
                    confidence: decision.prediction.probability,
                }]
            }
            _ => Vec::new(),
        }
    }

    fn timed<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.logger.timing(stage.as_str(), elapsed_ms(started));
        result
    }
}

fn report_outcome(index: usize, outcome: &FrameOutcome) {
    match outcome {
        FrameOutcome::Rejected(reason) => log::debug!("Frame {index}: {reason}"),
        FrameOutcome::Decided { decision, .. } if decision.is_confident() => log::info!(
            "Frame {index}: recognized {} ({:.3})",
            decision.label,
            decision.prediction.probability
        ),
        FrameOutcome::Decided { decision, .. } => log::info!(
            "Frame {index}: unknown face (best guess {}, {:.3})",
            decision.prediction.identity,
            decision.prediction.probability
        ),
        FrameOutcome::Failed(failure) if failure.is_contract_violation() => {
            log::error!("Frame {index}: {} stage violated its contract: {failure}", failure.stage())
        }
        FrameOutcome::Failed(failure) => log::warn!("Frame {index}: {failure}"),
    }
}

/// Releases the source and closes the display, containing panics from
/// either so both always run.
fn release(mut c: PipelineComponents) {
    if panic::catch_unwind(AssertUnwindSafe(|| c.source.release())).is_err() {
        log::error!("Frame source panicked while releasing");
    }
    if panic::catch_unwind(AssertUnwindSafe(|| c.display.close())).is_err() {
        log::error!("Display panicked while closing");
    }
}

/// Runs an in-process stage, turning a panic into a failure of this frame.
fn contained<T>(stage: Stage, f: impl FnOnce() -> T) -> Result<T, StageFailure> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| StageFailure::Panicked {
        stage,
        message: panic_message(payload.as_ref()).to_string(),
    })
}

/// Runs a collaborator call, turning both errors and panics into a message.
fn guarded<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("{what} panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::recognition::domain::decision_policy::UNKNOWN_LABEL;
    use crate::recognition::domain::embedding_extractor::Embedding;
    use crate::recognition::domain::face_preprocessor::{
        ChannelLayout, FaceTensor, Normalization, PreprocessorConfig,
    };
    use crate::shared::bounding_box::BoundingBox;
    use ndarray::Array2;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    // --- Stubs ---

    type ReadResult = Result<Option<Frame>, String>;

    struct StubSource {
        script: VecDeque<ReadResult>,
        releases: Arc<AtomicUsize>,
    }

    impl FrameSource for StubSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            match self.script.pop_front() {
                Some(Ok(frame)) => Ok(frame),
                Some(Err(e)) => Err(e.into()),
                None => Ok(None),
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Boxes per frame index; unlisted frames have none.
    struct StubDetector {
        boxes: HashMap<usize, Vec<BoundingBox>>,
        failing: HashSet<usize>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            if self.failing.contains(&frame.index()) {
                return Err("detector error".into());
            }
            Ok(self.boxes.get(&frame.index()).cloned().unwrap_or_default())
        }
    }

    #[derive(Clone, Copy)]
    enum EmbedBehavior {
        Vector(usize),
        Fail,
        Panic,
    }

    /// Behaviour per call, in order; falls back to `default` when exhausted.
    struct StubExtractor {
        script: VecDeque<EmbedBehavior>,
        default: EmbedBehavior,
        calls: Arc<AtomicUsize>,
    }

    impl EmbeddingExtractor for StubExtractor {
        fn embed(&mut self, batch: &[FaceTensor]) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front().unwrap_or(self.default) {
                EmbedBehavior::Vector(len) => Ok(batch
                    .iter()
                    .map(|_| Embedding::new(vec![1.0 / (len as f32).sqrt(); len]))
                    .collect()),
                EmbedBehavior::Fail => Err("embedding model error".into()),
                EmbedBehavior::Panic => panic!("extractor exploded"),
            }
        }
    }

    struct StubClassifier {
        labels: Vec<String>,
        distribution: Vec<f64>,
        calls: Arc<AtomicUsize>,
    }

    impl Classifier for StubClassifier {
        fn predict_proba(&self, batch: &[Embedding]) -> Result<Array2<f64>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Array2::zeros((batch.len(), self.distribution.len()));
            for mut row in out.rows_mut() {
                for (j, p) in self.distribution.iter().enumerate() {
                    row[j] = *p;
                }
            }
            Ok(out)
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }

    #[allow(clippy::type_complexity)]
    struct RecordingAnnotator {
        calls: Arc<Mutex<Vec<(usize, Vec<Overlay>)>>>,
    }

    impl FrameAnnotator for RecordingAnnotator {
        fn annotate(&self, frame: &mut Frame, overlays: &[Overlay]) -> Result<(), Box<dyn std::error::Error>> {
            self.calls
                .lock()
                .unwrap()
                .push((frame.index(), overlays.to_vec()));
            Ok(())
        }
    }

    struct StubDisplay {
        shown: Arc<Mutex<Vec<usize>>>,
        closes: Arc<AtomicUsize>,
        fail_on: Option<usize>,
        /// Raised after showing this frame index.
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl DisplaySurface for StubDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_on == Some(frame.index()) {
                return Err("window closed".into());
            }
            self.shown.lock().unwrap().push(frame.index());
            if let Some((index, stop)) = &self.stop_after {
                if *index == frame.index() {
                    stop.store(true, Ordering::SeqCst);
                }
            }
            Ok(())
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    // --- Harness ---

    struct Recorded {
        releases: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        embed_calls: Arc<AtomicUsize>,
        classify_calls: Arc<AtomicUsize>,
        #[allow(clippy::type_complexity)]
        annotations: Arc<Mutex<Vec<(usize, Vec<Overlay>)>>>,
        shown: Arc<Mutex<Vec<usize>>>,
    }

    struct Harness {
        script: VecDeque<ReadResult>,
        boxes: HashMap<usize, Vec<BoundingBox>>,
        failing_detections: HashSet<usize>,
        embed_script: VecDeque<EmbedBehavior>,
        labels: Vec<String>,
        distribution: Vec<f64>,
        threshold: f64,
        display_fail_on: Option<usize>,
        stop_after: Option<usize>,
        max_read_errors: usize,
    }

    impl Harness {
        fn frames(count: usize) -> Self {
            Self {
                script: (0..count).map(|i| Ok(Some(make_frame(i)))).collect(),
                boxes: HashMap::new(),
                failing_detections: HashSet::new(),
                embed_script: VecDeque::new(),
                labels: vec!["Alice".into(), "Bob".into()],
                distribution: vec![0.91, 0.09],
                threshold: 0.6,
                display_fail_on: None,
                stop_after: None,
                max_read_errors: 3,
            }
        }

        fn face_on(mut self, index: usize) -> Self {
            self.boxes.insert(index, vec![big_face()]);
            self
        }

        fn build(self) -> (RecognizeFacesUseCase, Recorded, Arc<AtomicBool>) {
            let recorded = Recorded {
                releases: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
                embed_calls: Arc::new(AtomicUsize::new(0)),
                classify_calls: Arc::new(AtomicUsize::new(0)),
                annotations: Arc::new(Mutex::new(Vec::new())),
                shown: Arc::new(Mutex::new(Vec::new())),
            };
            let stop = Arc::new(AtomicBool::new(false));

            let components = PipelineComponents {
                source: Box::new(StubSource {
                    script: self.script,
                    releases: Arc::clone(&recorded.releases),
                }),
                detector: Box::new(StubDetector {
                    boxes: self.boxes,
                    failing: self.failing_detections,
                }),
                extractor: Box::new(StubExtractor {
                    script: self.embed_script,
                    default: EmbedBehavior::Vector(4),
                    calls: Arc::clone(&recorded.embed_calls),
                }),
                classifier: Box::new(StubClassifier {
                    labels: self.labels,
                    distribution: self.distribution,
                    calls: Arc::clone(&recorded.classify_calls),
                }),
                annotator: Box::new(RecordingAnnotator {
                    calls: Arc::clone(&recorded.annotations),
                }),
                display: Box::new(StubDisplay {
                    shown: Arc::clone(&recorded.shown),
                    closes: Arc::clone(&recorded.closes),
                    fail_on: self.display_fail_on,
                    stop_after: self.stop_after.map(|i| (i, Arc::clone(&stop))),
                }),
            };
            let settings = PipelineSettings {
                filter: FaceFilter::default(),
                preprocessor: FacePreprocessor::new(PreprocessorConfig {
                    input_size: 8,
                    layout: ChannelLayout::Nchw,
                    normalization: Normalization::Standardize,
                }),
                policy: DecisionPolicy::new(self.threshold),
                max_consecutive_read_errors: self.max_read_errors,
            };
            let use_case = RecognizeFacesUseCase::new(
                components,
                settings,
                Some(Arc::clone(&stop)),
                Box::new(NullPipelineLogger),
            );
            (use_case, recorded, stop)
        }
    }

    fn make_frame(index: usize) -> Frame {
        let data = (0..100 * 100 * 3).map(|i| (i % 251) as u8).collect();
        Frame::new(data, 100, 100, 3, index)
    }

    /// Height ratio 0.6, well above the 0.25 minimum.
    fn big_face() -> BoundingBox {
        BoundingBox::new(10, 10, 60, 70).unwrap()
    }

    fn count(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }

    // --- Tests ---

    #[test]
    fn test_no_face_never_classifies() {
        let (mut use_case, recorded, _) = Harness::frames(3).build();
        let report = use_case.run().unwrap();

        assert_eq!(report.frames, 3);
        assert_eq!(report.outcomes.no_face, 3);
        assert_eq!(count(&recorded.embed_calls), 0);
        assert_eq!(count(&recorded.classify_calls), 0);
        assert!(report.tally.is_empty());
        assert!(recorded.annotations.lock().unwrap().is_empty());
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_multiple_faces_only_draws_warning() {
        let mut harness = Harness::frames(1);
        harness.boxes.insert(
            0,
            vec![big_face(), BoundingBox::new(65, 5, 95, 95).unwrap()],
        );
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.multiple_faces, 1);
        assert_eq!(count(&recorded.embed_calls), 0);
        assert_eq!(count(&recorded.classify_calls), 0);
        assert_eq!(
            *recorded.annotations.lock().unwrap(),
            vec![(0, vec![Overlay::multiple_faces()])]
        );
    }

    #[test]
    fn test_small_face_is_silently_rejected() {
        let mut harness = Harness::frames(1);
        // 25 / 100 = 0.25, not above the minimum
        harness
            .boxes
            .insert(0, vec![BoundingBox::new(10, 10, 40, 35).unwrap()]);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.too_small, 1);
        assert_eq!(count(&recorded.embed_calls), 0);
        assert!(recorded.annotations.lock().unwrap().is_empty());
    }

    #[test]
    fn test_confident_decision_is_drawn_and_tallied() {
        let (mut use_case, recorded, _) = Harness::frames(1).face_on(0).build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.recognized, 1);
        assert_eq!(report.tally.count("Alice"), 1);
        assert_eq!(use_case.tally().count("Alice"), 1);
        let annotations = recorded.annotations.lock().unwrap();
        assert_eq!(annotations.len(), 1);
        match &annotations[0].1[..] {
            [Overlay::FaceBox {
                bbox,
                label,
                confidence,
            }] => {
                assert_eq!(*bbox, big_face());
                assert_eq!(label, "Alice");
                assert!((confidence - 0.91).abs() < 1e-12);
            }
            other => panic!("unexpected overlays: {other:?}"),
        }
    }

    #[test]
    fn test_high_threshold_yields_unknown_without_tally() {
        let mut harness = Harness::frames(1).face_on(0);
        harness.threshold = 0.95;
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.unknown, 1);
        assert_eq!(report.outcomes.recognized, 0);
        assert!(report.tally.is_empty());
        assert_eq!(report.tally.count(UNKNOWN_LABEL), 0);
        assert!(recorded.annotations.lock().unwrap().is_empty());
    }

    #[test]
    fn test_probability_equal_to_threshold_is_unknown() {
        let mut harness = Harness::frames(1).face_on(0);
        harness.distribution = vec![0.6, 0.4];
        let (mut use_case, _, _) = harness.build();
        let report = use_case.run().unwrap();
        assert_eq!(report.outcomes.unknown, 1);
        assert!(report.tally.is_empty());
    }

    #[test]
    fn test_embedding_failure_does_not_affect_next_frame() {
        let mut harness = Harness::frames(2).face_on(0).face_on(1);
        harness.embed_script = VecDeque::from(vec![EmbedBehavior::Fail]);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.frames, 2);
        assert_eq!(report.outcomes.failed, 1);
        assert_eq!(report.outcomes.contract_violations, 0);
        assert_eq!(report.outcomes.recognized, 1);
        assert_eq!(report.tally.count("Alice"), 1);
        assert_eq!(count(&recorded.classify_calls), 1);
        // The failed frame is still displayed, without a decision
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 1]);
        let annotations = recorded.annotations.lock().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].0, 1);
    }

    #[test]
    fn test_extractor_panic_is_contained() {
        let mut harness = Harness::frames(2).face_on(0).face_on(1);
        harness.embed_script = VecDeque::from(vec![EmbedBehavior::Panic]);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.failed, 1);
        assert_eq!(report.outcomes.recognized, 1);
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(count(&recorded.releases), 1);
    }

    #[test]
    fn test_detection_failure_is_per_frame() {
        let mut harness = Harness::frames(2).face_on(1);
        harness.failing_detections.insert(0);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.failed, 1);
        assert_eq!(report.outcomes.recognized, 1);
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_embedding_length_change_is_contract_violation() {
        let mut harness = Harness::frames(3).face_on(0).face_on(1).face_on(2);
        harness.embed_script = VecDeque::from(vec![
            EmbedBehavior::Vector(4),
            EmbedBehavior::Vector(8),
            EmbedBehavior::Vector(4),
        ]);
        let (mut use_case, _, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.recognized, 2);
        assert_eq!(report.outcomes.failed, 1);
        assert_eq!(report.outcomes.contract_violations, 1);
    }

    #[test]
    fn test_label_mismatch_is_decision_failure() {
        let mut harness = Harness::frames(1).face_on(0);
        harness.labels = vec!["Alice".into()];
        let (mut use_case, _, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.outcomes.failed, 1);
        assert_eq!(report.outcomes.contract_violations, 1);
    }

    #[test]
    fn test_exhaustion_stops_and_releases_once() {
        let (mut use_case, recorded, _) = Harness::frames(2).build();
        assert_eq!(use_case.state(), PipelineState::Init);

        let report = use_case.run().unwrap();
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(use_case.state(), PipelineState::Stopped);
        assert_eq!(count(&recorded.releases), 1);
        assert_eq!(count(&recorded.closes), 1);

        assert_eq!(use_case.run().unwrap_err(), RunError::AlreadyRun);
        assert_eq!(count(&recorded.releases), 1);
        assert_eq!(count(&recorded.closes), 1);
    }

    #[test]
    fn test_transient_read_errors_are_skipped() {
        let mut harness = Harness::frames(0);
        harness.script = VecDeque::from(vec![
            Ok(Some(make_frame(0))),
            Err("glitch".to_string()),
            Err("glitch".to_string()),
            Ok(Some(make_frame(3))),
        ]);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.frames, 2);
        assert_eq!(report.read_errors, 2);
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_consecutive_read_errors_end_the_run() {
        let mut harness = Harness::frames(0);
        harness.script = VecDeque::from(vec![
            Ok(Some(make_frame(0))),
            Err("gone".to_string()),
            Err("gone".to_string()),
            Err("gone".to_string()),
            Ok(Some(make_frame(4))),
        ]);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.stop_reason, StopReason::ReadErrors(3));
        assert_eq!(report.frames, 1);
        assert_eq!(count(&recorded.releases), 1);
    }

    #[test]
    fn test_stop_request_is_checked_each_cycle() {
        let mut harness = Harness::frames(10);
        harness.stop_after = Some(2);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.stop_reason, StopReason::StopRequested);
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(count(&recorded.releases), 1);
        assert_eq!(count(&recorded.closes), 1);
    }

    #[test]
    fn test_stop_before_run_processes_nothing() {
        let (mut use_case, recorded, stop) = Harness::frames(3).build();
        stop.store(true, Ordering::SeqCst);
        let report = use_case.run().unwrap();

        assert_eq!(report.frames, 0);
        assert_eq!(report.stop_reason, StopReason::StopRequested);
        assert_eq!(count(&recorded.releases), 1);
    }

    #[test]
    fn test_display_failure_stops_and_still_releases() {
        let mut harness = Harness::frames(5);
        harness.display_fail_on = Some(1);
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert!(matches!(report.stop_reason, StopReason::DisplayFailed(ref e) if e.contains("window closed")));
        assert_eq!(report.frames, 2);
        assert_eq!(count(&recorded.releases), 1);
        assert_eq!(count(&recorded.closes), 1);
    }

    #[test]
    fn test_tally_accumulates_across_frames() {
        let (mut use_case, _, _) = Harness::frames(4)
            .face_on(0)
            .face_on(1)
            .face_on(3)
            .build();
        let report = use_case.run().unwrap();
        assert_eq!(report.tally.count("Alice"), 3);
        assert_eq!(report.tally.total(), 3);
        assert_eq!(report.outcomes.total(), 4);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = RecognitionConfig::default();
        config.confidence_threshold = 0.8;
        config.min_face_ratio = 0.3;
        config.max_consecutive_read_errors = 9;
        let settings = PipelineSettings::from(&config);
        assert_eq!(settings.policy.confidence_threshold(), 0.8);
        assert_eq!(settings.filter.min_face_ratio(), 0.3);
        assert_eq!(settings.max_consecutive_read_errors, 9);
        assert_eq!(settings.preprocessor.config().input_size, 112);
    }

    #[test]
    fn test_full_range_box_does_not_halt_the_run() {
        let mut harness = Harness::frames(2).face_on(1);
        harness.boxes.insert(
            0,
            vec![BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX).unwrap()],
        );
        let (mut use_case, recorded, _) = harness.build();
        let report = use_case.run().unwrap();

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.frames, 2);
        assert_eq!(report.outcomes.total(), 2);
        assert_eq!(report.outcomes.recognized, 2);
        assert_eq!(*recorded.shown.lock().unwrap(), vec![0, 1]);
        assert_eq!(count(&recorded.releases), 1);
    }

    #[test]
    fn test_contained_turns_stage_panic_into_failure() {
        let result: Result<(), StageFailure> =
            contained(Stage::Filter, || panic!("attempt to subtract with overflow"));
        assert_eq!(
            result.unwrap_err(),
            StageFailure::Panicked {
                stage: Stage::Filter,
                message: "attempt to subtract with overflow".into(),
            }
        );
        assert_eq!(contained(Stage::Decide, || 7).unwrap(), 7);
    }

    #[test]
    fn test_guarded_reports_panic_message() {
        let result: Result<(), String> = guarded("detector", || panic!("kaboom"));
        assert_eq!(result.unwrap_err(), "detector panicked: kaboom");
    }
}
