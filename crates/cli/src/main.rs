mod console;
mod settings;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{select, Receiver};

use facecam_core::annotation::domain::overlay::AnnotationStyle;
use facecam_core::annotation::infrastructure::frame_annotator::{
    default_font, load_font, FrameAnnotator,
};
use facecam_core::capture::domain::capture_backend::CaptureBackend;
use facecam_core::capture::domain::frame_source::FrameSource;
use facecam_core::capture::infrastructure::camera_factory::{create_camera, probe};
use facecam_core::capture::infrastructure::synthetic_source::{Pattern, SyntheticSource};
use facecam_core::detection::domain::detector_kind::DetectorKind;
use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::infrastructure::cascade_detector::{CascadeDetector, CascadeParams};
use facecam_core::detection::infrastructure::cascade_loader_factory::default_cascade_loader;
use facecam_core::detection::infrastructure::neural_backend_factory::{
    create_neural_detector, NeuralBackendKind,
};
use facecam_core::detection::infrastructure::neural_detector::NeuralConfig;
use facecam_core::pipeline::acquisition_loop::{AcquisitionConfig, AcquisitionLoop};
use facecam_core::pipeline::detector_selector::{CascadeModels, DetectorSelector, SelectionState};
use facecam_core::pipeline::display_sink::ChannelDisplay;
use facecam_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use facecam_core::shared::constants::TICK_PERIOD;
use facecam_core::shared::frame::Frame;

use console::ConsoleCommand;
use settings::Settings;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const DISPLAY_QUEUE: usize = 2;

/// Live camera face detection with Haar, LBP or neural detectors.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Camera device index.
    #[arg(long, global = true)]
    device: Option<u32>,

    /// Capture backend: any, dshow, msmf, v4l2, avfoundation, gstreamer, ffmpeg.
    #[arg(long, global = true)]
    backend: Option<CaptureBackend>,

    /// Frame source.
    #[arg(long, global = true, value_enum, default_value_t = SourceKind::Camera)]
    source: SourceKind,

    /// Persist the effective device, model and detector options as defaults.
    #[arg(long, global = true)]
    save_settings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run acquisition, driven by commands typed on stdin.
    Run(RunArgs),
    /// Open the device, grab one frame and report its size.
    Probe,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Detector selected at startup: none, haar, lbp, neural.
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Haar cascade XML.
    #[arg(long)]
    haar_model: Option<PathBuf>,

    /// LBP cascade XML.
    #[arg(long)]
    lbp_model: Option<PathBuf>,

    /// YuNet ONNX model.
    #[arg(long)]
    neural_model: Option<PathBuf>,

    /// Runtime for the neural model: onnx or opencv.
    #[arg(long)]
    neural_backend: Option<NeuralBackendKind>,

    /// TrueType font used for confidence labels [default: built-in DejaVu Sans].
    #[arg(long)]
    font: Option<PathBuf>,

    /// Start with the grayscale preview enabled.
    #[arg(long)]
    grayscale: bool,

    /// Start immediately and stop after this many seconds, without a prompt.
    #[arg(long)]
    seconds: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Camera,
    Synthetic,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = Settings::load();
    apply_overrides(&mut settings, &cli);

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    match &cli.command {
        Command::Probe => run_probe(&settings, cli.source),
        Command::Run(args) => run_acquisition(&settings, cli.source, args.seconds),
    }
}

/// Flags override the persisted settings field by field.
fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(device) = cli.device {
        settings.device = device;
    }
    if let Some(backend) = cli.backend {
        settings.capture_backend = backend.to_string();
    }
    let Command::Run(args) = &cli.command else {
        return;
    };
    if let Some(kind) = args.detector {
        settings.detector = kind.to_string();
    }
    if let Some(path) = &args.haar_model {
        settings.haar_model = path.clone();
    }
    if let Some(path) = &args.lbp_model {
        settings.lbp_model = path.clone();
    }
    if let Some(path) = &args.neural_model {
        settings.neural_model = path.clone();
    }
    if let Some(kind) = args.neural_backend {
        settings.neural_backend = kind.to_string();
    }
    if let Some(path) = &args.font {
        settings.font = Some(path.clone());
    }
    if args.grayscale {
        settings.grayscale = true;
    }
}

fn open_source(
    settings: &Settings,
    source: SourceKind,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    match source {
        SourceKind::Camera => {
            let backend: CaptureBackend = settings.capture_backend.parse()?;
            Ok(create_camera(settings.device, backend)?)
        }
        SourceKind::Synthetic => Ok(Box::new(
            SyntheticSource::new(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
                .with_pattern(Pattern::SweepingBar),
        )),
    }
}

fn run_probe(settings: &Settings, source: SourceKind) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = open_source(settings, source)?;
    let (width, height, channels) = probe(source.as_mut())?;
    println!(
        "{}: {width}x{height}, {channels} channel(s)",
        source.describe()
    );
    Ok(())
}

fn build_selector(settings: &Settings) -> Result<DetectorSelector, Box<dyn std::error::Error>> {
    let cascade = CascadeDetector::new(default_cascade_loader(), CascadeParams::default());

    let backend: NeuralBackendKind = settings.neural_backend.parse()?;
    let config = NeuralConfig {
        model_path: settings.neural_model.clone(),
        ..NeuralConfig::default()
    };
    // the neural option stays unavailable rather than failing startup
    let neural = match create_neural_detector(backend, &config) {
        Ok(detector) => Some(Box::new(detector) as Box<dyn FaceDetector>),
        Err(e) => {
            log::warn!("Neural detector unavailable: {e}");
            None
        }
    };

    let models = CascadeModels {
        haar: settings.haar_model.clone(),
        lbp: settings.lbp_model.clone(),
    };
    Ok(DetectorSelector::new(cascade, neural, models))
}

fn build_annotator(settings: &Settings) -> FrameAnnotator {
    let annotator = FrameAnnotator::new(AnnotationStyle::default());
    let font = match &settings.font {
        Some(path) => load_font(path).or_else(|e| {
            log::warn!("{e}; using the built-in label font");
            default_font()
        }),
        None => default_font(),
    };
    match font {
        Ok(font) => annotator.with_font(font),
        Err(e) => {
            log::warn!("{e}; confidence labels are not drawn");
            annotator
        }
    }
}

fn run_acquisition(
    settings: &Settings,
    source: SourceKind,
    seconds: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let selector = Arc::new(build_selector(settings)?);
    let initial: DetectorKind = settings.detector.parse()?;
    if let Err(e) = selector.select(initial) {
        log::warn!("Could not select {initial} detector: {e}");
    }
    let selection_rx = selector.subscribe();

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(DISPLAY_QUEUE);
    let mut acquisition = AcquisitionLoop::new(
        open_source(settings, source)?,
        Box::new(ChannelDisplay::new(frame_tx)),
        Box::new(SummaryPipelineLogger::default()),
        selector,
        build_annotator(settings),
        AcquisitionConfig {
            tick_period: TICK_PERIOD,
            grayscale: settings.grayscale,
        },
    );

    match seconds {
        Some(secs) => run_timed(&mut acquisition, &frame_rx, Duration::from_secs(secs)),
        None => run_interactive(&mut acquisition, &frame_rx, &selection_rx),
    }
}

fn run_timed(
    acquisition: &mut AcquisitionLoop,
    frame_rx: &Receiver<Frame>,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    acquisition.start()?;
    let mut view = FrameView::new();
    let deadline = crossbeam_channel::after(duration);
    loop {
        select! {
            recv(frame_rx) -> frame => match frame {
                Ok(frame) => view.show(&frame),
                Err(_) => break,
            },
            recv(deadline) -> _ => break,
        }
    }
    acquisition.stop();
    println!("{}", view.report());
    Ok(())
}

fn run_interactive(
    acquisition: &mut AcquisitionLoop,
    frame_rx: &Receiver<Frame>,
    selection_rx: &Receiver<SelectionState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    console::spawn_reader(command_tx);
    println!("{}", console::HELP);

    let mut view = FrameView::new();
    loop {
        select! {
            recv(command_rx) -> command => {
                let Ok(command) = command else { break };
                if !handle_command(acquisition, command, &mut view) {
                    break;
                }
            }
            recv(frame_rx) -> frame => {
                if let Ok(frame) = frame {
                    view.show(&frame);
                }
            }
            recv(selection_rx) -> state => {
                if let Ok(state) = state {
                    println!(
                        "detector: {} (start {})",
                        state.kind,
                        if state.start_enabled { "enabled" } else { "disabled" }
                    );
                }
            }
        }
    }
    acquisition.stop();
    Ok(())
}

/// Returns false when the session should end.
fn handle_command(
    acquisition: &mut AcquisitionLoop,
    command: ConsoleCommand,
    view: &mut FrameView,
) -> bool {
    match command {
        ConsoleCommand::Start => match acquisition.start() {
            Ok(()) => view.reset(),
            Err(e) => eprintln!("Cannot start: {e}"),
        },
        ConsoleCommand::Stop => acquisition.stop(),
        ConsoleCommand::Toggle(DetectorKind::None) => {
            if let Err(e) = acquisition.selector().select(DetectorKind::None) {
                eprintln!("{e}");
            }
        }
        ConsoleCommand::Toggle(kind) => {
            if let Err(e) = acquisition.selector().toggle(kind) {
                eprintln!("Cannot select {kind}: {e}");
            }
        }
        ConsoleCommand::Grayscale(enabled) => acquisition.set_grayscale(enabled),
        ConsoleCommand::Status => {
            println!(
                "{} | {} | detector {} | grayscale {}",
                if acquisition.is_active() { "running" } else { "stopped" },
                acquisition.stats(),
                acquisition.selector().current(),
                if acquisition.is_grayscale() { "on" } else { "off" },
            );
            println!("{}", view.report());
        }
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

/// Terminal stand-in for a preview window: tracks what was shown.
struct FrameView {
    shown: usize,
    since: Instant,
    last_size: Option<(u32, u32, u8)>,
}

impl FrameView {
    fn new() -> Self {
        Self {
            shown: 0,
            since: Instant::now(),
            last_size: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn show(&mut self, frame: &Frame) {
        let size = (frame.width(), frame.height(), frame.channels());
        if self.last_size != Some(size) {
            log::info!("Preview {}x{} ({} channel(s))", size.0, size.1, size.2);
            self.last_size = Some(size);
        }
        self.shown += 1;
    }

    fn report(&self) -> String {
        let secs = self.since.elapsed().as_secs_f64();
        let fps = if secs > 0.0 { self.shown as f64 / secs } else { 0.0 };
        format!("{} frames shown, {fps:.1} fps", self.shown)
    }
}
