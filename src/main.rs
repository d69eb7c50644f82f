use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prelabel::detection::{DetectionConfig, PERSON_CLASS_ID, PERSON_LABEL};
use prelabel::sampler::{DEFAULT_INTERVAL, DEFAULT_JPEG_QUALITY};
use prelabel::{
    FfmpegSource, FrameSource, ImageSequenceSource, Pipeline, SamplerConfig, YoloConfig,
    YoloDetector,
};

#[derive(Parser)]
#[command(name = "prelabel")]
#[command(about = "Sample video frames and pre-label people as Pascal VOC annotations")]
struct Cli {
    /// Path to input video (or a directory of already-decoded frames)
    #[arg(value_name = "VIDEO")]
    video_path: PathBuf,

    /// Directory receiving frames, sidecars and annotations
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Keep every Nth decoded frame
    #[arg(long, default_value_t = DEFAULT_INTERVAL, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// YOLOv8 model converted to .rten
    #[arg(long, value_name = "PATH", default_value = "yolov8n.rten")]
    model: PathBuf,

    /// Minimum detector score
    #[arg(long, default_value_t = 0.25)]
    confidence: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, default_value_t = 0.45)]
    iou: f32,

    /// Detector class id to keep
    #[arg(long, default_value_t = PERSON_CLASS_ID)]
    class_id: u32,

    /// Label written for every kept object
    #[arg(long, default_value = PERSON_LABEL)]
    label: String,

    /// JPEG quality of extracted frames
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Only extract frames (no detection or annotations)
    #[arg(long)]
    skip_detection: bool,

    /// Save box previews to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "prelabel=debug" } else { "prelabel=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let mut source: Box<dyn FrameSource> = if args.video_path.is_dir() {
        Box::new(ImageSequenceSource::from_dir(&args.video_path)?)
    } else {
        Box::new(FfmpegSource::open(&args.video_path)?)
    };

    let sampler = SamplerConfig {
        interval: args.interval,
        jpeg_quality: args.jpeg_quality,
    };

    // Build pipeline
    let pipeline = if args.skip_detection {
        Pipeline::new()
    } else {
        let detector = YoloDetector::load(YoloConfig {
            model_path: args.model.clone(),
            confidence: args.confidence,
            iou_threshold: args.iou,
            ..Default::default()
        })?;
        tracing::info!("Loaded model {}", detector.model_path().display());

        Pipeline::standard(
            Arc::new(detector),
            DetectionConfig {
                class_id: args.class_id,
                label: args.label.clone(),
            },
        )
    };
    let mut pipeline = pipeline.with_sampler(sampler);

    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let report = pipeline.run(source.as_mut(), &args.output_dir)?;

    println!("\n=== Pre-labeling Results ===");
    println!(
        "Frames extracted: {} (of {} decoded, every {})",
        report.manifest.len(),
        report.manifest.decoded,
        report.manifest.interval
    );

    if !args.skip_detection {
        println!("Frames annotated: {}", report.annotated());
        println!("Objects labeled:  {}", report.object_count());
    }

    if !report.failures.is_empty() {
        println!("\nFailed frames:");
        for failure in &report.failures {
            println!("  frame {} ({}): {}", failure.ordinal, failure.step, failure.error);
        }
    }

    println!(
        "\nFrames and annotations are saved in {}.",
        args.output_dir.display()
    );
    if !args.skip_detection {
        println!("Next steps:");
        println!("1. Open labelImg by running 'labelImg' in your terminal.");
        println!("2. Select 'Open Dir' and choose: {}", args.output_dir.display());
        println!("3. Verify and correct the pre-detected bounding boxes as needed.");
        println!("4. Save your changes in labelImg (annotations are updated in the XML files).");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
