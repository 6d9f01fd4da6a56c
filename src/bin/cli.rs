use anyhow::{anyhow, bail, Context, Result};
use livecheck::camera::CameraBackend;
use livecheck::testing::{FaceParams, SyntheticCamera};
use livecheck::{CameraManager, CapturedImage, LivecheckConfig, VerificationPipeline};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const USAGE: &str = "Usage: livecheck-cli <devices|detect|capture|liveness|config> [--native] [--config <path>] [--json]
  detect   [--frames <n>]
  capture  [--auto] [--out <file.jpg>]
  liveness [--retries <n>]
  config   [--write <path>]";

struct Options {
    command: String,
    native: bool,
    json: bool,
    config: Option<PathBuf>,
    frames: u32,
    auto: bool,
    out: Option<PathBuf>,
    retries: u32,
    write: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let command = args.get(1).cloned().ok_or_else(|| anyhow!(USAGE))?;
    let mut options = Options {
        command,
        native: false,
        json: false,
        config: None,
        frames: 10,
        auto: false,
        out: None,
        retries: 1,
        write: None,
    };

    let mut i = 2;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--native" => options.native = true,
            "--json" => options.json = true,
            "--auto" => options.auto = true,
            "--config" => {
                options.config = Some(value(i)?.into());
                i += 1;
            }
            "--frames" => {
                options.frames = value(i)?.parse().context("--frames")?;
                i += 1;
            }
            "--out" => {
                options.out = Some(value(i)?.into());
                i += 1;
            }
            "--retries" => {
                options.retries = value(i)?.parse().context("--retries")?;
                i += 1;
            }
            "--write" => {
                options.write = Some(value(i)?.into());
                i += 1;
            }
            other => bail!("Unknown argument: {}\n{}", other, USAGE),
        }
        i += 1;
    }
    Ok(options)
}

/// Synthetic subject that blinks, smiles and turns on cue so every check can pass offline.
fn demo_camera() -> SyntheticCamera {
    SyntheticCamera::new(640, 480).with_script(Arc::new(|index| {
        Some(match index % 60 {
            20..=22 => FaceParams::blinking(),
            30..=40 => FaceParams::smiling(),
            45..=52 => FaceParams::turned(if index % 2 == 0 { -0.08 } else { 0.08 }),
            _ => FaceParams::default(),
        })
    }))
}

fn backend(native: bool) -> Result<Arc<dyn CameraBackend>> {
    if native {
        native_backend()
    } else {
        Ok(Arc::new(demo_camera()))
    }
}

#[cfg(feature = "native")]
fn native_backend() -> Result<Arc<dyn CameraBackend>> {
    Ok(Arc::new(livecheck::camera::NativeBackend::new()))
}

#[cfg(not(feature = "native"))]
fn native_backend() -> Result<Arc<dyn CameraBackend>> {
    bail!("built without the `native` feature; rebuild with --features native")
}

fn load_config(path: Option<&PathBuf>) -> Result<LivecheckConfig> {
    let config = match path {
        Some(path) => LivecheckConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LivecheckConfig::load_or_default(),
    };
    config.validate().map_err(|e| anyhow!(e))?;
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    livecheck::init_logging();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;
    let config = load_config(options.config.as_ref())?;

    let interrupted = Arc::new(Notify::new());
    let notify = interrupted.clone();
    ctrlc::set_handler(move || notify.notify_one()).context("installing Ctrl-C handler")?;

    let pipeline = VerificationPipeline::new(config, CameraManager::new(backend(options.native)?));

    tokio::select! {
        result = run(&pipeline, &options) => result,
        _ = interrupted.notified() => {
            eprintln!("Interrupted, camera released");
            Ok(())
        }
    }
}

async fn run(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    match options.command.as_str() {
        "devices" => cmd_devices(pipeline, options),
        "detect" => cmd_detect(pipeline, options).await,
        "capture" => cmd_capture(pipeline, options).await,
        "liveness" => cmd_liveness(pipeline, options).await,
        "config" => cmd_config(pipeline, options),
        other => bail!("Unknown command: {}\n{}", other, USAGE),
    }
}

fn cmd_devices(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    let devices = pipeline.list_devices()?;
    if options.json {
        return print_json(&devices);
    }
    for d in devices {
        println!("{}: {}", d.id, d.name);
    }
    Ok(())
}

async fn cmd_detect(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    let tracker = pipeline.start_presence()?;
    let interval = pipeline.config().scheduler.presence_interval();

    for _ in 0..options.frames {
        tokio::time::sleep(interval).await;
        let status = tracker.status();
        if options.json {
            print_json(&status)?;
        } else {
            println!(
                "frame {:>4}: faces={} confidence={:.2} good={} overall={:.1}",
                status.frame_sequence,
                status.face_count,
                status.confidence,
                status.is_good_quality,
                status.quality.overall()
            );
        }
    }

    let stats = tracker.stats();
    tracker.stop();
    if !options.json {
        println!(
            "{} frames, {:.2} ms average, {:.1} fps, {} spoofing observations",
            stats.frames_processed,
            stats.average_processing_ms,
            stats.fps,
            tracker.spoofing_total()
        );
    }
    Ok(())
}

async fn cmd_capture(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CapturedImage>();
    let session = pipeline.start_capture(Box::new(tx))?;

    let image = if options.auto {
        println!("Waiting for auto-capture...");
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Some(image) = session.captured() {
                break image;
            }
        }
    } else {
        println!("Capturing in {} seconds...", pipeline.config().capture.countdown_secs);
        session.capture_manual().await?
    };

    session.confirm()?;
    session.stop();
    let delivered = rx.recv().await.ok_or_else(|| anyhow!("capture sink closed"))?;

    if let Some(path) = &options.out {
        std::fs::write(path, delivered.encoded_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if options.json {
        print_json(image.quality())?;
    } else {
        println!(
            "Captured {}x{} {} ({} bytes), overall quality {:.1}",
            image.width(),
            image.height(),
            image.mime_type(),
            image.encoded_bytes().len(),
            image.quality().overall()
        );
    }
    Ok(())
}

async fn cmd_liveness(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    let runner = pipeline.start_liveness()?;

    let result = runner.run_session(options.retries).await;
    runner.stop();
    let result = result?;

    if options.json {
        return print_json(&result);
    }
    for outcome in &result.checks {
        println!(
            "{:<10} {} after {} attempt(s){}",
            outcome.id.title(),
            if outcome.passed { "passed" } else { "failed" },
            outcome.attempts,
            if outcome.skipped { " (skipped)" } else { "" }
        );
    }
    println!(
        "{} in {} attempts",
        if result.all_passed() { "Liveness verified" } else { "Liveness not verified" },
        result.total_attempts
    );
    Ok(())
}

fn cmd_config(pipeline: &VerificationPipeline, options: &Options) -> Result<()> {
    let config = pipeline.config();
    if let Some(path) = &options.write {
        config.save_to_file(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    if options.json {
        print_json(config)
    } else {
        println!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}
