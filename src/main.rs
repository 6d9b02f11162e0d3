// Example runner for the `pyro_vision` library.
//
// Replays a short synthetic scene through the detector: a dark room in which a
// flickering flame patch and a grey smoke patch appear after a few frames.
// Logs the first frame on which each class is confirmed and optionally writes
// the last annotated frame as a PNG:
//
//     RUST_LOG=debug cargo run -- out.png

use pyro_vision::core_modules::utils::image_helper;
use pyro_vision::{DetectionPipeline, Frame, FrameAnalysis, PipelineConfig, Pixel};
use tracing::info;
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;
const FRAME_RATE: f64 = 30.0;
const FRAME_COUNT: u64 = 90;
const PATCHES_APPEAR_AT: u64 = 10;

fn synthetic_frame(index: u64) -> pyro_vision::Result<Frame> {
    let mut frame = Frame::filled(WIDTH, HEIGHT, Pixel::new(20, 20, 20))?;
    if index < PATCHES_APPEAR_AT {
        return Ok(frame);
    }

    let red = if index % 2 == 0 { 230 } else { 205 };
    for y in 8..24 {
        for x in 8..24 {
            frame.put_pixel(x, y, Pixel::new(90, 120, red));
        }
    }
    for y in 32..48 {
        for x in 32..56 {
            frame.put_pixel(x, y, Pixel::new(150, 152, 155));
        }
    }
    Ok(frame)
}

fn main() -> pyro_vision::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Pyro Vision - Example Runner");
    let output = std::env::args().nth(1);

    let mut pipeline = DetectionPipeline::new(PipelineConfig::default())?;
    pipeline.video_info_initialize(HEIGHT, WIDTH, FRAME_RATE)?;

    let mut first_flame = None;
    let mut first_smoke = None;
    let mut last: Option<FrameAnalysis> = None;

    for index in 0..FRAME_COUNT {
        let analysis = pipeline.analyze(&synthetic_frame(index)?)?;
        if first_flame.is_none() && analysis.has_flame() {
            first_flame = Some(index);
            info!(frame = index, blocks = analysis.flame_blocks.len(), "flame confirmed");
        }
        if first_smoke.is_none() && analysis.has_smoke() {
            first_smoke = Some(index);
            info!(frame = index, blocks = analysis.smoke_blocks.len(), "smoke confirmed");
        }
        last = Some(analysis);
    }

    info!(?first_flame, ?first_smoke, frames = pipeline.frames_processed(), "replay finished");

    if let (Some(path), Some(analysis)) = (output, last) {
        image_helper::save(&path, &analysis.annotated)?;
        info!(%path, "annotated frame written");
    }
    Ok(())
}
