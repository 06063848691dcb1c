use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backend::RenderBackend;
use crate::compositor::DualCompositor;
use crate::config::{BloomConfig, OutputMode, PRESET_NAMES};
use crate::demo_scenes::{DemoKind, DemoScene};
use crate::frame_loop::AnimationLoop;
use crate::gpu::GpuBackend;
use crate::software::SoftwareBackend;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// CPU rasterizer, deterministic
    Software,
    /// Headless wgpu device
    Gpu,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a demo scene to PNG frames
    Render {
        /// Demo scene to render
        #[arg(long, value_enum, default_value_t = DemoKind::Bloom)]
        demo: DemoKind,

        /// Named bloom preset (defaults to the demo's own preset)
        #[arg(long, conflicts_with = "config")]
        preset: Option<String>,

        /// JSON bloom config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 1)]
        frames: u64,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        #[arg(long, value_enum, default_value_t = BackendKind::Software)]
        backend: BackendKind,

        /// Override the config's output mode
        #[arg(long, value_enum)]
        output_mode: Option<OutputMode>,

        /// Seed for randomly placed objects
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print the built-in bloom presets as JSON
    Presets,
}

struct RenderJob {
    demo: DemoKind,
    config: BloomConfig,
    out: PathBuf,
    frames: u64,
    fps: f32,
    width: u32,
    height: u32,
    seed: u64,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            demo,
            preset,
            config,
            out,
            frames,
            fps,
            width,
            height,
            backend,
            output_mode,
            seed,
        } => {
            let mut bloom = match (config, preset) {
                (Some(path), _) => BloomConfig::load(&path)?,
                (None, Some(name)) => BloomConfig::preset(&name)?,
                (None, None) => BloomConfig::preset(demo.preset())?,
            };
            if let Some(mode) = output_mode {
                bloom.output_mode = mode;
            }

            let job = RenderJob {
                demo,
                config: bloom,
                out,
                frames,
                fps,
                width,
                height,
                seed,
            };
            match backend {
                BackendKind::Software => render_offline(SoftwareBackend::new(), job),
                BackendKind::Gpu => {
                    let gpu = GpuBackend::headless(width.max(1), height.max(1))
                        .context("Failed to create headless GPU backend")?;
                    render_offline(gpu, job)
                }
            }
        }
        Commands::Presets => print_presets(),
    }
}

fn print_presets() -> Result<()> {
    let mut presets = BTreeMap::new();
    for name in PRESET_NAMES {
        presets.insert(*name, BloomConfig::preset(name)?);
    }
    println!("{}", serde_json::to_string_pretty(&presets)?);
    Ok(())
}

fn render_offline<B: RenderBackend>(backend: B, job: RenderJob) -> Result<()> {
    std::fs::create_dir_all(&job.out)
        .with_context(|| format!("Failed to create output directory {:?}", job.out))?;

    let mut demo = DemoScene::build(job.demo, job.seed);
    let mut compositor = DualCompositor::new(backend, job.width, job.height, job.config)?;
    let mut animation = AnimationLoop::new(job.fps).with_frame_limit(job.frames);

    println!(
        "Rendering {} frames of '{}' to {:?}...",
        job.frames,
        job.demo.name(),
        job.out
    );

    let summary = animation.run(|tick| -> Result<()> {
        demo.advance(tick.dt);
        let stats = compositor.render_frame(&mut demo.scene, &demo.camera)?;
        if stats.orphaned() > 0 {
            log::warn!("Frame {}: {} objects vanished while masked", tick.index, stats.orphaned());
        }

        let frame_path = frame_path(&job.out, tick.index);
        compositor
            .snapshot_output()?
            .save(&frame_path)
            .with_context(|| format!("Failed to write {:?}", frame_path))?;

        if (tick.index + 1) % 10 == 0 {
            println!("Rendered frame {}/{}", tick.index + 1, job.frames);
        }
        Ok(())
    })?;

    println!("Done: {} frames ({:.2}s of animation)", summary.frames, summary.duration);
    Ok(())
}

fn frame_path(out: &Path, index: u64) -> PathBuf {
    out.join(format!("frame_{:05}.png", index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_args_parse() {
        let cli = Cli::try_parse_from([
            "selective-bloom",
            "render",
            "--demo",
            "sun",
            "--out",
            "frames",
            "--output-mode",
            "glow-only",
        ])
        .unwrap();
        match cli.command {
            Commands::Render {
                demo,
                output_mode,
                backend,
                ..
            } => {
                assert_eq!(demo, DemoKind::Sun);
                assert_eq!(output_mode, Some(OutputMode::GlowOnly));
                assert_eq!(backend, BackendKind::Software);
            }
            Commands::Presets => panic!("expected render"),
        }
    }

    #[test]
    fn test_preset_conflicts_with_config() {
        let result = Cli::try_parse_from([
            "selective-bloom",
            "render",
            "--out",
            "frames",
            "--preset",
            "sun",
            "--config",
            "bloom.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_path_is_zero_padded() {
        assert_eq!(frame_path(Path::new("out"), 7), PathBuf::from("out/frame_00007.png"));
    }
}
