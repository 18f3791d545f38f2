use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use facepose_core::detector::select_face;
use facepose_core::projector::project_detection;
use facepose_core::{EnrollPhase, TargetRegion};
use facepose_engine::{spawn_engine, Config, EngineHandle, EngineStatus};
use facepose_store::{GalleryStore, SqliteGallery};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod replay;

use replay::{load_trace, ReplayDetector, ReplayEmbedder, TraceFrame};

#[derive(Parser)]
#[command(name = "facepose", about = "Pose-guided face enrollment and verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List enrolled identities
    List,
    /// Remove an enrolled identity
    Remove {
        /// Identity ID to remove
        id: String,
    },
    /// Enroll an identity from a recorded detection trace
    Enroll {
        /// Name to store the identity under
        #[arg(short, long)]
        name: String,
        /// JSON Lines trace file
        #[arg(short, long)]
        trace: PathBuf,
    },
    /// Match a recorded trace against the gallery
    Verify {
        #[arg(short, long)]
        trace: PathBuf,
        /// Similarity threshold override (-1.0 to 1.0)
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Print the pose direction of every frame in a trace
    Classify {
        #[arg(short, long)]
        trace: PathBuf,
    },
}

#[derive(Serialize)]
struct ClassifiedFrame {
    sequence: u64,
    direction: Option<facepose_core::Direction>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::List => {
            let store = SqliteGallery::open(&config.db_path)?;
            let identities = store.load_all()?;
            if identities.is_empty() {
                println!("No identities enrolled");
            }
            for identity in identities {
                println!(
                    "{}  {}  {}  ({} embeddings)",
                    identity.id,
                    identity.name,
                    identity.created,
                    identity.embeddings.len()
                );
            }
        }
        Commands::Remove { id } => {
            let mut store = SqliteGallery::open(&config.db_path)?;
            if !store.delete(&id)? {
                bail!("no identity with id {id}");
            }
            println!("Removed {id}");
        }
        Commands::Enroll { name, trace } => enroll(config, &name, &trace).await?,
        Commands::Verify { trace, threshold } => verify(config, &trace, threshold).await?,
        Commands::Classify { trace } => classify(&config, &trace)?,
    }

    Ok(())
}

/// Spawn an engine fed by `trace` and backed by the configured gallery.
fn replay_engine(config: Config, trace: &Arc<[TraceFrame]>) -> Result<EngineHandle> {
    let store = SqliteGallery::open(&config.db_path)?;
    let engine = spawn_engine(
        config,
        Box::new(ReplayDetector::new(trace.clone())),
        Box::new(ReplayEmbedder::new(trace.clone())),
        Box::new(store),
    )?;
    Ok(engine)
}

/// Push every trace frame through the engine, printing one outcome per line.
async fn replay(engine: &EngineHandle, trace: &[TraceFrame]) -> Result<()> {
    for (sequence, entry) in trace.iter().enumerate() {
        let sequence = sequence as u64;
        let outcome = engine
            .process_frame(entry.frame(sequence), entry.preview_size())
            .await?;
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

async fn enroll(config: Config, name: &str, path: &Path) -> Result<()> {
    let trace: Arc<[TraceFrame]> = load_trace(path)?.into();
    let engine = replay_engine(config, &trace)?;

    engine.start_enrollment().await?;
    replay(&engine, &trace).await?;

    let status = engine.status().await?;
    if let Some(reason) = unfinished_enrollment(&status) {
        engine.stop().await?;
        bail!(reason);
    }

    let id = engine.accept(name).await?;
    engine.stop().await?;
    println!("Enrolled {name} as {id}");
    Ok(())
}

/// Why a replayed enrollment cannot be accepted yet, if it cannot.
fn unfinished_enrollment(status: &EngineStatus) -> Option<String> {
    if status.phase == Some(EnrollPhase::Review) {
        return None;
    }
    // Every pose is captured; review opens on the next in-region frame.
    if status.phase == Some(EnrollPhase::Camera) && status.progress.is_none() {
        return Some(format!(
            "all {} poses captured, but the trace has no in-region frame after the last capture",
            status.captures
        ));
    }
    Some(format!(
        "trace ended before the pose script finished ({} poses captured)",
        status.captures
    ))
}

async fn verify(config: Config, path: &Path, threshold: Option<f32>) -> Result<()> {
    let trace: Arc<[TraceFrame]> = load_trace(path)?.into();
    let engine = replay_engine(config, &trace)?;

    if let Some(threshold) = threshold {
        engine.set_threshold(threshold).await?;
    }
    let identities = engine.start_verification().await?;
    if identities == 0 {
        tracing::warn!("gallery is empty; nothing can match");
    }
    replay(&engine, &trace).await?;

    let status = engine.status().await?;
    engine.stop().await?;
    match status.matches.first() {
        Some(best) => println!(
            "Best match: {} ({}) score {:.3}",
            best.identity_name, best.identity_id, best.score
        ),
        None => println!("No match above {:.3}", status.threshold),
    }
    Ok(())
}

/// Classification only; no session, store or embedder involved.
fn classify(config: &Config, path: &Path) -> Result<()> {
    let trace = load_trace(path)?;
    for (sequence, entry) in trace.iter().enumerate() {
        let image = entry.image_size();
        let preview = entry.preview_size();
        let direction = select_face(&entry.detections, config.min_detection_confidence)
            .filter(|_| !image.is_empty() && !preview.is_empty())
            .and_then(|face| project_detection(face, image, preview))
            .map(|geometry| {
                let region = TargetRegion::for_preview(preview, config.region_divisor);
                config.thresholds.classify(&geometry, &region)
            });
        let line = ClassifiedFrame {
            sequence: sequence as u64,
            direction,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facepose_engine::Mode;

    fn enrolling(phase: EnrollPhase, progress: Option<f32>, captures: usize) -> EngineStatus {
        EngineStatus {
            mode: Mode::Enrolling,
            phase: Some(phase),
            prompt: None,
            progress,
            captures,
            matches: Vec::new(),
            gallery_size: None,
            threshold: 0.8,
        }
    }

    #[test]
    fn test_review_is_ready_to_accept() {
        assert!(unfinished_enrollment(&enrolling(EnrollPhase::Review, None, 5)).is_none());
    }

    #[test]
    fn test_trace_ending_on_last_capture() {
        let reason = unfinished_enrollment(&enrolling(EnrollPhase::Camera, None, 5)).unwrap();
        assert!(reason.contains("no in-region frame after the last capture"));
    }

    #[test]
    fn test_trace_ending_mid_script() {
        let reason = unfinished_enrollment(&enrolling(EnrollPhase::Camera, Some(0.5), 2)).unwrap();
        assert!(reason.contains("before the pose script finished (2 poses captured)"));
    }
}
