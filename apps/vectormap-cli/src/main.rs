use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vectormap_camera::{CameraController, CameraSnapshot};
use vectormap_common::{
    CameraAnimation, CameraDefaults, CameraPosition, CameraUpdate, LatLng, MapPadding,
};
use vectormap_engine::{MapEngine, MapEvent, MapInitialOptions, RecordingEngine, RecordingMapView};
use vectormap_events::MapEventListeners;
use vectormap_host::MapHost;
use vectormap_lifecycle::{HostEvent, LifecycleCallbacks};
use vectormap_persist::SavedStateStore;
use vectormap_scene::{LabelIcon, LabelProps, SceneDeclaration};

#[derive(Parser)]
#[command(name = "vectormap-cli", about = "CLI tool for the vectormap binding layer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default settings
    Info,
    /// Run a scripted lifecycle and camera race against the recording engine
    Demo,
    /// Apply a YAML or JSON scene twice and report native apply counts
    Scene {
        /// Scene declaration file (.yaml, .yml or .json)
        file: PathBuf,
    },
    /// Save or load camera snapshots in a saved-state store
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Save a camera position under a key
    Save {
        /// Store directory
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(short, long, default_value = "main")]
        key: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, default_value_t = CameraDefaults::POSITION.zoom_level)]
        zoom: i32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        tilt: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        rotation: f64,
    },
    /// Print the camera snapshot saved under a key
    Load {
        /// Store directory
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(short, long, default_value = "main")]
        key: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let p = CameraDefaults::POSITION;
            println!("vectormap-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "zoom bounds: {}..={}",
                CameraDefaults::MIN_ZOOM_LEVEL,
                CameraDefaults::MAX_ZOOM_LEVEL
            );
            println!("default camera: {} at zoom {}", p.target, p.zoom_level);
            println!(
                "initial options: {}",
                serde_json::to_string(&MapInitialOptions::default())?
            );
        }
        Commands::Demo => demo().await?,
        Commands::Scene { file } => scene(&file).await?,
        Commands::Snapshot { action } => snapshot(action)?,
    }

    Ok(())
}

/// A running host over a recording engine that reports ready on start.
async fn start_host() -> anyhow::Result<(Arc<RecordingEngine>, MapHost)> {
    let engine = Arc::new(RecordingEngine::new());
    let handle: Arc<dyn MapEngine> = engine.clone();
    let view = Arc::new(RecordingMapView::ready_on_start(handle));
    let host = MapHost::new(view, MapInitialOptions::default());
    host.set_lifecycle_callbacks(LifecycleCallbacks {
        on_ready: Arc::new(|_| tracing::info!("engine ready")),
        on_destroyed: Arc::new(|| tracing::info!("engine destroyed")),
        ..LifecycleCallbacks::default()
    });
    host.on_host_event(HostEvent::Resumed);
    host.run().await.context("engine never became ready")?;
    Ok((engine, host))
}

async fn wait_for_pending(engine: &RecordingEngine, n: usize) {
    while engine.pending_animations() < n {
        tokio::task::yield_now().await;
    }
}

fn demo_scene() -> SceneDeclaration {
    let mut scene = SceneDeclaration::default()
        .with_label(
            "cityhall",
            LabelProps::new(CameraDefaults::POSITION.target, LabelIcon::Resource(1))
                .with_id("cityhall"),
        )
        .with_label(
            "gwanghwamun",
            LabelProps::new(LatLng::new(37.575_929, 126.976_849), LabelIcon::Resource(2)),
        );
    scene.properties.padding = MapPadding::uniform(24);
    scene
}

async fn demo() -> anyhow::Result<()> {
    let (engine, host) = start_host().await?;
    println!("lifecycle: {:?}", host.state());

    let listeners = MapEventListeners::new()
        .on_padding_change(|| println!("event: padding changed"))
        .on_overlay_click(|id, kind| println!("event: {kind:?} {id} clicked"));
    let first = host.render(demo_scene(), listeners.clone());
    println!(
        "pass 1: created={} applies={}",
        first.created, first.applies
    );
    let second = host.render(demo_scene(), listeners);
    println!("pass 2: created={} applies={}", second.created, second.applies);
    engine.emit(MapEvent::LabelClicked(vectormap_common::LabelId(
        "cityhall".into(),
    )));

    let camera = host.camera().clone();
    let busan = LatLng::new(35.179_554, 129.075_642);
    let jeju = LatLng::new(33.499_621, 126.531_188);
    let animation = CameraAnimation::from_millis(800);

    let c = camera.clone();
    let to_busan = tokio::spawn(async move {
        c.animate(CameraUpdate::NewCenter(busan), animation, &CancellationToken::new())
            .await
    });
    wait_for_pending(&engine, 1).await;
    let c = camera.clone();
    let to_jeju = tokio::spawn(async move {
        c.animate(CameraUpdate::NewCenter(jeju), animation, &CancellationToken::new())
            .await
    });
    wait_for_pending(&engine, 2).await;

    engine.complete_all_animations();
    println!("animate to Busan: {:?}", to_busan.await?);
    println!("animate to Jeju:  {:?}", to_jeju.await?);
    println!("camera now at {}", camera.position().target);

    let c = camera.clone();
    let zoom = tokio::spawn(async move {
        c.animate(CameraUpdate::ZoomTo(19), animation, &CancellationToken::new())
            .await
    });
    wait_for_pending(&engine, 1).await;
    camera.jump(CameraUpdate::ZoomTo(10))?;
    println!("animated zoom after jump: {:?}", zoom.await?);
    engine.complete_all_animations();

    let snapshot = camera.save();
    println!("snapshot: {}", vectormap_persist::to_json(&snapshot)?);

    host.on_host_event(HostEvent::Paused);
    host.on_host_event(HostEvent::Destroyed);
    println!(
        "lifecycle: {:?}, bound={}, native calls={}",
        host.state(),
        host.is_bound(),
        engine.calls().len()
    );
    Ok(())
}

fn load_scene(path: &Path) -> anyhow::Result<SceneDeclaration> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let scene = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)?,
        _ => serde_yaml::from_str(&text)?,
    };
    Ok(scene)
}

async fn scene(path: &Path) -> anyhow::Result<()> {
    let declaration = load_scene(path)?;
    println!(
        "scene: {} overlays from {}",
        declaration.overlays.len(),
        path.display()
    );
    let (engine, host) = start_host().await?;
    let errors = MapEventListeners::new().on_apply_error(|f| eprintln!("error: {f}"));

    for pass in 1..=2 {
        engine.clear_calls();
        let report = host.render(declaration.clone(), errors.clone());
        println!(
            "pass {pass}: applies={} created={} removed={} failures={} native={}",
            report.applies,
            report.created,
            report.removed,
            report.failures,
            engine.calls().len()
        );
        for key in &report.duplicates {
            println!("  duplicate overlay key ignored: {key}");
        }
    }
    Ok(())
}

fn snapshot(action: SnapshotAction) -> anyhow::Result<()> {
    match action {
        SnapshotAction::Save {
            dir,
            key,
            lat,
            lng,
            zoom,
            tilt,
            rotation,
        } => {
            let mut store = SavedStateStore::open(&dir)?;
            let camera = CameraController::with_position(CameraPosition {
                target: LatLng::new(lat, lng),
                zoom_level: zoom,
                tilt_angle: tilt,
                rotation_angle: rotation,
                ..CameraDefaults::POSITION
            });
            let snapshot = camera.save();
            store.save_camera(&key, &snapshot)?;
            println!("saved {key}: {}", vectormap_persist::to_json(&snapshot)?);
        }
        SnapshotAction::Load { dir, key } => {
            let store = SavedStateStore::open(&dir)?;
            store.verify_integrity()?;
            match store.load_camera(&key)? {
                Some(snapshot) => {
                    let camera = CameraController::restore(snapshot);
                    let restored: CameraSnapshot = camera.save();
                    println!("{key}: {}", vectormap_persist::to_json(&restored)?);
                }
                None => println!("no snapshot saved under {key}"),
            }
        }
    }
    Ok(())
}
