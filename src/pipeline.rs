//! Fetch, join and render cycles, and the controller that lets a newer
//! cycle supersede one still in flight.

use crate::config::AppConfig;
use crate::data;
use crate::processing::{self, FeatureEnvelope};
use crate::render::Renderer;
use crate::types::{DatasetSelection, GeoFeature};
use anyhow::{Context, Result};
use rstar::RTree;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle};

/// What is currently drawn. Replaced wholesale by each committed cycle.
pub struct Surface {
    pub generation: u64,
    pub selection: DatasetSelection,
    pub svg: String,
    pub features: Vec<GeoFeature>,
    pub tree: RTree<FeatureEnvelope>,
}

/// Everything a render cycle needs, passed explicitly instead of living in
/// globals.
pub struct RenderContext {
    pub config: AppConfig,
    pub client: reqwest::Client,
    pub renderer: Renderer,
    pub surface: RwLock<Option<Surface>>,
}

impl RenderContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.input.fetch_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            renderer: Renderer::new(&config),
            config,
            client,
            surface: RwLock::new(None),
        })
    }

    pub async fn current_svg(&self) -> Option<String> {
        self.surface.read().await.as_ref().map(|s| s.svg.clone())
    }

    pub async fn current_selection(&self) -> DatasetSelection {
        self.surface
            .read()
            .await
            .as_ref()
            .map(|s| s.selection)
            .unwrap_or_default()
    }
}

/// Tabular data first, then geometry, then join. The geometry fetch only
/// starts once the dataset has loaded.
pub async fn fetch_and_join(ctx: &RenderContext, selection: DatasetSelection) -> Result<Vec<GeoFeature>> {
    let dataset = ctx
        .config
        .input
        .datasets
        .get(selection.index())
        .context("No dataset configured for slider position")?;

    let records = data::load_records(&dataset.path, &ctx.config.input).await?;
    let mut features = data::fetch_geometry(&ctx.client, &ctx.config.input).await?;
    processing::join_records(&mut features, &records);
    Ok(features)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Committed,
    /// A later `select` took over before this cycle could draw.
    Superseded,
}

/// Runs cycles one selection at a time. Starting a cycle aborts the one in
/// flight, and only the most recently started cycle may commit.
pub struct MapController {
    ctx: Arc<RenderContext>,
    latest: Arc<AtomicU64>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl MapController {
    pub fn new(ctx: Arc<RenderContext>) -> Self {
        Self {
            ctx,
            latest: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.ctx
    }

    /// Starts a full fetch, join and render cycle for `selection`, even when
    /// it is already the displayed one.
    pub fn select(&self, selection: DatasetSelection) -> CycleHandle {
        // Held across numbering and spawning so generations and aborts happen
        // in the same order.
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = Arc::clone(&self.ctx);
        let latest = Arc::clone(&self.latest);

        tracing::info!(generation, ?selection, "starting render cycle");
        let handle = tokio::spawn(run_cycle(ctx, latest, generation, selection));

        if let Some(previous) = in_flight.replace(handle.abort_handle()) {
            previous.abort();
        }

        CycleHandle { handle }
    }
}

async fn run_cycle(
    ctx: Arc<RenderContext>,
    latest: Arc<AtomicU64>,
    generation: u64,
    selection: DatasetSelection,
) -> Result<CycleOutcome> {
    let features = fetch_and_join(&ctx, selection).await?;
    let svg = ctx.renderer.render_svg(&features);
    let tree = processing::build_index(&features);

    let mut surface = ctx.surface.write().await;
    if latest.load(Ordering::SeqCst) != generation {
        tracing::info!(generation, "render cycle superseded");
        return Ok(CycleOutcome::Superseded);
    }

    *surface = Some(Surface {
        generation,
        selection,
        svg,
        features,
        tree,
    });
    tracing::info!(generation, ?selection, "render cycle committed");
    Ok(CycleOutcome::Committed)
}

pub struct CycleHandle {
    handle: JoinHandle<Result<CycleOutcome>>,
}

impl CycleHandle {
    /// Waits for the cycle. A failed cycle leaves the previous surface on
    /// screen and its error is returned here.
    pub async fn wait(self) -> Result<CycleOutcome> {
        match self.handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                tracing::warn!("render cycle failed: {:#}", e);
                Err(e)
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!("render cycle superseded");
                Ok(CycleOutcome::Superseded)
            }
            Err(e) => Err(e).context("Render cycle panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use std::path::Path;

    const GEOMETRY: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "name": "A" },
              "geometry": { "type": "Polygon", "coordinates": [[[10,50],[11,50],[11,51],[10,51],[10,50]]] } },
            { "type": "Feature", "properties": { "name": "B" },
              "geometry": { "type": "Polygon", "coordinates": [[[12,50],[13,50],[13,51],[12,51],[12,50]]] } },
            { "type": "Feature", "properties": { "name": "C" },
              "geometry": { "type": "Polygon", "coordinates": [[[14,50],[15,50],[15,51],[14,51],[14,50]]] } }
        ]
    }"#;

    fn write_inputs(dir: &Path) -> AppConfig {
        std::fs::write(dir.join("europe.geojson"), GEOMETRY).unwrap();
        std::fs::write(dir.join("dataset1.csv"), "coa_name,refugees\nA,500\nB,50000\n").unwrap();
        std::fs::write(dir.join("dataset2.csv"), "coa_name,refugees\nA,2000000\n").unwrap();

        let mut config = AppConfig::default();
        config.input.geometry = dir.join("europe.geojson").to_string_lossy().into_owned();
        config.input.datasets = vec![
            DatasetConfig { label: "Dec 2022".into(), path: dir.join("dataset1.csv") },
            DatasetConfig { label: "Dec 2023".into(), path: dir.join("dataset2.csv") },
        ];
        config
    }

    fn controller(config: AppConfig) -> MapController {
        MapController::new(Arc::new(RenderContext::new(config).unwrap()))
    }

    #[tokio::test]
    async fn cycle_joins_and_colors_features() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));

        let outcome = controller.select(DatasetSelection::First).wait().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Committed);

        let svg = controller.context().current_svg().await.unwrap();
        assert!(svg.contains("style=\"fill: #ffc9bb\"><title>A: 500</title>"));
        assert!(svg.contains("style=\"fill: #ff8164\"><title>B: 50000</title>"));
        assert!(svg.contains("style=\"fill: #ccc\"><title>C: undefined</title>"));
    }

    #[tokio::test]
    async fn second_position_loads_second_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));

        controller.select(DatasetSelection::Second).wait().await.unwrap();

        let ctx = controller.context();
        assert_eq!(ctx.current_selection().await, DatasetSelection::Second);
        let svg = ctx.current_svg().await.unwrap();
        assert!(svg.contains("<title>A: 2000000</title>"));
        assert!(svg.contains("<title>B: undefined</title>"));
    }

    #[tokio::test]
    async fn reselecting_runs_a_fresh_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));

        controller.select(DatasetSelection::First).wait().await.unwrap();
        let first = controller.context().current_svg().await.unwrap();

        std::fs::write(dir.path().join("dataset1.csv"), "coa_name,refugees\nC,7\n").unwrap();
        controller.select(DatasetSelection::First).wait().await.unwrap();
        let second = controller.context().current_svg().await.unwrap();

        assert_ne!(first, second);
        assert!(second.contains("<title>C: 7</title>"));
        assert_eq!(controller.context().surface.read().await.as_ref().unwrap().generation, 2);
    }

    #[tokio::test]
    async fn newer_cycle_supersedes_older_one() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));

        let older = controller.select(DatasetSelection::First);
        let newer = controller.select(DatasetSelection::Second);

        assert_eq!(older.wait().await.unwrap(), CycleOutcome::Superseded);
        assert_eq!(newer.wait().await.unwrap(), CycleOutcome::Committed);
        assert_eq!(controller.context().current_selection().await, DatasetSelection::Second);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_surface() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));

        controller.select(DatasetSelection::First).wait().await.unwrap();
        std::fs::remove_file(dir.path().join("dataset2.csv")).unwrap();

        assert!(controller.select(DatasetSelection::Second).wait().await.is_err());
        let ctx = controller.context();
        assert_eq!(ctx.current_selection().await, DatasetSelection::First);
        assert!(ctx.current_svg().await.unwrap().contains("<title>A: 500</title>"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_selects_always_commit_the_newest() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(write_inputs(dir.path()));
        let runtime = tokio::runtime::Handle::current();

        for _ in 0..200 {
            let barrier = std::sync::Barrier::new(2);
            let (first, second) = std::thread::scope(|s| {
                let a = s.spawn(|| {
                    let _guard = runtime.enter();
                    barrier.wait();
                    controller.select(DatasetSelection::First)
                });
                let b = s.spawn(|| {
                    let _guard = runtime.enter();
                    barrier.wait();
                    controller.select(DatasetSelection::Second)
                });
                (a.join().unwrap(), b.join().unwrap())
            });

            let outcomes = [first.wait().await.unwrap(), second.wait().await.unwrap()];
            assert!(outcomes.contains(&CycleOutcome::Committed));

            let latest = controller.latest.load(Ordering::SeqCst);
            let surface = controller.context().surface.read().await;
            assert_eq!(surface.as_ref().unwrap().generation, latest);
        }
    }
}
