use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const EUROPE_GEOJSON_URL: &str = "https://gist.githubusercontent.com/spiker830/3eab0cb407031bf9f2286f98b9d0558a/raw/7edae936285e77be675366550e20f9166bed0ed5/europe_features.json";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub scale: ScaleConfig,
    pub projection: ProjectionConfig,
    pub viewport: ViewportConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    /// URL or local path of the GeoJSON feature collection.
    pub geometry: String,
    pub name_property: String,
    pub name_column: String,
    pub value_column: String,
    pub fetch_timeout_secs: u64,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            geometry: EUROPE_GEOJSON_URL.to_string(),
            name_property: "name".to_string(),
            name_column: "coa_name".to_string(),
            value_column: "refugees".to_string(),
            fetch_timeout_secs: 30,
            datasets: vec![
                DatasetConfig {
                    label: "Dec 2022".to_string(),
                    path: PathBuf::from("dataset1.csv"),
                },
                DatasetConfig {
                    label: "Dec 2023".to_string(),
                    path: PathBuf::from("dataset2.csv"),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScaleConfig {
    pub thresholds: Vec<f64>,
    pub colors: Vec<String>, // one more than thresholds
    pub default_color: String,
    pub highlight_stroke: String,
    pub highlight_width: f64,
    pub special_feature: String,
    pub special_colors: [String; 2],
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![1000.0, 10000.0, 100000.0, 500000.0, 1000000.0, 1500000.0],
            colors: ["#ffc9bb", "#ffa590", "#ff8164", "#ff4122", "#ed3419", "#c61a09", "#8f0e02"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            default_color: "#ccc".to_string(),
            highlight_stroke: "#001141".to_string(),
            highlight_width: 1.5,
            special_feature: "Ukraine".to_string(),
            special_colors: ["#0057B7".to_string(), "#FFDD00".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectionConfig {
    /// `[longitude, latitude]` in degrees.
    pub center: [f64; 2],
    pub scale: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            center: [13.0, 52.0],
            scale: 560.0,
        }
    }
}

/// Size of the viewing surface, measured once at startup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl ViewportConfig {
    pub fn surface_height(&self) -> f64 {
        self.height * 0.85
    }

    pub fn legend_offset(&self) -> f64 {
        self.height / 1.45
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    /// Reads and validates a map configuration. Sections left out of the
    /// file keep their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read map config {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid map config {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Malformed TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load_from_file`, but falls back to the built-in defaults when
    /// the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(?path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.input.datasets.len() == 2,
            "Exactly two datasets are required, found {}",
            self.input.datasets.len()
        );

        let thresholds = &self.scale.thresholds;
        ensure!(!thresholds.is_empty(), "Color scale needs at least one threshold");
        if let Some(bad) = thresholds.iter().find(|t| !t.is_finite()) {
            return Err(anyhow!("Threshold {} is not a finite number", bad));
        }
        ensure!(
            thresholds.windows(2).all(|w| w[0] < w[1]),
            "Thresholds must be strictly ascending"
        );
        ensure!(
            self.scale.colors.len() == thresholds.len() + 1,
            "{} thresholds need {} colors, found {}",
            thresholds.len(),
            thresholds.len() + 1,
            self.scale.colors.len()
        );

        ensure!(self.projection.scale > 0.0, "Projection scale must be positive");
        ensure!(
            self.viewport.width > 0.0 && self.viewport.height > 0.0,
            "Viewport dimensions must be positive"
        );
        Ok(())
    }
}
