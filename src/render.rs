use crate::color::{ColorScale, GRADIENT_ID};
use crate::config::AppConfig;
use crate::projection::Mercator;
use crate::types::{DatasetSelection, GeoFeature};
use rayon::prelude::*;
use std::fmt::Write;

// Legend layout
const SWATCH_SIZE: f64 = 15.0;
const LABEL_OFFSET: f64 = 10.0;

/// Shared drawing parameters, built once from the configuration.
pub struct Renderer {
    config: AppConfig,
    scale: ColorScale,
    projection: Mercator,
}

impl Renderer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            scale: ColorScale::new(&config.scale),
            projection: Mercator::for_viewport(&config.projection, &config.viewport),
        }
    }

    /// Draws a complete SVG document for already-joined features. Nothing from
    /// a previous render is reused.
    pub fn render_svg(&self, features: &[GeoFeature]) -> String {
        let viewport = &self.config.viewport;
        let scale_cfg = &self.config.scale;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" fill="grey">"#,
            viewport.width,
            viewport.surface_height()
        );
        let _ = writeln!(
            svg,
            "<style>path.feature:hover {{ stroke: {}; stroke-width: {}; }}</style>",
            scale_cfg.highlight_stroke, scale_cfg.highlight_width
        );
        let _ = writeln!(
            svg,
            r#"<defs><linearGradient id="{}" x1="0%" y1="0%" x2="0%" y2="100%"><stop offset="50%" stop-color="{}"/><stop offset="50%" stop-color="{}"/></linearGradient></defs>"#,
            GRADIENT_ID, scale_cfg.special_colors[0], scale_cfg.special_colors[1]
        );

        let paths: Vec<String> = features.par_iter().map(|f| self.render_feature(f)).collect();
        for path in paths {
            svg.push_str(&path);
        }

        self.render_legend(&mut svg);
        svg.push_str("</svg>\n");
        svg
    }

    fn render_feature(&self, feature: &GeoFeature) -> String {
        let d = feature
            .geometry
            .as_ref()
            .map(|g| self.projection.path_data(g))
            .unwrap_or_default();
        let fill = self.scale.fill(&feature.name, feature.value).to_css();

        format!(
            "<path class=\"feature\" d=\"{}\" style=\"fill: {}\"><title>{}</title></path>\n",
            d,
            escape(&fill),
            escape(&feature.tooltip())
        )
    }

    fn render_legend(&self, svg: &mut String) {
        let _ = writeln!(
            svg,
            r#"<g class="legendThreshold" transform="translate(0, {})">"#,
            self.config.viewport.legend_offset()
        );
        for (i, (color, label)) in self.scale.legend_entries().into_iter().enumerate() {
            let _ = writeln!(
                svg,
                r#"<g class="cell" transform="translate(0, {})"><rect class="swatch" width="{}" height="{}" style="fill: {}"/><text class="label" transform="translate({}, {})">{}</text></g>"#,
                i as f64 * SWATCH_SIZE,
                SWATCH_SIZE,
                SWATCH_SIZE,
                escape(color),
                SWATCH_SIZE + LABEL_OFFSET,
                SWATCH_SIZE / 2.0 + 5.0,
                escape(&label)
            );
        }
        svg.push_str("</g>\n");
    }

    /// Full HTML page: the map plus the two-position dataset slider.
    pub fn render_page(&self, selection: DatasetSelection, svg: &str) -> String {
        let datasets = &self.config.input.datasets;
        let label = |i: usize| datasets.get(i).map(|d| escape(&d.label)).unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Refugees in Europe</title>
<style>
#sliderContainer {{ display: flex; align-items: center; gap: 1em; justify-content: center; }}
.sliderLabel {{ font-family: sans-serif; }}
</style>
</head>
<body>
<div id="chart">{svg}</div>
<div id="sliderContainer">
<div class="sliderLabel">{start}</div>
<input type="range" min="0" max="1" value="{value}" id="yearSlider">
<div class="sliderLabel">{end}</div>
</div>
<script>
document.getElementById("yearSlider").addEventListener("input", function () {{
  fetch("/api/select?value=" + encodeURIComponent(this.value))
    .then(function (r) {{ return r.ok ? r.text() : null; }})
    .then(function (svg) {{ if (svg) {{ document.getElementById("chart").innerHTML = svg; }} }});
}});
</script>
</body>
</html>
"#,
            svg = svg,
            start = label(0),
            end = label(1),
            value = selection.slider_value(),
        )
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
