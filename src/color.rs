use crate::config::ScaleConfig;

pub const GRADIENT_ID: &str = "gradient";

/// Fill for one feature, recomputed every time a feature is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill<'a> {
    Color(&'a str),
    /// The two-stop split gradient reserved for the special feature.
    Gradient,
}

impl Fill<'_> {
    pub fn to_css(&self) -> String {
        match self {
            Fill::Color(c) => (*c).to_string(),
            Fill::Gradient => format!("url(#{})", GRADIENT_ID),
        }
    }
}

/// Threshold color scale: `n` ascending breakpoints split the number line
/// into `n + 1` buckets, each with its own color.
#[derive(Debug, Clone)]
pub struct ColorScale {
    thresholds: Vec<f64>,
    colors: Vec<String>,
    default_color: String,
    special_feature: String,
}

impl ColorScale {
    pub fn new(config: &ScaleConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            colors: config.colors.clone(),
            default_color: config.default_color.clone(),
            special_feature: config.special_feature.clone(),
        }
    }

    /// Index of the bucket holding `value`: the number of thresholds that
    /// are `<= value`.
    pub fn bucket(&self, value: f64) -> usize {
        self.thresholds.partition_point(|t| *t <= value)
    }

    pub fn color_for(&self, value: f64) -> &str {
        let idx = self.bucket(value).min(self.colors.len().saturating_sub(1));
        self.colors.get(idx).map_or(self.default_color.as_str(), String::as_str)
    }

    pub fn fill(&self, name: &str, value: Option<f64>) -> Fill<'_> {
        if name == self.special_feature {
            return Fill::Gradient;
        }
        // Zero counts as no data, like an absent value.
        match value {
            Some(v) if v != 0.0 => Fill::Color(self.color_for(v)),
            _ => Fill::Color(&self.default_color),
        }
    }

    /// Swatch colors paired with their legend labels, lowest bucket first.
    pub fn legend_entries(&self) -> Vec<(&str, String)> {
        let last = self.colors.len().saturating_sub(1);
        self.colors
            .iter()
            .enumerate()
            .map(|(i, color)| {
                let label = if i == 0 {
                    format!("Less than {}", format_whole(self.thresholds[0]))
                } else if i == last {
                    format!("{} or more", format_whole(self.thresholds[i - 1]))
                } else {
                    format!(
                        "{} to {}",
                        format_whole(self.thresholds[i - 1]),
                        format_whole(self.thresholds[i])
                    )
                };
                (color.as_str(), label)
            })
            .collect()
    }
}

/// Rounds to a whole number and groups thousands with commas.
pub fn format_whole(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> ColorScale {
        ColorScale::new(&ScaleConfig::default())
    }

    #[test]
    fn buckets_follow_thresholds() {
        let scale = scale();
        assert_eq!(scale.bucket(0.0), 0);
        assert_eq!(scale.bucket(999.9), 0);
        assert_eq!(scale.bucket(1000.0), 1);
        assert_eq!(scale.bucket(9999.0), 1);
        assert_eq!(scale.bucket(10000.0), 2);
        assert_eq!(scale.bucket(499999.0), 3);
        assert_eq!(scale.bucket(500000.0), 4);
        assert_eq!(scale.bucket(1499999.0), 5);
        assert_eq!(scale.bucket(1500000.0), 6);
        assert_eq!(scale.bucket(9e9), 6);
    }

    #[test]
    fn every_bucket_has_a_distinct_color() {
        let scale = scale();
        assert_eq!(scale.color_for(500.0), "#ffc9bb");
        assert_eq!(scale.color_for(50000.0), "#ff8164");
        assert_eq!(scale.color_for(1200000.0), "#c61a09");
        assert_eq!(scale.color_for(3000000.0), "#8f0e02");
    }

    #[test]
    fn absent_value_uses_default_color() {
        assert_eq!(scale().fill("Norway", None), Fill::Color("#ccc"));
    }

    #[test]
    fn zero_uses_default_color() {
        let scale = scale();
        assert_eq!(scale.fill("Norway", Some(0.0)), Fill::Color("#ccc"));
        assert_eq!(scale.fill("Norway", Some(-0.0)), Fill::Color("#ccc"));
        assert_eq!(scale.fill("Norway", Some(0.5)), Fill::Color("#ffc9bb"));
    }

    #[test]
    fn special_feature_ignores_its_value() {
        let scale = scale();
        assert_eq!(scale.fill("Ukraine", None), Fill::Gradient);
        assert_eq!(scale.fill("Ukraine", Some(5000.0)), Fill::Gradient);
        assert_eq!(Fill::Gradient.to_css(), "url(#gradient)");
    }

    #[test]
    fn legend_labels_use_threshold_ranges() {
        let labels: Vec<String> = scale().legend_entries().into_iter().map(|(_, l)| l).collect();
        assert_eq!(
            labels,
            vec![
                "Less than 1,000",
                "1,000 to 10,000",
                "10,000 to 100,000",
                "100,000 to 500,000",
                "500,000 to 1,000,000",
                "1,000,000 to 1,500,000",
                "1,500,000 or more",
            ]
        );
    }

    #[test]
    fn formats_whole_numbers_with_grouping() {
        assert_eq!(format_whole(0.0), "0");
        assert_eq!(format_whole(999.6), "1,000");
        assert_eq!(format_whole(1500000.0), "1,500,000");
        assert_eq!(format_whole(-12345.0), "-12,345");
    }
}
