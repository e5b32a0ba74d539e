use geo::Geometry;

/// A named region of the map. `value` is unset until the joiner finds a
/// matching data record for it; `matched` records that a row was found even
/// when its number did not parse.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub name: String,
    pub geometry: Option<Geometry<f64>>,
    pub value: Option<f64>,
    pub matched: bool,
}

impl GeoFeature {
    pub fn new(name: impl Into<String>, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            name: name.into(),
            geometry,
            value: None,
            matched: false,
        }
    }

    /// Hover text, `"<name>: <value>"`. A matched row whose number did not
    /// parse prints `NaN`; no matching row prints `undefined`.
    pub fn tooltip(&self) -> String {
        match (self.value, self.matched) {
            (Some(v), _) => format!("{}: {}", self.name, v),
            (None, true) => format!("{}: NaN", self.name),
            (None, false) => format!("{}: undefined", self.name),
        }
    }
}

/// One row of a tabular dataset. A value that failed to parse is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub country: String,
    pub value: Option<f64>,
}

/// Position of the two-state dataset slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetSelection {
    #[default]
    First,
    Second,
}

impl DatasetSelection {
    /// Maps the raw slider value. Only `"0"` and `"1"` are valid.
    pub fn from_slider(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Self::First),
            "1" => Some(Self::Second),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    pub fn slider_value(self) -> &'static str {
        match self {
            Self::First => "0",
            Self::Second => "1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slider_accepts_only_two_positions() {
        assert_eq!(DatasetSelection::from_slider("0"), Some(DatasetSelection::First));
        assert_eq!(DatasetSelection::from_slider("1"), Some(DatasetSelection::Second));
        assert_eq!(DatasetSelection::from_slider("2"), None);
        assert_eq!(DatasetSelection::from_slider(""), None);
        assert_eq!(DatasetSelection::Second.index(), 1);
        assert_eq!(DatasetSelection::default().slider_value(), "0");
    }

    #[test]
    fn tooltip_prints_undefined_for_missing_value() {
        let mut feature = GeoFeature::new("France", None);
        assert_eq!(feature.tooltip(), "France: undefined");

        feature.value = Some(50000.0);
        assert_eq!(feature.tooltip(), "France: 50000");

        feature.value = Some(12.5);
        assert_eq!(feature.tooltip(), "France: 12.5");
    }

    #[test]
    fn tooltip_prints_nan_for_unparseable_match() {
        let mut feature = GeoFeature::new("Malta", None);
        feature.matched = true;
        assert_eq!(feature.tooltip(), "Malta: NaN");
    }
}
