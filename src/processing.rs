use crate::types::{DataRecord, GeoFeature};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};

/// Copies each record's value onto the first feature with exactly the same
/// name. Records without a matching feature are dropped; features without a
/// matching record keep an absent value. When several records name the same
/// feature the last one wins.
pub fn join_records(features: &mut [GeoFeature], records: &[DataRecord]) {
    let mut matched = 0usize;

    for record in records {
        if let Some(feature) = features.iter_mut().find(|f| f.name == record.country) {
            feature.value = record.value;
            feature.matched = true;
            matched += 1;
        }
    }

    tracing::debug!(
        records = records.len(),
        matched,
        unmatched = records.len() - matched,
        "joined tabular data onto geometry"
    );
}

/// Bounding box of one feature, pointing back into the feature list.
pub struct FeatureEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub fn build_index(features: &[GeoFeature]) -> RTree<FeatureEnvelope> {
    let items: Vec<FeatureEnvelope> = features
        .iter()
        .enumerate()
        .filter_map(|(i, feature)| {
            let rect = feature.geometry.as_ref()?.bounding_rect()?;
            Some(FeatureEnvelope {
                index: i,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();

    RTree::bulk_load(items)
}

/// Finds the feature whose geometry contains `(lon, lat)`.
pub fn locate<'a>(
    features: &'a [GeoFeature],
    tree: &RTree<FeatureEnvelope>,
    lon: f64,
    lat: f64,
) -> Option<&'a GeoFeature> {
    let point = Point::new(lon, lat);
    let envelope = AABB::from_point([lon, lat]);

    tree.locate_in_envelope_intersecting(&envelope)
        .filter_map(|candidate| features.get(candidate.index))
        .find(|feature| {
            feature
                .geometry
                .as_ref()
                .is_some_and(|geometry| geometry.contains(&point))
        })
}
