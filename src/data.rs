use crate::config::InputConfig;
use crate::types::{DataRecord, GeoFeature};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geojson::GeoJson;
use std::io::Read;
use std::path::Path;

/// Reads one tabular dataset from disk.
pub async fn load_records(path: &Path, config: &InputConfig) -> Result<Vec<DataRecord>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let records = parse_records(bytes.as_slice(), &config.name_column, &config.value_column)
        .with_context(|| format!("Failed to parse CSV file: {:?}", path))?;
    tracing::debug!(?path, records = records.len(), "loaded tabular data");
    Ok(records)
}

pub fn parse_records<R: Read>(
    reader: R,
    name_column: &str,
    value_column: &str,
) -> Result<Vec<DataRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = headers.iter().position(|h| h == name_column)
        .ok_or_else(|| anyhow!("Name column '{}' not found in CSV", name_column))?;
    let value_idx = headers.iter().position(|h| h == value_column)
        .ok_or_else(|| anyhow!("Value column '{}' not found in CSV", value_column))?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let country = record.get(name_idx).unwrap_or("");
        if country.is_empty() {
            continue;
        }

        records.push(DataRecord {
            country: country.to_string(),
            value: record.get(value_idx).and_then(parse_value),
        });
    }

    Ok(records)
}

/// Lenient number parsing: skips leading whitespace and reads the longest
/// numeric prefix, so `"1200 people"` is 1200 and `"1,500"` is 1. Returns
/// `None` when there is no prefix or the result is not finite.
pub fn parse_value(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetches the feature collection afresh. Nothing is cached between calls.
pub async fn fetch_geometry(client: &reqwest::Client, config: &InputConfig) -> Result<Vec<GeoFeature>> {
    let source = &config.geometry;

    let body = if is_remote(source) {
        let response = client
            .get(source)
            .send()
            .await
            .with_context(|| format!("Failed to request GeoJSON: {}", source))?
            .error_for_status()
            .with_context(|| format!("GeoJSON request rejected: {}", source))?;
        response.text().await.context("Failed to read GeoJSON response body")?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to open GeoJSON file: {}", source))?
    };

    let features = parse_features(&body, &config.name_property)?;
    tracing::debug!(source = %source, features = features.len(), "loaded geometry");
    Ok(features)
}

pub fn parse_features(body: &str, name_property: &str) -> Result<Vec<GeoFeature>> {
    let geojson: GeoJson = body.parse().context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        let name = feature
            .property(name_property)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let geometry = match feature.geometry {
            Some(geom) => {
                let geometry: geo::Geometry<f64> = geom.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of '{}': {:?}", name, e))?;
                Some(geometry)
            }
            None => None,
        };

        features.push(GeoFeature::new(name, geometry));
    }

    Ok(features)
}
