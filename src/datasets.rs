//! CSV loading for the four-measurement flower dataset.
use crate::error::DataError;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use serde::Serialize;

pub const FEATURE_COUNT: usize = 4;

/// Feature names in column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Human-readable feature titles in column order.
pub const FEATURE_TITLES: [&str; FEATURE_COUNT] =
    ["Sepal Length", "Sepal Width", "Petal Length", "Petal Width"];

const LABEL_PREFIX: &str = "iris-";
const LABEL_COLUMN: usize = 5;

/// One labeled measurement row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub features: [f64; FEATURE_COUNT],
    pub label: String,
}

pub type Dataset = Vec<Sample>;

/// Accepted rows plus the raw header fields.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub dataset: Dataset,
    pub headers: Vec<String>,
}

/// Lowercase and drop the `iris-` prefix: "Iris-setosa" -> "setosa".
pub fn normalize_label(raw: &str) -> String {
    let lower = clean_field(raw).to_lowercase();
    match lower.strip_prefix(LABEL_PREFIX) {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

fn clean_field(field: &str) -> String {
    field.replace('"', "").trim().to_string()
}

fn parse_feature(field: &str) -> Option<f64> {
    clean_field(field)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Layout: `Id, f1, f2, f3, f4, label`. Returns `None` for rows that fail
/// validation.
fn parse_row(record: &StringRecord) -> Option<Sample> {
    if record.len() <= LABEL_COLUMN {
        return None;
    }
    let mut features = [0.0; FEATURE_COUNT];
    for (i, slot) in features.iter_mut().enumerate() {
        *slot = parse_feature(record.get(i + 1)?)?;
    }
    let label = normalize_label(record.get(LABEL_COLUMN)?);
    if label.is_empty() {
        return None;
    }
    Some(Sample { features, label })
}

/// Parse CSV text whose first non-empty line is a header.
///
/// Rows that fail numeric or label validation are dropped silently. Fails
/// with [`DataError::NoValidRows`] if nothing survives.
pub fn parse_csv(text: &str) -> Result<ParsedCsv, DataError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut dataset = Vec::new();

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping malformed CSV record: {}", e);
                continue;
            }
        };
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if headers.is_none() {
            let fields: Vec<String> = record.iter().map(clean_field).collect();
            info!("CSV headers: {:?}", fields);
            headers = Some(fields);
            continue;
        }
        if let Some(sample) = parse_row(&record) {
            dataset.push(sample);
        }
    }

    if dataset.is_empty() {
        return Err(DataError::NoValidRows);
    }
    info!("Parsed {} samples from CSV", dataset.len());
    debug!("Sample data: {:?}", &dataset[..dataset.len().min(3)]);

    Ok(ParsedCsv {
        dataset,
        headers: headers.unwrap_or_default(),
    })
}
