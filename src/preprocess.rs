//! Shuffling, label vocabulary and one-hot encoding.
use crate::datasets::Sample;
use crate::error::DataError;
use log::{debug, info, trace};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;

/// Uniformly random permutation of `dataset` (Fisher-Yates). The input is
/// left untouched.
pub fn shuffle<R: Rng + ?Sized>(dataset: &[Sample], rng: &mut R) -> Vec<Sample> {
    let mut shuffled = dataset.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// One-hot encode
pub fn one_hot(label: usize, num_classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; num_classes];
    if label < num_classes {
        v[label] = 1.0;
    }
    v
}

/// Sorted distinct labels; a label's index is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            labels: set.into_iter().collect(),
        }
    }

    pub fn from_dataset(dataset: &[Sample]) -> Self {
        Self::from_labels(dataset.iter().map(|s| s.label.as_str()))
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Index-aligned feature rows and one-hot label rows.
///
/// The batch owns its buffers; whoever holds it last releases them, whether
/// training finished or failed.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    features: Vec<Vec<f64>>,
    labels: Vec<Vec<f64>>,
}

impl EncodedBatch {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<Vec<f64>>) -> Self {
        Self { features, labels }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[Vec<f64>] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> (&[f64], &[f64]) {
        (&self.features[index], &self.labels[index])
    }
}

#[cfg(test)]
thread_local! {
    pub(crate) static RELEASED_BATCHES: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

impl Drop for EncodedBatch {
    fn drop(&mut self) {
        trace!("Released encoded batch of {} rows", self.features.len());
        #[cfg(test)]
        RELEASED_BATCHES.with(|n| n.set(n.get() + 1));
    }
}

/// Encode `rows` in order against `vocabulary`.
pub fn encode(rows: &[Sample], vocabulary: &LabelVocabulary) -> Result<EncodedBatch, DataError> {
    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for sample in rows {
        let index = vocabulary
            .index_of(&sample.label)
            .ok_or_else(|| DataError::UnknownLabel(sample.label.clone()))?;
        features.push(sample.features.to_vec());
        labels.push(one_hot(index, vocabulary.len()));
    }
    Ok(EncodedBatch::new(features, labels))
}

/// Shuffle, build the vocabulary from the full dataset, and encode in
/// shuffle order.
pub fn preprocess<R: Rng + ?Sized>(
    dataset: &[Sample],
    rng: &mut R,
) -> Result<(EncodedBatch, LabelVocabulary), DataError> {
    let shuffled = shuffle(dataset, rng);
    let vocabulary = LabelVocabulary::from_dataset(dataset);
    debug!(
        "Species mapping: {:?}",
        vocabulary.labels().iter().enumerate().collect::<Vec<_>>()
    );

    let batch = encode(&shuffled, &vocabulary)?;
    info!(
        "Preprocessed {} samples into {} classes",
        batch.len(),
        vocabulary.len()
    );
    debug!("Sample features: {:?}", &batch.features()[..batch.len().min(3)]);
    debug!("Sample labels: {:?}", &batch.labels()[..batch.len().min(3)]);
    Ok((batch, vocabulary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Rows tagged by their first feature so identity survives a shuffle.
    fn tagged_dataset(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                features: [i as f64, 1.0, 2.0, 3.0],
                label: label_for_tag(i as f64).to_string(),
            })
            .collect()
    }

    fn label_for_tag(tag: f64) -> &'static str {
        match (tag as usize) % 3 {
            0 => "setosa",
            1 => "versicolor",
            _ => "virginica",
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let data = tagged_dataset(50);
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = shuffle(&data, &mut rng);

        assert_eq!(shuffled.len(), data.len());
        let mut tags: Vec<usize> = shuffled.iter().map(|s| s.features[0] as usize).collect();
        tags.sort_unstable();
        assert_eq!(tags, (0..50).collect::<Vec<_>>());
        assert_ne!(shuffled, data, "50 rows should not come back in the same order");
    }

    #[test]
    fn vocabulary_is_sorted_and_order_independent() {
        let forward = LabelVocabulary::from_labels(["virginica", "setosa", "versicolor", "setosa"]);
        let backward = LabelVocabulary::from_labels(["versicolor", "setosa", "virginica"]);

        assert_eq!(forward, backward);
        assert_eq!(forward.labels(), ["setosa", "versicolor", "virginica"]);
        assert_eq!(forward.index_of("versicolor"), Some(1));
        assert_eq!(forward.index_of("unknown"), None);
        assert_eq!(forward.label(2), Some("virginica"));
    }

    #[test]
    fn preprocess_encodes_aligned_one_hot_rows() {
        let data = tagged_dataset(30);
        let mut rng = StdRng::seed_from_u64(3);
        let (batch, vocabulary) = preprocess(&data, &mut rng).unwrap();

        assert_eq!(batch.len(), 30);
        assert_eq!(vocabulary.len(), 3);
        for i in 0..batch.len() {
            let (features, label) = batch.row(i);
            assert_eq!(features.len(), 4);
            assert_eq!(label.len(), 3);
            assert_eq!(label.iter().filter(|&&v| v == 1.0).count(), 1);
            assert_eq!(label.iter().sum::<f64>(), 1.0);
            let hot = label.iter().position(|&v| v == 1.0).unwrap();
            assert_eq!(vocabulary.label(hot), Some(label_for_tag(features[0])));
        }
    }

    #[test]
    fn preprocess_follows_shuffle_order() {
        let data = tagged_dataset(20);
        let shuffled = shuffle(&data, &mut StdRng::seed_from_u64(11));
        let (batch, _) = preprocess(&data, &mut StdRng::seed_from_u64(11)).unwrap();

        let expected: Vec<f64> = shuffled.iter().map(|s| s.features[0]).collect();
        let actual: Vec<f64> = batch.features().iter().map(|f| f[0]).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn encode_rejects_labels_outside_vocabulary() {
        let vocabulary = LabelVocabulary::from_labels(["setosa"]);
        let rows = tagged_dataset(2);
        assert!(matches!(
            encode(&rows, &vocabulary),
            Err(DataError::UnknownLabel(label)) if label == "versicolor"
        ));
    }
}
