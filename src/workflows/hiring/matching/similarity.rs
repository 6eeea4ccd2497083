use std::collections::{BTreeMap, HashSet};

use super::lexicon::tokenize;

/// Sparse, L2-normalised term vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    weights: BTreeMap<String, f64>,
}

impl TermVector {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }
}

/// TF-IDF model fitted over a small document set.
///
/// IDF is smoothed as `ln((1 + n) / (1 + df)) + 1`, so terms shared by every
/// document keep a weight of 1 instead of vanishing.
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    idf: BTreeMap<String, f64>,
    default_idf: f64,
}

impl TfIdfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let total = documents.len() as f64;
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();

        for document in documents {
            let unique: HashSet<String> = tokenize(document.as_ref()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let idf = document_frequency
            .into_iter()
            .map(|(term, df)| {
                let weight = ((1.0 + total) / (1.0 + df as f64)).ln() + 1.0;
                (term, weight)
            })
            .collect();

        Self {
            idf,
            default_idf: (1.0 + total).ln() + 1.0,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, document: &str) -> TermVector {
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for term in tokenize(document) {
            *counts.entry(term).or_insert(0.0) += 1.0;
        }

        let mut weights: BTreeMap<String, f64> = counts
            .into_iter()
            .map(|(term, tf)| {
                let idf = self.idf.get(&term).copied().unwrap_or(self.default_idf);
                (term, tf * idf)
            })
            .collect();

        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in weights.values_mut() {
                *weight /= norm;
            }
        }

        TermVector { weights }
    }
}

/// Cosine similarity of two term vectors, clipped to `[0, 1]`.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .weights
        .iter()
        .map(|(term, weight)| weight * large.weight(term))
        .sum();
    let norm_a = a.weights.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b = b.weights.values().map(|w| w * w).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Pairwise TF-IDF similarity with the model fitted over both texts.
pub fn text_similarity(left: &str, right: &str) -> f64 {
    let vectorizer = TfIdfVectorizer::fit(&[left, right]);
    let a = vectorizer.transform(left);
    let b = vectorizer.transform(right);
    cosine_similarity(&a, &b)
}
