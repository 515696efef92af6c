//! Offline evaluation of shortlists: relevance (NDCG@k), group fairness
//! (share of a protected group in the top-k) and catalogue coverage.

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub mean_ndcg: f64,
    pub mean_cdp_ratio: f64,
    pub coverage: f64,
}

#[derive(Debug, Clone)]
pub struct EvaluationHarness {
    k: usize,
}

impl EvaluationHarness {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Binary-relevance NDCG over the first `k` recommendations.
    pub fn ndcg_at_k<T: Eq + Hash>(&self, recommended: &[T], relevant: &AHashSet<T>) -> f64 {
        let gains: Vec<f64> = recommended
            .iter()
            .take(self.k)
            .map(|id| if relevant.contains(id) { 1.0 } else { 0.0 })
            .collect();

        let dcg = discounted(&gains);
        if dcg == 0.0 {
            return 0.0;
        }

        let mut ideal = gains;
        ideal.sort_by(|a, b| b.total_cmp(a));
        let idcg = discounted(&ideal);
        if idcg > 0.0 {
            dcg / idcg
        } else {
            0.0
        }
    }

    /// Fraction of the top-k whose `attr` equals `target`.
    pub fn cdp_ratio<T: Eq + Hash>(
        &self,
        recommended: &[T],
        attributes: &AHashMap<T, BTreeMap<String, String>>,
        attr: &str,
        target: &str,
    ) -> f64 {
        let top: Vec<&T> = recommended.iter().take(self.k).collect();
        if top.is_empty() {
            return 0.0;
        }
        let hits = top
            .iter()
            .filter(|id| {
                attributes
                    .get(**id)
                    .and_then(|a| a.get(attr))
                    .is_some_and(|v| v == target)
            })
            .count();
        hits as f64 / top.len() as f64
    }

    /// Share of the catalogue recommended at least once across all users.
    pub fn coverage<U, T>(&self, recommendations: &AHashMap<U, Vec<T>>, total_items: usize) -> f64
    where
        T: Eq + Hash,
    {
        if total_items == 0 {
            return 0.0;
        }
        let unique: AHashSet<&T> = recommendations
            .values()
            .flat_map(|recs| recs.iter().take(self.k))
            .collect();
        unique.len() as f64 / total_items as f64
    }

    /// Mean NDCG and mean CDP ratio over users, plus coverage over the
    /// attribute catalogue.
    pub fn run_benchmark<U, T>(
        &self,
        predictions: &AHashMap<U, Vec<T>>,
        ground_truth: &AHashMap<U, AHashSet<T>>,
        attributes: &AHashMap<T, BTreeMap<String, String>>,
        attr: &str,
        target: &str,
    ) -> BenchmarkReport
    where
        U: Eq + Hash,
        T: Eq + Hash,
    {
        let empty = AHashSet::new();
        let mut ndcg = Vec::with_capacity(predictions.len());
        let mut cdp = Vec::with_capacity(predictions.len());

        for (user, recs) in predictions {
            let truth = ground_truth.get(user).unwrap_or(&empty);
            ndcg.push(self.ndcg_at_k(recs, truth));
            cdp.push(self.cdp_ratio(recs, attributes, attr, target));
        }

        BenchmarkReport {
            mean_ndcg: mean(&ndcg),
            mean_cdp_ratio: mean(&cdp),
            coverage: self.coverage(predictions, attributes.len()),
        }
    }
}

fn discounted(gains: &[f64]) -> f64 {
    gains
        .iter()
        .enumerate()
        .map(|(i, g)| g / ((i + 2) as f64).log2())
        .sum()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&'static str]) -> AHashSet<&'static str> {
        ids.iter().copied().collect()
    }

    fn attrs() -> AHashMap<&'static str, BTreeMap<String, String>> {
        let mut map = AHashMap::new();
        for (id, gender) in [("101", "M"), ("102", "F"), ("103", "M"), ("104", "F")] {
            map.insert(id, BTreeMap::from([("gender".to_string(), gender.to_string())]));
        }
        map
    }

    #[test]
    fn test_ndcg_perfect_and_zero() {
        let harness = EvaluationHarness::new(3);
        assert!((harness.ndcg_at_k(&["a", "b", "c"], &set(&["a", "b"])) - 1.0).abs() < 1e-12);
        assert_eq!(harness.ndcg_at_k(&["x", "y"], &set(&["a"])), 0.0);
    }

    #[test]
    fn test_ndcg_penalizes_late_hits() {
        let harness = EvaluationHarness::new(3);
        // single hit at rank 2: (1/log2(3)) / 1
        let expected = 1.0 / 3f64.log2();
        let got = harness.ndcg_at_k(&["x", "a", "y"], &set(&["a"]));
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cdp_ratio() {
        let harness = EvaluationHarness::new(3);
        let ratio = harness.cdp_ratio(&["101", "102", "103", "104"], &attrs(), "gender", "F");
        assert!((ratio - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(harness.cdp_ratio::<&str>(&[], &attrs(), "gender", "F"), 0.0);
    }

    #[test]
    fn test_coverage() {
        let harness = EvaluationHarness::new(2);
        let mut recs = AHashMap::new();
        recs.insert(1, vec!["101", "102", "103"]);
        recs.insert(2, vec!["102", "101"]);
        assert!((harness.coverage(&recs, 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_run_benchmark() {
        let harness = EvaluationHarness::new(3);
        let mut predictions = AHashMap::new();
        predictions.insert("r1", vec!["101", "102", "103"]);
        predictions.insert("r2", vec!["104", "101"]);
        let mut truth = AHashMap::new();
        truth.insert("r1", set(&["101"]));
        truth.insert("r2", set(&["104"]));

        let report = harness.run_benchmark(&predictions, &truth, &attrs(), "gender", "F");
        assert!((report.mean_ndcg - 1.0).abs() < 1e-12);
        assert!((report.mean_cdp_ratio - (1.0 / 3.0 + 0.5) / 2.0).abs() < 1e-12);
        assert!((report.coverage - 1.0).abs() < 1e-12);
    }
}
