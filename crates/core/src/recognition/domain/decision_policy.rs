use thiserror::Error;

/// Display label for a prediction that did not clear the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("classifier returned an empty distribution")]
    EmptyDistribution,
    #[error("distribution has {distribution} classes but {labels} labels are known")]
    LabelCountMismatch { distribution: usize, labels: usize },
    #[error("probability at class {index} is not finite")]
    NonFinite { index: usize },
}

/// Arg-max of a classifier distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub identity: String,
    pub probability: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub prediction: Prediction,
    /// The identity when confident, otherwise [`UNKNOWN_LABEL`].
    pub label: String,
}

impl Decision {
    pub fn is_confident(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }
}

/// Resolves a probability distribution into a display label.
///
/// Pure: the result depends only on the inputs and the threshold.
#[derive(Clone, Copy, Debug)]
pub struct DecisionPolicy {
    confidence_threshold: f64,
}

impl DecisionPolicy {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn decide(&self, distribution: &[f64], labels: &[String]) -> Result<Decision, DecisionError> {
        if distribution.is_empty() {
            return Err(DecisionError::EmptyDistribution);
        }
        if distribution.len() != labels.len() {
            return Err(DecisionError::LabelCountMismatch {
                distribution: distribution.len(),
                labels: labels.len(),
            });
        }

        let mut best = 0;
        for (index, &p) in distribution.iter().enumerate() {
            if !p.is_finite() {
                return Err(DecisionError::NonFinite { index });
            }
            // Strict comparison keeps the lowest index on ties.
            if p > distribution[best] {
                best = index;
            }
        }

        let probability = distribution[best];
        let identity = labels[best].clone();
        let label = if probability > self.confidence_threshold {
            identity.clone()
        } else {
            UNKNOWN_LABEL.to_string()
        };

        Ok(Decision {
            prediction: Prediction {
                class_index: best,
                identity,
                probability,
            },
            label,
        })
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_confident_prediction_keeps_identity() {
        let policy = DecisionPolicy::default();
        let decision = policy
            .decide(&[0.91, 0.09], &labels(&["Alice", "Bob"]))
            .unwrap();
        assert_eq!(decision.label, "Alice");
        assert_eq!(decision.prediction.identity, "Alice");
        assert_eq!(decision.prediction.class_index, 0);
        assert_relative_eq!(decision.prediction.probability, 0.91);
        assert!(decision.is_confident());
    }

    #[test]
    fn test_high_threshold_yields_unknown() {
        let policy = DecisionPolicy::new(0.95);
        let decision = policy
            .decide(&[0.91, 0.09], &labels(&["Alice", "Bob"]))
            .unwrap();
        assert_eq!(decision.label, UNKNOWN_LABEL);
        assert_eq!(decision.prediction.identity, "Alice");
        assert!(!decision.is_confident());
    }

    #[rstest]
    #[case(0.6, 0.6)]
    #[case(0.0, 0.0)]
    #[case(1.0, 1.0)]
    fn test_probability_equal_to_threshold_is_unknown(#[case] threshold: f64, #[case] p: f64) {
        let policy = DecisionPolicy::new(threshold);
        let decision = policy.decide(&[p], &labels(&["Alice"])).unwrap();
        assert_eq!(decision.label, UNKNOWN_LABEL);
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let policy = DecisionPolicy::new(0.3);
        let decision = policy
            .decide(&[0.1, 0.45, 0.45], &labels(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(decision.prediction.class_index, 1);
        assert_eq!(decision.label, "B");
    }

    #[test]
    fn test_decide_is_pure() {
        let policy = DecisionPolicy::default();
        let names = labels(&["Alice", "Bob", "Carol"]);
        let distribution = [0.2, 0.7, 0.1];
        let first = policy.decide(&distribution, &names).unwrap();
        let second = policy.decide(&distribution, &names).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::empty(vec![], vec![], DecisionError::EmptyDistribution)]
    #[case::mismatch(
        vec![0.5, 0.5],
        vec!["A"],
        DecisionError::LabelCountMismatch { distribution: 2, labels: 1 }
    )]
    #[case::nan(vec![0.2, f64::NAN], vec!["A", "B"], DecisionError::NonFinite { index: 1 })]
    fn test_invalid_inputs_are_errors(
        #[case] distribution: Vec<f64>,
        #[case] names: Vec<&str>,
        #[case] expected: DecisionError,
    ) {
        let policy = DecisionPolicy::default();
        assert_eq!(
            policy.decide(&distribution, &labels(&names)).unwrap_err(),
            expected
        );
    }
}
