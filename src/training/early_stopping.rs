//! Early stopping on a watched evaluation metric

/// Tracks the best value of a metric and signals once it has not improved
/// for more than `patience` rounds.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_value: Option<f64>,
    best_round: usize,
    current_round: usize,
    higher_is_better: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, higher_is_better: bool) -> Self {
        Self {
            patience,
            best_value: None,
            best_round: 0,
            current_round: 0,
            higher_is_better,
        }
    }

    /// Record the metric of the current round.
    ///
    /// Returns `true` once `patience` rounds have passed without improvement.
    /// NaN values never count as improvement.
    pub fn should_stop(&mut self, value: f64) -> bool {
        let is_improvement = match self.best_value {
            _ if value.is_nan() => false,
            None => true,
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        };

        if is_improvement {
            self.best_value = Some(value);
            self.best_round = self.current_round;
        }

        self.current_round += 1;
        self.current_round - self.best_round > self.patience
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Zero-based round at which the best value was seen
    pub fn best_round(&self) -> usize {
        self.best_round
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_stop_while_improving() {
        let mut es = EarlyStopping::new(2, false);
        for v in [1.0, 0.9, 0.8, 0.7] {
            assert!(!es.should_stop(v));
        }
        assert_eq!(es.best_round(), 3);
    }

    #[test]
    fn test_stops_after_patience() {
        let mut es = EarlyStopping::new(2, false);
        assert!(!es.should_stop(0.5));
        assert!(!es.should_stop(0.6));
        assert!(es.should_stop(0.6));
        assert_eq!(es.best_round(), 0);
        assert_eq!(es.best_value(), Some(0.5));
    }

    #[test]
    fn test_higher_is_better() {
        let mut es = EarlyStopping::new(1, true);
        assert!(!es.should_stop(0.7));
        assert!(!es.should_stop(0.9));
        assert!(es.should_stop(0.8));
        assert_eq!(es.best_round(), 1);
        assert_eq!(es.current_round(), 3);
    }

    #[test]
    fn test_nan_is_never_best() {
        let mut es = EarlyStopping::new(5, true);
        es.should_stop(f64::NAN);
        assert!(es.best_value().is_none());
        es.should_stop(0.4);
        assert_eq!(es.best_round(), 1);
    }
}
