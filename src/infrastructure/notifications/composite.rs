use async_trait::async_trait;

use crate::domain::entities::calibration::CalibrationOutcome;
use crate::domain::ports::notifier::{NotificationError, ThresholdNotifier};

/// Forwards threshold notifications to multiple notifiers.
///
/// Calls each notifier in order and returns the first error encountered,
/// but always calls all notifiers.
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn ThresholdNotifier>>,
}

impl CompositeNotifier {
    #[must_use]
    pub fn new(notifiers: Vec<Box<dyn ThresholdNotifier>>) -> Self {
        Self { notifiers }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ThresholdNotifier for CompositeNotifier {
    async fn threshold_applied(
        &self,
        outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.threshold_applied(outcome).await {
                tracing::warn!("Threshold notification failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ThresholdNotifier for CountingNotifier {
        async fn threshold_applied(
            &self,
            _outcome: &CalibrationOutcome,
        ) -> Result<(), NotificationError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl ThresholdNotifier for FailingNotifier {
        async fn threshold_applied(
            &self,
            _outcome: &CalibrationOutcome,
        ) -> Result<(), NotificationError> {
            Err(NotificationError::SendFailed("test error".to_string()))
        }
    }

    fn make_outcome() -> CalibrationOutcome {
        CalibrationOutcome {
            calibrated_at: Utc::now(),
            idle_baseline: 1.4,
            threshold: 5.0,
            stability_bound: 1.0,
            samples_analyzed: 2880,
        }
    }

    fn counting(count: &Arc<AtomicUsize>) -> Box<dyn ThresholdNotifier> {
        Box::new(CountingNotifier {
            count: Arc::clone(count),
        })
    }

    #[tokio::test]
    async fn empty_composite_succeeds() {
        let composite = CompositeNotifier::default();
        assert!(composite.is_empty());
        assert!(composite.threshold_applied(&make_outcome()).await.is_ok());
    }

    #[tokio::test]
    async fn multiple_notifiers_all_called() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeNotifier::new(vec![counting(&count), counting(&count)]);
        assert_eq!(composite.len(), 2);
        assert!(composite.threshold_applied(&make_outcome()).await.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_from_one_still_calls_others() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeNotifier::new(vec![
            Box::new(FailingNotifier),
            counting(&count),
        ]);
        let result = composite.threshold_applied(&make_outcome()).await;
        assert!(matches!(result, Err(NotificationError::SendFailed(_))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
