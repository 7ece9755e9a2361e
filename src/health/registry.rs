//! Health check registry and aggregation.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;

use crate::health::check::{HealthCheck, HealthCheckResult, HealthError, HealthStatus};
use crate::health::report::HealthReport;

/// Registry of named checks.
///
/// Registration happens at startup; `evaluate` may be called concurrently
/// from any number of requests and never blocks on registration.
pub struct HealthRegistry {
    checks: ArcSwap<Vec<Arc<dyn HealthCheck>>>,
    probe_timeout: Duration,
}

impl HealthRegistry {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            checks: ArcSwap::from_pointee(Vec::new()),
            probe_timeout,
        }
    }

    /// Add a check. Names must be unique.
    pub fn register(&self, check: impl HealthCheck) -> Result<(), HealthError> {
        self.register_arc(Arc::new(check))
    }

    pub fn register_arc(&self, check: Arc<dyn HealthCheck>) -> Result<(), HealthError> {
        let name = check.name().to_string();
        let mut duplicate = false;
        // The name check runs inside rcu so racing registrations see each other.
        self.checks.rcu(|checks| {
            duplicate = checks.iter().any(|c| c.name() == name);
            if duplicate {
                return Arc::clone(checks);
            }
            let mut next = Vec::clone(checks);
            next.push(check.clone());
            Arc::new(next)
        });
        if duplicate {
            return Err(HealthError::DuplicateCheck(name));
        }

        tracing::debug!(check = %name, tags = ?check.tags(), "Health check registered");
        Ok(())
    }

    pub fn check_names(&self) -> Vec<String> {
        self.checks.load().iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.load().is_empty()
    }

    /// Run every check tagged `tag` and aggregate the results.
    ///
    /// Probes run concurrently. A probe that errors, panics or exceeds the
    /// probe timeout counts as unhealthy.
    pub async fn evaluate(&self, tag: &str) -> HealthReport {
        let selected: Vec<Arc<dyn HealthCheck>> = self
            .checks
            .load()
            .iter()
            .filter(|c| c.has_tag(tag))
            .cloned()
            .collect();

        let timeout = self.probe_timeout;
        let probes = selected.into_iter().map(|check| async move {
            let name = check.name().to_string();
            let tags = check.tags().to_vec();
            let probe = tokio::spawn({
                let check = check.clone();
                async move { tokio::time::timeout(timeout, check.probe()).await }
            });

            let outcome = match probe.await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(HealthError::Timeout(timeout)),
                Err(_) => Err(HealthError::Panicked),
            };

            let status = match outcome {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => {
                    tracing::warn!(check = %name, error = %e, "Health check failed");
                    HealthStatus::Unhealthy
                }
            };

            HealthCheckResult { name, status, tags }
        });

        let results = join_all(probes).await;
        HealthReport::from_results(&results)
    }
}

impl std::fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("checks", &self.check_names())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::check::{LIVE, READY};
    use crate::health::checks::{FnCheck, SelfCheck};

    fn registry() -> HealthRegistry {
        HealthRegistry::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn one_unhealthy_check_fails_readiness() {
        let registry = registry();
        registry.register(SelfCheck::new()).unwrap();
        registry.register(FnCheck::fixed("sqlite", &[READY], false)).unwrap();
        registry.register(FnCheck::fixed("ratings-api", &[READY], true)).unwrap();

        let report = registry.evaluate(READY).await;

        assert!(!report.is_healthy());
        assert_eq!(report.details.len(), 3);
        assert_eq!(report.details["sqlite"], HealthStatus::Unhealthy);
        assert_eq!(report.details["self"], HealthStatus::Healthy);
        assert_eq!(report.details["ratings-api"], HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn liveness_ignores_dependencies() {
        let registry = registry();
        registry.register(SelfCheck::new()).unwrap();
        registry.register(FnCheck::fixed("sqlite", &[READY], false)).unwrap();

        let report = registry.evaluate(LIVE).await;

        assert!(report.is_healthy());
        assert_eq!(report.details.keys().collect::<Vec<_>>(), vec!["self"]);
    }

    #[tokio::test]
    async fn slow_probe_times_out_as_unhealthy() {
        let registry = registry();
        registry
            .register(FnCheck::new("slow", &[READY], || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }))
            .unwrap();

        let started = std::time::Instant::now();
        let report = registry.evaluate(READY).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.details["slow"], HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn panicking_probe_is_unhealthy_not_excluded() {
        let registry = registry();
        registry.register(SelfCheck::new()).unwrap();
        registry
            .register(FnCheck::new("boom", &[READY], || async {
                let explode = true;
                if explode {
                    panic!("probe exploded");
                }
                Ok(())
            }))
            .unwrap();

        let report = registry.evaluate(READY).await;

        assert!(!report.is_healthy());
        assert_eq!(report.details["boom"], HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn empty_selection_is_healthy() {
        let registry = registry();
        registry.register(FnCheck::fixed("sqlite", &[READY], false)).unwrap();

        let report = registry.evaluate(LIVE).await;
        assert!(report.is_healthy());
        assert!(report.details.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = registry();
        registry.register(SelfCheck::new()).unwrap();
        let err = registry.register(FnCheck::fixed("self", &[LIVE], true)).unwrap_err();
        assert!(matches!(err, HealthError::DuplicateCheck(name) if name == "self"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn racing_registrations_of_one_name_admit_exactly_one() {
        let registry = Arc::new(registry());
        let barrier = Arc::new(std::sync::Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry
                        .register(FnCheck::fixed("sqlite", &[READY], true))
                        .is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.check_names(), vec!["sqlite"]);
    }

    #[tokio::test]
    async fn concurrent_evaluations_agree() {
        let registry = Arc::new(registry());
        registry.register(SelfCheck::new()).unwrap();
        registry.register(FnCheck::fixed("sqlite", &[READY], false)).unwrap();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.evaluate(READY).await })
            })
            .collect();

        for handle in handles {
            let report = handle.await.unwrap();
            assert!(!report.is_healthy());
            assert_eq!(report.details.len(), 2);
        }
    }
}
