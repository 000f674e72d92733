//! Scenario-based tests for workload-submit

mod accelerator_discovery;
mod cpu_only_build;
mod quota_reconcile;
mod request_validation;
