//! Integration tests for policy parsing against the built-in plugins.
//!
//! Covers pipeline order, fail-fast builds, rendering and registry misuse.

use std::sync::Arc;

use csr_approver::approvers::always::Always;
use csr_approver::decider::Decider;
use csr_approver::errors::PolicyError;
use csr_approver::inspectors::group::GroupInspector;
use csr_approver::inspectors::Inspectors;
use csr_approver::registry::Plugins;
use csr_approver::retry::RetryPolicy;

mod parse_tests {
    use super::*;

    #[test]
    fn test_builtin_policy_order() {
        let plugins = Plugins::with_builtins();
        let pipeline = Inspectors::parse(
            &plugins.inspectors,
            "username=^system:node:,group=system:nodes,usages=digital signature|client auth,pem",
        )
        .unwrap();

        let names: Vec<&str> = pipeline.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["username", "group", "usages", "pem"]);
        assert_eq!(
            pipeline.to_string(),
            "username=^system:node:,group=system:nodes,usages=digital signature|client auth,pem"
        );
    }

    #[test]
    fn test_unknown_inspector_lists_registered() {
        let plugins = Plugins::with_builtins();
        let err = Inspectors::parse(&plugins.inspectors, "group,subject=CN,pem").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not find inspector \"subject\", registered inspectors: group,pem,usages,username"
        );
    }

    #[test]
    fn test_builtin_config_error_aborts_build() {
        let plugins = Plugins::with_builtins();
        let err = Inspectors::parse(&plugins.inspectors, "group,username=(").unwrap_err();
        assert!(matches!(err, PolicyError::Configure { ref name, .. } if name == "username"));
    }

    #[test]
    fn test_pem_rejects_config() {
        let plugins = Plugins::with_builtins();
        assert!(Inspectors::parse(&plugins.inspectors, "pem=strict").is_err());
        assert!(Inspectors::parse(&plugins.inspectors, "pem").is_ok());
    }

    #[test]
    fn test_round_trip_by_name_and_config() {
        let plugins = Plugins::with_builtins();
        let first = Inspectors::parse(&plugins.inspectors, "group=ops,usages").unwrap();
        let again = Inspectors::parse(&plugins.inspectors, &first.to_string()).unwrap();
        assert_eq!(first, again);
    }
}

mod decider_policy_tests {
    use super::*;

    #[test]
    fn test_unknown_approver() {
        let plugins = Plugins::with_builtins();
        let err = Decider::from_policy(&plugins, "manual", "", RetryPolicy::default())
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "could not find approver \"manual\", registered approvers: always"
        );
    }

    #[test]
    fn test_approver_name_case_insensitive() {
        let plugins = Plugins::with_builtins();
        let d = Decider::from_policy(&plugins, "Always", "group", RetryPolicy::default()).unwrap();
        assert_eq!(d.approver_name(), Some("always"));
        assert_eq!(d.inspectors().to_string(), "group");
    }

    #[test]
    fn test_blank_approver_means_none() {
        let plugins = Plugins::with_builtins();
        let d = Decider::from_policy(&plugins, " ", "", RetryPolicy::default()).unwrap();
        assert_eq!(d.approver_name(), None);
        assert!(d.inspectors().is_empty());
    }
}

mod registration_tests {
    use super::*;

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_builtin_name_cannot_be_reused() {
        let plugins = Plugins::with_builtins();
        plugins
            .inspectors
            .register("GROUP", Arc::new(GroupInspector::default()));
    }

    #[test]
    #[should_panic(expected = "empty name")]
    fn test_empty_approver_name_panics() {
        Plugins::new().approvers.register("", Arc::new(Always));
    }

    #[test]
    fn test_custom_approver_registration() {
        let plugins = Plugins::new();
        plugins.approvers.register("Bootstrap", Arc::new(Always));
        assert_eq!(plugins.approvers.list(), vec!["bootstrap".to_string()]);
        assert!(plugins.inspectors.is_empty());
    }
}
