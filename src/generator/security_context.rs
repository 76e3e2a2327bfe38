//! Pod Security Standard contexts.

use super::types::{Capabilities, ContainerSecurityContext, PodSecurityContext, SeccompProfile};
use crate::config::PodSecurityStandard;

/// Pod-level context; only `restricted` needs one.
pub fn pod_security_context(pss: PodSecurityStandard) -> Option<PodSecurityContext> {
    match pss {
        PodSecurityStandard::Restricted => Some(PodSecurityContext {
            run_as_non_root: true,
            seccomp_profile: SeccompProfile {
                type_: "RuntimeDefault".to_string(),
            },
        }),
        PodSecurityStandard::Baseline | PodSecurityStandard::None => None,
    }
}

/// Container-level context, applied to main and init containers alike.
pub fn container_security_context(pss: PodSecurityStandard) -> Option<ContainerSecurityContext> {
    match pss {
        PodSecurityStandard::Restricted | PodSecurityStandard::Baseline => {
            Some(ContainerSecurityContext {
                allow_privilege_escalation: false,
                capabilities: Capabilities {
                    drop: vec!["ALL".to_string()],
                },
            })
        }
        PodSecurityStandard::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted() {
        let pod = pod_security_context(PodSecurityStandard::Restricted).unwrap();
        assert!(pod.run_as_non_root);
        assert_eq!(pod.seccomp_profile.type_, "RuntimeDefault");
        let container = container_security_context(PodSecurityStandard::Restricted).unwrap();
        assert!(!container.allow_privilege_escalation);
        assert_eq!(container.capabilities.drop, vec!["ALL"]);
    }

    #[test]
    fn test_baseline_is_container_only() {
        assert!(pod_security_context(PodSecurityStandard::Baseline).is_none());
        assert!(container_security_context(PodSecurityStandard::Baseline).is_some());
    }

    #[test]
    fn test_none() {
        assert!(pod_security_context(PodSecurityStandard::None).is_none());
        assert!(container_security_context(PodSecurityStandard::None).is_none());
    }
}
