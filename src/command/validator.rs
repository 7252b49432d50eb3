//! Command validator - checks a request against the fleet before dispatch

use crate::fleet::FleetBackend;
use async_trait::async_trait;
use rcworker_shared::CommandRequest;
use std::sync::Arc;
use tracing::{error, info};

/// Result of validating a command request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// Why the request was rejected
    pub diagnostic: Option<String>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self {
            passed: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Decides whether a command request may be submitted
#[async_trait]
pub trait CommandValidator: Send + Sync {
    async fn validate(&self, request: &CommandRequest) -> ValidationOutcome;
}

/// Validates requests against the documents and instances the fleet reports
///
/// Checks run in order (document, target platform, instance platforms) and
/// stop at the first failure. Backend errors never escape: they fail the check.
pub struct FleetValidator {
    fleet: Arc<dyn FleetBackend>,
}

impl FleetValidator {
    pub fn new(fleet: Arc<dyn FleetBackend>) -> Self {
        Self { fleet }
    }

    /// The document must exist and resolve with an OK status
    pub(crate) async fn validate_document(&self, request: &CommandRequest) -> ValidationOutcome {
        info!("[VALIDATOR] Validating command document");

        let Some(document) = request.document() else {
            return reject("Command document is empty".into());
        };

        match self.fleet.get_document(document).await {
            Ok(info) if info.is_ok() => ValidationOutcome::passed(),
            Ok(info) => reject(format!(
                "Command document {} is invalid (status {})",
                document, info.status_code
            )),
            Err(e) => reject(format!("Command document {} is invalid: {}", document, e)),
        }
    }

    /// The document must declare support for the request's target platform
    pub(crate) async fn validate_target_platform(
        &self,
        request: &CommandRequest,
    ) -> ValidationOutcome {
        info!("[VALIDATOR] Validating command target platform");

        let Some(target) = request.target_platform() else {
            return reject("Command target platform is empty".into());
        };

        let document = request.document().unwrap_or_default();
        let (supported, document_platforms) = match self.fleet.describe_document(document).await {
            Ok(description) => (
                description
                    .platform_types
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(target)),
                description.platform_types.join("|"),
            ),
            Err(e) => (false, format!("<unavailable: {}>", e)),
        };

        if supported {
            ValidationOutcome::passed()
        } else {
            reject(format!(
                "Command target platform and document platform don't match\n\
                 Command target platform: {}\n\
                 Document target platform: {}",
                target, document_platforms
            ))
        }
    }

    /// Every instance the fleet reports must run the target platform
    pub(crate) async fn validate_instances(&self, request: &CommandRequest) -> ValidationOutcome {
        info!("[VALIDATOR] Validating target instances");

        if request.instance_ids.is_empty() {
            return reject("Command instance ids are empty".into());
        }

        let target = request.target_platform().unwrap_or_default();
        let instances = match self.fleet.describe_instances(&request.instance_ids).await {
            Ok(instances) => instances,
            Err(e) => {
                return reject(format!(
                    "Could not describe target instances {}: {}",
                    request.instance_ids.join("|"),
                    e
                ))
            }
        };

        let mismatched: Vec<String> = instances
            .iter()
            .filter(|i| !i.platform_type.eq_ignore_ascii_case(target))
            .map(|i| format!("InstanceId: {} - Platform: {}", i.instance_id, i.platform_type))
            .collect();

        if mismatched.is_empty() {
            ValidationOutcome::passed()
        } else {
            reject(format!(
                "Command target platform and instances' platform don't match\n\
                 Command target platform: {}\n\
                 Instances target platform: {}",
                target,
                mismatched.join("|")
            ))
        }
    }
}

#[async_trait]
impl CommandValidator for FleetValidator {
    async fn validate(&self, request: &CommandRequest) -> ValidationOutcome {
        let outcome = self.validate_document(request).await;
        if !outcome.passed {
            return outcome;
        }

        let outcome = self.validate_target_platform(request).await;
        if !outcome.passed {
            return outcome;
        }

        self.validate_instances(request).await
    }
}

fn reject(diagnostic: String) -> ValidationOutcome {
    error!("[VALIDATOR] {}", diagnostic);
    ValidationOutcome::failed(diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::mock::ScriptedFleet;
    use std::collections::BTreeMap;

    fn request(instances: &[&str], document: Option<&str>, platform: Option<&str>) -> CommandRequest {
        let mut parameters = BTreeMap::new();
        parameters.insert("commands".to_string(), vec!["echo hi".to_string()]);

        CommandRequest {
            instance_ids: instances.iter().map(|i| i.to_string()).collect(),
            document: document.map(str::to_string),
            parameters,
            target_platform: platform.map(str::to_string),
        }
    }

    fn validator(fleet: ScriptedFleet) -> (FleetValidator, Arc<ScriptedFleet>) {
        let fleet = Arc::new(fleet);
        (FleetValidator::new(fleet.clone()), fleet)
    }

    #[tokio::test]
    async fn test_null_document_fails_without_backend() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]));

        let outcome = v.validate(&request(&["i-1"], None, Some("Linux"))).await;
        assert!(!outcome.passed);
        assert!(fleet.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_fails_without_backend() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]));

        let outcome = v.validate_document(&request(&["i-1"], Some(""), Some("Linux"))).await;
        assert!(!outcome.passed);
        assert!(fleet.calls().is_empty());
    }

    #[tokio::test]
    async fn test_document_not_ok_fails() {
        let mut scripted = ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]);
        scripted.document_status = Some(404);
        let (v, fleet) = validator(scripted);

        let outcome = v.validate(&request(&["i-1"], Some("doc-A"), Some("Linux"))).await;
        assert!(!outcome.passed);
        assert!(outcome.diagnostic.unwrap().contains("doc-A"));
        // Short-circuits before the platform check
        assert_eq!(fleet.calls(), vec!["get_document"]);
    }

    #[tokio::test]
    async fn test_document_backend_error_fails() {
        let mut scripted = ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]);
        scripted.document_status = None;
        let (v, _) = validator(scripted);

        let outcome = v.validate_document(&request(&["i-1"], Some("doc-A"), Some("Linux"))).await;
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_document_ok_passes() {
        let (v, _) = validator(ScriptedFleet::new(&["Linux"], &[]));

        let outcome = v.validate_document(&request(&[], Some("doc-A"), None)).await;
        assert_eq!(outcome, ValidationOutcome::passed());
    }

    #[tokio::test]
    async fn test_empty_target_platform_fails_without_backend() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]));

        let outcome = v
            .validate_target_platform(&request(&["i-1"], Some("doc-A"), Some("")))
            .await;
        assert!(!outcome.passed);

        let outcome = v
            .validate_target_platform(&request(&["i-1"], Some("doc-A"), None))
            .await;
        assert!(!outcome.passed);
        assert!(fleet.calls().is_empty());
    }

    #[tokio::test]
    async fn test_target_platform_case_insensitive() {
        let (v, _) = validator(ScriptedFleet::new(&["Windows"], &[]));

        let outcome = v
            .validate_target_platform(&request(&["i-1"], Some("doc-A"), Some("windows")))
            .await;
        assert!(outcome.passed);
    }

    #[tokio::test]
    async fn test_target_platform_not_declared() {
        let (v, _) = validator(ScriptedFleet::new(&["Windows", "MacOS"], &[]));

        let outcome = v
            .validate_target_platform(&request(&["i-1"], Some("doc-A"), Some("Linux")))
            .await;
        assert!(!outcome.passed);

        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.contains("Command target platform: Linux"));
        assert!(diagnostic.contains("Document target platform: Windows|MacOS"));
    }

    #[tokio::test]
    async fn test_target_platform_backend_error_fails() {
        let mut scripted = ScriptedFleet::new(&["Linux"], &[]);
        scripted.document_platforms = None;
        let (v, _) = validator(scripted);

        let outcome = v
            .validate_target_platform(&request(&["i-1"], Some("doc-A"), Some("Linux")))
            .await;
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_empty_instances_fail_without_backend() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[]));

        let outcome = v.validate_instances(&request(&[], Some("doc-A"), Some("Linux"))).await;
        assert!(!outcome.passed);
        assert!(fleet.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_mismatched_instance_fails() {
        let (v, _) = validator(ScriptedFleet::new(
            &["Linux"],
            &[("i-1", "Linux"), ("i-2", "Windows"), ("i-3", "linux")],
        ));

        let outcome = v
            .validate_instances(&request(&["i-1", "i-2", "i-3"], Some("doc-A"), Some("Linux")))
            .await;
        assert!(!outcome.passed);

        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.contains("InstanceId: i-2 - Platform: Windows"));
        assert!(!diagnostic.contains("i-1"));
        assert!(!diagnostic.contains("i-3"));
    }

    #[tokio::test]
    async fn test_duplicate_instance_ids_checked_individually() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]));

        let outcome = v.validate(&request(&["i-1", "i-1"], Some("doc-A"), Some("Linux"))).await;
        assert!(outcome.passed);
        assert_eq!(
            fleet.calls(),
            vec!["get_document", "describe_document", "describe_instances"]
        );

        let (v, _) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Windows")]));
        let outcome = v
            .validate_instances(&request(&["i-1", "i-1"], Some("doc-A"), Some("Linux")))
            .await;
        assert!(!outcome.passed);

        let diagnostic = outcome.diagnostic.unwrap();
        assert_eq!(diagnostic.matches("InstanceId: i-1 - Platform: Windows").count(), 2);
    }

    #[tokio::test]
    async fn test_instances_backend_error_fails() {
        let mut scripted = ScriptedFleet::new(&["Linux"], &[]);
        scripted.instances = None;
        let (v, _) = validator(scripted);

        let outcome = v
            .validate_instances(&request(&["i-1"], Some("doc-A"), Some("Linux")))
            .await;
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_matching_request_passes_all_checks() {
        let (v, fleet) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Linux")]));

        let outcome = v.validate(&request(&["i-1"], Some("doc-A"), Some("Linux"))).await;
        assert!(outcome.passed);
        assert_eq!(
            fleet.calls(),
            vec!["get_document", "describe_document", "describe_instances"]
        );
    }

    #[tokio::test]
    async fn test_instance_on_wrong_platform_fails() {
        let (v, _) = validator(ScriptedFleet::new(&["Linux"], &[("i-1", "Windows")]));

        let outcome = v.validate(&request(&["i-1"], Some("doc-A"), Some("Linux"))).await;
        assert!(!outcome.passed);
    }
}
