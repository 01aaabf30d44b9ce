//! Forward-rule evaluation: selects rules and resolves destination AE titles
//! for an inbound request (§4.2).

use dicom_object::mem::InMemDicomObject;

use crate::config::ForwardRule;
use crate::types::DimseKind;

/// Matches an accepted session's (calling AE, called AE, SOP class, DIMSE
/// kind) against a proxy AE's configured rules.
#[derive(Debug, Clone, Default)]
pub struct ForwardRuleEvaluator;

impl ForwardRuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Return the ordered list of rules (in configured priority order) whose
    /// predicate matches this request. `_kind` and `_data` are accepted for
    /// future per-request destination resolution (e.g. per-patient routing
    /// via `useCallingAET`) but this core's predicate depends only on AE
    /// titles and SOP class.
    pub fn evaluate<'a>(
        &self,
        rules: &'a [ForwardRule],
        calling_ae: &str,
        called_ae: &str,
        sop_class_uid: &str,
        _kind: DimseKind,
        _data: &InMemDicomObject,
    ) -> Vec<&'a ForwardRule> {
        rules
            .iter()
            .filter(|r| r.matches(calling_ae, called_ae, sop_class_uid))
            .collect()
    }
}
