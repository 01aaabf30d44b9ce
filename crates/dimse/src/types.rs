//! Per-association session context and DIMSE request/response shapes.
//!
//! Replaces the property-bag pattern with a strongly-typed [`SessionContext`]:
//! the forward association and rename suffix are explicit fields/arguments
//! rather than stringly-keyed properties (§9).

use std::sync::Arc;

use dicom_object::InMemDicomObject;

use crate::association::UpstreamAssociation;

/// The two MPPS DIMSE request kinds this core dispatches; anything else is
/// delegated to a default handler (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseKind {
    NCreateRq,
    NSetRq,
}

impl DimseKind {
    /// The suffix used when spooling the deferred first half of an MPPS
    /// exchange under a Dose-SR rule (`.ncreate`), or `None` for N-SET which
    /// never spools an intermediate of its own.
    pub fn intermediate_suffix(&self) -> Option<&'static str> {
        match self {
            DimseKind::NCreateRq => Some(".ncreate"),
            DimseKind::NSetRq => None,
        }
    }
}

/// Outcome status a response mirrors back to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    Success,
    Failure(u16),
}

/// A synthesized DIMSE response: the command mirrored back to the peer plus
/// an optional success dataset.
#[derive(Debug, Clone)]
pub struct DimseResponse {
    pub message_id: u16,
    pub status: DimseStatus,
    pub data: Option<InMemDicomObject>,
}

/// Fan-out policy for spooling a request across multiple matched destinations
/// (resolves Open Question 1, §4.1). Only `Strict` is implemented by this
/// core; the other variants are named so a future caller can select them
/// without re-deriving the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOutPolicy {
    /// Abort remaining destinations on the first spool failure; files already
    /// written for prior destinations are left in place (no rollback).
    #[default]
    Strict,
    /// Not implemented: would roll back already-written destinations on
    /// failure.
    AllOrNothing,
    /// Not implemented: would continue spooling to remaining destinations
    /// after a failure and report a partial result.
    BestEffort,
}

/// Receives the DIMSE response to a request issued on an upstream
/// association, replacing an anonymous response-handler object (§9). One
/// implementation writes the response back onto the accepted association
/// under the original presentation context.
pub trait ResponseSink: Send + Sync {
    fn accept(&self, response: DimseResponse);
}

/// Per-association state owned exclusively by the worker task handling that
/// association. `forward_association` is `Some` only when this session has
/// an upstream counterpart already attached (live-forward mode, §4.6).
pub struct SessionContext {
    pub calling_ae: String,
    pub called_ae: String,
    pub forward_association: Option<Arc<dyn UpstreamAssociation>>,
}

impl SessionContext {
    pub fn new(calling_ae: impl Into<String>, called_ae: impl Into<String>) -> Self {
        Self {
            calling_ae: calling_ae.into(),
            called_ae: called_ae.into(),
            forward_association: None,
        }
    }

    pub fn with_forward_association(mut self, assoc: Arc<dyn UpstreamAssociation>) -> Self {
        self.forward_association = Some(assoc);
        self
    }

    pub fn is_live_forward(&self) -> bool {
        self.forward_association.is_some()
    }
}
