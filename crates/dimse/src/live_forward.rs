//! Live Forwarder: issues MPPS requests directly on an already-open upstream
//! association instead of spooling to disk (§4.6).
//!
//! Dispatch does not block the calling association on the upstream
//! response: the request is handed to a detached task, and whatever arrives
//! (or fails) is logged rather than propagated, since by the time it
//! resolves the original N-CREATE/N-SET has already been accepted.

use std::sync::Arc;

use dicom_object::mem::InMemDicomObject;
use tracing::warn;

use crate::association::UpstreamAssociation;
use crate::types::{DimseKind, DimseResponse, ResponseSink};

/// A [`ResponseSink`] that discards the response. Placeholder until the SCP
/// shell can write the upstream response back onto the original association
/// (§4.8 is an ambient seam, not implemented by this core).
pub struct NoopResponseSink;

impl ResponseSink for NoopResponseSink {
    fn accept(&self, _response: DimseResponse) {}
}

pub struct LiveForwarder;

impl LiveForwarder {
    /// Spawn the upstream N-CREATE/N-SET without awaiting its response.
    pub fn forward_spawn(
        assoc: Arc<dyn UpstreamAssociation>,
        kind: DimseKind,
        sop_class_uid: String,
        sop_instance_uid: String,
        data: InMemDicomObject,
        transfer_syntax: String,
        sink: Arc<dyn ResponseSink>,
    ) {
        let log_iuid = sop_instance_uid.clone();
        tokio::spawn(async move {
            let result = match kind {
                DimseKind::NCreateRq => {
                    assoc
                        .issue_ncreate(&sop_class_uid, &sop_instance_uid, data, &transfer_syntax, sink)
                        .await
                }
                DimseKind::NSetRq => {
                    assoc
                        .issue_nset(&sop_class_uid, &sop_instance_uid, data, &transfer_syntax, sink)
                        .await
                }
            };
            if let Err(e) = result {
                warn!(sop_instance_uid = %log_iuid, error = %e, "live-forward upstream request failed");
            }
        });
    }
}
