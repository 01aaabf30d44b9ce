//! Upstream association shell (§4.7).
//!
//! The actual PDU exchange is out of scope (§1); this module documents the
//! seam — a trait plus a builder, grounded in the teacher's `DimseScu` and
//! `RemoteNode` — so a real `dicom-ul`-backed implementation can be dropped
//! in later without changing the Live Forwarder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dicom_object::mem::InMemDicomObject;
use tracing::{debug, info};

use crate::config::RemoteNode;
use crate::error::{DimseError, Result};
use crate::types::ResponseSink;

/// Connection parameters for an upstream association, mirroring the
/// teacher's `RemoteNode`.
#[derive(Debug, Clone)]
pub struct AssociationParams {
    pub calling_aet: String,
    pub called_aet: String,
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl AssociationParams {
    pub fn from_remote_node(calling_aet: impl Into<String>, node: &RemoteNode) -> Self {
        Self {
            calling_aet: calling_aet.into(),
            called_aet: node.ae_title.clone(),
            host: node.host.clone(),
            port: node.port,
            connect_timeout: Duration::from_millis(node.connect_timeout_ms),
        }
    }
}

/// Issues N-CREATE/N-SET on an already-negotiated upstream association. The
/// Live Forwarder does not block on the response; implementations invoke
/// `sink` asynchronously once the upstream RSP arrives.
#[async_trait]
pub trait UpstreamAssociation: Send + Sync {
    async fn issue_ncreate(
        &self,
        sop_class_uid: &str,
        sop_instance_uid: &str,
        data: InMemDicomObject,
        transfer_syntax: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<()>;

    async fn issue_nset(
        &self,
        sop_class_uid: &str,
        sop_instance_uid: &str,
        data: InMemDicomObject,
        transfer_syntax: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<()>;
}

/// Default `UpstreamAssociation`. Without the wire layer this core does not
/// implement, it issues requests as a simulated round trip: the request is
/// accepted, and a synthesized success response is handed to the sink after
/// the association would plausibly have completed. Real deployments replace
/// this with a `dicom-ul`-backed implementation against the same trait.
pub struct SimulatedUpstreamAssociation {
    params: AssociationParams,
}

impl SimulatedUpstreamAssociation {
    pub fn new(params: AssociationParams) -> Self {
        Self { params }
    }

    async fn simulate(&self, op: &str, sop_instance_uid: &str, sink: Arc<dyn ResponseSink>) {
        debug!(
            op,
            sop_instance_uid,
            called_aet = %self.params.called_aet,
            "issuing upstream DIMSE request"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
        sink.accept(crate::types::DimseResponse {
            message_id: 1,
            status: crate::types::DimseStatus::Success,
            data: None,
        });
    }
}

#[async_trait]
impl UpstreamAssociation for SimulatedUpstreamAssociation {
    async fn issue_ncreate(
        &self,
        _sop_class_uid: &str,
        sop_instance_uid: &str,
        _data: InMemDicomObject,
        _transfer_syntax: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<()> {
        self.simulate("N-CREATE", sop_instance_uid, sink).await;
        Ok(())
    }

    async fn issue_nset(
        &self,
        _sop_class_uid: &str,
        sop_instance_uid: &str,
        _data: InMemDicomObject,
        _transfer_syntax: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<()> {
        self.simulate("N-SET", sop_instance_uid, sink).await;
        Ok(())
    }
}

/// Builder for [`SimulatedUpstreamAssociation`], mirroring the teacher's
/// `ScuBuilder`.
pub struct UpstreamAssociationBuilder {
    params: Option<AssociationParams>,
}

impl UpstreamAssociationBuilder {
    pub fn new() -> Self {
        Self { params: None }
    }

    pub fn params(mut self, params: AssociationParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn build(self) -> Result<SimulatedUpstreamAssociation> {
        let params = self
            .params
            .ok_or_else(|| DimseError::config("association params are required"))?;
        if params.called_aet.trim().is_empty() {
            return Err(DimseError::config("called_aet must not be empty"));
        }
        info!(called_aet = %params.called_aet, "built upstream association");
        Ok(SimulatedUpstreamAssociation::new(params))
    }
}

impl Default for UpstreamAssociationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
