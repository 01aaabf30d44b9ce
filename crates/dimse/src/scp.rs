//! SCP (Service Class Provider) shell: accepts associations and dispatches
//! decoded MPPS requests to the MPPS Service (§4.8).
//!
//! The PDU codec itself is out of scope (§1); this module documents the
//! seam — [`AssociationRead`]/[`AssociationWrite`] — so a `dicom-ul`-backed
//! listener can be dropped in later without changing [`MppsService`] or the
//! association accounting below.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dicom_object::mem::InMemDicomObject;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::ProxyAeConfig;
use crate::error::Result;
use crate::mpps::MppsService;
use crate::types::{DimseKind, DimseResponse, SessionContext};

/// Reads decoded DIMSE command/data pairs off an accepted association.
#[async_trait]
pub trait AssociationRead: Send {
    async fn next_request(
        &mut self,
    ) -> Result<Option<(DimseKind, InMemDicomObject, InMemDicomObject, String)>>;
}

/// Writes a synthesized response back onto an accepted association.
#[async_trait]
pub trait AssociationWrite: Send + Sync {
    async fn write_response(&self, response: DimseResponse) -> Result<()>;
}

/// Accepts associations for one proxy AE and dispatches decoded requests to
/// the MPPS Service, within a bounded number of concurrent associations
/// (§5).
pub struct DimseScp {
    ae_config: ProxyAeConfig,
    mpps: Arc<MppsService>,
    active_associations: Arc<RwLock<u32>>,
}

impl DimseScp {
    pub fn new(ae_config: ProxyAeConfig, mpps: Arc<MppsService>) -> Self {
        Self {
            ae_config,
            mpps,
            active_associations: Arc::new(RwLock::new(0)),
        }
    }

    /// Bind and accept associations until the listener errors.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(self.ae_config.bind_addr, self.ae_config.port);
        let listener = TcpListener::bind(addr).await?;

        info!(addr = %addr, aet = %self.ae_config.local_aet, "DIMSE SCP listening");

        let scp = Arc::new(self);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!(peer = %peer_addr, "accepted connection");

                    {
                        let active = scp.active_associations.read().await;
                        if *active >= scp.ae_config.max_associations {
                            warn!(peer = %peer_addr, "max associations reached, rejecting");
                            drop(stream);
                            continue;
                        }
                    }

                    let scp = Arc::clone(&scp);
                    tokio::spawn(async move {
                        scp.accept_association(stream, peer_addr).await;
                    });
                }
                Err(e) => error!(error = %e, "error accepting connection"),
            }
        }
    }

    async fn accept_association(
        self: Arc<Self>,
        _stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) {
        {
            let mut active = self.active_associations.write().await;
            *active += 1;
        }

        info!(
            peer = %peer_addr,
            "association accepted; PDU negotiation is out of scope for this core"
        );

        {
            let mut active = self.active_associations.write().await;
            *active -= 1;
        }
    }

    /// Dispatch one decoded request within an accepted association. Called
    /// by an [`AssociationRead`] implementation once the wire layer exists.
    pub async fn handle_request(
        &self,
        session: &SessionContext,
        kind: DimseKind,
        command: &InMemDicomObject,
        data: &InMemDicomObject,
        transfer_syntax: &str,
    ) -> Result<Option<DimseResponse>> {
        self.mpps
            .on_dimse_request(session, &self.ae_config, kind, command, data, transfer_syntax)
            .await
    }
}
