//! DIMSE (DICOM Message Service Element) core for the MPPS proxy
//!
//! This crate provides the protocol-adjacent pieces of the proxy that are not
//! the wire codec itself: the MPPS service (N-CREATE/N-SET dispatch), the
//! forward-rule evaluator, the crash-safe spool writer and its recovery
//! sweeper, and the live-forward path used when an upstream association is
//! already open.

pub mod association;
pub mod config;
pub mod error;
pub mod forward_rules;
pub mod live_forward;
pub mod mpps;
pub mod recovery;
pub mod scp;
pub mod spool;
pub mod types;

// Re-export commonly used types
pub use association::{AssociationParams, UpstreamAssociation};
pub use config::{ForwardRule, ProxyAeConfig, SpoolPaths};
pub use error::{DimseError, Result};
pub use forward_rules::ForwardRuleEvaluator;
pub use live_forward::LiveForwarder;
pub use mpps::MppsService;
pub use recovery::RecoverySweeper;
pub use scp::DimseScp;
pub use spool::SpoolWriter;
pub use types::{
    DimseKind, DimseResponse, DimseStatus, FanOutPolicy, ResponseSink, SessionContext,
};

/// DIMSE protocol version of this core.
pub const DIMSE_VERSION: &str = "0.1.0";

/// Default DICOM port (non-TLS).
pub const DEFAULT_DIMSE_PORT: u16 = 11112;

/// MPPS SOP Class UID.
pub const MPPS_SOP_CLASS_UID: &str = "1.2.840.10008.3.1.2.3.3";
