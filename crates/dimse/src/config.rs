//! Configuration types for a proxy Application Entity: bind parameters,
//! forward rules and spool directory layout (§6).

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::DEFAULT_DIMSE_PORT;

/// Configuration for one proxy Application Entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAeConfig {
    /// Local Application Entity Title this proxy presents to peers.
    pub local_aet: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_associations")]
    pub max_associations: u32,

    /// Forward rules evaluated in configured priority order (§4.2).
    #[serde(default)]
    pub rules: Vec<ForwardRule>,

    /// Spool directory layout for this AE's services (§6).
    pub spool: SpoolPaths,

    /// Upstream nodes this AE may issue live-forward DIMSE requests to,
    /// keyed by AE title.
    #[serde(default)]
    pub upstreams: std::collections::HashMap<String, RemoteNode>,
}

/// Absolute spool roots for each DIMSE service this core touches (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolPaths {
    pub cstore_dir: PathBuf,
    pub ncreate_dir: PathBuf,
    pub nset_dir: PathBuf,
    pub dose_sr_dir: PathBuf,
    #[serde(default = "default_naction_dir")]
    pub naction_dir: PathBuf,
    #[serde(default = "default_nevent_dir")]
    pub nevent_dir: PathBuf,
}

/// A single forwarding rule: predicate plus destinations (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRule {
    pub name: String,
    /// Calling AE this rule matches, or `None` to match any.
    #[serde(default)]
    pub calling_aet: Option<String>,
    /// Called AE this rule matches, or `None` to match any.
    #[serde(default)]
    pub called_aet: Option<String>,
    /// SOP Class UID this rule matches; for this core, the MPPS SOP class.
    pub sop_class_uid: String,
    /// Ordered, non-empty list of destination AE titles.
    pub destinations: Vec<String>,
    /// When set, spooled requests are tagged with this AE instead of the
    /// calling AE (sidecar `use-calling-aet`, §4.3).
    #[serde(default)]
    pub use_calling_aet: Option<String>,
    /// When set, this rule converts the MPPS exchange into a Dose SR via the
    /// named template URI instead of forwarding the MPPS objects as-is
    /// (§4.4).
    #[serde(default)]
    pub mpps2_dose_sr_template_uri: Option<String>,
}

/// A remote DICOM node this proxy can open an upstream association to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNode {
    pub ae_title: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ProxyAeConfig {
    /// Validate this AE's configuration eagerly, before accepting
    /// associations (ambient stack, §1).
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.local_aet.trim().is_empty() || self.local_aet.len() > 16 {
            return Err(crate::error::DimseError::config(
                "local_aet must be 1-16 characters",
            ));
        }
        if self.port == 0 {
            return Err(crate::error::DimseError::config("port must be non-zero"));
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        for (name, node) in &self.upstreams {
            node.validate()
                .map_err(|e| crate::error::DimseError::config(format!("upstream {name}: {e}")))?;
        }
        Ok(())
    }
}

impl ForwardRule {
    fn validate(&self) -> crate::error::Result<()> {
        if self.destinations.is_empty() {
            return Err(crate::error::DimseError::config(format!(
                "rule '{}' has no destinations",
                self.name
            )));
        }
        if self.sop_class_uid.trim().is_empty() {
            return Err(crate::error::DimseError::config(format!(
                "rule '{}' has an empty sop_class_uid",
                self.name
            )));
        }
        Ok(())
    }

    /// Whether this rule matches the given calling/called AE and SOP class.
    pub fn matches(&self, calling_aet: &str, called_aet: &str, sop_class_uid: &str) -> bool {
        if self.sop_class_uid != sop_class_uid {
            return false;
        }
        if let Some(expected) = &self.calling_aet {
            if expected != calling_aet {
                return false;
            }
        }
        if let Some(expected) = &self.called_aet {
            if expected != called_aet {
                return false;
            }
        }
        true
    }
}

impl RemoteNode {
    pub fn new(ae_title: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ae_title: ae_title.into(),
            host: host.into(),
            port,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.ae_title.trim().is_empty() || self.ae_title.len() > 16 {
            return Err(crate::error::DimseError::config(
                "ae_title must be 1-16 characters",
            ));
        }
        if self.host.trim().is_empty() {
            return Err(crate::error::DimseError::config("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::error::DimseError::config("port must be non-zero"));
        }
        Ok(())
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    DEFAULT_DIMSE_PORT
}

fn default_max_associations() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_naction_dir() -> PathBuf {
    PathBuf::from("./spool/naction")
}

fn default_nevent_dir() -> PathBuf {
    PathBuf::from("./spool/nevent")
}
