//! MPPS Service: dispatches one accepted N-CREATE-RQ/N-SET-RQ through
//! live-forward, or through the Forward-Rule Evaluator and the Spool Writer
//! (optionally via the Dose-SR transformer), under a fan-out policy (§4.1).

use std::sync::Arc;

use dicom_dictionary_std::tags;
use dicom_object::mem::InMemDicomObject;
use dicom_object::meta::FileMetaTableBuilder;
use tracing::warn;

use crate::config::{ForwardRule, ProxyAeConfig};
use crate::error::{DimseError, Result};
use crate::forward_rules::ForwardRuleEvaluator;
use crate::live_forward::{LiveForwarder, NoopResponseSink};
use crate::spool::SpoolWriter;
use crate::types::{DimseKind, DimseResponse, DimseStatus, FanOutPolicy, SessionContext};
use dimse_transform::DoseSrTransformer;

pub struct MppsService {
    evaluator: ForwardRuleEvaluator,
    spool: SpoolWriter,
    transformer: Arc<DoseSrTransformer>,
    fan_out_policy: FanOutPolicy,
}

impl MppsService {
    pub fn new(transformer: Arc<DoseSrTransformer>) -> Self {
        Self {
            evaluator: ForwardRuleEvaluator::new(),
            spool: SpoolWriter::new(),
            transformer,
            fan_out_policy: FanOutPolicy::default(),
        }
    }

    /// Handle one inbound N-CREATE-RQ or N-SET-RQ (§4.1). `Ok(None)` means
    /// the request was handed to the Live Forwarder and its response
    /// arrives asynchronously; `Ok(Some(response))` means a response should
    /// be written back to the peer now.
    pub async fn on_dimse_request(
        &self,
        session: &SessionContext,
        ae_config: &ProxyAeConfig,
        kind: DimseKind,
        command: &InMemDicomObject,
        data: &InMemDicomObject,
        transfer_syntax: &str,
    ) -> Result<Option<DimseResponse>> {
        let message_id = read_message_id(command)?;
        let (sop_class_uid, sop_instance_uid) = read_ids(kind, command)?;

        if let Some(forward_assoc) = session.forward_association.clone() {
            LiveForwarder::forward_spawn(
                forward_assoc,
                kind,
                sop_class_uid,
                sop_instance_uid,
                data.clone(),
                transfer_syntax.to_string(),
                Arc::new(NoopResponseSink),
            );
            return Ok(None);
        }

        let matched = self.evaluator.evaluate(
            &ae_config.rules,
            &session.calling_ae,
            &session.called_ae,
            &sop_class_uid,
            kind,
            data,
        );

        if matched.is_empty() {
            return Err(DimseError::NoMatchingRule);
        }

        for rule in &matched {
            for destination in &rule.destinations {
                let outcome = self
                    .dispatch_one(
                        ae_config,
                        rule,
                        destination,
                        kind,
                        &sop_instance_uid,
                        &session.calling_ae,
                        data,
                        transfer_syntax,
                    )
                    .await;

                if let Err(e) = outcome {
                    warn!(rule = %rule.name, destination, error = %e, "spool dispatch failed");
                    if self.fan_out_policy == FanOutPolicy::Strict {
                        return Err(e);
                    }
                }
            }
        }

        Ok(Some(DimseResponse {
            message_id,
            status: DimseStatus::Success,
            data: None,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_one(
        &self,
        ae_config: &ProxyAeConfig,
        rule: &ForwardRule,
        destination: &str,
        kind: DimseKind,
        sop_instance_uid: &str,
        calling_ae: &str,
        data: &InMemDicomObject,
        transfer_syntax: &str,
    ) -> Result<()> {
        match &rule.mpps2_dose_sr_template_uri {
            Some(template_uri) => {
                self.dispatch_dose_sr(
                    ae_config,
                    rule,
                    template_uri,
                    destination,
                    kind,
                    sop_instance_uid,
                    calling_ae,
                    data,
                    transfer_syntax,
                )
                .await
            }
            None => {
                self.dispatch_plain(
                    ae_config,
                    rule,
                    destination,
                    kind,
                    sop_instance_uid,
                    calling_ae,
                    data,
                    transfer_syntax,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_plain(
        &self,
        ae_config: &ProxyAeConfig,
        rule: &ForwardRule,
        destination: &str,
        kind: DimseKind,
        sop_instance_uid: &str,
        calling_ae: &str,
        data: &InMemDicomObject,
        transfer_syntax: &str,
    ) -> Result<()> {
        let base_dir = match kind {
            DimseKind::NCreateRq => &ae_config.spool.ncreate_dir,
            DimseKind::NSetRq => &ae_config.spool.nset_dir,
        };

        let fmi = FileMetaTableBuilder::new()
            .transfer_syntax(transfer_syntax)
            .media_storage_sop_class_uid(rule.sop_class_uid.as_str())
            .media_storage_sop_instance_uid(sop_instance_uid);

        let temp_path = self
            .spool
            .create(
                base_dir,
                destination,
                sop_instance_uid,
                fmi,
                data,
                calling_ae,
                rule.use_calling_aet.as_deref(),
            )
            .await?;

        self.spool.rename(&temp_path, sop_instance_uid, ".dcm").await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_dose_sr(
        &self,
        ae_config: &ProxyAeConfig,
        rule: &ForwardRule,
        template_uri: &str,
        destination: &str,
        kind: DimseKind,
        sop_instance_uid: &str,
        calling_ae: &str,
        data: &InMemDicomObject,
        transfer_syntax: &str,
    ) -> Result<()> {
        match kind {
            DimseKind::NCreateRq => {
                let fmi = FileMetaTableBuilder::new()
                    .transfer_syntax(transfer_syntax)
                    .media_storage_sop_class_uid(rule.sop_class_uid.as_str())
                    .media_storage_sop_instance_uid(sop_instance_uid);

                let temp_path = self
                    .spool
                    .create(
                        &ae_config.spool.dose_sr_dir,
                        destination,
                        sop_instance_uid,
                        fmi,
                        data,
                        calling_ae,
                        rule.use_calling_aet.as_deref(),
                    )
                    .await?;
                self.spool
                    .rename(&temp_path, sop_instance_uid, ".ncreate")
                    .await?;
                Ok(())
            }
            DimseKind::NSetRq => {
                let ncreate_path = ae_config
                    .spool
                    .dose_sr_dir
                    .join(destination)
                    .join(format!("{sop_instance_uid}.ncreate"));

                let ncreate_data = dicom_object::open_file(&ncreate_path)
                    .map_err(|_| DimseError::MissingNCreate(sop_instance_uid.to_string()))?
                    .into_inner();

                let (dose_sr_data, fmi, dose_iuid) = self
                    .transformer
                    .transform(
                        template_uri,
                        &ncreate_data,
                        data,
                        sop_instance_uid,
                        calling_ae,
                    )
                    .map_err(|e| DimseError::Transform(e.to_string()))?;

                let temp_path = self
                    .spool
                    .create(
                        &ae_config.spool.cstore_dir,
                        destination,
                        &dose_iuid,
                        fmi,
                        &dose_sr_data,
                        calling_ae,
                        rule.use_calling_aet.as_deref(),
                    )
                    .await?;
                self.spool.rename(&temp_path, &dose_iuid, ".dcm").await?;

                self.spool.delete(&ncreate_path).await;
                Ok(())
            }
        }
    }
}

fn read_message_id(command: &InMemDicomObject) -> Result<u16> {
    command
        .element(tags::MESSAGE_ID)
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .to_int::<u16>()
        .map_err(|e| DimseError::DicomObject(e.to_string()))
}

fn read_ids(kind: DimseKind, command: &InMemDicomObject) -> Result<(String, String)> {
    let (class_tag, instance_tag) = match kind {
        DimseKind::NCreateRq => (tags::AFFECTED_SOP_CLASS_UID, tags::AFFECTED_SOP_INSTANCE_UID),
        DimseKind::NSetRq => (tags::REQUESTED_SOP_CLASS_UID, tags::REQUESTED_SOP_INSTANCE_UID),
    };

    let sop_class_uid = command
        .element(class_tag)
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .to_str()
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .trim_end_matches('\0')
        .to_string();

    let sop_instance_uid = command
        .element(instance_tag)
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .to_str()
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .trim_end_matches('\0')
        .to_string();

    Ok((sop_class_uid, sop_instance_uid))
}
