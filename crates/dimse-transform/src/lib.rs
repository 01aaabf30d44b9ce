//! MPPS-to-Dose-SR transform: merges the two halves of an MPPS exchange,
//! projects them to DICOM JSON, runs a JOLT template, and rebuilds a Dose SR
//! dataset with fresh identifiers (§4.4).
//!
//! Grounded in the teacher's `harmony_transform::JoltTransformEngine` (JOLT
//! application) and `dicom_json_tool` (DICOM<->JSON projection, Part 10
//! write-out).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::mem::InMemDicomObject;
use dicom_object::meta::FileMetaTableBuilder;
use fluvio_jolt::{transform, TransformSpec};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// SOP Class UID for an X-Ray Radiation Dose Structured Report.
pub const XRAY_RADIATION_DOSE_SR_SOP_CLASS_UID: &str = "1.2.840.10008.5.1.4.1.1.88.67";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to read JOLT template file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse JOLT template JSON: {0}")]
    SpecParse(#[from] serde_json::Error),
    #[error("DICOM JSON conversion error: {0}")]
    Json(String),
    #[error("DICOM object error: {0}")]
    DicomObject(String),
    #[error("JOLT transformation failed: {0}")]
    TransformFailed(String),
    #[error("JOLT output is not a JSON object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// A compiled JOLT spec, ready to apply to a DICOM JSON projection.
pub struct CompiledTemplate {
    spec: TransformSpec,
}

impl CompiledTemplate {
    /// Load and parse a template. `uri` is a plain filesystem path; a
    /// `file://` prefix is stripped if present.
    pub fn load(uri: &str) -> Result<Self> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let contents = std::fs::read_to_string(path)?;
        let spec: TransformSpec = serde_json::from_str(&contents)?;
        Ok(Self { spec })
    }

    pub fn apply(&self, input: Value) -> Result<Value> {
        transform(input, &self.spec).map_err(|e| TransformError::TransformFailed(e.to_string()))
    }
}

/// Process-wide cache of compiled templates keyed by URI (§4.4, §9). Shared
/// across associations via `Arc`; `clear()` lets an operator force a reload
/// after editing a template on disk without restarting the proxy.
#[derive(Default)]
pub struct TemplateCache {
    templates: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, uri: &str) -> Result<Arc<CompiledTemplate>> {
        if let Some(t) = self.templates.read().unwrap().get(uri) {
            return Ok(t.clone());
        }
        let compiled = Arc::new(CompiledTemplate::load(uri)?);
        self.templates
            .write()
            .unwrap()
            .insert(uri.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn clear(&self) {
        self.templates.write().unwrap().clear();
    }
}

/// Generate a fresh UID via the UUID-to-OID scheme `2.25.<u128 from UUID
/// v4>` (resolves an Open Question, see DESIGN.md).
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

/// DeviceObserverUID derived from a calling AE title: the lowercase-hex
/// encoding of the title's bytes, read back as a base-16 integer. This drops
/// any leading zero the hex encoding would otherwise carry and must be
/// preserved verbatim for compatibility with existing Dose SR consumers
/// (resolves an Open Question, see DESIGN.md).
pub fn device_observer_uid(calling_ae_title: &str) -> String {
    let hex: String = calling_ae_title
        .as_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    u128::from_str_radix(&hex, 16)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| hex)
}

/// Merge two DICOM JSON objects, with `nset`'s keys taking precedence on
/// conflict (§4.4).
fn merge_json_objects(ncreate: Value, nset: Value) -> Value {
    let mut merged = match ncreate {
        Value::Object(m) => m,
        _ => Default::default(),
    };
    if let Value::Object(nset_map) = nset {
        for (k, v) in nset_map {
            merged.insert(k, v);
        }
    }
    Value::Object(merged)
}

/// Applies an MPPS-to-Dose-SR JOLT template to the merged N-CREATE/N-SET
/// datasets and builds the resulting Dose SR object plus its File Meta
/// Information.
pub struct DoseSrTransformer {
    cache: Arc<TemplateCache>,
}

impl DoseSrTransformer {
    pub fn new(cache: Arc<TemplateCache>) -> Self {
        Self { cache }
    }

    /// Run the transform (§4.4, steps 1-9). `original_sop_instance_uid` is
    /// the MPPS SOP Instance UID from the original N-CREATE; `calling_ae`
    /// the modality that opened the association.
    pub fn transform(
        &self,
        template_uri: &str,
        ncreate_data: &InMemDicomObject,
        nset_data: &InMemDicomObject,
        original_sop_instance_uid: &str,
        calling_ae: &str,
    ) -> Result<(InMemDicomObject, FileMetaTableBuilder, String)> {
        let template = self.cache.get_or_compile(template_uri)?;

        let ncreate_json =
            dicom_json::to_value(ncreate_data).map_err(|e| TransformError::Json(e.to_string()))?;
        let nset_json =
            dicom_json::to_value(nset_data).map_err(|e| TransformError::Json(e.to_string()))?;
        let merged = merge_json_objects(ncreate_json, nset_json);

        let mut input = match merged {
            Value::Object(m) => m,
            _ => return Err(TransformError::NotAnObject),
        };
        input.insert(
            "_params".to_string(),
            json!({
                "IrradiationEventUID": format!("{original_sop_instance_uid}1"),
                "DeviceObserverUID": device_observer_uid(calling_ae),
                "PerformedProcedureStepSOPInstanceUID": original_sop_instance_uid,
            }),
        );

        let mut output = template.apply(Value::Object(input))?;
        if let Value::Object(ref mut map) = output {
            map.remove("_params");
        }

        let mut dose_sr_data: InMemDicomObject =
            dicom_json::from_value(output).map_err(|e| TransformError::Json(e.to_string()))?;

        let dose_iuid = generate_uid();
        let series_uid = generate_uid();

        dose_sr_data.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(dose_iuid.as_str()),
        ));
        dose_sr_data.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(XRAY_RADIATION_DOSE_SR_SOP_CLASS_UID),
        ));
        dose_sr_data.put(DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(series_uid.as_str()),
        ));

        let fmi = FileMetaTableBuilder::new()
            .transfer_syntax(uids::IMPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(XRAY_RADIATION_DOSE_SR_SOP_CLASS_UID)
            .media_storage_sop_instance_uid(dose_iuid.as_str());

        Ok((dose_sr_data, fmi, dose_iuid))
    }
}
