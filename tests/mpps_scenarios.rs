use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemDicomObject;
use dimse::{
    DimseError, DimseKind, DimseStatus, ForwardRule, MppsService, ProxyAeConfig, RecoverySweeper,
    SessionContext, SpoolPaths,
};
use dimse_transform::{DoseSrTransformer, TemplateCache};
use tempfile::TempDir;

const MPPS_SOP_CLASS_UID: &str = "1.2.840.10008.3.1.2.3.3";
const IDENTITY_TEMPLATE: &str = r#"[{"operation":"shift","spec":{"*":"&"}}]"#;

fn ae_config(dir: &TempDir, rules: Vec<ForwardRule>) -> ProxyAeConfig {
    ProxyAeConfig {
        local_aet: "PROXY".into(),
        bind_addr: "127.0.0.1".parse().unwrap(),
        port: 0,
        max_associations: 10,
        rules,
        spool: SpoolPaths {
            cstore_dir: dir.path().join("cstore"),
            ncreate_dir: dir.path().join("ncreate"),
            nset_dir: dir.path().join("nset"),
            dose_sr_dir: dir.path().join("dose_sr"),
            naction_dir: dir.path().join("naction"),
            nevent_dir: dir.path().join("nevent"),
        },
        upstreams: Default::default(),
    }
}

fn mpps_service() -> Arc<MppsService> {
    Arc::new(MppsService::new(Arc::new(DoseSrTransformer::new(Arc::new(
        TemplateCache::new(),
    )))))
}

fn ncreate_command(iuid: &str) -> InMemDicomObject {
    let mut command = InMemDicomObject::new_empty();
    command.put(DataElement::new(
        tags::MESSAGE_ID,
        VR::US,
        PrimitiveValue::from(1_u16),
    ));
    command.put(DataElement::new(
        tags::AFFECTED_SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(MPPS_SOP_CLASS_UID),
    ));
    command.put(DataElement::new(
        tags::AFFECTED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(iuid),
    ));
    command
}

fn nset_command(iuid: &str) -> InMemDicomObject {
    let mut command = InMemDicomObject::new_empty();
    command.put(DataElement::new(
        tags::MESSAGE_ID,
        VR::US,
        PrimitiveValue::from(2_u16),
    ));
    command.put(DataElement::new(
        tags::REQUESTED_SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(MPPS_SOP_CLASS_UID),
    ));
    command.put(DataElement::new(
        tags::REQUESTED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(iuid),
    ));
    command
}

fn status_data() -> InMemDicomObject {
    let mut data = InMemDicomObject::new_empty();
    data.put(DataElement::new(
        Tag(0x0040, 0x0252),
        VR::CS,
        PrimitiveValue::from("IN PROGRESS"),
    ));
    data
}

fn basic_rule(destinations: Vec<&str>) -> ForwardRule {
    ForwardRule {
        name: "forward-all".into(),
        calling_aet: None,
        called_aet: None,
        sop_class_uid: MPPS_SOP_CLASS_UID.into(),
        destinations: destinations.into_iter().map(String::from).collect(),
        use_calling_aet: None,
        mpps2_dose_sr_template_uri: None,
    }
}

/// Scenario 1: straight forward forwarding to a single destination.
#[tokio::test]
async fn scenario_straight_forward() {
    let dir = TempDir::new().unwrap();
    let ae = ae_config(&dir, vec![basic_rule(vec!["ARCHIVE"])]);
    let service = mpps_service();

    let session = SessionContext::new("MOD1", "PROXY");
    let command = ncreate_command("1.2.3");
    let data = status_data();

    let response = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NCreateRq,
            &command,
            &data,
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status, DimseStatus::Success);

    let dcm = ae.spool.ncreate_dir.join("ARCHIVE").join("1.2.3.dcm");
    let info = ae.spool.ncreate_dir.join("ARCHIVE").join("1.2.3.info");
    assert!(dcm.exists());
    let sidecar = tokio::fs::read_to_string(&info).await.unwrap();
    assert!(sidecar.contains("source-aet=MOD1"));
}

/// Scenario 2: fan-out to three destinations produces three pairs and one
/// success response.
#[tokio::test]
async fn scenario_fan_out() {
    let dir = TempDir::new().unwrap();
    let ae = ae_config(&dir, vec![basic_rule(vec!["A", "B", "C"])]);
    let service = mpps_service();

    let session = SessionContext::new("MOD1", "PROXY");
    let command = ncreate_command("2.2.2");
    let data = status_data();

    let response = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NCreateRq,
            &command,
            &data,
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status, DimseStatus::Success);

    for dest in ["A", "B", "C"] {
        assert!(ae
            .spool
            .ncreate_dir
            .join(dest)
            .join("2.2.2.dcm")
            .exists());
        assert!(ae
            .spool
            .ncreate_dir
            .join(dest)
            .join("2.2.2.info")
            .exists());
    }
}

/// Scenario 3: N-CREATE then matching N-SET under a Dose-SR rule produces a
/// Dose SR in the C-STORE root and removes the `.ncreate` intermediate.
#[tokio::test]
async fn scenario_dose_sr_conversion() {
    let dir = TempDir::new().unwrap();
    let template = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(template.path(), IDENTITY_TEMPLATE).unwrap();

    let rule = ForwardRule {
        name: "to-dose-sr".into(),
        calling_aet: None,
        called_aet: None,
        sop_class_uid: MPPS_SOP_CLASS_UID.into(),
        destinations: vec!["SR_ARCHIVE".into()],
        use_calling_aet: None,
        mpps2_dose_sr_template_uri: Some(format!("file://{}", template.path().display())),
    };
    let ae = ae_config(&dir, vec![rule]);
    let service = mpps_service();
    let session = SessionContext::new("MOD1", "PROXY");

    let ncreate_response = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NCreateRq,
            &ncreate_command("9.9"),
            &status_data(),
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ncreate_response.status, DimseStatus::Success);

    let ncreate_path = ae.spool.dose_sr_dir.join("SR_ARCHIVE").join("9.9.ncreate");
    assert!(ncreate_path.exists());

    let nset_response = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NSetRq,
            &nset_command("9.9"),
            &status_data(),
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nset_response.status, DimseStatus::Success);

    assert!(!ncreate_path.exists());

    let mut entries = tokio::fs::read_dir(ae.spool.cstore_dir.join("SR_ARCHIVE"))
        .await
        .unwrap();
    let mut found_dcm = false;
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.path().extension().and_then(|e| e.to_str()) == Some("dcm") {
            found_dcm = true;
        }
    }
    assert!(found_dcm, "expected a Dose SR .dcm in the C-STORE root");
}

/// Scenario 4: no matching rule fails with ProcessingFailure, spool untouched.
#[tokio::test]
async fn scenario_no_matching_rule() {
    let dir = TempDir::new().unwrap();
    let ae = ae_config(&dir, vec![]);
    let service = mpps_service();
    let session = SessionContext::new("MOD1", "PROXY");

    let err = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NCreateRq,
            &ncreate_command("4.4.4"),
            &status_data(),
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DimseError::NoMatchingRule));
    assert!(!ae.spool.ncreate_dir.join("ARCHIVE").exists());
}

/// Scenario 5: crash recovery sweep reconciles a seeded spool directory.
#[tokio::test]
async fn scenario_crash_recovery() {
    let dir = TempDir::new().unwrap();
    let ae = ae_config(&dir, vec![]);
    let dest = ae.spool.ncreate_dir.join("ARCHIVE");
    tokio::fs::create_dir_all(&dest).await.unwrap();

    tokio::fs::write(dest.join("foo.part"), b"partial").await.unwrap();
    tokio::fs::write(dest.join("bar.dcm"), b"no-sidecar").await.unwrap();
    tokio::fs::write(dest.join("baz.dcm"), b"with-sidecar").await.unwrap();
    tokio::fs::write(dest.join("baz.info"), b"source-aet=MOD1\n").await.unwrap();
    tokio::fs::write(dest.join("qux.snd"), b"in-flight").await.unwrap();

    RecoverySweeper::new().sweep_ae(&ae).await;

    assert!(!dest.join("foo.part").exists());
    assert!(!dest.join("bar.dcm").exists());
    assert!(dest.join("baz.dcm").exists());
    assert!(dest.join("baz.info").exists());
    assert!(!dest.join("qux.snd").exists());
    assert!(dest.join("qux").exists());
}

/// Scenario 6: live forward bypasses the spool entirely.
#[tokio::test]
async fn scenario_live_forward() {
    use async_trait::async_trait;
    use dimse::{Result as DimseResult, ResponseSink, UpstreamAssociation};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct RecordingAssociation {
        invoked: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UpstreamAssociation for RecordingAssociation {
        async fn issue_ncreate(
            &self,
            _sop_class_uid: &str,
            _sop_instance_uid: &str,
            _data: InMemDicomObject,
            _transfer_syntax: &str,
            sink: Arc<dyn ResponseSink>,
        ) -> DimseResult<()> {
            self.invoked.store(true, Ordering::SeqCst);
            sink.accept(dimse::DimseResponse {
                message_id: 1,
                status: dimse::DimseStatus::Success,
                data: None,
            });
            Ok(())
        }

        async fn issue_nset(
            &self,
            _sop_class_uid: &str,
            _sop_instance_uid: &str,
            _data: InMemDicomObject,
            _transfer_syntax: &str,
            _sink: Arc<dyn ResponseSink>,
        ) -> DimseResult<()> {
            unimplemented!("not exercised by this test")
        }
    }

    let dir = TempDir::new().unwrap();
    let ae = ae_config(&dir, vec![basic_rule(vec!["ARCHIVE"])]);
    let service = mpps_service();

    let invoked = Arc::new(AtomicBool::new(false));
    let assoc: Arc<dyn UpstreamAssociation> = Arc::new(RecordingAssociation {
        invoked: invoked.clone(),
    });
    let session = SessionContext::new("MOD1", "PROXY").with_forward_association(assoc);

    let response = service
        .on_dimse_request(
            &session,
            &ae,
            DimseKind::NCreateRq,
            &ncreate_command("6.6.6"),
            &status_data(),
            "1.2.840.10008.1.2.1",
        )
        .await
        .unwrap();

    // The live-forward path returns immediately without a synthesized
    // response; the upstream call itself runs on a spawned task.
    assert!(response.is_none());
    assert!(!ae.spool.ncreate_dir.join("ARCHIVE").join("6.6.6.dcm").exists());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(invoked.load(Ordering::SeqCst));
}
