#![cfg(test)]

use crate::config::config::Config;

const SAMPLE_TOML: &str = r#"
[proxy]
log_level = "debug"

[logging]
log_to_file = false
log_file_path = ""

[[application_entity]]
local_aet = "PROXY1"
port = 11112

[[application_entity.rules]]
name = "forward-all"
sop_class_uid = "1.2.840.10008.3.1.2.3.3"
destinations = ["ARCHIVE"]

[application_entity.spool]
cstore_dir = "/tmp/spool/cstore"
ncreate_dir = "/tmp/spool/ncreate"
nset_dir = "/tmp/spool/nset"
dose_sr_dir = "/tmp/spool/dose_sr"
"#;

#[test]
fn test_basic_config() {
    let config: Config = toml::from_str(SAMPLE_TOML).expect("config should parse");
    assert_eq!(config.proxy.log_level, "debug");
    assert_eq!(config.application_entities.len(), 1);

    let ae = &config.application_entities[0];
    assert_eq!(ae.local_aet, "PROXY1");
    assert_eq!(ae.port, 11112);
    assert_eq!(ae.rules.len(), 1);
    assert_eq!(ae.rules[0].destinations, vec!["ARCHIVE".to_string()]);

    config.validate().expect("sample config should be valid");
}

#[test]
fn test_validate_rejects_no_application_entities() {
    let config: Config = toml::from_str(
        r#"
        [proxy]
        log_level = "debug"
        "#,
    )
    .expect("config should parse");

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_duplicate_application_entity_names() {
    let mut toml_str = SAMPLE_TOML.to_string();
    toml_str.push_str(
        r#"
[[application_entity]]
local_aet = "PROXY1"
port = 11113

[application_entity.spool]
cstore_dir = "/tmp/spool2/cstore"
ncreate_dir = "/tmp/spool2/ncreate"
nset_dir = "/tmp/spool2/nset"
dose_sr_dir = "/tmp/spool2/dose_sr"
"#,
    );

    let config: Config = toml::from_str(&toml_str).expect("config should parse");
    assert!(config.validate().is_err());
}
