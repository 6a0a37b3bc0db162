use super::*;

fn version(raw: &str) -> ScriptVersion {
    raw.parse().expect("must parse version")
}

#[test]
fn version_order_is_lexicographic_over_components() {
    let cases = [
        ("1.0", "1.1"),
        ("1.0.0", "1.0.1"),
        ("1.9", "1.10"),
        ("1.2.3", "1.2.3.1"),
        ("0.9.9.9", "1.0"),
    ];
    for (older, newer) in cases {
        let older = version(older);
        let newer = version(newer);
        assert!(newer.is_newer_than(&older), "{newer} must be newer than {older}");
        assert!(!older.is_newer_than(&newer), "{older} must not be newer than {newer}");
    }
}

#[test]
fn equal_versions_are_not_newer_either_way() {
    let a = version("1.2.0");
    let b = version("1.2");
    assert_eq!(a, b);
    assert!(!a.is_newer_than(&b));
    assert!(!b.is_newer_than(&a));
}

#[test]
fn version_missing_components_are_zero() {
    assert_eq!(version("2").components(), [2, 0, 0, 0]);
    assert_eq!(version("2.1").components(), [2, 1, 0, 0]);
    assert_eq!(version("2.1.3.4").components(), [2, 1, 3, 4]);
}

#[test]
fn version_rejects_garbage() {
    assert!("".parse::<ScriptVersion>().is_err());
    assert!("1.a".parse::<ScriptVersion>().is_err());
    assert!("1.2.3.4.5".parse::<ScriptVersion>().is_err());
    assert!("1..2".parse::<ScriptVersion>().is_err());
}

#[test]
fn version_display_reproduces_the_parsed_spelling() {
    // Trailing zero components must survive: tags and backup names are
    // derived from this rendering and have to match the remote spelling.
    for raw in ["1.2.3", "1.2.3.4", "1.2.0.0", "1.0.0", "1.2", "3"] {
        assert_eq!(version(raw).to_string(), raw);
    }
}

#[test]
fn version_display_is_stable_under_equality() {
    // "1.1" and "1.1.0" compare equal but keep their own spellings.
    let short = version("1.1");
    let long = version("1.1.0");
    assert_eq!(short, long);
    assert_eq!(short.to_string(), "1.1");
    assert_eq!(long.to_string(), "1.1.0");
}

fn sample_document() -> VersionDocument {
    let raw = r#"{
        "channels": {
            "stable": {"version": "1.1.0", "forceUpdateBelowVersion": "0.9.0"},
            "dev": {"version": "1.2.0.7", "showDevInfo": true}
        },
        "changelog": {
            "1.1.0": {"notes": ["fix throttle window"], "CertificateSubject": "CN=Scriptup Release Signing"},
            "1.2.0.7": {"notes": ["dev build"], "CertificateSubject": "CN=Scriptup Dev Signing", "Sha256": "ab"}
        }
    }"#;
    VersionDocument::from_json_str(raw).expect("must parse document")
}

#[test]
fn resolve_channel_joins_changelog_entry() {
    let release = sample_document()
        .resolve_channel("stable")
        .expect("must resolve stable");
    assert_eq!(release.version, version("1.1.0"));
    assert_eq!(release.force_update_below_version, Some(version("0.9.0")));
    assert_eq!(release.certificate_subject, "CN=Scriptup Release Signing");
    assert_eq!(release.notes, vec!["fix throttle window"]);
    assert!(release.sha256.is_none());
    assert!(!release.show_dev_info);
}

#[test]
fn resolve_channel_missing_channel_is_metadata_error() {
    let err = sample_document()
        .resolve_channel("beta")
        .expect_err("must fail for unknown channel");
    assert_eq!(err.reason_code(), "metadata_error");
    assert!(err.is_transient());
}

#[test]
fn resolve_channel_requires_changelog_entry() {
    let raw = r#"{"channels": {"stable": {"version": "1.1.0"}}, "changelog": {}}"#;
    let document = VersionDocument::from_json_str(raw).expect("must parse document");
    let err = document
        .resolve_channel("stable")
        .expect_err("must fail without changelog entry");
    assert_eq!(err.reason_code(), "metadata_error");
}

#[test]
fn changelog_key_matches_by_version_value_not_spelling() {
    let raw = r#"{
        "channels": {"stable": {"version": "1.1"}},
        "changelog": {"1.1.0.0": {"notes": [], "CertificateSubject": "CN=X"}}
    }"#;
    let document = VersionDocument::from_json_str(raw).expect("must parse document");
    let release = document.resolve_channel("stable").expect("must resolve");
    assert_eq!(release.certificate_subject, "CN=X");
}

#[test]
fn forced_floor_fires_only_below_floor() {
    let release = sample_document()
        .resolve_channel("stable")
        .expect("must resolve stable");

    let err = release
        .check_forced_floor(&version("0.8.9"))
        .expect_err("below floor must be fatal");
    assert_eq!(err.reason_code(), "forced_update_required");
    assert!(!err.is_transient());

    release
        .check_forced_floor(&version("0.9.0"))
        .expect("at floor must pass");
    release
        .check_forced_floor(&version("1.0.0"))
        .expect("above floor must pass");
}

#[test]
fn other_channel_query_reports_newest_foreign_version() {
    let document = sample_document();
    let hit = document.newer_on_other_channel(&version("1.1.0"), "stable");
    assert_eq!(hit, Some(("dev".to_string(), version("1.2.0.7"))));

    let none = document.newer_on_other_channel(&version("1.3"), "stable");
    assert!(none.is_none());

    // The active channel itself never counts.
    let none = document.newer_on_other_channel(&version("1.0"), "dev");
    assert_eq!(none, Some(("stable".to_string(), version("1.1.0"))));
}

#[test]
fn malformed_document_is_metadata_error() {
    let err = VersionDocument::from_json_str("{not json").expect_err("must fail");
    assert_eq!(err.reason_code(), "metadata_error");

    let err = VersionDocument::from_json_str(r#"{"channels": {"stable": {"version": "x.y"}}}"#)
        .expect_err("unparsable version must fail");
    assert_eq!(err.reason_code(), "metadata_error");
}

#[test]
fn script_location_derives_name_stem_and_directory() {
    let location = ScriptLocation::new("/opt/tools/agent.ps1").expect("must build location");
    assert_eq!(location.file_name(), "agent.ps1");
    assert_eq!(location.file_stem(), "agent");
    assert_eq!(location.directory(), std::path::Path::new("/opt/tools"));
    assert_eq!(
        location.staging_path(),
        std::path::Path::new("/opt/tools/agent.ps1.staged")
    );
}

#[test]
fn script_location_without_extension_uses_full_name_as_stem() {
    let location = ScriptLocation::new("/opt/tools/agent").expect("must build location");
    assert_eq!(location.file_stem(), "agent");
}

#[test]
fn settings_parse_with_defaults() {
    let raw = r#"
        channel = "stable"
        metadata_url = "https://updates.example.test/versions.json"
        release_root = "https://api.example.test/releases/tags"
    "#;
    let settings = UpdateSettings::from_toml_str(raw).expect("must parse settings");
    assert_eq!(settings.check_interval_hours, 24);
    assert!(!settings.auto_update);
    assert!(!settings.restart_after_update);
    assert!(settings.trusted_root_keys.is_empty());
}

#[test]
fn settings_reject_empty_channel() {
    let raw = r#"
        channel = " "
        metadata_url = "https://updates.example.test/versions.json"
        release_root = "https://api.example.test/releases/tags"
    "#;
    assert!(UpdateSettings::from_toml_str(raw).is_err());
}
