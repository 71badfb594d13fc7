use super::{
    filter::glob_to_regex, listing::created_between, parse_tag_reference, reconstruct_history,
    unique_locator, ImageFilter, ReferencePattern, MISSING_ID,
};
use crate::{
    errors::ImageError,
    image::{ContentDigest, Reference},
    manifest::{HistoryEntry, RuntimeConfig, FS_TYPE},
    registry::DefaultRegistry,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

fn refs(names: &[&str]) -> Vec<Reference> {
    names.iter().map(|n| n.parse().unwrap()).collect()
}

fn step(created_by: &str, empty_layer: bool) -> HistoryEntry {
    HistoryEntry {
        created_by: created_by.to_owned(),
        empty_layer,
        ..HistoryEntry::default()
    }
}

#[test]
fn locators() {
    assert!(unique_locator(&[]));
    assert!(unique_locator(&refs(&[
        "busybox:1.25",
        "busybox@sha256:29f5d56d12684887bdfa50dcd29fc31eea4aaf4ad3bec43daf19026a7ce69912"
    ])));
    assert!(!unique_locator(&refs(&["a.com/repo:t1", "b.com/repo:t2"])));
    assert!(!unique_locator(&refs(&["busybox:latest", "localhost:5000/busybox:latest"])));
}

#[test]
fn tag_targets() {
    assert_eq!(
        parse_tag_reference("example.com/app").unwrap().as_str(),
        "example.com/app:latest"
    );
    assert_eq!(
        parse_tag_reference("example.com/app:v2").unwrap().as_str(),
        "example.com/app:v2"
    );
    assert!(parse_tag_reference(
        "example.com/app@sha256:29f5d56d12684887bdfa50dcd29fc31eea4aaf4ad3bec43daf19026a7ce69912"
    )
    .unwrap_err()
    .is_invalid_param());
    match parse_tag_reference("Example.com/APP") {
        Err(ImageError::InvalidParam(_)) => (),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn glob_translation() {
    assert_eq!(glob_to_regex("busybox").unwrap(), "^busybox$");
    assert_eq!(glob_to_regex("*:latest").unwrap(), "^[^/]*:latest$");
    assert_eq!(glob_to_regex("a?c").unwrap(), "^a[^/]c$");
    assert_eq!(glob_to_regex("v[0-9]").unwrap(), "^v[0-9]$");
    assert_eq!(glob_to_regex("v[^.]").unwrap(), "^v[^\\.]$");
    assert_eq!(glob_to_regex("a.b").unwrap(), "^a\\.b$");
    assert!(glob_to_regex("v[0-9").is_err());
    assert!(glob_to_regex("trailing\\").is_err());
}

#[test]
fn pattern_matching() {
    let latest = ReferencePattern::parse("*:latest").unwrap();
    assert!(latest.matches("busybox:latest"));
    assert!(!latest.matches("library/busybox:latest"));
    assert!(!latest.matches("busybox:1.25"));

    let default_registry = DefaultRegistry::new();
    let full = "registry.hub.docker.com/library/busybox:latest";
    assert!(!latest.matches(full));
    assert!(latest.matches_familiar(&default_registry, full));
    assert!(!latest.matches_familiar(&default_registry, "example.com/app:latest"));

    let everything = ReferencePattern::parse("example.com/*/*").unwrap();
    assert!(everything.matches("example.com/team/app:v1"));
    assert!(!everything.matches("example.com/app:v1"));

    let versions = ReferencePattern::parse("busybox:1.2[0-9]").unwrap();
    assert!(versions.matches_familiar(
        &default_registry,
        "registry.hub.docker.com/library/busybox:1.25"
    ));
    assert_eq!(versions.as_str(), "busybox:1.2[0-9]");
}

#[test]
fn filter_from_json() {
    assert_eq!(ImageFilter::from_json("").unwrap(), ImageFilter::new());
    assert!(ImageFilter::new().is_empty());

    let filter = ImageFilter::from_json(
        r#"{"before": ["busybox"], "since": {"alpine": true}, "reference": ["*:latest", "app*"]}"#,
    )
    .unwrap();
    assert_eq!(
        filter,
        ImageFilter::new()
            .before("busybox")
            .since("alpine")
            .reference("*:latest")
            .reference("app*")
    );

    assert!(ImageFilter::from_json(r#"{"before": ["a", "b"]}"#)
        .unwrap_err()
        .is_invalid_param());
    assert!(ImageFilter::from_json(r#"{"since": {"a": true, "b": true}}"#)
        .unwrap_err()
        .is_invalid_param());
    assert!(ImageFilter::from_json(r#"{"label": ["x=y"]}"#)
        .unwrap_err()
        .is_invalid_param());
    assert!(ImageFilter::from_json("not json")
        .unwrap_err()
        .is_invalid_param());

    let mut args = BTreeMap::new();
    args.insert("reference".to_owned(), vec!["busybox".to_owned()]);
    assert_eq!(
        ImageFilter::from_args(args).unwrap(),
        ImageFilter::new().reference("busybox")
    );
}

#[test]
fn creation_bounds() {
    let t = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
    let later = Utc.timestamp_opt(1_600_000_010, 0).unwrap();
    let between = Utc.timestamp_opt(1_600_000_005, 0).unwrap();
    assert!(created_between(Some(between), Some(Some(t)), Some(Some(later))));
    assert!(!created_between(Some(t), Some(Some(t)), Some(Some(later))));
    assert!(!created_between(Some(later), Some(Some(t)), Some(Some(later))));
    assert!(created_between(Some(t), None, None));
    assert!(!created_between(None, Some(Some(t)), None));
    assert!(created_between(None, None, Some(Some(t))));
}

#[test]
fn history_with_empty_layer() {
    let id = ContentDigest::from_content(b"config");
    let history = vec![step("bottom", false), step("mid", true), step("top", false)];
    let items = reconstruct_history(&id, &history, &[100, 200]).unwrap();
    let summary: Vec<(&str, u64)> = items
        .iter()
        .map(|item| (item.created_by.as_str(), item.size))
        .collect();
    assert_eq!(summary, vec![("top", 200), ("mid", 0), ("bottom", 100)]);
    assert_eq!(items[0].id, id.to_string());
    assert_eq!(items[1].id, MISSING_ID);
    assert_eq!(items[2].id, MISSING_ID);
    assert!(items[1].empty_layer);
}

#[test]
fn history_layer_mismatch() {
    let id = ContentDigest::from_content(b"config");
    let history = vec![step("bottom", false), step("mid", true), step("top", false)];
    match reconstruct_history(&id, &history, &[1, 2, 3]) {
        Err(ImageError::Integrity(_)) => (),
        other => panic!("unexpected {:?}", other),
    }
    match reconstruct_history(&id, &history, &[1]) {
        Err(ImageError::Integrity(_)) => (),
        other => panic!("unexpected {:?}", other),
    }
    assert!(reconstruct_history(&id, &[], &[]).unwrap().is_empty());
}

#[test]
fn config_blob_parses() {
    let config: RuntimeConfig = serde_json::from_str(
        r#"{
            "created": "2020-09-13T12:26:40Z",
            "architecture": "arm64",
            "os": "linux",
            "config": {"Env": ["PATH=/bin"], "Cmd": ["sh"], "Labels": {"a": "b"}},
            "rootfs": {"type": "layers", "diff_ids": ["sha256:00"]},
            "history": [{"created_by": "ADD x /"}, {"created_by": "CMD sh", "empty_layer": true}]
        }"#,
    )
    .unwrap();
    assert_eq!(config.created.unwrap().timestamp(), 1_600_000_000);
    assert_eq!(config.config.cmd, vec!["sh"]);
    assert!(config.config.entrypoint.is_none());
    assert_eq!(config.rootfs.fs_type, FS_TYPE);
    assert_eq!(
        config.history.iter().map(|h| h.empty_layer).collect::<Vec<_>>(),
        vec![false, true]
    );
    assert!(config.author.is_empty());
}
