#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for share operations and listings.

mod common;

use common::*;
use smb_zfs::error::{EntityKind, PreconditionError, SmbZfsError, ValidationError};
use smb_zfs::operations::AssumeYes;
use smb_zfs::operations::list::{Category, Listing, get_state, list};
use smb_zfs::operations::share::{
    CreateShareRequest, ModifyShareRequest, create_share, delete_share, modify_share,
};
use smb_zfs::operations::user::{CreateUserRequest, create_user};
use smb_zfs::operations::validate::QuotaSetting;

fn media() -> CreateShareRequest {
    CreateShareRequest {
        name: "media".to_string(),
        dataset: "media".to_string(),
        comment: "Movies and music".to_string(),
        ..CreateShareRequest::default()
    }
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[test]
fn created_share_has_dataset_section_and_ledger_entry() {
    let env = TestEnv::set_up();
    let outcome = create_share(&env.ctx(&AssumeYes), &media()).unwrap();
    assert_eq!(outcome.message, "Share 'media' created successfully.");

    {
        let host = env.host.state();
        assert_eq!(
            host.datasets["tank/media"].ownership,
            Some(("root".into(), "smb_users".into(), "0775".into()))
        );
        assert_eq!(host.services["smbd"].reloads, 1);
        assert_eq!(host.services["nmbd"].reloads, 1);
    }

    let conf = env.smb_conf();
    let section = conf.section("media").unwrap();
    assert_eq!(section.get("path"), Some("/tank/media"));
    assert_eq!(section.get("comment"), Some("Movies and music"));
    assert_eq!(section.get("valid users"), Some("@smb_users"));
    assert_eq!(section.get("read only"), Some("no"));
    assert!(conf.contains("shared"));

    let ledger = env.ledger();
    let entry = &ledger.shares["media"];
    assert_eq!(entry.dataset, "tank/media");
    assert_eq!(entry.owner, "root");
    assert_eq!(entry.group, "smb_users");
}

#[test]
fn share_quota_reads_back_from_host() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.quota = Some("500g".to_string());
    create_share(&env.ctx(&AssumeYes), &req).unwrap();

    assert_eq!(
        env.host.state().datasets["tank/media"].quota.as_deref(),
        Some("500G")
    );
    let Listing::Shares(shares) = list(&env.ctx(&AssumeYes), Category::Shares).unwrap() else {
        panic!("expected a share listing");
    };
    let media = shares.iter().find(|s| s.name == "media").unwrap();
    assert_eq!(media.entry.quota.as_deref(), Some("500G"));
}

#[test]
fn share_on_secondary_pool() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.pool = Some("bulk".to_string());
    create_share(&env.ctx(&AssumeYes), &req).unwrap();
    assert!(env.host.state().datasets.contains_key("bulk/media"));
    assert_eq!(env.ledger().shares["media"].dataset, "bulk/media");
}

#[test]
fn unmanaged_pool_is_refused() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.pool = Some("scratch".to_string());
    let err = create_share(&env.ctx(&AssumeYes), &req).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Precondition failed: Pool 'scratch' is not a valid pool. Managed pools are: tank, bulk"
    );
}

#[test]
fn unknown_owner_is_rejected_before_any_host_call() {
    let env = TestEnv::set_up();
    let calls = env.call_count();
    let mut req = media();
    req.owner = Some("ghost".to_string());
    let err = create_share(&env.ctx(&AssumeYes), &req).unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Validation(ValidationError::UnknownReference {
            kind: EntityKind::User,
            ..
        })
    ));
    assert_eq!(env.call_count(), calls);
}

#[test]
fn reserved_share_name_is_rejected() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.name = "homes".to_string();
    let err = create_share(&env.ctx(&AssumeYes), &req).unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Validation(ValidationError::InvalidName { .. })
    ));
}

#[test]
fn dataset_of_another_share_is_rejected() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();
    let mut req = media();
    req.name = "films".to_string();
    let err = create_share(&env.ctx(&AssumeYes), &req).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid request: Invalid dataset 'tank/media': overlaps tank/media of share 'media'"
    );
}

fn on_dataset(name: &str, dataset: &str) -> CreateShareRequest {
    CreateShareRequest {
        name: name.to_string(),
        dataset: dataset.to_string(),
        ..CreateShareRequest::default()
    }
}

#[test]
fn homes_root_cannot_become_a_share() {
    let env = TestEnv::set_up();
    create_user(
        &env.ctx(&AssumeYes),
        &CreateUserRequest {
            name: "alice".to_string(),
            password: password(),
            shell_access: false,
            groups: Vec::new(),
        },
    )
    .unwrap();
    let calls = env.call_count();

    let err = create_share(&env.ctx(&AssumeYes), &on_dataset("x", "homes")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid request: Invalid dataset 'tank/homes': overlaps tank/homes/alice, the home of user 'alice'"
    );
    assert_eq!(env.call_count(), calls);
    let host = env.host.state();
    assert_eq!(
        host.datasets["tank/homes"].ownership,
        Some(("root".into(), "root".into(), "0755".into()))
    );
    assert!(host.datasets.contains_key("tank/homes/alice"));
}

#[test]
fn share_inside_the_homes_root_is_rejected() {
    let env = TestEnv::set_up();
    let err = create_share(&env.ctx(&AssumeYes), &on_dataset("x", "homes/x")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid request: Invalid dataset 'tank/homes/x': overlaps tank/homes, the parent of all homes"
    );
    assert!(!env.host.state().datasets.contains_key("tank/homes/x"));
}

#[test]
fn share_nested_in_another_share_is_rejected() {
    let env = TestEnv::set_up();
    let err = create_share(&env.ctx(&AssumeYes), &on_dataset("sub", "shared/sub")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid request: Invalid dataset 'tank/shared/sub': overlaps tank/shared of share 'shared'"
    );
    assert!(!env.ledger().shares.contains_key("sub"));
}

#[test]
fn share_above_another_share_is_rejected() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &on_dataset("films", "media/films")).unwrap();
    let err = create_share(&env.ctx(&AssumeYes), &on_dataset("media", "media")).unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Validation(ValidationError::InvalidValue { field: "dataset", .. })
    ));
    assert!(!env.ledger().shares.contains_key("media"));
}

#[test]
fn everyone_omits_valid_users() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.valid_users = Some("*".to_string());
    create_share(&env.ctx(&AssumeYes), &req).unwrap();
    assert!(env.smb_conf().section("media").unwrap().get("valid users").is_none());
}

#[test]
fn rejected_reload_restores_smb_conf() {
    let env = TestEnv::set_up();
    let before = env.smb_conf();
    env.host.fail_on("reload nmbd");

    let err = create_share(&env.ctx(&AssumeYes), &media()).unwrap_err();
    assert!(matches!(err, SmbZfsError::External { .. }), "{err:?}");
    assert_eq!(env.smb_conf(), before);
    assert!(!env.ledger().shares.contains_key("media"));
}

// ---------------------------------------------------------------------------
// modify
// ---------------------------------------------------------------------------

#[test]
fn modify_share_rewrites_section_and_ownership() {
    let env = TestEnv::set_up();
    create_user(
        &env.ctx(&AssumeYes),
        &CreateUserRequest {
            name: "alice".to_string(),
            password: password(),
            shell_access: false,
            groups: Vec::new(),
        },
    )
    .unwrap();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();

    let outcome = modify_share(
        &env.ctx(&AssumeYes),
        &ModifyShareRequest {
            name: "media".to_string(),
            read_only: Some(true),
            owner: Some("alice".to_string()),
            valid_users: Some("alice".to_string()),
            quota: Some(QuotaSetting::Set("1T".to_string())),
            ..ModifyShareRequest::default()
        },
    )
    .unwrap();
    assert_eq!(outcome.message, "Share 'media' modified successfully.");

    {
        let host = env.host.state();
        let dataset = &host.datasets["tank/media"];
        assert_eq!(dataset.quota.as_deref(), Some("1T"));
        assert_eq!(
            dataset.ownership,
            Some(("alice".into(), "smb_users".into(), "0775".into()))
        );
    }
    let conf = env.smb_conf();
    let section = conf.section("media").unwrap();
    assert_eq!(section.get("read only"), Some("yes"));
    assert_eq!(section.get("valid users"), Some("alice"));
    assert_eq!(section.get("force user"), Some("alice"));

    let ledger = env.ledger();
    let entry = &ledger.shares["media"];
    assert!(entry.read_only);
    assert_eq!(entry.quota.as_deref(), Some("1T"));
}

#[test]
fn quota_only_change_leaves_smb_conf_alone() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();
    let calls = env.call_count();

    modify_share(
        &env.ctx(&AssumeYes),
        &ModifyShareRequest {
            name: "media".to_string(),
            quota: Some(QuotaSetting::Clear),
            ..ModifyShareRequest::default()
        },
    )
    .unwrap();
    let host = env.host.state();
    assert_eq!(host.calls.len(), calls + 1);
    assert!(host.calls.last().unwrap().starts_with("set quota"));
}

#[test]
fn empty_modify_is_nothing_to_do() {
    let env = TestEnv::set_up();
    let err = modify_share(
        &env.ctx(&AssumeYes),
        &ModifyShareRequest {
            name: "shared".to_string(),
            ..ModifyShareRequest::default()
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Validation(ValidationError::NothingToDo(_))
    ));
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[test]
fn delete_share_keeps_dataset_by_default() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();

    delete_share(&env.ctx(&Scripted::answer("yes")), "media", false).unwrap();
    assert!(!env.smb_conf().contains("media"));
    assert!(env.host.state().datasets.contains_key("tank/media"));
    assert!(!env.ledger().shares.contains_key("media"));
}

#[test]
fn delete_share_with_data_destroys_dataset() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();

    let confirm = Scripted::answer("destroy media");
    delete_share(&env.ctx(&confirm), "media", true).unwrap();
    assert_eq!(confirm.asked(), ["destroy media"]);
    assert!(!env.host.state().datasets.contains_key("tank/media"));
}

#[test]
fn builtin_share_is_protected() {
    let env = TestEnv::set_up();
    let confirm = Scripted::answer("destroy shared");
    let err = delete_share(&env.ctx(&confirm), "shared", true).unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Precondition(PreconditionError::Protected { .. })
    ));
    assert!(confirm.asked().is_empty());
}

// ---------------------------------------------------------------------------
// list / get-state
// ---------------------------------------------------------------------------

#[test]
fn pools_listing_counts_shares() {
    let env = TestEnv::set_up();
    let mut req = media();
    req.pool = Some("bulk".to_string());
    create_share(&env.ctx(&AssumeYes), &req).unwrap();

    let listing = list(&env.ctx(&AssumeYes), Category::Pools).unwrap();
    let value = serde_json::to_value(&listing).unwrap();
    assert_eq!(value[0]["name"], "tank");
    assert_eq!(value[0]["primary"], true);
    assert_eq!(value[0]["shares"], 1);
    assert_eq!(value[1]["name"], "bulk");
    assert_eq!(value[1]["shares"], 1);
}

#[test]
fn listing_before_setup_fails() {
    let env = TestEnv::new();
    let err = list(&env.ctx(&AssumeYes), Category::Users).unwrap_err();
    assert!(matches!(
        err,
        SmbZfsError::Precondition(PreconditionError::NotInitialized)
    ));
    assert!(get_state(&env.ctx(&AssumeYes)).is_err());
}

#[test]
fn get_state_matches_ledger() {
    let env = TestEnv::set_up();
    create_share(&env.ctx(&AssumeYes), &media()).unwrap();
    let state = get_state(&env.ctx(&AssumeYes)).unwrap();
    assert_eq!(state, env.ledger());
}
