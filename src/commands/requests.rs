//! Translation of parsed arguments into operation requests.
use secrecy::SecretString;

use crate::cli::{
    CreateGroupArgs, CreateShareArgs, ModifyGroupArgs, ModifySetupArgs, ModifyShareArgs,
    RemoveArgs, SetupArgs, toggle,
};
use crate::error::ValidationError;
use crate::operations::group::{CreateGroupRequest, ModifyGroupRequest};
use crate::operations::remove::RemoveRequest;
use crate::operations::setup::{ModifySetupRequest, SetupRequest};
use crate::operations::share::{CreateShareRequest, ModifyShareRequest};
use crate::operations::user::ModifyUserRequest;
use crate::operations::validate::QuotaSetting;

fn quota_setting(value: Option<&str>) -> Result<Option<QuotaSetting>, ValidationError> {
    value.map(QuotaSetting::parse).transpose()
}

/// `setup` arguments; `server_name` is the resolved NetBIOS name.
#[must_use]
pub fn setup(args: &SetupArgs, server_name: String) -> SetupRequest {
    SetupRequest {
        primary_pool: args.primary_pool.clone(),
        secondary_pools: args.secondary_pools.clone(),
        server_name,
        workgroup: args.workgroup.clone(),
        macos_optimized: args.macos,
        default_home_quota: args.default_home_quota.clone(),
    }
}

/// `modify setup` arguments.
///
/// # Errors
///
/// Returns an error for a malformed quota.
pub fn modify_setup(args: &ModifySetupArgs) -> Result<ModifySetupRequest, ValidationError> {
    Ok(ModifySetupRequest {
        server_name: args.server_name.clone(),
        workgroup: args.workgroup.clone(),
        macos_optimized: toggle(args.macos, args.no_macos),
        default_home_quota: quota_setting(args.default_home_quota.as_deref())?,
        add_pools: args.add_secondary_pools.clone(),
        remove_pools: args.remove_secondary_pools.clone(),
    })
}

/// `modify user` arguments.
#[must_use]
pub fn modify_user(
    name: &str,
    shell: Option<bool>,
    password: Option<SecretString>,
    add_groups: &[String],
    remove_groups: &[String],
) -> ModifyUserRequest {
    ModifyUserRequest {
        name: name.to_string(),
        shell_access: shell,
        password,
        add_groups: add_groups.to_vec(),
        remove_groups: remove_groups.to_vec(),
    }
}

/// `create share` arguments.
#[must_use]
pub fn create_share(args: &CreateShareArgs) -> CreateShareRequest {
    CreateShareRequest {
        name: args.name.clone(),
        dataset: args.dataset.clone(),
        pool: args.pool.clone(),
        comment: args.comment.clone(),
        owner: args.owner.clone(),
        group: args.group.clone(),
        permissions: args.perms.clone(),
        valid_users: args.valid_users.clone(),
        read_only: args.readonly,
        browseable: !args.no_browse,
        quota: args.quota.clone(),
    }
}

/// `modify share` arguments.
///
/// # Errors
///
/// Returns an error for a malformed quota.
pub fn modify_share(args: &ModifyShareArgs) -> Result<ModifyShareRequest, ValidationError> {
    Ok(ModifyShareRequest {
        name: args.name.clone(),
        comment: args.comment.clone(),
        valid_users: args.valid_users.clone(),
        read_only: toggle(args.readonly, args.writable),
        browseable: toggle(args.browse, args.no_browse),
        owner: args.owner.clone(),
        group: args.group.clone(),
        permissions: args.perms.clone(),
        quota: quota_setting(args.quota.as_deref())?,
    })
}

/// `create group` arguments.
#[must_use]
pub fn create_group(args: &CreateGroupArgs) -> CreateGroupRequest {
    CreateGroupRequest {
        name: args.name.clone(),
        description: args.description.clone(),
        members: args.users.clone(),
    }
}

/// `modify group` arguments.
#[must_use]
pub fn modify_group(args: &ModifyGroupArgs) -> ModifyGroupRequest {
    ModifyGroupRequest {
        name: args.name.clone(),
        add_users: args.add_users.clone(),
        remove_users: args.remove_users.clone(),
    }
}

/// `remove` arguments.
#[must_use]
pub const fn remove(args: RemoveArgs) -> RemoveRequest {
    RemoveRequest {
        delete_data: args.delete_data,
        delete_users_and_groups: args.delete_users,
    }
}
