//! Dispatch of [`AdminCommand`] onto the admin subset of [`Ops`].

use lakehouse_backend::{CreateUserRequest, Result, Role, SsoConfig, TabulatorOpenQuery, User};
use lakehouse_core::Ops;
use serde::Serialize;

use crate::schemas::AdminCommand;

/// Result of an admin command, serialized as the bare payload.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AdminReply {
    User(User),
    Users(Vec<User>),
    Roles(Vec<Role>),
    SsoConfig(Option<SsoConfig>),
    OpenQuery(TabulatorOpenQuery),
    Done { ok: bool },
}

const DONE: AdminReply = AdminReply::Done { ok: true };

pub async fn dispatch(ops: &Ops, command: AdminCommand) -> Result<AdminReply> {
    let reply = match command {
        AdminCommand::UserList => AdminReply::Users(ops.user_list().await?),
        AdminCommand::UserGet { name } => AdminReply::User(ops.user_get(&name).await?),
        AdminCommand::UserCreate {
            name,
            email,
            role,
            extra_roles,
        } => {
            let req = CreateUserRequest {
                name,
                email,
                role,
                extra_roles,
            };
            AdminReply::User(ops.user_create(&req).await?)
        }
        AdminCommand::UserDelete { name } => {
            ops.user_delete(&name).await?;
            DONE
        }
        AdminCommand::UserSetEmail { name, email } => {
            AdminReply::User(ops.user_set_email(&name, &email).await?)
        }
        AdminCommand::UserSetAdmin { name, admin } => {
            AdminReply::User(ops.user_set_admin(&name, admin).await?)
        }
        AdminCommand::UserSetActive { name, active } => {
            AdminReply::User(ops.user_set_active(&name, active).await?)
        }
        AdminCommand::UserResetPassword { name } => {
            AdminReply::User(ops.user_reset_password(&name).await?)
        }
        AdminCommand::UserSetRole {
            name,
            role,
            extra_roles,
            append,
        } => AdminReply::User(ops.user_set_role(&name, &role, &extra_roles, append).await?),
        AdminCommand::UserAddRoles { name, roles } => {
            AdminReply::User(ops.user_add_roles(&name, &roles).await?)
        }
        AdminCommand::UserRemoveRoles {
            name,
            roles,
            fallback,
        } => AdminReply::User(
            ops.user_remove_roles(&name, &roles, fallback.as_deref())
                .await?,
        ),
        AdminCommand::RoleList => AdminReply::Roles(ops.role_list().await?),
        AdminCommand::SsoConfigGet => AdminReply::SsoConfig(ops.sso_config_get().await?),
        AdminCommand::SsoConfigSet { config } => {
            AdminReply::SsoConfig(Some(ops.sso_config_set(&config).await?))
        }
        AdminCommand::SsoConfigRemove => {
            ops.sso_config_remove().await?;
            DONE
        }
        AdminCommand::TabulatorOpenQueryGet => {
            AdminReply::OpenQuery(ops.tabulator_open_query_get().await?)
        }
        AdminCommand::TabulatorOpenQuerySet { enabled } => {
            AdminReply::OpenQuery(ops.tabulator_open_query_set(enabled).await?)
        }
    };
    Ok(reply)
}
