//! MCP tool parameter schemas
//!
//! Defines the input parameter structures for all MCP tools.
//! All structs derive `Debug`, `Deserialize`, and `JsonSchema` as required by rmcp.

use schemars::JsonSchema;
use serde::Deserialize;

/// Parameters for tools that take no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EmptyParams {}

/// Parameters for `catalog_configure` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CatalogConfigureParams {
    #[schemars(description = "Catalog URL to point at, e.g. https://catalog.example.com")]
    pub catalog_url: String,
}

/// Parameters for `packages_list` tool.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PackagesListParams {
    /// Registry to list; the default bucket or local registry when omitted.
    #[schemars(description = "Registry (s3://bucket, file://path or 'local'); defaults to the configured default bucket, or the local registry")]
    pub registry: Option<String>,

    #[schemars(description = "Only return packages whose name starts with this prefix")]
    pub prefix: Option<String>,

    #[schemars(description = "Maximum number of names to return (default: 100, max: 1000)")]
    pub limit: Option<usize>,
}

/// Parameters for `package_browse` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackageBrowseParams {
    #[schemars(description = "Package name in namespace/name form")]
    pub package_name: String,

    #[schemars(description = "Registry (s3://bucket, file://path or 'local'); defaults to the default bucket or local registry")]
    pub registry: Option<String>,

    /// Logical path inside the package, empty for the root.
    #[serde(default)]
    #[schemars(description = "Logical path inside the package (default: root)")]
    pub path: String,
}

/// Parameters for `package_info` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackageInfoParams {
    #[schemars(description = "Package name in namespace/name form")]
    pub package_name: String,

    #[schemars(description = "Registry (s3://bucket, file://path or 'local'); defaults to the default bucket or local registry")]
    pub registry: Option<String>,

    #[schemars(description = "Revision hash; the latest revision when omitted")]
    pub top_hash: Option<String>,
}

/// Parameters for `admin` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AdminParams {
    #[schemars(description = "Administrative command: {\"action\": ..., \"params\": {...}}")]
    pub command: AdminCommand,
}

/// Closed set of administrative commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum AdminCommand {
    UserList,
    UserGet {
        name: String,
    },
    UserCreate {
        name: String,
        email: String,
        role: String,
        #[serde(default)]
        extra_roles: Vec<String>,
    },
    UserDelete {
        name: String,
    },
    UserSetEmail {
        name: String,
        email: String,
    },
    UserSetAdmin {
        name: String,
        admin: bool,
    },
    UserSetActive {
        name: String,
        active: bool,
    },
    UserResetPassword {
        name: String,
    },
    UserSetRole {
        name: String,
        role: String,
        #[serde(default)]
        extra_roles: Vec<String>,
        /// Keep existing extra roles instead of replacing them.
        #[serde(default)]
        append: bool,
    },
    UserAddRoles {
        name: String,
        roles: Vec<String>,
    },
    UserRemoveRoles {
        name: String,
        roles: Vec<String>,
        /// Role assigned when the primary role is removed.
        fallback: Option<String>,
    },
    RoleList,
    SsoConfigGet,
    SsoConfigSet {
        config: String,
    },
    SsoConfigRemove,
    TabulatorOpenQueryGet,
    TabulatorOpenQuerySet {
        enabled: bool,
    },
}

impl AdminCommand {
    /// The wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::UserList => "user_list",
            Self::UserGet { .. } => "user_get",
            Self::UserCreate { .. } => "user_create",
            Self::UserDelete { .. } => "user_delete",
            Self::UserSetEmail { .. } => "user_set_email",
            Self::UserSetAdmin { .. } => "user_set_admin",
            Self::UserSetActive { .. } => "user_set_active",
            Self::UserResetPassword { .. } => "user_reset_password",
            Self::UserSetRole { .. } => "user_set_role",
            Self::UserAddRoles { .. } => "user_add_roles",
            Self::UserRemoveRoles { .. } => "user_remove_roles",
            Self::RoleList => "role_list",
            Self::SsoConfigGet => "sso_config_get",
            Self::SsoConfigSet { .. } => "sso_config_set",
            Self::SsoConfigRemove => "sso_config_remove",
            Self::TabulatorOpenQueryGet => "tabulator_open_query_get",
            Self::TabulatorOpenQuerySet { .. } => "tabulator_open_query_set",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<AdminCommand, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn unit_actions_need_no_params() {
        assert_eq!(parse(json!({"action": "user_list"})).ok(), Some(AdminCommand::UserList));
        assert_eq!(
            parse(json!({"action": "sso_config_remove"})).ok(),
            Some(AdminCommand::SsoConfigRemove)
        );
    }

    #[test]
    fn params_are_deserialized() {
        let command = parse(json!({
            "action": "user_set_role",
            "params": {"name": "alice", "role": "Editor"}
        }));
        assert_eq!(
            command.ok(),
            Some(AdminCommand::UserSetRole {
                name: "alice".into(),
                role: "Editor".into(),
                extra_roles: Vec::new(),
                append: false,
            })
        );
    }

    #[test]
    fn action_name_round_trips() {
        let command = AdminCommand::TabulatorOpenQuerySet { enabled: true };
        let parsed = parse(json!({"action": command.action(), "params": {"enabled": true}}));
        assert_eq!(parsed.ok(), Some(command));
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(parse(json!({"action": "drop_everything"})).is_err());
    }

    #[test]
    fn missing_required_param_is_rejected() {
        assert!(parse(json!({"action": "user_set_email", "params": {"name": "alice"}})).is_err());
    }

    #[test]
    fn browse_path_defaults_to_root() {
        let params: Result<PackageBrowseParams, _> =
            serde_json::from_value(json!({"package_name": "team/data"}));
        assert_eq!(params.ok().map(|p| p.path), Some(String::new()));
    }
}
