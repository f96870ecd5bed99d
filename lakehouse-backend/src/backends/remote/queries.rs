//! GraphQL documents

macro_rules! role_selection {
    () => {
        "__typename ... on ManagedRole { id name arn } ... on UnmanagedRole { id name arn }"
    };
}

macro_rules! user_selection {
    () => {
        concat!(
            "name email dateJoined lastLogin isActive isAdmin isSsoOnly isService ",
            "role { ",
            role_selection!(),
            " } extraRoles { ",
            role_selection!(),
            " }"
        )
    };
}

macro_rules! failure_members {
    () => {
        "... on InvalidInput { errors { path message name } } ... on OperationError { message name }"
    };
}

macro_rules! user_result {
    () => {
        concat!(
            "__typename ... on User { ",
            user_selection!(),
            " } ",
            failure_members!()
        )
    };
}

macro_rules! operation_result {
    () => {
        concat!("__typename ... on Ok { _ } ", failure_members!())
    };
}

/// `mutation ($name: String!, <args>) { admin { user { mutate(name: $name) { <field> { ... } } } } }`
macro_rules! user_mutation {
    ($args:literal, $field:literal, $($result:tt)+) => {
        concat!(
            "mutation ($name: String!",
            $args,
            ") { admin { user { mutate(name: $name) { ",
            $field,
            " { ",
            $($result)+,
            " } } } } }"
        )
    };
}

// ============ 会话 ============

pub const ME: &str = "query { me { name email isAdmin } }";

// ============ 包 ============

pub const PACKAGES_PAGE: &str = "query ($bucket: String!, $page: Int!, $perPage: Int!) { \
     packages(bucket: $bucket) { total page(number: $page, perPage: $perPage) { name } } }";

pub const PACKAGE: &str = "query ($bucket: String!, $name: String!, $hashOrTag: String!) { \
     package(bucket: $bucket, name: $name) { bucket name modified \
     revision(hashOrTag: $hashOrTag) { hash modified message } \
     latest: revision(hashOrTag: \"latest\") { hash } } }";

pub const PACKAGE_META: &str = "query ($bucket: String!, $name: String!, $hashOrTag: String!) { \
     package(bucket: $bucket, name: $name) { revision(hashOrTag: $hashOrTag) { hash userMeta } } }";

pub const PACKAGE_DIR: &str =
    "query ($bucket: String!, $name: String!, $hashOrTag: String!, $path: String!) { \
     package(bucket: $bucket, name: $name) { revision(hashOrTag: $hashOrTag) { hash \
     dir(path: $path) { path size children { __typename \
     ... on PackageFile { path size physicalKey } ... on PackageDir { path size } } } } } }";

// ============ 用户 ============

pub const USER_LIST: &str = concat!("query { admin { user { list { ", user_selection!(), " } } } }");

pub const USER_GET: &str = concat!(
    "query ($name: String!) { admin { user { get(name: $name) { ",
    user_selection!(),
    " } } } }"
);

pub const USER_CREATE: &str = concat!(
    "mutation ($input: UserInput!) { admin { user { create(input: $input) { ",
    user_result!(),
    " } } } }"
);

pub const USER_DELETE: &str = user_mutation!("", "delete", operation_result!());
pub const USER_SET_EMAIL: &str =
    user_mutation!(", $email: String!", "setEmail(email: $email)", user_result!());
pub const USER_SET_ADMIN: &str =
    user_mutation!(", $admin: Boolean!", "setAdmin(admin: $admin)", user_result!());
pub const USER_SET_ACTIVE: &str =
    user_mutation!(", $active: Boolean!", "setActive(active: $active)", user_result!());
pub const USER_RESET_PASSWORD: &str =
    user_mutation!("", "resetPassword", operation_result!());
pub const USER_SET_ROLE: &str = user_mutation!(
    ", $role: String!, $extraRoles: [String!], $append: Boolean!",
    "setRole(role: $role, extraRoles: $extraRoles, append: $append)",
    user_result!()
);
pub const USER_ADD_ROLES: &str =
    user_mutation!(", $roles: [String!]!", "addRoles(roles: $roles)", user_result!());
pub const USER_REMOVE_ROLES: &str = user_mutation!(
    ", $roles: [String!]!, $fallback: String",
    "removeRoles(roles: $roles, fallback: $fallback)",
    user_result!()
);

// ============ 角色 / SSO / Tabulator ============

pub const ROLE_LIST: &str = concat!("query { roles { ", role_selection!(), " } }");

pub const SSO_CONFIG_GET: &str =
    "query { admin { ssoConfig { text timestamp uploader { name } } } }";

pub const SSO_CONFIG_SET: &str = concat!(
    "mutation ($config: String) { admin { setSsoConfig(config: $config) { ",
    "__typename ... on SsoConfig { text timestamp uploader { name } } ",
    failure_members!(),
    " } } }"
);

pub const TABULATOR_OPEN_QUERY_GET: &str = "query { admin { tabulatorOpenQuery } }";

pub const TABULATOR_OPEN_QUERY_SET: &str = "mutation ($enabled: Boolean!) { admin { \
     setTabulatorOpenQuery(enabled: $enabled) { tabulatorOpenQuery } } }";

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(doc: &str) -> bool {
        let mut depth = 0_i32;
        for c in doc.chars() {
            match c {
                '{' | '(' => depth += 1,
                '}' | ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
        }
        depth == 0
    }

    #[test]
    fn documents_are_balanced() {
        for doc in [
            ME,
            PACKAGES_PAGE,
            PACKAGE,
            PACKAGE_META,
            PACKAGE_DIR,
            USER_LIST,
            USER_GET,
            USER_CREATE,
            USER_DELETE,
            USER_SET_EMAIL,
            USER_SET_ADMIN,
            USER_SET_ACTIVE,
            USER_RESET_PASSWORD,
            USER_SET_ROLE,
            USER_ADD_ROLES,
            USER_REMOVE_ROLES,
            ROLE_LIST,
            SSO_CONFIG_GET,
            SSO_CONFIG_SET,
            TABULATOR_OPEN_QUERY_GET,
            TABULATOR_OPEN_QUERY_SET,
        ] {
            assert!(balanced(doc), "unbalanced document: {doc}");
        }
    }

    #[test]
    fn user_mutation_expands() {
        assert_eq!(
            USER_DELETE,
            "mutation ($name: String!) { admin { user { mutate(name: $name) { delete { \
             __typename ... on Ok { _ } ... on InvalidInput { errors { path message name } } \
             ... on OperationError { message name } } } } } }"
        );
    }
}
