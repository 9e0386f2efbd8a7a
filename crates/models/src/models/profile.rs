use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Structural board operations are admin-only; everyone may edit tasks.
/// Checked server-side on every entry point; the UI also reads the same
/// capability set to decide which controls to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    ManageColumns,
    DeleteAnyTask,
    ManageMembers,
    EditTasks,
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::EditTasks => true,
            Capability::ManageColumns | Capability::DeleteAnyTask | Capability::ManageMembers => {
                matches!(self, Role::Admin)
            }
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        [
            Capability::ManageColumns,
            Capability::DeleteAnyTask,
            Capability::ManageMembers,
            Capability::EditTasks,
        ]
        .into_iter()
        .filter(|c| self.allows(*c))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub job_title: Option<String>,
    pub avatar_url: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub job_title: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub organization_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_cannot_manage_columns() {
        assert!(!Role::User.allows(Capability::ManageColumns));
        assert!(!Role::User.allows(Capability::DeleteAnyTask));
        assert!(Role::User.allows(Capability::EditTasks));
    }

    #[test]
    fn admin_has_structural_capabilities() {
        assert!(Role::Admin.allows(Capability::ManageColumns));
        assert!(Role::Admin.allows(Capability::ManageMembers));
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    }
}
