//! Role-partitioned project membership.
//!
//! A project's users are derived entirely from its `project_users` rows; each row pairs one
//! user with exactly one [`Role`], so the owner, contributer and designer sets never overlap.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Contributer,
    Designer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Contributer, Role::Designer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Contributer => "contributer",
            Role::Designer => "designer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("unknown role: {}", s)))
    }
}

/// Public view of a stored user. The password hash is never deserialized into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Member {
    #[serde(flatten)]
    pub user: User,
    pub role: Role,
}

/// Resolved membership of one project, in user id order.
#[derive(Clone, Debug, Default)]
pub struct ProjectMembers {
    pub project_id: i64,
    pub members: Vec<Member>,
}

impl ProjectMembers {
    /// Users holding exactly `role`. An unrecognized role yields an empty list.
    pub fn users_with_role(&self, role: &str) -> Vec<&User> {
        self.members
            .iter()
            .filter(|m| m.role.as_str() == role)
            .map(|m| &m.user)
            .collect()
    }

    pub fn owners(&self) -> Vec<&User> {
        self.users_with_role(Role::Owner.as_str())
    }

    pub fn contributers(&self) -> Vec<&User> {
        self.users_with_role(Role::Contributer.as_str())
    }

    pub fn designers(&self) -> Vec<&User> {
        self.users_with_role(Role::Designer.as_str())
    }

    pub fn role_of(&self, user_id: i64) -> Option<Role> {
        self.members.iter().find(|m| m.user.id == user_id).map(|m| m.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: None,
        }
    }

    fn members() -> ProjectMembers {
        let roles = [Role::Owner, Role::Contributer, Role::Contributer, Role::Designer, Role::Owner];
        ProjectMembers {
            project_id: 1,
            members: roles
                .into_iter()
                .enumerate()
                .map(|(i, role)| Member { user: user(i as i64 + 1), role })
                .collect(),
        }
    }

    #[test]
    fn wrappers_filter_by_literal() {
        let m = members();
        let ids = |users: Vec<&User>| users.iter().map(|u| u.id).collect::<Vec<_>>();
        assert_eq!(ids(m.owners()), vec![1, 5]);
        assert_eq!(ids(m.contributers()), vec![2, 3]);
        assert_eq!(ids(m.designers()), vec![4]);
        assert_eq!(m.role_of(3), Some(Role::Contributer));
        assert_eq!(m.role_of(9), None);
    }

    #[test]
    fn unknown_role_is_empty_not_an_error() {
        assert!(members().users_with_role("admin").is_empty());
        assert!(members().users_with_role("Owner").is_empty());
    }

    #[test]
    fn role_sets_partition_the_membership() {
        let m = members();
        let sets: Vec<HashSet<i64>> = [m.owners(), m.contributers(), m.designers()]
            .into_iter()
            .map(|users| users.iter().map(|u| u.id).collect())
            .collect();
        for i in 0..sets.len() {
            for j in i + 1..sets.len() {
                assert!(sets[i].is_disjoint(&sets[j]));
            }
        }
        let union: HashSet<i64> = sets.into_iter().flatten().collect();
        let all: HashSet<i64> = m.members.iter().map(|m| m.user.id).collect();
        assert_eq!(union, all);
    }

    #[test]
    fn role_parsing_and_serialization() {
        assert_eq!("designer".parse::<Role>().unwrap(), Role::Designer);
        assert!(matches!("admin".parse::<Role>(), Err(AppError::Validation(_))));
        let member = Member { user: user(7), role: Role::Owner };
        assert_eq!(
            serde_json::to_value(&member).unwrap(),
            serde_json::json!({"id": 7, "username": "user7", "email": null, "role": "owner"})
        );
    }

    #[test]
    fn user_view_skips_password() {
        let u: User = serde_json::from_value(serde_json::json!({
            "id": 1, "username": "ganemone", "password": "$argon2id$...", "email": "g@x.com"
        }))
        .unwrap();
        assert_eq!(u.email.as_deref(), Some("g@x.com"));
    }
}
