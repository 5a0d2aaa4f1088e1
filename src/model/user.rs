use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub email_verified_at: Option<NaiveDateTime>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::from_name(&self.role)
    }

    pub fn full_name(&self) -> String {
        join_name(&self.last_name, &self.first_name)
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

pub fn join_name(last_name: &str, first_name: &str) -> String {
    format!("{last_name} {first_name}").trim().to_string()
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct StaffMember {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "Yamada")]
    pub last_name: String,
    #[schema(example = "Taro")]
    pub first_name: String,
    #[schema(example = "taro@example.com")]
    pub email: String,
}
