//! User and school models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum! {
    /// Role of an account; drives authorization
    UserRole {
        Admin => "admin",
        Organizer => "organizer",
        SchoolRepresentative => "school_representative",
        Analyst => "analyst",
        User => "user",
    }
}

text_enum! {
    UserStatus {
        Active => "active",
        Inactive => "inactive",
        Deleted => "deleted",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub registration_date: DateTime<Utc>,
    pub email_verified: bool,
    pub preferred_language: String,
    pub profile_picture: Option<String>,
    pub subscription: Option<String>,
    pub phone_number: Option<String>,
    pub school_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }

    pub fn status(&self) -> UserStatus {
        self.status.parse().unwrap_or(UserStatus::Inactive)
    }

    pub fn is_active(&self) -> bool {
        self.status() == UserStatus::Active
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub user_email: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub preferred_language: Option<String>,
    pub phone_number: Option<String>,
    pub school_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub preferred_language: Option<String>,
    pub profile_picture: Option<String>,
    pub subscription: Option<String>,
    pub phone_number: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub ico: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub psc: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub number_of_students: Option<i32>,
    pub number_of_employees: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchoolRequest {
    pub name: String,
    pub ico: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub psc: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub number_of_students: Option<i32>,
    pub number_of_employees: Option<i32>,
}

/// Public self-registration of a school representative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSchoolRepresentativeRequest {
    pub first_name: String,
    pub last_name: String,
    pub user_email: String,
    pub password: String,
    pub phone_number: String,
    pub preferred_language: Option<String>,
    pub school: CreateSchoolRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_text() {
        assert_eq!("school_representative".parse::<UserRole>().unwrap(), UserRole::SchoolRepresentative);
        assert_eq!(UserRole::Analyst.as_str(), "analyst");
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            user_id: 1,
            first_name: "Jana".into(),
            last_name: "Kovacova".into(),
            user_email: "jana@school.sk".into(),
            password_hash: "$argon2id$secret".into(),
            role: "admin".into(),
            status: "active".into(),
            registration_date: now,
            email_verified: true,
            preferred_language: "sk".into(),
            profile_picture: None,
            subscription: None,
            phone_number: None,
            school_id: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(user.role(), UserRole::Admin);
        assert!(user.is_active());
        assert_eq!(user.full_name(), "Jana Kovacova");
    }
}
