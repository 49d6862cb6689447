//! User and school repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::database::filters::{fetch_page, Column, ColumnKind, FilterSet, PageRequest, Pagination, TableSpec};
use crate::models::user::{CreateSchoolRequest, School, User, UserRole, UserStatus};
use crate::utils::errors::SchoolEventsError;

const USER_COLUMNS: &str = "user_id, first_name, last_name, user_email, password_hash, role, status, \
    registration_date, email_verified, preferred_language, profile_picture, subscription, phone_number, \
    school_id, created_at, updated_at";

pub const USERS: TableSpec = TableSpec {
    table: "users",
    primary_key: "user_id",
    columns: &[
        Column::new("user_id", ColumnKind::Integer),
        Column::new("first_name", ColumnKind::Text),
        Column::new("last_name", ColumnKind::Text),
        Column::new("user_email", ColumnKind::Text),
        Column::new("role", ColumnKind::Enum(&["admin", "organizer", "school_representative", "analyst", "user"])),
        Column::new("status", ColumnKind::Enum(&["active", "inactive", "deleted", "rejected"])),
        Column::new("registration_date", ColumnKind::DateTime),
        Column::new("email_verified", ColumnKind::Bool),
        Column::new("preferred_language", ColumnKind::Enum(&["en", "sk", "cz"])),
        Column::nullable("phone_number", ColumnKind::Text),
        Column::nullable("school_id", ColumnKind::Integer),
        Column::new("created_at", ColumnKind::DateTime),
        Column::new("updated_at", ColumnKind::DateTime),
    ],
};

/// Row values for a new account; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub user_email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub preferred_language: String,
    pub phone_number: Option<String>,
    pub school_id: Option<i64>,
    pub email_verified: bool,
}

/// Column changes for an existing account
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub preferred_language: Option<String>,
    pub profile_picture: Option<String>,
    pub subscription: Option<String>,
    pub phone_number: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, conn: &mut PgConnection, user: NewUser) -> Result<User, SchoolEventsError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (first_name, last_name, user_email, password_hash, role, status, registration_date,
                               email_verified, preferred_language, phone_number, school_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $7, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.user_email.to_lowercase())
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(now)
        .bind(user.email_verified)
        .bind(user.preferred_language)
        .bind(user.phone_number)
        .bind(user.school_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, SchoolEventsError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by email, case-insensitive
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, SchoolEventsError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(user_email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Whether another account already uses this email
    pub async fn email_taken(&self, email: &str, exclude_user_id: Option<i64>) -> Result<bool, SchoolEventsError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE LOWER(user_email) = LOWER($1) AND ($2::BIGINT IS NULL OR user_id <> $2)"
        )
        .bind(email)
        .bind(exclude_user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    /// Update user
    pub async fn update(&self, conn: &mut PgConnection, id: i64, changes: UserChanges) -> Result<User, SchoolEventsError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                user_email = COALESCE(LOWER($4), user_email),
                password_hash = COALESCE($5, password_hash),
                role = COALESCE($6, role),
                status = COALESCE($7, status),
                preferred_language = COALESCE($8, preferred_language),
                profile_picture = COALESCE($9, profile_picture),
                subscription = COALESCE($10, subscription),
                phone_number = COALESCE($11, phone_number),
                email_verified = COALESCE($12, email_verified),
                updated_at = $13
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.user_email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.preferred_language)
        .bind(changes.profile_picture)
        .bind(changes.subscription)
        .bind(changes.phone_number)
        .bind(changes.email_verified)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::UserNotFound { user_id: id })?;

        Ok(user)
    }

    /// Change account status
    pub async fn set_status(&self, conn: &mut PgConnection, id: i64, status: UserStatus) -> Result<User, SchoolEventsError> {
        self.update(conn, id, UserChanges { status: Some(status), ..Default::default() }).await
    }

    /// List users with filters and pagination
    pub async fn list(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<User>, SchoolEventsError> {
        fetch_page(&self.pool, &USERS, filters, page, |_| {}).await
    }

    /// Accounts waiting for admin approval
    pub async fn list_pending(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<User>, SchoolEventsError> {
        fetch_page(&self.pool, &USERS, filters, page, |qb| {
            qb.push(" AND users.status = ");
            qb.push_bind(UserStatus::Inactive.as_str());
        })
        .await
    }

    /// Active accounts with the given role
    pub async fn find_active_by_role(&self, role: UserRole) -> Result<Vec<User>, SchoolEventsError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 AND status = 'active' ORDER BY user_id"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count users grouped by role
    pub async fn count_by_role(&self) -> Result<Vec<(String, i64)>, SchoolEventsError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT role, COUNT(*) FROM users WHERE status <> 'deleted' GROUP BY role ORDER BY role"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[derive(Clone, Debug)]
pub struct SchoolRepository {
    pool: PgPool,
}

impl SchoolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<School>, SchoolEventsError> {
        let school = sqlx::query_as::<_, School>("SELECT * FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(school)
    }

    pub async fn find_by_ico(&self, conn: &mut PgConnection, ico: &str) -> Result<Option<School>, SchoolEventsError> {
        let school = sqlx::query_as::<_, School>("SELECT * FROM schools WHERE ico = $1")
            .bind(ico)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(school)
    }

    pub async fn create(&self, conn: &mut PgConnection, request: CreateSchoolRequest) -> Result<School, SchoolEventsError> {
        let school = sqlx::query_as::<_, School>(
            r#"
            INSERT INTO schools (name, ico, address, city, psc, district, region, number_of_students, number_of_employees,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#
        )
        .bind(request.name)
        .bind(request.ico)
        .bind(request.address)
        .bind(request.city)
        .bind(request.psc)
        .bind(request.district)
        .bind(request.region)
        .bind(request.number_of_students)
        .bind(request.number_of_employees)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(school)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_repository_creation() {
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = UserRepository::new(pool);
            assert!(!repo.pool.is_closed());
        }
    }

    #[test]
    fn test_password_hash_is_not_filterable() {
        assert!(USERS.column("password_hash").is_none());
        assert!(USERS.column("user_email").is_some());
    }
}
