//! # User Repository
//!
//! Accounts, roles, permissions and the two link tables between them.
//! Password hashing happens in the service layer; this module only stores
//! the encoded hash.

use chrono::{DateTime, Utc};
use comptoir_core::types::{Permission, Role, User};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, active, created_at, updated_at";
const ROLE_COLUMNS: &str = "id, name, description";
const PERMISSION_COLUMNS: &str = "id, name, module, action, resource";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn insert<'e>(&self, ex: impl SqliteExecutor<'e>, user: &User) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, password_hash, first_name, last_name, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(ex)
        .await?;

        debug!(id = %user.id, username = %user.username, "Inserted user");
        Ok(())
    }

    pub async fn get<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(ex)
            .await?;
        Ok(user)
    }

    /// Looks a user up by username or email, case-insensitively.
    pub async fn find_by_login<'e>(&self, ex: impl SqliteExecutor<'e>, login: &str) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower(?1) OR lower(email) = lower(?1)"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login.trim())
            .fetch_optional(ex)
            .await?;
        Ok(user)
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    pub async fn set_active<'e>(
        &self,
        ex: impl SqliteExecutor<'e>,
        id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(now)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn insert_role<'e>(&self, ex: impl SqliteExecutor<'e>, role: &Role) -> DbResult<()> {
        sqlx::query("INSERT INTO roles (id, name, description) VALUES (?1, ?2, ?3)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(&role.description)
            .execute(ex)
            .await
            .map_err(|e| DbError::from(e).with_value(&role.name))?;
        debug!(name = %role.name, "Inserted role");
        Ok(())
    }

    pub async fn find_role<'e>(&self, ex: impl SqliteExecutor<'e>, name: &str) -> DbResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?1");
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .fetch_optional(ex)
            .await?;
        Ok(role)
    }

    pub async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name");
        let roles = sqlx::query_as::<_, Role>(&sql).fetch_all(&self.pool).await?;
        Ok(roles)
    }

    /// Fails with a foreign key violation while users still hold the role.
    pub async fn delete_role<'e>(&self, ex: impl SqliteExecutor<'e>, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?1")
            .bind(id)
            .execute(ex)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Role", id));
        }
        Ok(())
    }

    pub async fn count_role_holders<'e>(&self, ex: impl SqliteExecutor<'e>, role_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = ?1")
            .bind(role_id)
            .fetch_one(ex)
            .await?;
        Ok(count)
    }

    /// Idempotent.
    pub async fn assign_role<'e>(&self, ex: impl SqliteExecutor<'e>, user_id: &str, role_id: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(role_id)
            .execute(ex)
            .await?;
        Ok(())
    }

    /// Returns whether a link was removed.
    pub async fn revoke_role<'e>(&self, ex: impl SqliteExecutor<'e>, user_id: &str, role_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2")
            .bind(user_id)
            .bind(role_id)
            .execute(ex)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn roles_of<'e>(&self, ex: impl SqliteExecutor<'e>, user_id: &str) -> DbResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = ?1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(ex)
        .await?;
        Ok(roles)
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    pub async fn insert_permission<'e>(&self, ex: impl SqliteExecutor<'e>, permission: &Permission) -> DbResult<()> {
        sqlx::query("INSERT INTO permissions (id, name, module, action, resource) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(&permission.id)
            .bind(&permission.name)
            .bind(&permission.module)
            .bind(&permission.action)
            .bind(&permission.resource)
            .execute(ex)
            .await
            .map_err(|e| DbError::from(e).with_value(&permission.name))?;
        Ok(())
    }

    pub async fn find_permission<'e>(&self, ex: impl SqliteExecutor<'e>, name: &str) -> DbResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE name = ?1");
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(name)
            .fetch_optional(ex)
            .await?;
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> DbResult<Vec<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY module, name");
        let permissions = sqlx::query_as::<_, Permission>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(permissions)
    }

    /// Idempotent.
    pub async fn grant<'e>(&self, ex: impl SqliteExecutor<'e>, role_id: &str, permission_id: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?1, ?2)")
            .bind(role_id)
            .bind(permission_id)
            .execute(ex)
            .await?;
        Ok(())
    }

    pub async fn revoke<'e>(&self, ex: impl SqliteExecutor<'e>, role_id: &str, permission_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = ?1 AND permission_id = ?2")
            .bind(role_id)
            .bind(permission_id)
            .execute(ex)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Union of the permissions of every role the user holds.
    pub async fn effective_permissions(&self, user_id: &str) -> DbResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT DISTINCT p.id, p.name, p.module, p.action, p.resource
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = ?1
            ORDER BY p.module, p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn user(id: &str, username: &str) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn role(id: &str, name: &str) -> Role {
        Role {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn permission(id: &str, name: &str) -> Permission {
        Permission {
            id: id.to_string(),
            name: name.to_string(),
            module: "CRM".to_string(),
            action: "READ".to_string(),
            resource: None,
        }
    }

    #[tokio::test]
    async fn test_login_lookup_is_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        repo.insert(db.pool(), &user("u1", "alice")).await.unwrap();

        assert!(repo.find_by_login(db.pool(), "ALICE").await.unwrap().is_some());
        assert!(repo.find_by_login(db.pool(), "alice@example.com").await.unwrap().is_some());
        assert!(repo.find_by_login(db.pool(), "bob").await.unwrap().is_none());

        let err = repo.insert(db.pool(), &user("u2", "alice")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_effective_permissions_are_deduplicated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        repo.insert(db.pool(), &user("u1", "alice")).await.unwrap();
        repo.insert_role(db.pool(), &role("r1", "SALES")).await.unwrap();
        repo.insert_role(db.pool(), &role("r2", "SUPPORT")).await.unwrap();
        repo.insert_permission(db.pool(), &permission("p1", "CUSTOMER_READ")).await.unwrap();
        repo.insert_permission(db.pool(), &permission("p2", "CONTACT_READ")).await.unwrap();

        repo.grant(db.pool(), "r1", "p1").await.unwrap();
        repo.grant(db.pool(), "r2", "p1").await.unwrap();
        repo.grant(db.pool(), "r2", "p2").await.unwrap();
        repo.assign_role(db.pool(), "u1", "r1").await.unwrap();
        repo.assign_role(db.pool(), "u1", "r2").await.unwrap();
        repo.assign_role(db.pool(), "u1", "r2").await.unwrap();

        assert_eq!(repo.roles_of(db.pool(), "u1").await.unwrap().len(), 2);
        assert_eq!(repo.effective_permissions("u1").await.unwrap().len(), 2);

        assert!(repo.revoke_role(db.pool(), "u1", "r2").await.unwrap());
        let names: Vec<String> = repo
            .effective_permissions("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["CUSTOMER_READ"]);
    }

    #[tokio::test]
    async fn test_held_role_cannot_be_deleted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        repo.insert(db.pool(), &user("u1", "alice")).await.unwrap();
        repo.insert_role(db.pool(), &role("r1", "USER")).await.unwrap();
        repo.assign_role(db.pool(), "u1", "r1").await.unwrap();

        assert_eq!(repo.count_role_holders(db.pool(), "r1").await.unwrap(), 1);
        let err = repo.delete_role(db.pool(), "r1").await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        repo.revoke_role(db.pool(), "u1", "r1").await.unwrap();
        repo.delete_role(db.pool(), "r1").await.unwrap();
        assert!(repo.find_role(db.pool(), "USER").await.unwrap().is_none());
    }
}
