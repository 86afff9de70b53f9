//! # User Service
//!
//! Application accounts, roles and permissions.
//!
//! ## Access Model
//! ```text
//! User ──< user_roles >── Role ──< role_permissions >── Permission
//!
//! effective_permissions(user) = ∪ permissions of every role it holds
//! ```
//!
//! Passwords are hashed with argon2 (random salt, PHC string) before they
//! reach storage and are never returned.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use comptoir_core::validation::{
    validate_new_user, validate_optional, validate_permission_input, validate_role_name,
};
use comptoir_core::{
    new_id, NewUser, Permission, PermissionInput, Role, User, ValidationError, DEFAULT_ROLE,
};
use comptoir_db::DbError;
use tracing::{info, warn};

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::services::clean;

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        UserService { ctx }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Creates an active account. It receives the `USER` role when that
    /// role exists.
    pub async fn create_user(&self, input: NewUser) -> ServiceResult<User> {
        validate_new_user(&input)?;
        let password_hash = hash_password(&input.password)?;

        let user = self
            .ctx
            .run("user.create", || async {
                let now = self.ctx.now();
                let repo = self.ctx.db().users();
                let mut tx = self.ctx.db().pool().begin().await?;

                let user = User {
                    id: new_id(),
                    username: input.username.trim().to_string(),
                    email: input.email.trim().to_lowercase(),
                    password_hash: password_hash.clone(),
                    first_name: clean(&input.first_name),
                    last_name: clean(&input.last_name),
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                repo.insert(&mut *tx, &user).await.map_err(|e| {
                    let value = match &e {
                        DbError::UniqueViolation { field, .. } if field == "users.email" => &user.email,
                        _ => &user.username,
                    };
                    e.with_value(value)
                })?;
                if let Some(role) = repo.find_role(&mut *tx, DEFAULT_ROLE).await? {
                    repo.assign_role(&mut *tx, &user.id, &role.id).await?;
                }

                tx.commit().await?;
                Ok(user)
            })
            .await?;
        info!(id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Checks a username (or email) and password.
    ///
    /// `None` for an unknown login, a wrong password or a disabled account;
    /// callers cannot tell which.
    pub async fn authenticate(&self, login: &str, password: &str) -> ServiceResult<Option<User>> {
        let found = self
            .ctx
            .db()
            .users()
            .find_by_login(self.ctx.db().pool(), login)
            .await?;
        let Some(user) = found else {
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash) {
            warn!(username = %user.username, "Authentication failed");
            return Ok(None);
        }
        if !user.active {
            warn!(username = %user.username, "Login attempt on disabled account");
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub async fn set_active(&self, user_id: &str, active: bool) -> ServiceResult<()> {
        self.ctx
            .run("user.set_active", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                self.ctx
                    .db()
                    .users()
                    .set_active(&mut *tx, user_id, active, self.ctx.now())
                    .await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(id = user_id, active, "User activation changed");
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<User> {
        self.ctx
            .db()
            .users()
            .get(self.ctx.db().pool(), user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.ctx.db().users().list().await?)
    }

    pub async fn count_users(&self) -> ServiceResult<i64> {
        Ok(self.ctx.db().users().count().await?)
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn create_role(&self, name: &str, description: Option<String>) -> ServiceResult<Role> {
        let name = name.trim();
        validate_role_name(name)?;
        validate_optional("description", description.as_deref(), 255)?;

        let role = Role {
            id: new_id(),
            name: name.to_string(),
            description: clean(&description),
        };
        self.ctx
            .run("user.create_role", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                self.ctx.db().users().insert_role(&mut *tx, &role).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(name = %role.name, "Role created");
        Ok(role)
    }

    pub async fn list_roles(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.ctx.db().users().list_roles().await?)
    }

    pub async fn roles_of(&self, user_id: &str) -> ServiceResult<Vec<Role>> {
        Ok(self.ctx.db().users().roles_of(self.ctx.db().pool(), user_id).await?)
    }

    /// Idempotent.
    pub async fn assign_role(&self, user_id: &str, role_name: &str) -> ServiceResult<()> {
        self.ctx
            .run("user.assign_role", || async {
                let repo = self.ctx.db().users();
                let mut tx = self.ctx.db().pool().begin().await?;
                if repo.get(&mut *tx, user_id).await?.is_none() {
                    return Err(ServiceError::not_found("User", user_id));
                }
                let role = repo
                    .find_role(&mut *tx, role_name)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Role", role_name))?;
                repo.assign_role(&mut *tx, user_id, &role.id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(user_id, role = role_name, "Role assigned");
        Ok(())
    }

    /// Returns whether the user held the role.
    pub async fn revoke_role(&self, user_id: &str, role_name: &str) -> ServiceResult<bool> {
        let revoked = self
            .ctx
            .run("user.revoke_role", || async {
                let repo = self.ctx.db().users();
                let mut tx = self.ctx.db().pool().begin().await?;
                let role = repo
                    .find_role(&mut *tx, role_name)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Role", role_name))?;
                let revoked = repo.revoke_role(&mut *tx, user_id, &role.id).await?;
                tx.commit().await?;
                Ok(revoked)
            })
            .await?;
        if revoked {
            info!(user_id, role = role_name, "Role revoked");
        }
        Ok(revoked)
    }

    /// Refused while any user holds the role.
    pub async fn delete_role(&self, name: &str) -> ServiceResult<()> {
        self.ctx
            .run("user.delete_role", || async {
                let repo = self.ctx.db().users();
                let mut tx = self.ctx.db().pool().begin().await?;
                let role = repo
                    .find_role(&mut *tx, name)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Role", name))?;
                let holders = repo.count_role_holders(&mut *tx, &role.id).await?;
                if holders > 0 {
                    return Err(ValidationError::HasDependents {
                        entity: "Role".to_string(),
                        id: name.to_string(),
                        reason: format!("assigned to {holders} user(s)"),
                    }
                    .into());
                }
                repo.delete_role(&mut *tx, &role.id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(name, "Role deleted");
        Ok(())
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    pub async fn create_permission(&self, input: PermissionInput) -> ServiceResult<Permission> {
        validate_permission_input(&input)?;
        let permission = Permission {
            id: new_id(),
            name: input.name.trim().to_string(),
            module: input.module.trim().to_string(),
            action: input.action.trim().to_string(),
            resource: clean(&input.resource),
        };
        self.ctx
            .run("user.create_permission", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                self.ctx
                    .db()
                    .users()
                    .insert_permission(&mut *tx, &permission)
                    .await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(name = %permission.name, "Permission created");
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> ServiceResult<Vec<Permission>> {
        Ok(self.ctx.db().users().list_permissions().await?)
    }

    /// Idempotent.
    pub async fn grant_permission(&self, role_name: &str, permission_name: &str) -> ServiceResult<()> {
        self.ctx
            .run("user.grant_permission", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                let (role, permission) = self.role_and_permission(&mut tx, role_name, permission_name).await?;
                self.ctx.db().users().grant(&mut *tx, &role.id, &permission.id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;
        info!(role = role_name, permission = permission_name, "Permission granted");
        Ok(())
    }

    /// Returns whether the role had the permission.
    pub async fn revoke_permission(&self, role_name: &str, permission_name: &str) -> ServiceResult<bool> {
        let revoked = self
            .ctx
            .run("user.revoke_permission", || async {
                let mut tx = self.ctx.db().pool().begin().await?;
                let (role, permission) = self.role_and_permission(&mut tx, role_name, permission_name).await?;
                let revoked = self.ctx.db().users().revoke(&mut *tx, &role.id, &permission.id).await?;
                tx.commit().await?;
                Ok(revoked)
            })
            .await?;
        if revoked {
            info!(role = role_name, permission = permission_name, "Permission revoked");
        }
        Ok(revoked)
    }

    /// Union of the permissions granted to every role of the user.
    pub async fn effective_permissions(&self, user_id: &str) -> ServiceResult<Vec<Permission>> {
        self.get_user(user_id).await?;
        Ok(self.ctx.db().users().effective_permissions(user_id).await?)
    }

    async fn role_and_permission(
        &self,
        conn: &mut sqlx::SqliteConnection,
        role_name: &str,
        permission_name: &str,
    ) -> ServiceResult<(Role, Permission)> {
        let repo = self.ctx.db().users();
        let role = repo
            .find_role(&mut *conn, role_name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_name))?;
        let permission = repo
            .find_permission(&mut *conn, permission_name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Permission", permission_name))?;
        Ok((role, permission))
    }
}

fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use comptoir_db::{Database, DbConfig};

    async fn service() -> UserService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        UserService::new(ServiceContext::new(db))
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@comptoir.test"),
            password: "correct horse".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let service = service().await;
        service.create_role(DEFAULT_ROLE, None).await.unwrap();
        let user = service.create_user(new_user("alice")).await.unwrap();
        assert_ne!(user.password_hash, "correct horse");
        assert!(user.password_hash.starts_with("$argon2"));

        let roles = service.roles_of(&user.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, DEFAULT_ROLE);

        let found = service.authenticate("ALICE", "correct horse").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id.clone()));
        let by_email = service.authenticate("alice@comptoir.test", "correct horse").await.unwrap();
        assert!(by_email.is_some());

        assert!(service.authenticate("alice", "wrong pass").await.unwrap().is_none());
        assert!(service.authenticate("nobody", "correct horse").await.unwrap().is_none());

        service.set_active(&user.id, false).await.unwrap();
        assert!(service.authenticate("alice", "correct horse").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_weak_password() {
        let service = service().await;
        service.create_user(new_user("bob")).await.unwrap();

        let err = service
            .create_user(NewUser {
                email: "other@comptoir.test".to_string(),
                ..new_user("bob")
            })
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(ValidationError::Duplicate { field, value }) => {
                assert_eq!(field, "username");
                assert_eq!(value, "bob");
            }
            other => panic!("unexpected {other:?}"),
        }

        let weak = NewUser {
            password: "short".to_string(),
            ..new_user("carol")
        };
        assert_eq!(
            service.create_user(weak).await.unwrap_err().code(),
            ErrorCode::ValidationError
        );
        assert_eq!(service.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_roles_and_effective_permissions() {
        let service = service().await;
        let user = service.create_user(new_user("dave")).await.unwrap();
        service.create_role("SALES", Some("Sales team".to_string())).await.unwrap();
        service.create_role("ADMIN", None).await.unwrap();

        for (name, action) in [("CUSTOMER_READ", "READ"), ("CUSTOMER_WRITE", "WRITE")] {
            service
                .create_permission(PermissionInput {
                    name: name.to_string(),
                    module: "CRM".to_string(),
                    action: action.to_string(),
                    resource: Some("customer".to_string()),
                })
                .await
                .unwrap();
        }
        service.grant_permission("SALES", "CUSTOMER_READ").await.unwrap();
        service.grant_permission("ADMIN", "CUSTOMER_READ").await.unwrap();
        service.grant_permission("ADMIN", "CUSTOMER_WRITE").await.unwrap();

        service.assign_role(&user.id, "SALES").await.unwrap();
        service.assign_role(&user.id, "ADMIN").await.unwrap();
        service.assign_role(&user.id, "ADMIN").await.unwrap();

        let names: Vec<String> = service
            .effective_permissions(&user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["CUSTOMER_READ", "CUSTOMER_WRITE"]);

        assert!(service.revoke_permission("ADMIN", "CUSTOMER_WRITE").await.unwrap());
        assert!(!service.revoke_permission("ADMIN", "CUSTOMER_WRITE").await.unwrap());
        assert_eq!(service.effective_permissions(&user.id).await.unwrap().len(), 1);

        let err = service.delete_role("ADMIN").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::HasDependents { .. })
        ));
        assert!(service.revoke_role(&user.id, "ADMIN").await.unwrap());
        service.delete_role("ADMIN").await.unwrap();
        assert_eq!(service.list_roles().await.unwrap().len(), 1);

        let err = service.assign_role(&user.id, "GHOST").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(service.create_role("lower", None).await.is_err());
    }
}
