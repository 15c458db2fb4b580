//! User account service.

use escalation_types::activity::{NewActivity, actions};
use escalation_types::error::{RepositoryError, UserError};
use escalation_types::page::{Page, PageRequest, Pagination};
use escalation_types::rbac::{DEFAULT_USER_ROLE, RoleId};
use escalation_types::user::{CreateUserRequest, UpdateProfileRequest, User, UserFilter, UserId};
use serde_json::json;

use crate::repository::activity::ActivityLogRepository;
use crate::repository::user::{NewUser, UserRepository};
use crate::service::activity::ActivityService;

pub const DEFAULT_USER_PAGE: i64 = 20;
pub const MAX_USER_PAGE: i64 = 100;

fn storage(e: RepositoryError) -> UserError {
    UserError::StorageError(e.to_string())
}

fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(UserError::Validation(format!("invalid email address '{email}'"))),
    }
}

fn required_name(field: &str, value: &str) -> Result<String, UserError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UserError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

pub struct UserService<U: UserRepository, A: ActivityLogRepository> {
    repo: U,
    activity: ActivityService<A>,
}

impl<U: UserRepository, A: ActivityLogRepository> UserService<U, A> {
    pub fn new(repo: U, activity: ActivityService<A>) -> Self {
        Self { repo, activity }
    }

    /// Create an account. The role defaults to `league_user`.
    pub async fn create_user(
        &self,
        actor: Option<UserId>,
        request: CreateUserRequest,
    ) -> Result<User, UserError> {
        let email = normalize_email(&request.email)?;
        let firstname = required_name("firstname", &request.firstname)?;
        let lastname = required_name("lastname", &request.lastname)?;

        let role_name = request
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_USER_ROLE);
        let role_id = self
            .repo
            .find_role_id(role_name)
            .await
            .map_err(storage)?
            .ok_or_else(|| UserError::UnknownRole(role_name.to_string()))?;

        let user = self
            .repo
            .create(&NewUser {
                email: email.clone(),
                firstname,
                lastname,
                role_id,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => UserError::EmailConflict(email.clone()),
                other => storage(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role_name, "created user");
        let entry = NewActivity {
            user_id: actor.or(Some(user.id)),
            action: actions::USER_CREATED.to_string(),
            metadata: Some(json!({ "user_id": user.id, "email": user.email, "role": user.role_name })),
        };
        self.activity.log(entry).await;
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, UserError> {
        self.repo
            .get_by_id(id)
            .await
            .map_err(storage)?
            .ok_or(UserError::NotFound)
    }

    /// The user behind a credential, refusing deactivated or deleted accounts.
    pub async fn active_user(&self, id: UserId) -> Result<User, UserError> {
        let user = self.get_user(id).await?;
        if !user.can_sign_in() {
            return Err(UserError::Inactive);
        }
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, UserError> {
        self.repo
            .get_by_email(&email.trim().to_lowercase())
            .await
            .map_err(storage)?
            .ok_or(UserError::NotFound)
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<User>, UserError> {
        let request = PageRequest::clamped(page, limit, DEFAULT_USER_PAGE, MAX_USER_PAGE);
        let (items, total) = self.repo.list(filter, request).await.map_err(storage)?;
        Ok(Page {
            items,
            pagination: Pagination::new(request, total),
        })
    }

    /// Update the caller's own profile. At least one field is required.
    pub async fn update_profile(
        &self,
        id: UserId,
        request: UpdateProfileRequest,
    ) -> Result<User, UserError> {
        if request.is_empty() {
            return Err(UserError::Validation(
                "at least one of email, firstname or lastname is required".to_string(),
            ));
        }
        let update = UpdateProfileRequest {
            email: request.email.as_deref().map(normalize_email).transpose()?,
            firstname: request
                .firstname
                .as_deref()
                .map(|v| required_name("firstname", v))
                .transpose()?,
            lastname: request
                .lastname
                .as_deref()
                .map(|v| required_name("lastname", v))
                .transpose()?,
        };

        let user = self
            .repo
            .update_profile(id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => UserError::NotFound,
                RepositoryError::Conflict(_) => {
                    UserError::EmailConflict(update.email.clone().unwrap_or_default())
                }
                other => storage(other),
            })?;

        let mut fields = Vec::new();
        if update.email.is_some() {
            fields.push("email");
        }
        if update.firstname.is_some() {
            fields.push("firstname");
        }
        if update.lastname.is_some() {
            fields.push("lastname");
        }
        self.activity
            .log(NewActivity::new(id, actions::PROFILE_UPDATED).with_metadata(json!({ "fields": fields })))
            .await;
        Ok(user)
    }

    /// Soft-delete the caller's account.
    pub async fn delete_account(&self, id: UserId) -> Result<(), UserError> {
        self.repo.soft_delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound,
            other => storage(other),
        })?;
        tracing::info!(user_id = %id, "account deleted");
        self.activity.log(NewActivity::new(id, actions::ACCOUNT_DELETED)).await;
        Ok(())
    }

    pub async fn set_active(&self, actor: UserId, id: UserId, active: bool) -> Result<User, UserError> {
        let user = self.repo.set_active(id, active).await.map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound,
            other => storage(other),
        })?;
        let action = if active {
            actions::USER_ACTIVATED
        } else {
            actions::USER_DEACTIVATED
        };
        self.activity
            .log(NewActivity::new(actor, action).with_metadata(json!({ "target_user_id": id })))
            .await;
        Ok(user)
    }

    pub async fn change_role(&self, actor: UserId, id: UserId, role_id: RoleId) -> Result<User, UserError> {
        let before = self.get_user(id).await?;
        let user = self.repo.set_role(id, role_id).await.map_err(|e| match e {
            RepositoryError::NotFound => UserError::NotFound,
            RepositoryError::Conflict(_) => UserError::UnknownRole(role_id.to_string()),
            other => storage(other),
        })?;
        tracing::info!(user_id = %id, from = %before.role_name, to = %user.role_name, "changed user role");
        self.activity
            .log(NewActivity::new(actor, actions::ROLE_CHANGED).with_metadata(json!({
                "target_user_id": id,
                "previous_role_id": before.role_id,
                "new_role_id": role_id,
            })))
            .await;
        Ok(user)
    }

    /// Resolve a role name to its id.
    pub async fn role_id(&self, name: &str) -> Result<RoleId, UserError> {
        self.repo
            .find_role_id(name)
            .await
            .map_err(storage)?
            .ok_or_else(|| UserError::UnknownRole(name.to_string()))
    }
}
