use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{CreateUserCmd, EngineError, ResultEngine, User, users};

use super::{Engine, normalize_required_name, with_tx};

fn normalize_email(value: &str) -> ResultEngine<String> {
    let email = value.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if well_formed {
        Ok(email)
    } else {
        Err(EngineError::InvalidData {
            field: "email",
            reason: format!("'{value}' is not a valid email address"),
        })
    }
}

impl Engine {
    /// Registers a shopper account and returns its id.
    ///
    /// The email is lowercased before storage and must be unique across all
    /// accounts, active or not.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidData`] if the email is malformed, the display
    ///   name is blank, or the password is empty
    /// - [`EngineError::AlreadyExists`] if another account uses the same email
    pub async fn create_user(&self, cmd: CreateUserCmd) -> ResultEngine<Uuid> {
        let email = normalize_email(&cmd.email)?;
        let display_name = normalize_required_name(&cmd.display_name, "display_name")?;
        if cmd.password.is_empty() {
            return Err(EngineError::InvalidData {
                field: "password",
                reason: "must not be empty".to_string(),
            });
        }

        with_tx!(self, |db_tx| {
            let taken = users::Entity::find()
                .filter(Expr::cust("LOWER(email)").eq(email.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if taken {
                return Err(EngineError::AlreadyExists {
                    entity: "user",
                    field: "email",
                    value: email,
                });
            }

            let user = User::new(email, cmd.password, display_name);
            let user_id = user.id;
            users::ActiveModel::from(&user).insert(&db_tx).await?;
            Ok(user_id)
        })
    }

    /// Fetches an account by id.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such account exists.
    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, user_id).await?;
            User::try_from(model)
        })
    }

    /// Fetches an account by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no account uses this email.
    pub async fn user_by_email(&self, email: &str) -> ResultEngine<User> {
        let email = email.trim().to_lowercase();
        with_tx!(self, |db_tx| {
            let model = users::Entity::find()
                .filter(Expr::cust("LOWER(email)").eq(email.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "user",
                    id: email.clone(),
                })?;
            User::try_from(model)
        })
    }

    /// Enables or disables an account. Idempotent.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such account exists.
    pub async fn set_user_active(&self, user_id: Uuid, active: bool) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let user = users::ActiveModel {
                id: ActiveValue::Set(user_id.to_string()),
                is_active: ActiveValue::Set(active),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            user.update(&db_tx).await?;
            Ok(())
        })
    }
}
