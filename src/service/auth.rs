use std::sync::Arc;

use crate::auth::{Passwords, TokenIssuer, STUDENT_ROLE};
use crate::models::TokenPair;
use crate::storage::{Storage, StorageError};

use super::ServiceError;

const BAD_CREDENTIALS: &str = "invalid login or password";

pub struct AuthService {
    storage: Arc<dyn Storage>,
    passwords: Arc<Passwords>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub(super) fn new(
        storage: Arc<dyn Storage>,
        passwords: Arc<Passwords>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            storage,
            passwords,
            tokens,
        }
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn student_login(
        &self,
        login: &str,
        password: &str,
    ) -> Result<TokenPair, ServiceError> {
        if login.is_empty() || password.is_empty() {
            log::warn!(op = "student_login", entity = "student"; "blank credentials");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        let student = match self.storage.accounts().get_by_login(login).await {
            Ok(student) => student,
            Err(StorageError::NotFound) => {
                log::warn!(op = "student_login", entity = "student"; "unknown login");
                return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
            }
            Err(err) => {
                log::error!(op = "student_login", entity = "student", error:% = err; "ERROR in service layer");
                return Err(ServiceError::Internal(err.to_string()));
            }
        };

        let passwords = Arc::clone(&self.passwords);
        let plain = password.to_string();
        let stored = student.password.clone();
        let matches = tokio::task::spawn_blocking(move || passwords.verify(&plain, &stored))
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        if !matches {
            log::warn!(op = "student_login", entity = "student"; "password mismatch");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        self.tokens.issue(student.id, STUDENT_ROLE).map_err(|err| {
            log::error!(op = "student_login", entity = "student", error:% = err; "ERROR in service layer");
            ServiceError::Internal(err.to_string())
        })
    }
}
