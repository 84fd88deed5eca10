//! Service layer: thin delegation to storage that logs every failure with
//! the operation and entity it happened in.

mod auth;
mod payment;

use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Passwords, TokenIssuer};
use crate::models::{AdminPayment, ListQuery, Page};
use crate::storage::{Entity, Repository, Storage, StorageError};

pub use auth::AuthService;
pub use payment::PaymentService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Only a missing record keeps its own category; every other storage
    /// failure is internal.
    fn from_storage(entity: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound(format!("{entity} not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Logs a failed storage call and translates its error.
fn logged<T>(
    op: &'static str,
    entity: &'static str,
    result: Result<T, StorageError>,
) -> Result<T, ServiceError> {
    result.map_err(|err| {
        log::error!(op = op, entity = entity, error:% = err; "ERROR in service layer");
        ServiceError::from_storage(entity, err)
    })
}

/// Entry point to every service, shared by all handlers.
pub struct Services {
    storage: Arc<dyn Storage>,
    auth: AuthService,
}

impl Services {
    pub fn new(storage: Arc<dyn Storage>, passwords: Arc<Passwords>, tokens: TokenIssuer) -> Self {
        Self {
            auth: AuthService::new(Arc::clone(&storage), passwords, tokens),
            storage,
        }
    }

    pub fn entity<E: Entity>(&self) -> EntityService<'_, E> {
        EntityService {
            repository: E::repository(self.storage.as_ref()),
            entity: PhantomData,
        }
    }

    pub fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(self.storage.as_ref())
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub async fn admin_report(&self, admin_id: Uuid) -> Result<Vec<AdminPayment>, ServiceError> {
        logged(
            "admin_report",
            "admin",
            self.storage.reports().admin_payments(admin_id).await,
        )
    }
}

pub struct EntityService<'a, E> {
    repository: &'a dyn Repository<E>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityService<'_, E> {
    pub async fn create(&self, payload: &E::Payload) -> Result<E, ServiceError> {
        logged("create", E::NAME, self.repository.create(payload).await)
    }

    pub async fn update(&self, id: Uuid, payload: &E::Payload) -> Result<E, ServiceError> {
        logged("update", E::NAME, self.repository.update(id, payload).await)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<E, ServiceError> {
        logged("get_by_id", E::NAME, self.repository.get_by_id(id).await)
    }

    pub async fn get_all(&self, query: &ListQuery) -> Result<Page<E>, ServiceError> {
        logged("get_all", E::NAME, self.repository.get_all(query).await)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        logged("delete", E::NAME, self.repository.delete(id).await)
    }
}
