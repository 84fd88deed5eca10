//! Persistence for every entity.
//!
//! Each entity is served by one [`Repository`]. Two backends implement the
//! [`Storage`] set: PostgreSQL ([`postgres::PgStorage`]) and a process-local
//! store ([`memory::MemoryStorage`]) used when no database is configured.

pub mod memory;
pub mod postgres;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Admin, AdminPayment, Branch, Credentials, Group, Lesson, ListQuery, Page, Payment,
    PaymentPayload, Schedule, Student, Task, Teacher,
};

pub type PgQueryAs<'q, O> = QueryAs<'q, Postgres, O, PgArguments>;

/// A foreign key held by a record: the referenced table and id.
pub type Reference = (&'static str, Uuid);

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return Self::NotFound;
        }
        if let Some(db) = err.as_database_error() {
            let message = db.message().to_owned();
            match db.code().as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => return Self::InvalidReference(message),
                Some(UNIQUE_VIOLATION) => return Self::Conflict(message),
                _ => {}
            }
        }
        Self::Database(err)
    }
}

/// A record type with its own table, routes and repository.
pub trait Entity:
    Serialize + Clone + Send + Sync + Unpin + for<'r> FromRow<'r, PgRow> + 'static
{
    type Payload: DeserializeOwned + Credentials + Clone + Send + Sync + 'static;

    /// Singular name, used for routes and logs.
    const NAME: &'static str;
    /// Table name and list response key.
    const PLURAL: &'static str;
    /// Writable columns in the order [`Entity::bind`] binds them.
    const COLUMNS: &'static [&'static str];
    /// Column matched by the `search` list parameter.
    const SEARCH: Option<&'static str>;

    fn id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;

    /// Column that must be unique when non-empty.
    fn unique_key(&self) -> Option<&str> {
        None
    }

    /// Foreign keys this record holds. Absent references are skipped.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Value of the [`Entity::SEARCH`] column.
    fn search_text(&self) -> Option<&str>;

    /// Builds a record the way the store would after an insert or update.
    fn assemble(
        id: Uuid,
        payload: Self::Payload,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self;

    /// Binds the payload's values for [`Entity::COLUMNS`], in order.
    fn bind<'q, O>(payload: &'q Self::Payload, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O>;

    fn repository(storage: &dyn Storage) -> &dyn Repository<Self>;
}

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, payload: &E::Payload) -> Result<E, StorageError>;
    async fn update(&self, id: Uuid, payload: &E::Payload) -> Result<E, StorageError>;
    async fn get_by_id(&self, id: Uuid) -> Result<E, StorageError>;
    async fn get_all(&self, query: &ListQuery) -> Result<Page<E>, StorageError>;
    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StudentAccounts: Send + Sync {
    async fn get_by_login(&self, login: &str) -> Result<Student, StorageError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Inserts the payment and credits the student's paid sum as one unit.
    async fn record(&self, payload: &PaymentPayload) -> Result<Payment, StorageError>;
}

#[async_trait]
pub trait AdminReports: Send + Sync {
    async fn admin_payments(&self, admin_id: Uuid) -> Result<Vec<AdminPayment>, StorageError>;
}

pub trait Storage: Send + Sync {
    fn backend(&self) -> &'static str;

    fn admins(&self) -> &dyn Repository<Admin>;
    fn branches(&self) -> &dyn Repository<Branch>;
    fn groups(&self) -> &dyn Repository<Group>;
    fn lessons(&self) -> &dyn Repository<Lesson>;
    fn payments(&self) -> &dyn Repository<Payment>;
    fn schedules(&self) -> &dyn Repository<Schedule>;
    fn students(&self) -> &dyn Repository<Student>;
    fn tasks(&self) -> &dyn Repository<Task>;
    fn teachers(&self) -> &dyn Repository<Teacher>;

    fn accounts(&self) -> &dyn StudentAccounts;
    fn ledger(&self) -> &dyn PaymentLedger;
    fn reports(&self) -> &dyn AdminReports;
}
