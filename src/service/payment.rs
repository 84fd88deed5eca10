use crate::models::{Payment, PaymentPayload};
use crate::storage::{Storage, StorageError};

use super::ServiceError;

/// Creates payments through the ledger so the student's paid sum moves with
/// the insert.
pub struct PaymentService<'a> {
    storage: &'a dyn Storage,
}

impl<'a> PaymentService<'a> {
    pub(super) fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    pub async fn create(&self, payload: &PaymentPayload) -> Result<Payment, ServiceError> {
        let recorded = self.storage.ledger().record(payload).await;
        let payment = match recorded {
            Ok(payment) => self.storage.payments().get_by_id(payment.id).await,
            Err(err) => Err(err),
        };
        payment.map_err(|err| {
            log::error!(op = "create", entity = "payment", error:% = err; "ERROR in service layer");
            rejected(err)
        })
    }
}

/// Any failure while recording a payment is the caller's fault unless the
/// database itself is unreachable.
fn rejected(err: StorageError) -> ServiceError {
    match err {
        StorageError::Database(err) if is_outage(&err) => ServiceError::Internal(err.to_string()),
        other => ServiceError::InvalidArgument(format!("could not create payment: {other}")),
    }
}

fn is_outage(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}
