//! HTTP handlers. Every entity shares the same generic CRUD handlers; only
//! payment creation and the admin report have their own.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::err::{proceeds, Error, Payload};
use crate::models::{AdminPayment, Credentials, ListParams, Page, Payment, PaymentPayload};
use crate::service::ServiceError;
use crate::state::AppState;
use crate::storage::Entity;

/// Bounds a service call by the request deadline.
pub async fn within<T, F>(timeout: Duration, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::Timeout),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Ok(Uuid::from_str(raw)?)
}

/// Replaces a plaintext password with its hash, if the payload has one.
async fn seal<P: Credentials>(state: &AppState, payload: &mut P) -> Result<(), Error> {
    if let Some(password) = payload.password_mut() {
        let plain = std::mem::take(password);
        *password = hash_password(Arc::clone(&state.passwords), plain).await?;
    }
    Ok(())
}

pub async fn create<E: Entity>(
    Extension(state): Extension<AppState>,
    body: Result<Json<E::Payload>, JsonRejection>,
) -> Payload<E> {
    let Json(mut payload) = body?;
    seal(&state, &mut payload).await?;

    let record = within(state.timeout, state.services.entity::<E>().create(&payload)).await?;
    proceeds("created successfully", record)
}

pub async fn update<E: Entity>(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    body: Result<Json<E::Payload>, JsonRejection>,
) -> Payload<E> {
    let id = parse_id(&id)?;
    let Json(mut payload) = body?;
    seal(&state, &mut payload).await?;

    let record = within(state.timeout, state.services.entity::<E>().update(id, &payload)).await?;
    proceeds("updated successfully", record)
}

pub async fn list<E: Entity>(
    Extension(state): Extension<AppState>,
    Query(params): Query<ListParams>,
) -> Payload<Page<E>> {
    let query = params.into_query();
    let page = within(state.timeout, state.services.entity::<E>().get_all(&query)).await?;
    proceeds("ok", page)
}

pub async fn get_by_id<E: Entity>(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Payload<E> {
    let id = parse_id(&id)?;
    let record = within(state.timeout, state.services.entity::<E>().get_by_id(id)).await?;
    proceeds("ok", record)
}

pub async fn delete<E: Entity>(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Payload<Uuid> {
    let id = parse_id(&id)?;
    within(state.timeout, state.services.entity::<E>().delete(id)).await?;
    proceeds("deleted successfully", id)
}

pub async fn create_payment(
    Extension(state): Extension<AppState>,
    body: Result<Json<PaymentPayload>, JsonRejection>,
) -> Payload<Payment> {
    let Json(payload) = body?;
    let payment = within(state.timeout, state.services.payments().create(&payload)).await?;
    proceeds("created successfully", payment)
}

pub async fn admin_payments(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Payload<Vec<AdminPayment>> {
    let id = parse_id(&id)?;
    let report = within(state.timeout, state.services.admin_report(id)).await?;
    proceeds("ok", report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn elapsed_deadline_is_a_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, ServiceError>(())
        };
        let err = within(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn service_errors_pass_through() {
        let failing = async { Err::<(), _>(ServiceError::NotFound("task not found".into())) };
        let err = within(Duration::from_secs(1), failing).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(matches!(parse_id("42"), Err(Error::InvalidPayload { .. })));
        assert!(parse_id("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }
}
