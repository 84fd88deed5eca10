pub mod auth;
pub mod config;
pub mod err;
pub mod handlers;
pub mod models;
pub mod service;
pub mod state;
pub mod storage;

use axum::middleware;
use axum::routing::{get, post, MethodRouter};
use axum::{Extension, Router};

use crate::models::{Admin, Branch, Group, Lesson, Payment, Schedule, Student, Task, Teacher};
use crate::state::AppState;
use crate::storage::Entity;

/// `/{name}` and `/{name}/:id` for one entity. `create` serves the POST.
fn resource<E: Entity>(router: Router, create: MethodRouter) -> Router {
    router
        .route(&format!("/{}", E::NAME), create.get(handlers::list::<E>))
        .route(
            &format!("/{}/:id", E::NAME),
            get(handlers::get_by_id::<E>)
                .put(handlers::update::<E>)
                .delete(handlers::delete::<E>),
        )
}

fn crud<E: Entity>(router: Router) -> Router {
    resource::<E>(router, post(handlers::create::<E>))
}

pub fn app(state: AppState) -> Router {
    let mut protected = Router::new();
    protected = crud::<Admin>(protected);
    protected = crud::<Branch>(protected);
    protected = crud::<Group>(protected);
    protected = crud::<Lesson>(protected);
    protected = resource::<Payment>(protected, post(handlers::create_payment));
    protected = crud::<Schedule>(protected);
    protected = crud::<Student>(protected);
    protected = crud::<Task>(protected);
    protected = crud::<Teacher>(protected);
    let protected = protected
        .route("/adminPay/:id", get(handlers::admin_payments))
        .route_layer(middleware::from_fn(auth::require_authorization));

    Router::new()
        .route("/student/login", post(auth::login_student))
        .merge(protected)
        .fallback(err::handler404)
        .layer(Extension(state))
}
