use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::database::models::{Role, Sample, User};
use crate::error::AppError;
use crate::handlers::{self, crud, system};
use crate::middleware::{normalize_errors, protect, restrict_to, RoleGuard};
use crate::server::Supervisor;
use crate::state::AppState;

/// Full application router with every global layer applied
pub fn app(state: AppState) -> Router {
    let supervisor = state.supervisor.clone();
    let api = state.config.api.clone();

    let router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .nest("/users", user_routes(&state))
        .nest("/api/v1/sample", sample_routes())
        // Known path with an unrouted method answers like an unknown path
        .method_not_allowed_fallback(system::not_found)
        .fallback(system::not_found)
        // Innermost first: panics become errors, errors become bodies
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(&supervisor, panic)
        }))
        .layer(middleware::from_fn_with_state(state.clone(), normalize_errors))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(api.max_request_size_bytes)),
        );

    rate_limited(router, &api).with_state(state)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use axum::routing::{delete, patch, post};
    use handlers::{auth, users};

    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password));

    let protected = Router::new()
        .route("/me", get(users::get_me))
        .route("/updatePassword", patch(auth::update_password))
        .route("/updateMe", patch(users::update_me))
        .route("/deleteMe", delete(users::delete_me));

    let admin = Router::new()
        .route("/", get(crud::get_many::<User>).post(crud::create_one::<User>))
        .route(
            "/:id",
            get(crud::get_one::<User>)
                .patch(crud::update_one::<User>)
                .delete(crud::delete_one::<User>),
        )
        .route_layer(middleware::from_fn_with_state(RoleGuard::new([Role::Admin]), restrict_to));

    // protect wraps restrict_to, so the guard always sees a CurrentUser
    let authenticated = protected
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    public.merge(authenticated)
}

fn sample_routes() -> Router<AppState> {
    use axum::routing::post;

    Router::new()
        .route("/", get(crud::get_many::<Sample>).post(crud::create_one::<Sample>))
        .route("/createOne", post(crud::create_one::<Sample>))
        .route(
            "/:id",
            get(crud::get_one::<Sample>)
                .patch(crud::update_one::<Sample>)
                .delete(crud::delete_one::<Sample>),
        )
}

/// Per-client-IP limit of `rate_limit_requests` per window, refilled evenly
fn rate_limited(router: Router<AppState>, api: &ApiConfig) -> Router<AppState> {
    if !api.enable_rate_limiting {
        return router;
    }

    let requests = api.rate_limit_requests.max(1);
    let replenish_ms = (api.rate_limit_window_secs.saturating_mul(1000) / u64::from(requests)).max(1);

    match GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(requests)
        .finish()
    {
        Some(governor) => {
            info!(
                "Rate limiting: {} requests per {}s per client",
                requests, api.rate_limit_window_secs
            );
            router.layer(GovernorLayer {
                config: Arc::new(governor),
            })
        }
        None => {
            warn!("Invalid rate limit settings; rate limiting disabled");
            router
        }
    }
}

fn panic_response(supervisor: &Supervisor, panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    supervisor.report_fatal(format!("request handler panicked: {}", detail));
    AppError::unexpected(anyhow::anyhow!("request handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn panic_is_reported_as_fatal() {
        let (supervisor, mut fatal) = Supervisor::new();

        let response = panic_response(&supervisor, Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<Arc<AppError>>().is_some());

        assert_eq!(fatal.recv().await, "request handler panicked: index out of bounds");
    }
}
