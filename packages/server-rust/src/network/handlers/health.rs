//! Liveness and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;

use super::AppState;
use crate::network::HealthState;

/// Always 200 while the process is serving at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 when ready; 503 while starting, draining, or stopped.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use luaguard_core::{TransformOutcome, TransformRequest};

    use super::*;
    use crate::config::AppConfig;
    use crate::network::ShutdownController;
    use crate::traits::Transformer;
    use crate::workspace::Workspace;

    struct Unused;

    #[async_trait]
    impl Transformer for Unused {
        async fn transform(&self, _: &Workspace, _: &TransformRequest) -> TransformOutcome {
            unreachable!("probes never transform")
        }
    }

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(AppConfig::default()),
            Arc::new(Unused),
            Arc::new(ShutdownController::new()),
        )
    }

    #[tokio::test]
    async fn liveness_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
