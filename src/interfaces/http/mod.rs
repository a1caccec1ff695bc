//! axum surface over the application services.
//!
//! Handlers decode the request, delegate, and map [`crate::error::PaymentError`]
//! onto a status code. The caller's identity comes from the `x-customer-id`
//! header, set by the auth middleware in front of this service.

pub mod dto;
pub mod error;
pub mod handlers;

use crate::application::assistant::Assistant;
use crate::application::orchestrator::TransferOrchestrator;
use crate::application::receipts::Receipts;
use crate::application::scheduler::ScheduledTransfers;
use crate::domain::clock::Clock;
use crate::domain::ports::StoreHandle;
use crate::error::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub transfers: TransferOrchestrator,
    pub schedules: ScheduledTransfers,
    pub receipts: Receipts,
    pub assistant: Assistant,
}

impl AppState {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, assistant: Assistant) -> Self {
        let transfers = TransferOrchestrator::new(store.clone(), clock.clone());
        Self {
            schedules: ScheduledTransfers::new(store.clone(), transfers.clone(), clock),
            receipts: Receipts::new(store),
            transfers,
            assistant,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/pix/transfer", post(handlers::create_transfer))
        .route("/v1/pix/credit-card", post(handlers::create_credit_transfer))
        .route("/v1/pix/transfers", get(handlers::list_transfers))
        .route("/v1/pix/transfers/{id}", get(handlers::get_transfer))
        .route("/v1/pix/transfers/{id}/cancel", post(handlers::cancel_transfer))
        .route("/v1/pix/transfers/{id}/receipt", get(handlers::transfer_receipt))
        .route("/v1/pix/keys", post(handlers::register_key))
        .route("/v1/pix/keys/lookup", get(handlers::lookup_key))
        .route("/v1/pix/schedule", post(handlers::create_schedule))
        .route(
            "/v1/pix/schedule/{id}",
            get(handlers::get_schedule).delete(handlers::cancel_schedule),
        )
        .route("/v1/pix/schedule/{id}/pause", post(handlers::pause_schedule))
        .route("/v1/pix/schedule/{id}/resume", post(handlers::resume_schedule))
        .route("/v1/pix/scheduled", get(handlers::list_schedules))
        .route("/v1/pix/receipts", get(handlers::list_receipts))
        .route("/v1/pix/receipts/{id}", get(handlers::get_receipt))
        .route("/v1/assistant", post(handlers::assistant))
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
