use super::AppState;
use super::dto::{
    AssistantBody, AssistantResponse, CreditCardBody, Health, KeyLookupQuery, KeyLookupResponse,
    ListQuery, PayeeKeyResponse, ReceiptResponse, RegisterKeyBody, ScheduleBody,
    ScheduleResponse, TransferBody, TransferList, TransferResponse, parse_key_type,
};
use super::error::{ApiError, ApiResult};
use crate::application::orchestrator::DEFAULT_PAGE_SIZE;
use crate::error::PaymentError;
use axum::{
    Json,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, request::Parts},
};
use uuid::Uuid;

pub const CUSTOMER_HEADER: &str = "x-customer-id";
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Caller identity, taken from `x-customer-id`.
#[derive(Debug, Clone)]
pub struct CustomerId(pub String);

impl<S> FromRequestParts<S> for CustomerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CUSTOMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CustomerId(v.to_string()))
            .ok_or_else(|| {
                ApiError(PaymentError::Unauthorized(format!(
                    "missing {CUSTOMER_HEADER} header"
                )))
            })
    }
}

fn idempotency_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError(PaymentError::validation("body", rejection.body_text())))
}

fn parse_id(field: &str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError(PaymentError::validation(field, "must be a valid UUID")))
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn create_transfer(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    headers: HeaderMap,
    payload: Result<Json<TransferBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransferResponse>)> {
    let request = body(payload)?.into_request(idempotency_header(&headers))?;
    let transfer = state.transfers.submit(&customer_id, request).await?;
    Ok((StatusCode::CREATED, Json(TransferResponse::from(&transfer))))
}

pub async fn create_credit_transfer(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    headers: HeaderMap,
    payload: Result<Json<CreditCardBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransferResponse>)> {
    let request = body(payload)?.into_request(idempotency_header(&headers))?;
    let transfer = state.transfers.submit(&customer_id, request).await?;
    Ok((StatusCode::CREATED, Json(TransferResponse::from(&transfer))))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<TransferList>> {
    let Query(query) = query
        .map_err(|rejection| ApiError(PaymentError::validation("query", rejection.body_text())))?;
    let transfers = state
        .transfers
        .list(&customer_id, query.page, query.page_size)
        .await?;
    Ok(Json(TransferList {
        transfers: transfers.iter().map(TransferResponse::from).collect(),
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    }))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferResponse>> {
    let id = parse_id("transfer_id", &id)?;
    let transfer = state.transfers.get(&customer_id, id).await?;
    Ok(Json(TransferResponse::from(&transfer)))
}

pub async fn cancel_transfer(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<Json<TransferResponse>> {
    let id = parse_id("transfer_id", &id)?;
    let transfer = state.transfers.cancel(&customer_id, id).await?;
    Ok(Json(TransferResponse::from(&transfer)))
}

pub async fn transfer_receipt(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<Json<ReceiptResponse>> {
    let id = parse_id("transfer_id", &id)?;
    let receipt = state.receipts.by_transfer(&customer_id, id).await?;
    Ok(Json(ReceiptResponse::from(&receipt)))
}

pub async fn lookup_key(
    State(state): State<AppState>,
    CustomerId(_customer_id): CustomerId,
    query: Result<Query<KeyLookupQuery>, QueryRejection>,
) -> ApiResult<Json<KeyLookupResponse>> {
    let Query(query) = query
        .map_err(|rejection| ApiError(PaymentError::validation("query", rejection.body_text())))?;
    let key_type = parse_key_type("type", query.key_type.as_deref())?;
    let lookup = state.transfers.keys().lookup(key_type, &query.key).await?;
    Ok(Json(KeyLookupResponse::from(lookup)))
}

pub async fn register_key(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    payload: Result<Json<RegisterKeyBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PayeeKeyResponse>)> {
    let request = body(payload)?;
    let key_type = parse_key_type("key_type", Some(request.key_type.as_str()))?
        .ok_or_else(|| ApiError(PaymentError::validation("key_type", "required")))?;
    let key = state
        .transfers
        .keys()
        .register(&customer_id, key_type, request.key_value)
        .await?;
    Ok((StatusCode::CREATED, Json(PayeeKeyResponse::from(key))))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    headers: HeaderMap,
    payload: Result<Json<ScheduleBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ScheduleResponse>)> {
    let request = body(payload)?.into_request(idempotency_header(&headers))?;
    let scheduled = state.schedules.create(&customer_id, request).await?;
    Ok((StatusCode::CREATED, Json(ScheduleResponse::from(&scheduled))))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<Json<ScheduleResponse>> {
    let id = parse_id("schedule_id", &id)?;
    let scheduled = state.schedules.get(&customer_id, id).await?;
    Ok(Json(ScheduleResponse::from(&scheduled)))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let schedules = state.schedules.list(&customer_id).await?;
    Ok(Json(schedules.iter().map(ScheduleResponse::from).collect()))
}

pub async fn cancel_schedule(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id("schedule_id", &id)?;
    state.schedules.cancel(&customer_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause_schedule(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id("schedule_id", &id)?;
    state.schedules.pause(&customer_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_schedule(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id("schedule_id", &id)?;
    state.schedules.resume(&customer_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_receipt(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    Path(id): Path<String>,
) -> ApiResult<Json<ReceiptResponse>> {
    let id = parse_id("receipt_id", &id)?;
    let receipt = state.receipts.get(&customer_id, id).await?;
    Ok(Json(ReceiptResponse::from(&receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
) -> ApiResult<Json<Vec<ReceiptResponse>>> {
    let receipts = state.receipts.list(&customer_id).await?;
    Ok(Json(receipts.iter().map(ReceiptResponse::from).collect()))
}

pub async fn assistant(
    State(state): State<AppState>,
    CustomerId(customer_id): CustomerId,
    payload: Result<Json<AssistantBody>, JsonRejection>,
) -> ApiResult<Json<AssistantResponse>> {
    let request = body(payload)?;
    let result = state.assistant.respond(&customer_id, request.query).await?;
    Ok(Json(AssistantResponse::from(result)))
}
