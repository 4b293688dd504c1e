use super::*;

pub async fn list_transaction_logs_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<TransactionAuditListQuery>,
) -> ApiResult<Json<TransactionAuditPageResponse>> {
    let page = state
        .transaction_audit_service
        .list(&user, query.into_query()?)
        .await?;

    Ok(Json(TransactionAuditPageResponse::from(page)))
}

pub async fn transaction_history_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<TransactionHistoryResponse>> {
    let entries = state
        .transaction_audit_service
        .history_for_transaction(&user, transaction_id.as_str())
        .await?;

    Ok(Json(TransactionHistoryResponse {
        success: true,
        transaction_id,
        data: entries
            .into_iter()
            .map(TransactionAuditEntryResponse::from)
            .collect(),
    }))
}
