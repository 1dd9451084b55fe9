use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{
    CustomerContact, NotifyChannel, Order, OrderItem, OrderStatus, PaymentStatus, Pricing,
    ShippingAddress,
};
use crate::domain::tenant::{self, Tenant, TenantStatus};
use crate::engine::CallerContext;
use crate::notify::NotifySummary;
use crate::store::OrderScope;
use crate::utils::retry_on_conflict;

use super::{caller, require_admin, require_tenant, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics))
        .route("/orders", web::post().to(place_order))
        .route("/orders", web::get().to(list_orders))
        .route("/orders/my-orders", web::get().to(my_orders))
        .route("/orders/{id}/assign-tenant", web::post().to(assign_tenant))
        .route("/orders/{id}/claim", web::post().to(claim_order))
        .route("/orders/{id}/status", web::put().to(update_status))
        .route("/orders/{id}/tenant-status", web::put().to(update_tenant_order_status))
        .route("/orders/{id}/notify", web::post().to(notify_order))
        .route("/orders/{id}/invoice", web::get().to(download_invoice))
        .route("/orders/{id}/share-invoice", web::post().to(share_invoice))
        .route("/tenants", web::post().to(register_tenant))
        .route("/tenants/{id}/commission", web::put().to(update_commission))
        .route("/tenants/{id}/status", web::put().to(update_tenant_status));
}

// ==== Orders ====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderRequest {
    customer: CustomerContact,
    shipping_address: ShippingAddress,
    items: Vec<OrderItem>,
    payment_method: String,
    payment_status: PaymentStatus,
    #[serde(flatten)]
    pricing: Pricing,
    #[serde(default)]
    tenant_id: Option<Uuid>,
    #[serde(default)]
    is_multi_tenant: bool,
}

async fn place_order(
    state: web::Data<AppState>,
    body: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let order = Order::place(
        body.customer,
        body.shipping_address,
        body.items,
        body.payment_method,
        body.payment_status,
        body.pricing,
        body.tenant_id,
        body.is_multi_tenant,
    )?;

    state
        .store
        .insert_order(order.clone())
        .await?;
    tracing::info!(order_id = %order.id, total = order.pricing.total_price, "order placed");

    // Order confirmation is best-effort; placement already committed.
    state
        .dispatcher
        .notify_status(&order, &[NotifyChannel::Email], OrderStatus::Pending, None)
        .await;

    Ok(HttpResponse::Created().json(order))
}

async fn list_orders(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    let orders = state
        .store
        .list_orders(OrderScope::All)
        .await?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn my_orders(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    let tenant_id = require_tenant(ctx)?;
    let orders = state
        .store
        .list_orders(OrderScope::Tenant(tenant_id))
        .await?;
    Ok(HttpResponse::Ok().json(orders))
}

// ==== Routing ====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignTenantRequest {
    #[serde(default)]
    tenant_id: Option<Uuid>,
    /// Broadcast mode: notify candidates and open a claim window instead
    /// of routing.
    #[serde(default)]
    notify_only: bool,
    #[serde(default)]
    tenant_ids: Vec<Uuid>,
}

async fn assign_tenant(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<AssignTenantRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    let order_id = path.into_inner();
    let body = body.into_inner();

    if body.notify_only {
        let claim = state.assignment.broadcast(order_id, body.tenant_ids).await?;
        return Ok(HttpResponse::Accepted().json(claim));
    }

    let tenant_id = body
        .tenant_id
        .ok_or_else(|| ApiError::bad_request("tenantId is required unless notifyOnly is set"))?;
    let order = state.assignment.assign_direct(order_id, tenant_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn claim_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    let tenant_id = require_tenant(ctx)?;
    let order = state.assignment.claim(path.into_inner(), tenant_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

// ==== Status ====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    status: OrderStatus,
    #[serde(default)]
    tracking_number: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransitionResponse {
    order: Order,
    no_op: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<NotifySummary>,
}

async fn transition(
    state: &AppState,
    ctx: CallerContext,
    order_id: Uuid,
    body: StatusRequest,
) -> Result<HttpResponse, ApiError> {
    // One immediate retry on an optimistic-concurrency conflict; a second
    // loss surfaces 409 to the caller.
    let outcome = retry_on_conflict(2, || {
        state
            .status
            .transition(ctx, order_id, body.status, body.tracking_number.clone())
    })
    .await?;

    Ok(HttpResponse::Ok().json(TransitionResponse {
        order: outcome.order,
        no_op: outcome.no_op,
        notification: outcome.notification,
    }))
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    transition(&state, ctx, path.into_inner(), body.into_inner()).await
}

async fn update_tenant_order_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_tenant(ctx)?;
    transition(&state, ctx, path.into_inner(), body.into_inner()).await
}

// ==== Notifications & Invoices ====

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum NotifyKind {
    Email,
    Whatsapp,
    Both,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest {
    #[serde(rename = "type")]
    kind: NotifyKind,
    #[serde(default)]
    tracking_number: Option<String>,
}

/// Load the order and check the caller may act on it: platform admins
/// always, tenants only on orders they own.
async fn authorized_order(
    state: &AppState,
    ctx: CallerContext,
    order_id: Uuid,
) -> Result<Order, ApiError> {
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("order not found: {order_id}")))?;

    match ctx.tenant_id {
        None => require_admin(ctx)?,
        Some(tenant_id) => {
            if !order.owned_by(tenant_id) {
                return Err(ApiError::forbidden("order belongs to another tenant"));
            }
        }
    }
    Ok(order)
}

async fn notify_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<NotifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    let body = body.into_inner();
    let order = authorized_order(&state, ctx, path.into_inner()).await?;

    let channels: &[NotifyChannel] = match body.kind {
        NotifyKind::Email => &[NotifyChannel::Email],
        NotifyKind::Whatsapp => &[NotifyChannel::Whatsapp],
        NotifyKind::Both => &[NotifyChannel::Email, NotifyChannel::Whatsapp],
    };

    let summary = state
        .dispatcher
        .notify_status(
            &order,
            channels,
            order.order_status,
            body.tracking_number.as_deref(),
        )
        .await;
    Ok(HttpResponse::Ok().json(summary))
}

async fn download_invoice(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    let order = authorized_order(&state, ctx, path.into_inner()).await?;

    let pdf = state
        .invoices
        .fetch_pdf(order.id)
        .await
        .map_err(|error| ApiError::upstream(format!("invoice renderer: {error}")))?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .body(pdf))
}

async fn share_invoice(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    let order = authorized_order(&state, ctx, path.into_inner()).await?;
    let result = state.invoices.share(order.id).await;
    Ok(HttpResponse::Ok().json(result))
}

// ==== Tenants ====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterTenantRequest {
    business_name: String,
    email: String,
    phone: String,
    commission_rate: f64,
}

async fn register_tenant(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RegisterTenantRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    let body = body.into_inner();

    let tenant = Tenant::register(body.business_name, body.email, body.phone, body.commission_rate)?;
    state
        .store
        .insert_tenant(tenant.clone())
        .await?;
    tracing::info!(tenant_id = %tenant.id, business = %tenant.business_name, "tenant registered");
    Ok(HttpResponse::Created().json(tenant))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommissionRequest {
    commission_rate: f64,
}

async fn update_commission(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<CommissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    let tenant_id = path.into_inner();
    let rate = body.into_inner().commission_rate;
    tenant::validate_rate(rate)?;

    let updated = state
        .store
        .update_commission_rate(tenant_id, rate)
        .await?;
    if !updated {
        return Err(ApiError::not_found(format!("tenant not found: {tenant_id}")));
    }

    tracing::info!(tenant_id = %tenant_id, rate, "commission rate updated");
    let tenant = state
        .store
        .get_tenant(tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tenant not found: {tenant_id}")))?;
    Ok(HttpResponse::Ok().json(tenant))
}

#[derive(Deserialize)]
struct TenantStatusRequest {
    status: TenantStatus,
}

async fn update_tenant_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<TenantStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = caller(req.headers())?;
    require_admin(ctx)?;
    let tenant_id = path.into_inner();
    let status = body.into_inner().status;

    let updated = state
        .store
        .update_tenant_status(tenant_id, status)
        .await?;
    if !updated {
        return Err(ApiError::not_found(format!("tenant not found: {tenant_id}")));
    }

    tracing::info!(tenant_id = %tenant_id, status = %status, "tenant status updated");
    let tenant = state
        .store
        .get_tenant(tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("tenant not found: {tenant_id}")))?;
    Ok(HttpResponse::Ok().json(tenant))
}

// ==== Operational ====

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "orderhub",
    }))
}

async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|error| ApiError::internal(format!("metrics encoding: {error}")))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

// ============================================================================
// Handler Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};
    use chrono::Duration;

    use super::*;
    use crate::engine::{AssignmentEngine, StatusEngine};
    use crate::metrics::Metrics;
    use crate::notify::testing::MockEmailGateway;
    use crate::notify::{Dispatcher, InvoiceService};
    use crate::store::MemoryStore;

    fn test_state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockEmailGateway::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            gateway,
            metrics.clone(),
        ));
        let assignment = AssignmentEngine::new(
            store.clone(),
            dispatcher.clone(),
            metrics.clone(),
            Duration::minutes(30),
        );
        let status = StatusEngine::new(store.clone(), dispatcher.clone(), metrics.clone());
        let invoices = InvoiceService::new(
            "http://invoices.internal".into(),
            None,
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        web::Data::new(AppState {
            store,
            assignment,
            status,
            dispatcher,
            invoices,
            metrics,
        })
    }

    fn order_body(tenant_id: Option<Uuid>) -> serde_json::Value {
        serde_json::json!({
            "customer": {"name": "Asha", "email": "asha@example.com", "phone": "+919900112233"},
            "shippingAddress": {"address": "12 MG Road", "city": "Bengaluru", "postalCode": "560001", "country": "IN"},
            "items": [{"productId": Uuid::new_v4(), "name": "Handmade mug", "price": 100_000, "quantity": 1}],
            "paymentMethod": "card",
            "paymentStatus": "Paid",
            "itemsPrice": 100_000,
            "totalPrice": 100_000,
            "tenantId": tenant_id,
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    async fn register_approved_tenant(
        app: &impl actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
        rate: f64,
    ) -> Uuid {
        let req = test::TestRequest::post()
            .uri("/tenants")
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({
                "businessName": "Clay & Kiln",
                "email": "seller@example.com",
                "phone": "+918800112233",
                "commissionRate": rate,
            }))
            .to_request();
        let tenant: Tenant = test::call_and_read_body_json(app, req).await;

        let req = test::TestRequest::put()
            .uri(&format!("/tenants/{}/status", tenant.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"status": "approved"}))
            .to_request();
        let approved: Tenant = test::call_and_read_body_json(app, req).await;
        assert_eq!(approved.status, TenantStatus::Approved);
        tenant.id
    }

    async fn place(app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >) -> Order {
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(order_body(None))
            .to_request();
        test::call_and_read_body_json(app, req).await
    }

    #[actix_web::test]
    async fn test_place_order_starts_pending() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(order_body(None))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 201);

        let order: Order = test::read_body_json(response).await;
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert!(!order.routed_to_tenant);
    }

    #[actix_web::test]
    async fn test_place_order_rejects_inconsistent_pricing() {
        let state = test_state();
        let app = app!(state);

        let mut body = order_body(None);
        body["totalPrice"] = serde_json::json!(90_000);
        let req = test::TestRequest::post().uri("/orders").set_json(body).to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 400);
    }

    #[actix_web::test]
    async fn test_assign_tenant_requires_admin_role() {
        let state = test_state();
        let app = app!(state);
        let order = place(&app).await;

        // No identity headers at all.
        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .set_json(serde_json::json!({"tenantId": Uuid::new_v4()}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        // Tenant identity is not enough.
        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", Uuid::new_v4().to_string()))
            .set_json(serde_json::json!({"tenantId": Uuid::new_v4()}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }

    #[actix_web::test]
    async fn test_direct_assign_then_conflict() {
        let state = test_state();
        let app = app!(state);
        let tenant_id = register_approved_tenant(&app, 10.0).await;
        let other = register_approved_tenant(&app, 12.0).await;
        let order = place(&app).await;

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"tenantId": tenant_id}))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);
        let routed: Order = test::read_body_json(response).await;
        assert_eq!(routed.tenant_id, Some(tenant_id));

        // Second assignment loses the race.
        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"tenantId": other}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 409);
    }

    #[actix_web::test]
    async fn test_broadcast_then_claim() {
        let state = test_state();
        let app = app!(state);
        let a = register_approved_tenant(&app, 10.0).await;
        let b = register_approved_tenant(&app, 12.0).await;
        let order = place(&app).await;

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"notifyOnly": true, "tenantIds": [a, b]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 202);

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/claim", order.id))
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", b.to_string()))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);
        let claimed: Order = test::read_body_json(response).await;
        assert_eq!(claimed.tenant_id, Some(b));

        // The loser is told the order is gone.
        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/claim", order.id))
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", a.to_string()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 409);
    }

    #[actix_web::test]
    async fn test_tenant_status_rules_enforced_over_http() {
        let state = test_state();
        let app = app!(state);
        let tenant_id = register_approved_tenant(&app, 10.0).await;
        let order = place(&app).await;

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/assign-tenant", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"tenantId": tenant_id}))
            .to_request();
        test::call_service(&app, req).await;

        // Tenant may not skip Pending -> Processing.
        let req = test::TestRequest::put()
            .uri(&format!("/orders/{}/tenant-status", order.id))
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", tenant_id.to_string()))
            .set_json(serde_json::json!({"status": "Processing"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 422);

        // One canonical step is fine.
        let req = test::TestRequest::put()
            .uri(&format!("/orders/{}/tenant-status", order.id))
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", tenant_id.to_string()))
            .set_json(serde_json::json!({"status": "Accepted"}))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);

        // Admin may jump straight to Shipped with a tracking number.
        let req = test::TestRequest::put()
            .uri(&format!("/orders/{}/status", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"status": "Shipped", "trackingNumber": "TRK-9"}))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["order"]["trackingNumber"], "TRK-9");
    }

    #[actix_web::test]
    async fn test_my_orders_scoped_to_caller() {
        let state = test_state();
        let app = app!(state);
        let mine = register_approved_tenant(&app, 10.0).await;
        let theirs = register_approved_tenant(&app, 10.0).await;

        for tenant_id in [mine, theirs] {
            let order = place(&app).await;
            let req = test::TestRequest::post()
                .uri(&format!("/orders/{}/assign-tenant", order.id))
                .insert_header(("x-caller-role", "admin"))
                .set_json(serde_json::json!({"tenantId": tenant_id}))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get()
            .uri("/orders/my-orders")
            .insert_header(("x-caller-role", "tenant"))
            .insert_header(("x-tenant-id", mine.to_string()))
            .to_request();
        let orders: Vec<Order> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].tenant_id, Some(mine));

        // Admin listing sees both.
        let req = test::TestRequest::get()
            .uri("/orders")
            .insert_header(("x-caller-role", "admin"))
            .to_request();
        let all: Vec<Order> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 2);
    }

    #[actix_web::test]
    async fn test_notify_both_reports_each_channel() {
        let state = test_state();
        let app = app!(state);
        let order = place(&app).await;

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/notify", order.id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"type": "both"}))
            .to_request();
        let summary: NotifySummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.results.len(), 2);
        assert!(summary.all_delivered());
    }

    #[actix_web::test]
    async fn test_share_invoice_degrades_without_storage() {
        let state = test_state();
        let app = app!(state);
        let order = place(&app).await;

        let req = test::TestRequest::post()
            .uri(&format!("/orders/{}/share-invoice", order.id))
            .insert_header(("x-caller-role", "admin"))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["uploaded"], false);
        assert!(body["url"].as_str().unwrap().ends_with(&format!("{}.pdf", order.id)));
    }

    #[actix_web::test]
    async fn test_commission_update_validates_rate() {
        let state = test_state();
        let app = app!(state);
        let tenant_id = register_approved_tenant(&app, 10.0).await;

        let req = test::TestRequest::put()
            .uri(&format!("/tenants/{}/commission", tenant_id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"commissionRate": 140.0}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::put()
            .uri(&format!("/tenants/{}/commission", tenant_id))
            .insert_header(("x-caller-role", "admin"))
            .set_json(serde_json::json!({"commissionRate": 15.0}))
            .to_request();
        let tenant: Tenant = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tenant.commission_rate, 15.0);
    }

    #[actix_web::test]
    async fn test_health_and_metrics_respond() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), 200);
    }
}
