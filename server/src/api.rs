//! # REST API
//!
//! Builds the axum router for the Grantees HTTP interface. All endpoints
//! share application state through axum's `State` extractor and speak
//! JSON; failures use the `{ "error": ... }` body from [`crate::error`].
//!
//! ## Endpoints
//!
//! | Method      | Path                                 | Auth     |
//! |-------------|--------------------------------------|----------|
//! | GET         | `/health`                            | none     |
//! | GET         | `/status`                            | none     |
//! | POST        | `/functions/v1/credits-consume`      | bearer   |
//! | POST        | `/functions/v1/credits-purchase`     | bearer   |
//! | POST        | `/functions/v1/send-welcome-email`   | none     |
//! | POST        | `/auth/signup`                       | none     |
//! | POST        | `/auth/signin`                       | none     |
//! | GET / PATCH | `/profile`                           | bearer   |
//! | POST        | `/profile/premium`                   | bearer   |
//! | POST        | `/profile/onboarding`                | bearer   |
//! | GET         | `/credits`                           | bearer   |
//! | GET         | `/credits/audit`                     | bearer   |
//! | GET         | `/grants`                            | none     |
//! | GET         | `/grants/categories`                 | none     |
//! | GET         | `/grants/:id`                        | none     |
//! | GET         | `/opportunities`                     | none     |
//! | GET         | `/opportunities/:id`                 | none     |
//! | POST        | `/analytics/events`                  | optional |
//!
//! The three `/functions/v1/*` routes keep the paths existing clients
//! already call.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderName, Method, StatusCode,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use grantees_catalog::{
    category_count, data, parse_list, BuilderNiche, BuilderProfile, Grant, GrantFilter,
    Opportunity, OpportunityFilter,
};
use grantees_ledger::analytics::{Analytics, AnalyticsEvent};
use grantees_ledger::auth::{Claims, TokenIssuer};
use grantees_ledger::config::{
    DEFAULT_CONSUME_AMOUNT, DEFAULT_CONSUME_DESCRIPTION, DEMO_TX_PREFIX,
};
use grantees_ledger::email::{welcome_email, EmailError, Mailer};
use grantees_ledger::payments::{PaymentClaim, PaymentVerifier, UnverifiedPayments};
use grantees_ledger::{
    AccountPolicy, AccountService, CreditPackage, CreditSummary, GranteesDb, Ledger, LedgerAudit,
    LedgerError, Profile, ProfileUpdate,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: the database handle is reference-counted and the
/// integrations sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The server's reported version string.
    pub version: String,
    /// Accounts, tokens, and (through it) the credit ledger.
    pub accounts: AccountService,
    pub analytics: Analytics,
    /// Gate in front of every purchase.
    pub payments: Arc<dyn PaymentVerifier>,
    /// `None` when no Resend key is configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    /// Send the welcome email after signup.
    pub welcome_on_signup: bool,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// State with unverified payments and no mailer.
    pub fn new(
        db: GranteesDb,
        tokens: TokenIssuer,
        policy: AccountPolicy,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            accounts: AccountService::new(Ledger::new(db.clone()), tokens, policy),
            analytics: Analytics::new(db),
            payments: Arc::new(UnverifiedPayments),
            mailer: None,
            welcome_on_signup: false,
            metrics,
        }
    }

    pub fn with_payments(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.payments = verifier;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>, welcome_on_signup: bool) -> Self {
        self.mailer = Some(mailer);
        self.welcome_on_signup = welcome_on_signup;
        self
    }

    fn ledger(&self) -> &Ledger {
        self.accounts.ledger()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/functions/v1/credits-consume", post(credits_consume_handler))
        .route("/functions/v1/credits-purchase", post(credits_purchase_handler))
        .route("/functions/v1/send-welcome-email", post(send_welcome_email_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signin", post(signin_handler))
        .route("/profile", get(profile_handler).patch(update_profile_handler))
        .route("/profile/premium", post(premium_handler))
        .route("/profile/onboarding", post(onboarding_handler))
        .route("/credits", get(credits_handler))
        .route("/credits/audit", get(audit_handler))
        .route("/grants", get(grants_handler))
        .route("/grants/categories", get(categories_handler))
        .route("/grants/:id", get(grant_handler))
        .route("/opportunities", get(opportunities_handler))
        .route("/opportunities/:id", get(opportunity_handler))
        .route("/analytics/events", post(analytics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let claims = state.accounts.tokens().authenticate(header)?;
        Ok(AuthUser(claims))
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /functions/v1/credits-consume`. Both fields are optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConsumeRequest {
    pub amount: i64,
    pub description: String,
}

impl Default for ConsumeRequest {
    fn default() -> Self {
        Self {
            amount: DEFAULT_CONSUME_AMOUNT,
            description: DEFAULT_CONSUME_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    pub success: bool,
    pub credits_spent: u64,
    pub new_balance: u64,
}

/// Body of `POST /functions/v1/credits-purchase`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseRequest {
    pub wallet_address: Option<String>,
    /// Package name; `starter` when omitted.
    pub package: Option<String>,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub credits: u64,
    pub new_balance: u64,
}

#[derive(Debug, Deserialize)]
pub struct WelcomeEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and signin. `profile` is only present after signup.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct PremiumRequest {
    pub is_premium: bool,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsRequest {
    pub event: AnalyticsEvent,
    #[serde(default)]
    pub page_name: Option<String>,
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub users: usize,
    pub profiles: usize,
    pub transactions: usize,
    pub analytics_events: usize,
    /// `unverified` or `evm-rpc`.
    pub payment_verification: String,
    pub email_configured: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Query string of `GET /grants`. List values are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct GrantQuery {
    pub search: Option<String>,
    pub ecosystem: Option<String>,
    pub niche: Option<String>,
    /// Defaults to `open`. An empty value disables the status filter.
    pub status: Option<String>,
}

impl GrantQuery {
    pub fn to_filter(&self) -> ApiResult<GrantFilter> {
        let mut filter = GrantFilter::default();
        if let Some(search) = &self.search {
            filter.search = search.clone();
        }
        if let Some(raw) = &self.ecosystem {
            filter.ecosystems = parse_list(raw)?;
        }
        if let Some(raw) = &self.niche {
            filter.niches = parse_list(raw)?;
        }
        if let Some(raw) = &self.status {
            filter.statuses = parse_list(raw)?;
        }
        Ok(filter)
    }
}

/// Query string of `GET /opportunities`.
#[derive(Debug, Default, Deserialize)]
pub struct OpportunityQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ecosystem: Option<String>,
    pub remote: Option<String>,
}

impl OpportunityQuery {
    pub fn to_filter(&self) -> ApiResult<OpportunityFilter> {
        let mut filter = OpportunityFilter::default();
        if let Some(search) = &self.search {
            filter.search = search.clone();
        }
        if let Some(raw) = &self.kind {
            filter.types = parse_list(raw)?;
        }
        if let Some(raw) = &self.ecosystem {
            filter.ecosystems = parse_list(raw)?;
        }
        if let Some(raw) = &self.remote {
            filter.remote_only = match raw.trim().to_ascii_lowercase().as_str() {
                "" | "false" | "0" => false,
                "true" | "1" => true,
                other => {
                    return Err(ApiError::BadRequest(format!(
                        "remote must be true or false, got '{other}'"
                    )))
                }
            };
        }
        Ok(filter)
    }
}

/// Parses a JSON body that may be empty; an empty body yields `T::default()`.
fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers: service
// ---------------------------------------------------------------------------

/// `GET /health`: liveness probe. Does not touch storage.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let db = state.ledger().db();
    Json(StatusResponse {
        version: state.version.clone(),
        users: db.user_count(),
        profiles: db.profile_count(),
        transactions: db.transaction_count(),
        analytics_events: state.analytics.count(),
        payment_verification: state.payments.mode().to_string(),
        email_configured: state.mailer.is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// Handlers: credit functions
// ---------------------------------------------------------------------------

/// `POST /functions/v1/credits-consume`: spends credits for an AI action.
async fn credits_consume_handler(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<Json<ConsumeResponse>> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["credits-consume"])
        .start_timer();

    let req: ConsumeRequest = optional_body(&body)?;
    let description = non_blank(Some(req.description.as_str())).unwrap_or(DEFAULT_CONSUME_DESCRIPTION);

    let receipt = match state.ledger().consume(user.user_id(), req.amount, description) {
        Ok(receipt) => receipt,
        Err(e) => {
            if matches!(e, LedgerError::InsufficientCredits { .. }) {
                state.metrics.consume_rejections_total.inc();
            }
            return Err(e.into());
        }
    };

    let spent = receipt.transaction.credits.unsigned_abs();
    state.metrics.credits_consumed_total.inc_by(spent);
    Ok(Json(ConsumeResponse {
        success: true,
        credits_spent: spent,
        new_balance: receipt.new_balance,
    }))
}

/// `POST /functions/v1/credits-purchase`: credits a package after the
/// payment gate accepts it.
async fn credits_purchase_handler(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<Json<PurchaseResponse>> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["credits-purchase"])
        .start_timer();

    let req: PurchaseRequest = optional_body(&body)?;
    let package: CreditPackage = req.package.as_deref().unwrap_or("starter").parse()?;
    let wallet = non_blank(req.wallet_address.as_deref())
        .ok_or_else(|| ApiError::BadRequest("wallet_address is required".into()))?
        .to_string();
    let tx_hash = match non_blank(req.tx_hash.as_deref()) {
        Some(hash) => hash.to_string(),
        None if state.payments.requires_tx_hash() => {
            return Err(ApiError::BadRequest("tx_hash is required".into()))
        }
        None => format!("{DEMO_TX_PREFIX}{}", Uuid::new_v4().simple()),
    };
    // Verification and the replay index both see the canonical hash.
    let claim = PaymentClaim::new(&tx_hash, wallet, package)?;

    // Unknown users fail here rather than after a round trip to the chain.
    state.ledger().profile(user.user_id())?;

    state.payments.verify(&claim).await?;

    let receipt =
        state
            .ledger()
            .purchase(user.user_id(), &claim.wallet_address, package, &claim.tx_hash)?;

    state.metrics.purchases_total.inc();
    state.metrics.credits_purchased_total.inc_by(package.credits());
    Ok(Json(PurchaseResponse {
        success: true,
        credits: package.credits(),
        new_balance: receipt.new_balance,
    }))
}

/// `POST /functions/v1/send-welcome-email`
async fn send_welcome_email_handler(
    State(state): State<AppState>,
    payload: Result<Json<WelcomeEmailRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["send-welcome-email"])
        .start_timer();

    let Json(req) = payload?;
    let mailer = state.mailer.as_ref().ok_or(EmailError::NotConfigured)?;
    let message = welcome_email(&req.email)?;

    match mailer.send(&message).await {
        Ok(data) => {
            state.metrics.emails_sent_total.inc();
            Ok(Json(serde_json::json!({ "success": true, "data": data })))
        }
        Err(e) => {
            state.metrics.email_failures_total.inc();
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers: accounts
// ---------------------------------------------------------------------------

/// `POST /auth/signup`
async fn signup_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = payload?;
    let accounts = state.accounts.clone();
    // Password hashing is CPU-bound.
    let signed_up = tokio::task::spawn_blocking(move || {
        accounts.sign_up(&req.email, &req.password, req.referral_code.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    state.metrics.signups_total.inc();
    state.analytics.record(
        Some(&signed_up.user_id),
        AnalyticsEvent::SignupSuccess,
        None,
        None,
    );

    if state.welcome_on_signup {
        if let Some(mailer) = state.mailer.clone() {
            let metrics = state.metrics.clone();
            let email = signed_up.profile.email.clone();
            tokio::spawn(async move { deliver_welcome(mailer, metrics, email).await });
        }
    }

    Ok(Json(SessionResponse {
        access_token: signed_up.access_token,
        token_type: "bearer",
        user_id: signed_up.user_id,
        profile: Some(signed_up.profile),
    }))
}

/// Best-effort welcome email; failures are logged and counted only.
async fn deliver_welcome(mailer: Arc<dyn Mailer>, metrics: SharedMetrics, email: String) {
    let result = match welcome_email(&email) {
        Ok(message) => mailer.send(&message).await.map(|_| ()),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => metrics.emails_sent_total.inc(),
        Err(e) => {
            metrics.email_failures_total.inc();
            tracing::warn!(error = %e, "welcome email not sent");
        }
    }
}

/// `POST /auth/signin`
async fn signin_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<SessionResponse>> {
    let Json(req) = payload?;
    let accounts = state.accounts.clone();
    let signed_in = tokio::task::spawn_blocking(move || accounts.sign_in(&req.email, &req.password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    state.analytics.record(
        Some(&signed_in.user_id),
        AnalyticsEvent::LoginSuccess,
        None,
        None,
    );

    Ok(Json(SessionResponse {
        access_token: signed_in.access_token,
        token_type: "bearer",
        user_id: signed_in.user_id,
        profile: None,
    }))
}

/// `GET /profile`
async fn profile_handler(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Profile>> {
    Ok(Json(state.ledger().profile(user.user_id())?))
}

/// `PATCH /profile`: display name and wallet address.
async fn update_profile_handler(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<Profile>> {
    let Json(update) = payload?;
    Ok(Json(state.accounts.update_profile(user.user_id(), &update)?))
}

/// `POST /profile/premium`
async fn premium_handler(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<PremiumRequest>, JsonRejection>,
) -> ApiResult<Json<Profile>> {
    let Json(req) = payload?;
    let profile = state.accounts.update_premium(
        user.user_id(),
        req.is_premium,
        non_blank(req.tx_hash.as_deref()),
    )?;
    if req.is_premium {
        state.analytics.record(
            Some(user.user_id()),
            AnalyticsEvent::PremiumUnlockSuccess,
            None,
            None,
        );
    }
    Ok(Json(profile))
}

/// `POST /profile/onboarding`: stores the wizard's completed profile.
async fn onboarding_handler(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<BuilderProfile>, JsonRejection>,
) -> ApiResult<Json<Profile>> {
    let Json(builder) = payload?;
    let profile = state.accounts.set_builder_profile(user.user_id(), &builder)?;
    state.analytics.record(
        Some(user.user_id()),
        AnalyticsEvent::OnboardingComplete,
        None,
        None,
    );
    Ok(Json(profile))
}

/// `GET /credits`: balance, referrals, recent activity, and score.
async fn credits_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CreditSummary>> {
    Ok(Json(CreditSummary::load(state.ledger(), user.user_id())?))
}

/// `GET /credits/audit`: replays the caller's log against their balance.
async fn audit_handler(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<LedgerAudit>> {
    Ok(Json(state.ledger().audit(user.user_id())?))
}

// ---------------------------------------------------------------------------
// Handlers: directory
// ---------------------------------------------------------------------------

/// `GET /grants`
async fn grants_handler(Query(query): Query<GrantQuery>) -> ApiResult<Json<Vec<&'static Grant>>> {
    let filter = query.to_filter()?;
    Ok(Json(filter.apply(data::grants())))
}

/// `GET /grants/categories`: open grants per niche.
async fn categories_handler() -> Json<BTreeMap<&'static str, usize>> {
    let grants = data::grants();
    Json(
        BuilderNiche::ALL
            .iter()
            .map(|niche| (niche.as_str(), category_count(grants, *niche)))
            .collect(),
    )
}

/// `GET /grants/:id`
async fn grant_handler(Path(id): Path<String>) -> ApiResult<Json<&'static Grant>> {
    data::find_grant(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Grant not found: {id}")))
}

/// `GET /opportunities`
async fn opportunities_handler(
    Query(query): Query<OpportunityQuery>,
) -> ApiResult<Json<Vec<&'static Opportunity>>> {
    let filter = query.to_filter()?;
    Ok(Json(filter.apply(data::opportunities())))
}

/// `GET /opportunities/:id`
async fn opportunity_handler(Path(id): Path<String>) -> ApiResult<Json<&'static Opportunity>> {
    data::find_opportunity(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Opportunity not found: {id}")))
}

// ---------------------------------------------------------------------------
// Handlers: analytics
// ---------------------------------------------------------------------------

/// `POST /analytics/events`: anonymous events are accepted; a bad token
/// simply records the event without a user.
async fn analytics_handler(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    payload: Result<Json<AnalyticsRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(req) = payload?;
    state.analytics.record(
        user.as_ref().map(AuthUser::user_id),
        req.event,
        req.page_name.as_deref(),
        req.event_data.as_ref(),
    );
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
