//! HTTP surface: thin handlers over the domain services. Authorization
//! scopes are checked before any mutation; dates default to today but may
//! be supplied explicitly so reconciliation stays reproducible.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::accounts::AccountService;
use crate::clients::{IdentityProvider, Notifier};
use crate::domain::{
    AdverseActionId, Compact, EncumbranceType, HomeJurisdictionSelection, InvestigationId,
    Jurisdiction, LicenseType, MilitaryAffiliationType, ProviderId, RecordKind,
};
use crate::encumbrance::{EncumbrancePayload, EncumbranceService, RecordRef};
use crate::error::DomainError;
use crate::events::{EventPublisher, IngestQueue};
use crate::home::HomeJurisdictionService;
use crate::pipeline::{IngestService, PreprocessService, RawLicenseUpload, UploadBatchItem};
use crate::store::{ProviderStore, SsnIndex};

const SCOPES_HEADER: &str = "x-compact-scopes";
const ACTOR_HEADER: &str = "x-actor-id";

/// Every service the handlers dispatch into, wired once per process.
pub struct AppServices<S, X, Q, P, N, I> {
    pub preprocess: PreprocessService<S, X, Q>,
    pub ingest: IngestService<S, P>,
    pub home: HomeJurisdictionService<S, P>,
    pub encumbrance: EncumbranceService<S, P>,
    pub accounts: AccountService<S, X, N, I>,
    pub store: Arc<S>,
    pub queue: Arc<Q>,
}

/// Router builder exposing the compact-connect API.
pub fn compact_router<S, X, Q, P, N, I>(services: Arc<AppServices<S, X, Q, P, N, I>>) -> Router
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/compacts/:compact/licenses",
            post(upload_licenses::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers",
            get(list_providers::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id",
            get(get_provider::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/home-jurisdiction",
            put(put_home_jurisdiction::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/investigations",
            post(open_investigation::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/investigations/:investigation_id/close",
            post(close_investigation::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/adverse-actions",
            post(create_adverse_action::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/adverse-actions/:action_id/lift",
            post(lift_adverse_action::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/military-affiliations",
            post(upload_military_affiliation::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/registration",
            post(register_provider::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/email",
            post(request_email_change::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/email/confirm",
            post(confirm_email_change::<S, X, Q, P, N, I>),
        )
        .route(
            "/api/v1/compacts/:compact/providers/:provider_id/ssn",
            get(read_ssn::<S, X, Q, P, N, I>),
        )
        .with_state(services)
}

fn require_scope(headers: &HeaderMap, scope: &str) -> Result<(), DomainError> {
    let granted = headers
        .get(SCOPES_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if granted.split_whitespace().any(|held| held == scope) {
        Ok(())
    } else {
        Err(DomainError::Authorization(scope.to_string()))
    }
}

fn actor(headers: &HeaderMap) -> Result<String, DomainError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| DomainError::validation(None, "missing x-actor-id header"))
}

fn effective_date(supplied: Option<NaiveDate>) -> NaiveDate {
    supplied.unwrap_or_else(|| Local::now().date_naive())
}

fn parse_provider_id(raw: &str) -> Result<ProviderId, DomainError> {
    raw.parse()
        .map(ProviderId)
        .map_err(|_| DomainError::validation(Some("providerId".to_string()), "not a valid uuid"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseUploadRequest {
    licenses: Vec<RawLicenseUpload>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchFailureView {
    item_id: String,
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    accepted: usize,
    failures: Vec<BatchFailureView>,
}

/// Runs Stage A over the batch, then drains the queue through Stage B for
/// the synchronous path. Per-record failures never block the rest.
async fn upload_licenses<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path(compact): Path<String>,
    Json(request): Json<LicenseUploadRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.write"))?;
    let today = effective_date(request.today);

    let total = request.licenses.len();
    let items = request
        .licenses
        .into_iter()
        .enumerate()
        .map(|(index, mut upload)| {
            upload.compact = Compact(compact.clone());
            UploadBatchItem {
                item_id: format!("upload-{index}"),
                upload,
            }
        })
        .collect();

    let mut failures = services.preprocess.preprocess_batch(items);

    let queued = services.queue.receive(total)?;
    let messages = queued
        .into_iter()
        .enumerate()
        .map(|(index, body)| (format!("ingest-{index}"), body))
        .collect();
    failures.extend(services.ingest.ingest_batch(messages, today));

    let failures: Vec<BatchFailureView> = failures
        .into_iter()
        .map(|failure| BatchFailureView {
            item_id: failure.item_id,
            reason: failure.reason,
        })
        .collect();

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            accepted: total - failures.len(),
            failures,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderListQuery {
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    license_type: Option<String>,
}

/// Staff-facing provider listing over the secondary indexes: family-name
/// order by default, last-updated order on request, or holders of one
/// license type.
async fn list_providers<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path(compact): Path<String>,
    Query(query): Query<ProviderListQuery>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.readGeneral"))?;
    let compact = Compact(compact);

    let providers = match (query.license_type, query.sort.as_deref()) {
        (Some(license_type), _) => services
            .store
            .providers_by_license_type(&compact, &LicenseType(license_type))?,
        (None, Some("lastUpdated")) => services.store.providers_by_last_updated(&compact)?,
        (None, Some("familyName") | None) => services.store.providers_by_family_name(&compact)?,
        (None, Some(other)) => {
            return Err(DomainError::validation(
                Some("sort".to_string()),
                format!("unknown sort '{other}'"),
            ))
        }
    };

    Ok(Json(json!({ "providers": providers })))
}

async fn get_provider<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.readGeneral"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    let records = services
        .store
        .provider_records(&Compact(compact), provider_id)?;
    if records.is_empty() {
        return Err(DomainError::not_found(format!("provider {provider_id}")));
    }

    let bodies: Vec<_> = records.into_iter().map(|record| record.body).collect();
    Ok(Json(json!({ "items": bodies })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomeJurisdictionRequest {
    jurisdiction: String,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn put_home_jurisdiction<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<HomeJurisdictionRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.provider"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    let target = HomeJurisdictionSelection::from(request.jurisdiction);

    let outcome = services.home.change_home_jurisdiction(
        &Compact(compact),
        provider_id,
        target,
        effective_date(request.today),
    )?;

    Ok(Json(json!({
        "changed": outcome.changed,
        "affectedPrivileges": outcome.affected_privileges,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInvestigationRequest {
    against: RecordKind,
    jurisdiction: String,
    license_type: String,
    submitting_user: String,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn open_investigation<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<OpenInvestigationRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.admin"))?;
    let provider_id = parse_provider_id(&provider_id)?;

    let investigation = services.encumbrance.open_investigation(
        RecordRef {
            compact: Compact(compact),
            provider_id,
            kind: request.against,
            jurisdiction: Jurisdiction(request.jurisdiction),
            license_type: LicenseType(request.license_type),
        },
        &request.submitting_user,
        effective_date(request.today),
    )?;

    Ok((StatusCode::CREATED, Json(investigation)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncumbranceBody {
    clinical_privilege_action_category: String,
    encumbrance_type: EncumbranceType,
    effective_start_date: NaiveDate,
}

impl From<EncumbranceBody> for EncumbrancePayload {
    fn from(body: EncumbranceBody) -> Self {
        Self {
            clinical_privilege_action_category: body.clinical_privilege_action_category,
            encumbrance_type: body.encumbrance_type,
            effective_start_date: body.effective_start_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseInvestigationRequest {
    closing_user: String,
    #[serde(default)]
    encumbrance: Option<EncumbranceBody>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn close_investigation<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id, investigation_id)): Path<(String, String, String)>,
    Json(request): Json<CloseInvestigationRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.admin"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    let investigation_id = investigation_id
        .parse()
        .map(InvestigationId)
        .map_err(|_| DomainError::validation(Some("investigationId".to_string()), "not a valid uuid"))?;

    let investigation = services.encumbrance.close_investigation(
        &Compact(compact),
        provider_id,
        investigation_id,
        &request.closing_user,
        request.encumbrance.map(EncumbrancePayload::from),
        effective_date(request.today),
    )?;

    Ok(Json(investigation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdverseActionRequest {
    against: RecordKind,
    jurisdiction: String,
    license_type: String,
    submitting_user: String,
    #[serde(flatten)]
    encumbrance: EncumbranceBody,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn create_adverse_action<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<AdverseActionRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.admin"))?;
    let provider_id = parse_provider_id(&provider_id)?;

    let action = services.encumbrance.encumber(
        RecordRef {
            compact: Compact(compact),
            provider_id,
            kind: request.against,
            jurisdiction: Jurisdiction(request.jurisdiction),
            license_type: LicenseType(request.license_type),
        },
        request.encumbrance.into(),
        &request.submitting_user,
        effective_date(request.today),
    )?;

    Ok((StatusCode::CREATED, Json(action)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiftRequest {
    lifting_user: String,
    effective_lift_date: NaiveDate,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn lift_adverse_action<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id, action_id)): Path<(String, String, String)>,
    Json(request): Json<LiftRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.admin"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    let action_id = action_id
        .parse()
        .map(AdverseActionId)
        .map_err(|_| DomainError::validation(Some("actionId".to_string()), "not a valid uuid"))?;

    let action = services.encumbrance.lift(
        &Compact(compact),
        provider_id,
        action_id,
        &request.lifting_user,
        request.effective_lift_date,
        effective_date(request.today),
    )?;

    Ok(Json(action))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilitaryUploadRequest {
    affiliation_type: MilitaryAffiliationType,
    document_keys: Vec<String>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

async fn upload_military_affiliation<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<MilitaryUploadRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.provider"))?;
    let provider_id = parse_provider_id(&provider_id)?;

    let affiliation = services.accounts.upload_military_affiliation(
        &Compact(compact),
        provider_id,
        request.affiliation_type,
        request.document_keys,
        effective_date(request.today),
    )?;

    Ok((StatusCode::CREATED, Json(affiliation)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
}

async fn register_provider<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.provider"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    services
        .accounts
        .register(&Compact(compact), provider_id, &request.email)?;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailChangeRequest {
    email: String,
}

async fn request_email_change<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<EmailChangeRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.provider"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    services
        .accounts
        .request_email_change(&Compact(compact), provider_id, &request.email)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailConfirmRequest {
    code: String,
}

async fn confirm_email_change<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
    Json(request): Json<EmailConfirmRequest>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.provider"))?;
    let provider_id = parse_provider_id(&provider_id)?;
    services
        .accounts
        .confirm_email_change(&Compact(compact), provider_id, &request.code)?;
    Ok(StatusCode::OK)
}

async fn read_ssn<S, X, Q, P, N, I>(
    State(services): State<Arc<AppServices<S, X, Q, P, N, I>>>,
    headers: HeaderMap,
    Path((compact, provider_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, DomainError>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
    P: EventPublisher + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    require_scope(&headers, &format!("{compact}.readSSN"))?;
    let actor = actor(&headers)?;
    let provider_id = parse_provider_id(&provider_id)?;

    let now: DateTime<Utc> = Utc::now();
    let ssn = services
        .accounts
        .read_ssn(&actor, &Compact(compact), provider_id, now)?;
    Ok(Json(json!({ "ssn": ssn })))
}
