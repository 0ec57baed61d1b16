//! # API REST
//!
//! REST API implementation for LeafDoc.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, multipart uploads, CORS, session header)
//!
//! Uses `api-shared` for request/response types and accounts, and `leafdoc-core` for the
//! diagnosis pipeline.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{
        multipart::MultipartError, DefaultBodyLimit, Multipart, Path as AxumPath, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use api_shared::{
    AccountError, AccountService, DiagnosisRes, HealthRes, HealthService, LabelsRes, LoginReq,
    LoginRes, PredictionDto, RegisterReq, RegisterRes, RemedyDto, SettingsRes, Theme,
    TreatmentRes, UpdateSettingsReq, UploadImageReq, User,
};
use leafdoc_core::{
    validation::validate_upload_filename, CoreError, Diagnosis, DiseaseLabel, Prediction,
    PredictionService, Remedy, TreatmentRecord,
};
use leafdoc_files::UploadStore;

/// Header carrying the session token issued by `/login`.
pub const SESSION_HEADER: &str = "x-session-token";

/// Public URL prefix the upload directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/static/uploads";

/// Largest accepted request body; phone photos routinely exceed axum's 2 MiB default.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

type ApiError = (StatusCode, &'static str);

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub predictions: PredictionService,
    pub accounts: Arc<AccountService>,
    pub uploads: Arc<UploadStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register,
        login,
        logout,
        get_settings,
        update_settings,
        list_labels,
        get_treatment,
        predict,
    ),
    components(schemas(
        HealthRes,
        RegisterReq,
        RegisterRes,
        LoginReq,
        LoginRes,
        SettingsRes,
        UpdateSettingsReq,
        Theme,
        LabelsRes,
        RemedyDto,
        TreatmentRes,
        PredictionDto,
        DiagnosisRes,
        UploadImageReq,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router, including Swagger UI and the uploaded-image files.
pub fn router(state: AppState) -> Router {
    let uploads_dir = ServeDir::new(state.uploads.upload_dir());

    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/labels", get(list_labels))
        .route("/treatments/:label", get(get_treatment))
        .route("/predict", post(predict))
        .nest_service(UPLOADS_URL_PREFIX, uploads_dir)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn account_error(e: AccountError) -> ApiError {
    match e {
        AccountError::EmailTaken => (StatusCode::CONFLICT, "Email already registered"),
        AccountError::UsernameTaken => (StatusCode::CONFLICT, "Username already taken"),
        AccountError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Login failed"),
        AccountError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not logged in"),
        AccountError::InvalidInput(reason) => {
            tracing::debug!("rejected account request: {}", reason);
            (StatusCode::BAD_REQUEST, "Invalid input")
        }
        AccountError::Hashing(reason) => {
            tracing::error!("Password hashing error: {}", reason);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn core_error(e: CoreError) -> ApiError {
    match e {
        CoreError::NoImageUploaded => (StatusCode::BAD_REQUEST, "No image uploaded"),
        CoreError::NoImageSelected => (StatusCode::BAD_REQUEST, "No image selected"),
        CoreError::InvalidFileType => (
            StatusCode::BAD_REQUEST,
            "Invalid file type. Only png/jpg/jpeg allowed.",
        ),
        CoreError::AnalysisFailed(e) => {
            tracing::error!("Predict failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Model failed to analyze image")
        }
        other => {
            tracing::error!("Core error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Runs password hashing off the async workers.
async fn on_blocking_thread<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("Blocking task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::debug!("Multipart error: {}", e);
    match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => (StatusCode::PAYLOAD_TOO_LARGE, "Image too large"),
        _ => (StatusCode::BAD_REQUEST, "Invalid multipart body"),
    }
}

fn session_token(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Not logged in"))
}

fn current_user(state: &AppState, headers: &HeaderMap) -> Result<(Uuid, User), ApiError> {
    let token = session_token(headers)?;
    let user = state.accounts.user_for_token(token).map_err(account_error)?;
    Ok((token, user))
}

fn remedies(items: &[Remedy]) -> Vec<RemedyDto> {
    items
        .iter()
        .map(|r| RemedyDto {
            name: r.name.clone(),
            link: r.link.clone(),
        })
        .collect()
}

fn treatment_res(label: &str, record: &TreatmentRecord) -> TreatmentRes {
    TreatmentRes {
        label: label.to_string(),
        chemical: remedies(&record.chemical),
        organic: remedies(&record.organic),
        prevention: record.prevention.clone(),
    }
}

fn prediction_dto(p: &Prediction) -> PredictionDto {
    PredictionDto {
        label: p.label.to_string(),
        confidence: p.confidence.value(),
        percent: p.confidence.percent(),
    }
}

fn diagnosis_res(diagnosis: Diagnosis, image_url: String) -> DiagnosisRes {
    DiagnosisRes {
        image_url,
        predictions: diagnosis.predictions.iter().map(prediction_dto).collect(),
        top: prediction_dto(&diagnosis.top),
        treatment: treatment_res(diagnosis.top.label.as_str(), &diagnosis.treatment),
        explanation: diagnosis.explanation.text.into_string(),
        explanation_source: match diagnosis.explanation.source {
            leafdoc_core::ExplanationSource::Model => "model".into(),
            leafdoc_core::ExplanationSource::Fallback => "fallback".into(),
        },
        low_confidence: diagnosis.low_confidence,
        warning: diagnosis.warning,
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = RegisterRes),
        (status = 400, description = "Missing username, email or password"),
        (status = 409, description = "Email or username already in use")
    )
)]
/// Register a new user
///
/// Email is matched case-insensitively. Duplicate email is reported before duplicate username.
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<(StatusCode, Json<RegisterRes>), ApiError> {
    let accounts = Arc::clone(&state.accounts);
    let user = on_blocking_thread(move || {
        accounts.register(&req.username, &req.email, &req.password)
    })
    .await?
    .map_err(account_error)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterRes {
            id: user.id,
            username: user.username.to_string(),
            email: user.email.to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Session opened", body = LoginRes),
        (status = 401, description = "Login failed")
    )
)]
/// Open a session
///
/// The returned token must be sent in the `x-session-token` header on authenticated routes.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginRes>, ApiError> {
    let accounts = Arc::clone(&state.accounts);
    let token = on_blocking_thread(move || accounts.login(&req.email, &req.password))
        .await?
        .map_err(account_error)?;
    Ok(Json(LoginRes {
        token: token.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Not logged in")
    )
)]
#[axum::debug_handler]
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let (token, _) = current_user(&state, &headers)?;
    state.accounts.logout(token);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Current user's settings", body = SettingsRes),
        (status = 401, description = "Not logged in")
    )
)]
#[axum::debug_handler]
async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsRes>, ApiError> {
    let (_, user) = current_user(&state, &headers)?;
    Ok(Json(user.settings()))
}

#[utoipa::path(
    put,
    path = "/settings",
    request_body = UpdateSettingsReq,
    responses(
        (status = 200, description = "Settings saved", body = SettingsRes),
        (status = 401, description = "Not logged in")
    )
)]
#[axum::debug_handler]
async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateSettingsReq>,
) -> Result<Json<SettingsRes>, ApiError> {
    let token = session_token(&headers)?;
    let user = state
        .accounts
        .update_settings(token, req.theme, req.notifications)
        .map_err(account_error)?;
    Ok(Json(user.settings()))
}

#[utoipa::path(
    get,
    path = "/labels",
    responses(
        (status = 200, description = "Every label the classifier can return", body = LabelsRes)
    )
)]
#[axum::debug_handler]
async fn list_labels(State(_state): State<AppState>) -> Json<LabelsRes> {
    Json(LabelsRes {
        labels: DiseaseLabel::ALL.iter().map(|l| l.to_string()).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/treatments/{label}",
    params(("label" = String, Path, description = "Disease label, e.g. `Early Blight leaf disease`")),
    responses(
        (status = 200, description = "Treatment record; empty lists for unknown labels", body = TreatmentRes)
    )
)]
/// Treatment lookup by label
///
/// Never fails: an unrecognised label yields a record with empty lists.
#[axum::debug_handler]
async fn get_treatment(
    State(state): State<AppState>,
    AxumPath(label): AxumPath<String>,
) -> Json<TreatmentRes> {
    let record = state.predictions.catalog().lookup(&label);
    Json(treatment_res(&label, record))
}

#[utoipa::path(
    post,
    path = "/predict",
    request_body(content = UploadImageReq, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Diagnosis for the uploaded leaf", body = DiagnosisRes),
        (status = 400, description = "Missing image, empty filename or disallowed file type"),
        (status = 401, description = "Not logged in"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Model failed to analyze image")
    )
)]
/// Upload a leaf photo and diagnose it
///
/// The multipart field must be named `image`. The file is stored under its sanitised name,
/// replacing any earlier upload with the same name.
#[axum::debug_handler]
async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DiagnosisRes>, ApiError> {
    current_user(&state, &headers)?;

    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    // A field without a filename is a plain form value, not a file.
    let (file_name, bytes) = match upload {
        Some((Some(name), bytes)) => (Some(name), bytes),
        _ => (None, Vec::new()),
    };
    let file_name = validate_upload_filename(file_name.as_deref()).map_err(core_error)?;

    let stored = state.uploads.save(&file_name, &bytes).map_err(|e| {
        tracing::error!("Upload save error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save upload")
    })?;
    tracing::info!(
        "stored upload {} ({} bytes, sha256 {}, type {}, replaced {})",
        stored.file_name,
        stored.size_bytes,
        stored.sha256,
        stored.media_type.as_deref().unwrap_or("unknown"),
        stored.replaced
    );
    if !stored.looks_like_image() {
        tracing::warn!("upload {} does not look like an image", stored.file_name);
    }

    let diagnosis = state
        .predictions
        .diagnose(stored.path.clone())
        .await
        .map_err(core_error)?;

    let image_url = format!("{}/{}", UPLOADS_URL_PREFIX, stored.file_name);
    Ok(Json(diagnosis_res(diagnosis, image_url)))
}
