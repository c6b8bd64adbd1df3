use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post, put},
};
use pipeline_flow::{
    FlowError, InMemorySessionStorage, PipelineRunner, Session, SessionStorage,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    languages,
    llm::ModelChain,
    models::{
        CaptureRequest, CapturedImage, ImageOrigin, MAX_IMAGE_BYTES, PatientInfo, ReportCase,
        SessionView, SpeakRequest, SummarizeRequest, TranslateRequest, TranslateTtsRequest,
        TtsRequest,
    },
    ocr::{LocalOcr, OcrAdapter, RemoteEngine, RemoteOcrClient, TextExtractor},
    report::{ReportHistory, ReportRecord, render_html},
    speech::{SarvamTts, SpeechAdapter, SpeechError, Translator, VoiceOptions},
    stages::CASE_KEY,
    summarize::{GeminiSummarizer, ReportSummarizer},
    workflow::{build_report_pipeline, create_report_session, create_runner, describe_state},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn upstream_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn SessionStorage>,
    pub runner: PipelineRunner,
    pub remote_ocr: Arc<dyn RemoteEngine>,
    pub summarizer: Arc<dyn ReportSummarizer>,
    pub speech: Arc<SpeechAdapter>,
    pub history: Arc<ReportHistory>,
    pub environment: String,
    pub prefer_remote_ocr: bool,
}

pub fn create_app(config: &AppConfig) -> Router {
    build_router(create_app_state(config))
}

pub fn create_app_state(config: &AppConfig) -> AppState {
    let remote_ocr = Arc::new(RemoteOcrClient::new(
        config.ocr_api_key.clone(),
        config.ocr_api_url.clone(),
    ));
    let extractor: Arc<dyn TextExtractor> = Arc::new(OcrAdapter::new(
        remote_ocr.clone(),
        LocalOcr::with_default_engine(),
    ));

    let chain = ModelChain::new(config.gemini_api_key.clone());
    let summarizer: Arc<dyn ReportSummarizer> = Arc::new(GeminiSummarizer::new(chain.clone()));
    let speech = Arc::new(SpeechAdapter::new(
        Translator::new(chain),
        SarvamTts::new(config.sarvam_api_key.clone(), config.sarvam_api_url.clone()),
    ));

    let history = Arc::new(ReportHistory::new());
    let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    let pipeline = build_report_pipeline(extractor, summarizer.clone(), history.clone());
    let runner = create_runner(pipeline, storage.clone());

    AppState {
        storage,
        runner,
        remote_ocr,
        summarizer,
        speech,
        history,
        environment: config.environment.clone(),
        prefer_remote_ocr: config.prefer_remote_ocr,
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/ocr", post(api_ocr))
        .route("/api/analyze", post(api_analyze))
        .route("/api/summarize", post(api_summarize))
        .route("/api/translate", post(api_translate))
        .route("/api/tts", post(api_tts))
        .route("/api/translate-tts", post(api_translate_tts))
        .route("/api/reports", post(api_store_report))
        .route("/reports", post(capture_report))
        .route("/reports/history", get(report_history))
        .route("/reports/{session_id}", get(get_report_session))
        .route("/reports/{session_id}/capture", post(recapture_report))
        .route("/reports/{session_id}/process", post(process_report))
        .route("/reports/{session_id}/retake", post(retake_report))
        .route("/reports/{session_id}/patient", put(update_patient))
        .route("/reports/{session_id}/speak", post(speak_summary))
        .route("/reports/{session_id}/document", get(report_document))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "ASHA Report Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Medical report capture, OCR, AI summarization and voice playback",
        "endpoints": {
            "POST /reports": "Capture a report image and open a session",
            "POST /reports/{id}/process": "Run extraction and summarization",
            "POST /reports/{id}/retake": "Discard the current capture",
            "GET /reports/{id}": "Session state and artifacts",
            "GET /reports/history": "Completed report records",
            "POST /api/analyze": "One-shot OCR + summary (multipart)",
            "GET /api/health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.environment
    }))
}

// ---------------------------------------------------------------------------
// Workflow API
// ---------------------------------------------------------------------------

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found("Report session not found", session_id)),
        Err(err) => {
            error!(session = %session_id, error = %err, "failed to load session");
            Err(internal_error("Failed to load session", &err.to_string()))
        }
    }
}

async fn save_session(state: &AppState, session: Session) -> Result<(), ApiError> {
    state.storage.save(session).await.map_err(|err| {
        error!(error = %err, "failed to save session");
        internal_error("Failed to save session", &err.to_string())
    })
}

fn build_case(state: &AppState, request: &CaptureRequest) -> Result<ReportCase, ApiError> {
    let language = request
        .language
        .clone()
        .unwrap_or_else(|| languages::default_language().to_string());
    if !languages::is_supported(&language) {
        return Err(bad_request(&format!("unsupported language: {language}")));
    }

    let image = CapturedImage::from_payload(
        &request.image,
        request.mime_type.clone(),
        request.origin.unwrap_or(ImageOrigin::Camera),
        request.file_name.clone(),
    )
    .map_err(|e| bad_request(&e.to_string()))?;

    Ok(ReportCase::new(language, state.prefer_remote_ocr, image))
}

async fn capture_report(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> ApiResult<Value> {
    let case = build_case(&state, &request)?;
    info!(case = %case.id, language = %case.language, "report captured");

    let session = create_report_session(case).await;
    let session_id = session.id.clone();
    save_session(&state, session).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "state": "captured"
    })))
}

/// Replace the capture on an existing session. Cancels any in-flight run and
/// resets all artifacts first, like a retake followed by a fresh capture.
async fn recapture_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<CaptureRequest>,
) -> ApiResult<Value> {
    state.runner.cancel(&session_id);

    let mut session = load_session(&state, &session_id).await?;
    session.reset(state.runner.pipeline().start_stage_id());

    let case = build_case(&state, &request)?;
    session.context.set(CASE_KEY, case).await;
    save_session(&state, session).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "state": "captured"
    })))
}

async fn process_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    info!(session = %session_id, "processing report");

    match state.runner.run(&session_id).await {
        Ok(_result) => {
            let session = load_session(&state, &session_id).await?;
            let state_name = describe_state(&session).await;
            Ok(Json(json!({
                "session_id": session_id,
                "state": state_name,
                "status_message": session.status_message
            })))
        }
        Err(FlowError::RunInProgress) => Err(conflict(
            "processing is already in progress for this report",
        )),
        Err(FlowError::SessionNotFound(_)) => {
            Err(not_found("Report session not found", &session_id))
        }
        Err(FlowError::Cancelled) => Err(conflict("processing was superseded by a retake")),
        Err(err) => {
            error!(session = %session_id, error = %err, "failed to process report");
            Err(internal_error("Failed to process report", &err.to_string()))
        }
    }
}

/// Unconditional user cancellation: legal in every state. Cancels any
/// in-flight run and clears image, extraction and summary.
async fn retake_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    state.runner.cancel(&session_id);

    let mut session = load_session(&state, &session_id).await?;
    session.reset(state.runner.pipeline().start_stage_id());
    save_session(&state, session).await?;

    info!(session = %session_id, "report retaken");
    Ok(Json(json!({
        "session_id": session_id,
        "state": "idle"
    })))
}

async fn get_report_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = load_session(&state, &session_id).await?;
    let state_name = describe_state(&session).await;
    let case: Option<ReportCase> = session.context.get(CASE_KEY).await;

    let view = match case {
        Some(case) => SessionView {
            session_id: session.id.clone(),
            state: state_name,
            status_message: session.status_message.clone(),
            language: Some(case.language),
            has_image: case.image.is_some(),
            extraction: case.extraction,
            summary: case.summary,
            patient: case.patient,
            completed_at: case.completed_at,
        },
        None => SessionView {
            session_id: session.id.clone(),
            state: state_name,
            status_message: session.status_message.clone(),
            language: None,
            has_image: false,
            extraction: None,
            summary: None,
            patient: None,
            completed_at: None,
        },
    };

    Ok(Json(view))
}

async fn update_patient(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(patient): Json<PatientInfo>,
) -> ApiResult<Value> {
    let session = load_session(&state, &session_id).await?;
    let mut case: ReportCase = match session.context.get(CASE_KEY).await {
        Some(case) => case,
        None => return Err(bad_request("no report captured yet")),
    };

    case.patient = Some(patient);
    session.context.set(CASE_KEY, case.clone()).await;
    save_session(&state, session).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "status": "updated",
        "patient": case.patient
    })))
}

async fn speak_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SpeakRequest>,
) -> ApiResult<Value> {
    if !languages::is_speakable_locale(&request.target_language_code) {
        return Err(bad_request(&format!(
            "unsupported target language: {}",
            request.target_language_code
        )));
    }

    let session = load_session(&state, &session_id).await?;
    let case: ReportCase = session
        .context
        .get(CASE_KEY)
        .await
        .ok_or_else(|| bad_request("no report captured yet"))?;
    let summary = case
        .summary
        .ok_or_else(|| conflict("no summary available to speak yet"))?;

    let options = request.options.unwrap_or_default();
    let spoken = state
        .speech
        .speak(
            &summary.interpretation,
            &case.language,
            &request.target_language_code,
            &options,
        )
        .await
        .map_err(speech_error)?;

    Ok(Json(json!({
        "session_id": session_id,
        "originalText": spoken.original_text,
        "translatedText": spoken.translated_text,
        "audioData": spoken.audio_base64,
        "requestId": spoken.request_id,
        "sourceLanguage": case.language,
        "targetLanguage": spoken.target_locale
    })))
}

async fn report_document(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let case: ReportCase = session
        .context
        .get(CASE_KEY)
        .await
        .ok_or_else(|| bad_request("no report captured yet"))?;

    let record = state
        .history
        .find_by_case(&case.id)
        .or_else(|| ReportRecord::from_case(&case))
        .ok_or_else(|| conflict("report is not completed yet"))?;

    Ok(Html(render_html(&record)))
}

async fn report_history(State(state): State<AppState>) -> ApiResult<Vec<ReportRecord>> {
    Ok(Json(state.history.list()))
}

// ---------------------------------------------------------------------------
// Compatibility proxy API
// ---------------------------------------------------------------------------

fn speech_error(err: SpeechError) -> ApiError {
    match err {
        SpeechError::EmptyText => bad_request("No text provided"),
        other => upstream_error(&other.to_string()),
    }
}

struct UploadedFile {
    image: CapturedImage,
    language: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    let mut image = None;
    let mut language = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let mime_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "image/jpeg".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&e.to_string()))?;
                image = Some(
                    CapturedImage::from_bytes(&bytes, mime_type, ImageOrigin::Upload, file_name)
                        .map_err(|e| bad_request(&e.to_string()))?,
                );
            }
            "language" => {
                language = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(&e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| bad_request("No file provided"))?;
    Ok(UploadedFile { image, language })
}

async fn api_ocr(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Value> {
    let upload = read_upload(multipart).await?;
    let language = upload.language.unwrap_or_else(|| "eng".to_string());

    info!(file = %upload.image.file_name, "proxying OCR request");
    match state.remote_ocr.parse_image(&upload.image, &language).await {
        Ok(text) => Ok(Json(json!({ "extractedText": text }))),
        Err(err) => {
            error!(error = %err, "OCR proxy failed");
            Err(upstream_error(&format!("OCR processing failed: {err}")))
        }
    }
}

async fn api_analyze(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Value> {
    let upload = read_upload(multipart).await?;
    let language = upload
        .language
        .unwrap_or_else(|| languages::default_language().to_string());

    let text = state
        .remote_ocr
        .parse_image(&upload.image, &language)
        .await
        .map_err(|err| upstream_error(&format!("OCR processing failed: {err}")))?;

    let summary = state
        .summarizer
        .summarize(&text, &language)
        .await
        .map_err(|err| upstream_error(&err.to_string()))?;

    Ok(Json(json!({
        "extractedText": text,
        "summary": {
            "interpretation": summary.interpretation,
            "actionItems": summary.action_items
        }
    })))
}

async fn api_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Value> {
    if request.text.trim().is_empty() {
        return Err(bad_request("No text provided"));
    }

    let summary = state
        .summarizer
        .summarize(&request.text, &request.language)
        .await
        .map_err(|err| upstream_error(&err.to_string()))?;

    Ok(Json(json!({
        "summary": {
            "interpretation": summary.interpretation,
            "actionItems": summary.action_items
        }
    })))
}

async fn api_translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Value> {
    if request.text.trim().is_empty() {
        return Err(bad_request("No text provided"));
    }

    let translated = state
        .speech
        .translate(&request.text, &request.source_language, &request.target_language)
        .await
        .map_err(speech_error)?;

    Ok(Json(json!({
        "originalText": request.text,
        "translatedText": translated,
        "sourceLanguage": request.source_language,
        "targetLanguage": request.target_language
    })))
}

async fn api_tts(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> ApiResult<Value> {
    if request.text.trim().is_empty() {
        return Err(bad_request("No text provided"));
    }

    let options = request.options.unwrap_or_default();
    let audio = state
        .speech
        .synthesize(&request.text, &request.target_language_code, &options)
        .await
        .map_err(speech_error)?;

    Ok(Json(json!({
        "audioData": audio.audio_base64,
        "targetLanguage": request.target_language_code
    })))
}

async fn api_translate_tts(
    State(state): State<AppState>,
    Json(request): Json<TranslateTtsRequest>,
) -> ApiResult<Value> {
    if request.text.trim().is_empty() {
        return Err(bad_request("No text provided"));
    }

    let options = request.options.unwrap_or_default();
    let spoken = state
        .speech
        .speak(
            &request.text,
            &request.source_language,
            &request.target_language_code,
            &options,
        )
        .await
        .map_err(speech_error)?;

    Ok(Json(json!({
        "originalText": spoken.original_text,
        "translatedText": spoken.translated_text,
        "audioData": spoken.audio_base64,
        "requestId": spoken.request_id,
        "sourceLanguage": request.source_language,
        "targetLanguage": spoken.target_locale
    })))
}

/// Replay target for the offline sync queue: stores a previously assembled
/// report record into the history.
async fn api_store_report(
    State(state): State<AppState>,
    Json(record): Json<ReportRecord>,
) -> ApiResult<Value> {
    let id = record.id.clone();
    state.history.push(record);
    info!(record = %id, "queued report stored");
    Ok(Json(json!({ "status": "stored", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            environment: "test".to_string(),
            ocr_api_key: "ocr-key".to_string(),
            gemini_api_key: "gemini-key".to_string(),
            sarvam_api_key: "sarvam-key".to_string(),
            // Dead endpoints: these tests never complete a remote call.
            ocr_api_url: "http://127.0.0.1:1/parse/image".to_string(),
            sarvam_api_url: "http://127.0.0.1:1/text-to-speech".to_string(),
            prefer_remote_ocr: true,
        }
    }

    fn capture_request() -> CaptureRequest {
        CaptureRequest {
            image: STANDARD.encode(b"report-photo"),
            mime_type: Some("image/jpeg".to_string()),
            origin: Some(ImageOrigin::Camera),
            file_name: None,
            language: Some("en".to_string()),
        }
    }

    #[tokio::test]
    async fn health_reports_status_and_environment() {
        let state = create_app_state(&test_config());
        let Json(body) = health_check(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"], "test");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn summarize_rejects_empty_text_before_any_upstream_call() {
        let state = create_app_state(&test_config());
        let result = api_summarize(
            State(state),
            Json(SummarizeRequest {
                text: "   ".to_string(),
                language: "en".to_string(),
            }),
        )
        .await;

        let (status, Json(body)) = result.err().unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No text provided");
    }

    #[tokio::test]
    async fn translate_tts_rejects_empty_text_before_any_upstream_call() {
        let state = create_app_state(&test_config());
        let result = api_translate_tts(
            State(state),
            Json(TranslateTtsRequest {
                text: String::new(),
                source_language: "en".to_string(),
                target_language_code: "hi-IN".to_string(),
                options: None,
            }),
        )
        .await;

        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn capture_creates_a_session_in_captured_state() {
        let state = create_app_state(&test_config());
        let Json(body) = capture_report(State(state.clone()), Json(capture_request()))
            .await
            .unwrap();

        assert_eq!(body["state"], "captured");
        let session_id = body["session_id"].as_str().unwrap();
        let session = state.storage.get(session_id).await.unwrap().unwrap();
        assert_eq!(describe_state(&session).await, "captured");
    }

    #[tokio::test]
    async fn capture_rejects_unsupported_languages_and_bad_payloads() {
        let state = create_app_state(&test_config());

        let mut request = capture_request();
        request.language = Some("xx".to_string());
        let (status, _) = capture_report(State(state.clone()), Json(request))
            .await
            .err()
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut request = capture_request();
        request.image = String::new();
        let (status, _) = capture_report(State(state), Json(request))
            .await
            .err()
            .unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn retake_resets_the_session_to_idle() {
        let state = create_app_state(&test_config());
        let Json(body) = capture_report(State(state.clone()), Json(capture_request()))
            .await
            .unwrap();
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let Json(body) = retake_report(State(state.clone()), Path(session_id.clone()))
            .await
            .unwrap();
        assert_eq!(body["state"], "idle");

        let session = state.storage.get(&session_id).await.unwrap().unwrap();
        assert_eq!(describe_state(&session).await, "idle");
        assert_eq!(session.run_generation, 1);
    }

    #[tokio::test]
    async fn unknown_sessions_are_404() {
        let state = create_app_state(&test_config());
        let (status, _) = process_report(State(state.clone()), Path("missing".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let result = get_report_session(State(state), Path("missing".to_string())).await;
        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn speaking_before_a_summary_exists_is_a_conflict() {
        let state = create_app_state(&test_config());
        let Json(body) = capture_report(State(state.clone()), Json(capture_request()))
            .await
            .unwrap();
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let result = speak_summary(
            State(state),
            Path(session_id),
            Json(SpeakRequest {
                target_language_code: "hi-IN".to_string(),
                options: None,
            }),
        )
        .await;
        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stored_reports_show_up_in_history() {
        let state = create_app_state(&test_config());
        assert!(state.history.is_empty());

        let record = json!({
            "id": "rec-1",
            "case_id": "case-1",
            "language": "en",
            "patient": null,
            "extracted_text": "BP: 120/80",
            "summary": {
                "interpretation": "Normal blood pressure",
                "action_items": ["No action needed"],
                "model": "gemini-1.5-flash"
            },
            "image": null,
            "created_at": "2025-01-01T00:00:00Z"
        });
        let record: ReportRecord = serde_json::from_value(record).unwrap();

        api_store_report(State(state.clone()), Json(record)).await.unwrap();
        let Json(listed) = report_history(State(state)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "rec-1");
    }
}
