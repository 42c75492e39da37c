use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use askama::Template;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Form, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::chain::RagChain;
use crate::cleaner::ResponseCleaner;
use crate::config::AppConfig;
use crate::models::ChatForm;

pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a valid medical question";
pub const APOLOGY_MESSAGE: &str =
    "I'm having trouble answering that right now. Please try again later.";

/// Everything a request needs, built once at startup and never mutated.
pub struct AppState {
    pub chain: RagChain,
    pub cleaner: ResponseCleaner,
}

pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/get", post(chat_handler))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn run_server(config: AppConfig, state: AppState) -> Result<()> {
    let app = build_router(state, &config.static_dir);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page() -> Result<Html<String>, ApiError> {
    let body = ChatTemplate {
        title: "Medical Chatbot",
    }
    .render()?;
    Ok(Html(body))
}

async fn chat_handler(State(state): State<Arc<AppState>>, request: Request) -> String {
    let msg = match read_msg(request).await {
        Ok(Some(msg)) => msg,
        Ok(None) => {
            tracing::warn!("chat request without msg field");
            return APOLOGY_MESSAGE.to_string();
        }
        Err(err) => {
            tracing::warn!("rejected chat form: {:#}", err);
            return APOLOGY_MESSAGE.to_string();
        }
    };

    let query = msg.trim();
    if query.is_empty() {
        return EMPTY_QUESTION_MESSAGE.to_string();
    }

    match state.chain.invoke(query).await {
        Ok(output) => state.cleaner.clean(&output.answer),
        Err(err) => {
            tracing::error!(stage = err.stage(), "chat chain failed: {}", err);
            APOLOGY_MESSAGE.to_string()
        }
    }
}

/// Pulls `msg` out of either a urlencoded or a multipart form body.
async fn read_msg(request: Request) -> Result<Option<String>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<ChatForm>::from_request(request, &()).await?;
        return Ok(form.msg);
    }

    let mut multipart = Multipart::from_request(request, &()).await?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("msg") {
            return Ok(Some(field.text().await?));
        }
    }
    Ok(None)
}

#[derive(Template)]
#[template(path = "chat.html")]
struct ChatTemplate {
    title: &'static str,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<askama::Error> for ApiError {
    fn from(value: askama::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("page render failed: {}", self.message);
        (self.status, self.message).into_response()
    }
}
