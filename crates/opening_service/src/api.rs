//! HTTP API handlers and routes using axum.
//!
//! Read-only presentation surface over the query service.
//!
//! Routes:
//! - GET / - Live openings browser page
//! - GET /health - Health check
//! - GET /stats - Service statistics
//! - GET /openings - Filtered opening index
//! - GET /openings/{code}/games - Games counted under one opening
//! - GET /games - All tracked games
//! - GET /games/{id} - Single game snapshot

use crate::index::QueryFilter;
use crate::query::QueryService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
}

/// Query parameters of `GET /openings`.
#[derive(Debug, Deserialize)]
pub struct OpeningsParams {
    /// ECO code prefix, e.g. "B2".
    pub eco: Option<String>,
    /// Case-insensitive substring of the opening name or an alias.
    pub name: Option<String>,
    /// Minimum rating of a game's higher-rated player.
    pub min_rating: Option<u32>,
    /// Exact time-control tag, e.g. "blitz".
    pub time_control: Option<String>,
}

impl From<OpeningsParams> for QueryFilter {
    fn from(params: OpeningsParams) -> Self {
        QueryFilter {
            eco_prefix: params.eco,
            name_substring: params.name,
            min_rating: params.min_rating,
            time_control: params.time_control,
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/openings", get(openings_handler))
        .route("/openings/{code}/games", get(opening_games_handler))
        .route("/games", get(games_handler))
        .route("/games/{id}", get(game_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Live openings browser.
/// GET /
async fn page_handler() -> impl IntoResponse {
    Html(PAGE_HTML)
}

/// Health check endpoint.
/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Current and cumulative service numbers.
/// GET /stats
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.query.stats())
}

/// Filtered opening index, ordered by live game count.
/// GET /openings?eco=B2&name=sicilian&min_rating=2000&time_control=blitz
async fn openings_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OpeningsParams>,
) -> impl IntoResponse {
    Json(state.query.query(&params.into()))
}

/// Games counted under one opening.
/// GET /openings/{code}/games
async fn opening_games_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.query.games_for_opening(&code) {
        Some(games) => Ok(Json(games)),
        None => Err(ApiError::NotFound(format!("Opening '{}' not found", code))),
    }
}

/// All tracked games.
/// GET /games
async fn games_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.query.games())
}

/// Single game snapshot.
/// GET /games/{id}
async fn game_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.query.game(&id) {
        Some(game) => Ok(Json(game)),
        None => Err(ApiError::NotFound(format!("Game '{}' not found", id))),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// API error types.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse { error: message });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Browser Page
// ============================================================================

const PAGE_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Chess Openings Live</title>
    <style>
      body { font-family: sans-serif; margin: 32px; background: #f7f7f9; }
      h1 { margin-bottom: 8px; }
      .meta { color: #555; margin-bottom: 24px; }
      .controls { margin-bottom: 16px; display: flex; gap: 12px; align-items: center; }
      .controls input { padding: 8px 10px; border-radius: 6px; border: 1px solid #ccc; width: 280px; }
      .opening { background: white; border-radius: 8px; padding: 16px; margin-bottom: 16px; }
      .opening h2 { margin: 0 0 8px 0; font-size: 1.1rem; }
      .count { color: #666; font-weight: normal; }
      ul { margin: 0; padding-left: 18px; }
      li { margin-bottom: 6px; }
      a { color: #1a4ae0; text-decoration: none; }
      a:hover { text-decoration: underline; }
      .muted { color: #777; }
      .error { background: #fff2f2; border: 1px solid #f2c0c0; padding: 12px; border-radius: 8px; }
    </style>
  </head>
  <body>
    <h1>Chess Openings Live</h1>
    <p class="meta">Live games grouped by opening.</p>
    <div class="controls">
      <input id="filter" type="text" placeholder="Filter by opening or ECO code" />
      <span id="summary" class="muted"></span>
    </div>
    <div id="status" class="muted">Loading live games&hellip;</div>
    <div id="openings"></div>
    <script>
      const state = { openings: [], filter: '' };
      const openingsEl = document.getElementById('openings');
      const statusEl = document.getElementById('status');
      const summaryEl = document.getElementById('summary');
      const filterEl = document.getElementById('filter');

      function matches(opening, needle) {
        if (opening.code.toLowerCase().includes(needle)) return true;
        if (opening.name.toLowerCase().includes(needle)) return true;
        return opening.aliases.some(alias => alias.toLowerCase().includes(needle));
      }

      function render() {
        const needle = state.filter.trim().toLowerCase();
        const filtered = state.openings.filter(opening => !needle || matches(opening, needle));

        if (!filtered.length) {
          openingsEl.innerHTML = '<p class="muted">No live games found.</p>';
        } else {
          openingsEl.innerHTML = filtered.map(opening => {
            const gamesHtml = opening.game_ids.map(id => (
              `<li><a href="https://lichess.org/${id}" target="_blank">${id}</a></li>`
            )).join('');
            return `
              <section class="opening">
                <h2>${opening.code} ${opening.name} <span class="count">(${opening.count})</span></h2>
                <ul>${gamesHtml}</ul>
              </section>
            `;
          }).join('');
        }
        const totalGames = filtered.reduce((sum, opening) => sum + opening.count, 0);
        summaryEl.textContent = `${filtered.length} openings · ${totalGames} games`;
      }

      async function refresh() {
        statusEl.textContent = 'Refreshing…';
        statusEl.className = 'muted';
        try {
          const response = await fetch('/openings');
          if (!response.ok) {
            const text = await response.text();
            throw new Error(text || `API error (${response.status})`);
          }
          state.openings = await response.json();
          statusEl.textContent = `Last updated ${new Date().toLocaleTimeString()}`;
          render();
        } catch (error) {
          statusEl.className = 'error';
          statusEl.textContent = error.message;
          openingsEl.innerHTML = '';
          summaryEl.textContent = '';
        }
      }

      filterEl.addEventListener('input', event => {
        state.filter = event.target.value;
        render();
      });

      refresh();
      setInterval(refresh, 30000);
    </script>
  </body>
</html>
"#;
