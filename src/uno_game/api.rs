use super::card::{Card, Color};
use super::game::{Direction, GamePhase, GameSettings, Move, TurnPhase};
use super::player::PlayerId;
use super::session::{GameSession, SessionError, SessionManager};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

#[derive(Clone)]
pub struct AppState {
    session_manager: SessionManager,
}

#[derive(Deserialize)]
pub struct CreateGameRequest {
    player_names: Vec<String>,
    #[serde(default)]
    allow_stacking: Option<bool>,
    #[serde(default)]
    ai_players: usize,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    player_id: PlayerId,
    #[serde(rename = "move")]
    mv: Move,
}

/// Public view of a game: everything except the contents of hands and piles.
#[derive(Serialize, Deserialize)]
pub struct GameResponse {
    id: String,
    current_player_index: usize,
    current_player_id: PlayerId,
    direction: Direction,
    current_card: Card,
    current_color: Color,
    pending_draw_count: usize,
    turn_phase: TurnPhase,
    game_phase: GamePhase,
    winner_id: Option<PlayerId>,
    draw_pile_size: usize,
    players: Vec<PlayerResponse>,
    last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct PlayerResponse {
    id: PlayerId,
    name: String,
    hand_size: usize,
    has_called_uno: bool,
    is_human: bool,
}

#[derive(Serialize, Deserialize)]
pub struct HandResponse {
    player_id: PlayerId,
    cards: Vec<Card>,
    playable: Vec<Card>,
}

impl GameResponse {
    fn from_session(session: &GameSession) -> Self {
        let state = &session.state;
        Self {
            id: session.id.clone(),
            current_player_index: state.current_player_index,
            current_player_id: state.current_player().id.clone(),
            direction: state.direction,
            current_card: state.current_card.clone(),
            current_color: state.current_color,
            pending_draw_count: state.pending_draw_count,
            turn_phase: state.turn_phase,
            game_phase: state.game_phase,
            winner_id: state.winner_id.clone(),
            draw_pile_size: state.draw_pile.len(),
            players: state
                .players
                .iter()
                .map(|p| PlayerResponse {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    hand_size: p.hand.len(),
                    has_called_uno: p.has_called_uno,
                    is_human: p.is_human,
                })
                .collect(),
            last_updated: session.last_updated,
        }
    }
}

fn error_response(e: SessionError) -> Response {
    let status = match &e {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::NotYourTurn => StatusCode::CONFLICT,
        SessionError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::UnknownPlayer(_) | SessionError::Setup(_) => StatusCode::BAD_REQUEST,
        SessionError::LockPoisoned
        | SessionError::Worker(_)
        | SessionError::Io(_)
        | SessionError::Json(_) => {
            error!("Session storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string()).into_response()
}

fn flatten<T>(
    joined: Result<Result<T, SessionError>, tokio::task::JoinError>,
) -> Result<T, SessionError> {
    joined.unwrap_or_else(|e| Err(SessionError::Worker(e.to_string())))
}

pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> impl IntoResponse {
    info!(
        "Creating new game with players {:?} and {} computer seats",
        req.player_names, req.ai_players
    );
    let settings = GameSettings {
        allow_stacking: req
            .allow_stacking
            .unwrap_or(GameSettings::default().allow_stacking),
    };
    let manager = state.session_manager.clone();
    let created = tokio::task::spawn_blocking(move || {
        manager.create_session(req.player_names, settings, req.ai_players)
    })
    .await;
    match flatten(created) {
        Ok(session) => {
            let response = GameResponse::from_session(&session);
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn list_games(State(state): State<AppState>) -> impl IntoResponse {
    match state.session_manager.list_sessions() {
        Ok(sessions) => {
            info!("Found {} games", sessions.len());
            Json(sessions).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.session_manager.load_session(&id) {
        Ok(session) => Json(GameResponse::from_session(&session)).into_response(),
        Err(e) => {
            info!("Game not found: {}", id);
            error_response(e)
        }
    }
}

pub async fn get_game_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.session_manager.load_session(&id) {
        Ok(session) => Json(session.state).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_hand(
    State(state): State<AppState>,
    Path((id, player_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let session = match state.session_manager.load_session(&id) {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };
    let Some(player) = session.state.player(&player_id) else {
        return (
            StatusCode::NOT_FOUND,
            format!("Player {} is not seated in game {}", player_id, id),
        )
            .into_response();
    };

    let response = HandResponse {
        player_id: player.id.clone(),
        cards: player.hand.clone(),
        playable: session
            .state
            .playable_cards(&player_id)
            .into_iter()
            .cloned()
            .collect(),
    };
    Json(response).into_response()
}

pub async fn make_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> impl IntoResponse {
    info!("Game {}: {} submits {:?}", id, req.player_id, req.mv);
    // Computer seats may take many moves; keep that off the async workers
    let manager = state.session_manager.clone();
    let applied =
        tokio::task::spawn_blocking(move || manager.apply_move(&id, &req.player_id, &req.mv))
            .await;
    match flatten(applied) {
        Ok(session) => Json(GameResponse::from_session(&session)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    info!("Deleting game with ID: {}", id);
    match state.session_manager.delete_session(&id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router(session_manager: SessionManager) -> Router {
    let state = AppState { session_manager };

    let cors = CorsLayer::permissive();

    // Create a trace layer for logging
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().include_headers(true))
        .on_response(DefaultOnResponse::new().include_headers(true));

    Router::new()
        .route("/games", post(create_game).get(list_games))
        .route("/games/{id}", get(get_game).delete(delete_game))
        .route("/games/{id}/state", get(get_game_state))
        .route("/games/{id}/players/{player_id}/hand", get(get_hand))
        .route("/games/{id}/moves", post(make_move))
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}

/// Serves the game API on `addr` until the process is stopped.
///
/// Logging must already be initialised by the caller.
pub async fn start_api_server(
    addr: &str,
    sessions_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Uno API server...");

    let session_manager = SessionManager::new(sessions_dir)?;
    let app = router(session_manager);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server running on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
