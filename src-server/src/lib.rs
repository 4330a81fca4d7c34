//! iTaskOrg Backend
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: SQLite data access and schema migrations
//! - commands: HTTP handlers

use std::path::Path;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

pub mod commands;
pub mod config;
pub mod domain;
pub mod repository;

use commands::{group_cmd, settings_cmd, task_cmd, template_cmd, ticket_cmd};
use config::ServerConfig;
use repository::{
    init_db, DbState, GroupRepository, PreferenceRepository, TaskRepository, TemplateRepository, TicketRepository,
};

/// Application state shared across handlers
pub struct AppState {
    pub db_state: DbState,
    pub task_repo: TaskRepository,
    pub template_repo: TemplateRepository,
    pub group_repo: GroupRepository,
    pub ticket_repo: TicketRepository,
    pub preference_repo: PreferenceRepository,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db_state: DbState) -> Self {
        let conn = db_state.conn.clone();
        Self {
            task_repo: TaskRepository::new(conn.clone()),
            template_repo: TemplateRepository::new(conn.clone()),
            group_repo: GroupRepository::new(conn.clone()),
            ticket_repo: TicketRepository::new(conn.clone()),
            preference_repo: PreferenceRepository::new(conn),
            db_state,
        }
    }

    /// Open (and migrate) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<SharedState, String> {
        let db_state = init_db(db_path).await?;
        Ok(Arc::new(Self::new(db_state)))
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        uri,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Build the API router
pub fn app_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(commands::health))
        // Tasks + subtasks
        .route("/api/tasks", get(task_cmd::list_tasks).post(task_cmd::create_task))
        .route(
            "/api/tasks/:id",
            get(task_cmd::get_task).put(task_cmd::update_task).delete(task_cmd::delete_task),
        )
        .route("/api/tasks/:id/toggle", post(task_cmd::toggle_task))
        .route("/api/tasks/:id/subtasks", post(task_cmd::add_subtask))
        .route(
            "/api/tasks/:id/subtasks/:subtask_id",
            axum::routing::put(task_cmd::update_subtask).delete(task_cmd::delete_subtask),
        )
        .route("/api/tasks/:id/subtasks/:subtask_id/toggle", post(task_cmd::toggle_subtask))
        // Templates
        .route(
            "/api/templates",
            get(template_cmd::list_templates).post(template_cmd::create_template),
        )
        .route(
            "/api/templates/:id",
            get(template_cmd::get_template)
                .put(template_cmd::update_template)
                .delete(template_cmd::delete_template),
        )
        .route("/api/templates/:id/apply", post(template_cmd::apply_template))
        // Groups
        .route("/api/groups", get(group_cmd::list_groups).post(group_cmd::create_group))
        .route(
            "/api/groups/:id",
            get(group_cmd::get_group).put(group_cmd::update_group).delete(group_cmd::delete_group),
        )
        .route("/api/groups/:id/members", post(group_cmd::add_group_member))
        .route(
            "/api/groups/:id/members/:user_id",
            axum::routing::delete(group_cmd::remove_group_member),
        )
        // Teams
        .route("/api/teams", get(group_cmd::list_teams).post(group_cmd::create_team))
        .route("/api/teams/tasks/assign", post(group_cmd::assign_team_task))
        .route(
            "/api/teams/:id",
            get(group_cmd::get_team).put(group_cmd::update_team).delete(group_cmd::delete_team),
        )
        .route("/api/teams/:id/tasks", get(group_cmd::list_team_tasks))
        .route("/api/teams/:id/members", post(group_cmd::add_team_member))
        .route(
            "/api/teams/:id/members/:user_id",
            axum::routing::delete(group_cmd::remove_team_member),
        )
        // Help desk
        .route("/api/help-desk", get(ticket_cmd::list_tickets).post(ticket_cmd::create_ticket))
        .route(
            "/api/help-desk/:id",
            get(ticket_cmd::get_ticket)
                .put(ticket_cmd::update_ticket)
                .delete(ticket_cmd::delete_ticket),
        )
        .route("/api/help-desk/:id/status", post(ticket_cmd::set_ticket_status))
        .route("/api/help-desk/:id/notes", post(ticket_cmd::add_ticket_note))
        // Settings / profile
        .route(
            "/api/settings/:user_id",
            get(settings_cmd::get_settings)
                .put(settings_cmd::put_settings)
                .patch(settings_cmd::patch_settings),
        )
        .route(
            "/api/profile/:user_id",
            get(settings_cmd::get_profile)
                .put(settings_cmd::put_profile)
                .patch(settings_cmd::patch_profile),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutdown requested");
}

/// Open the database and serve the API until Ctrl-C
pub async fn run(config: ServerConfig) -> Result<(), String> {
    let addr = config.bind_addr().map_err(|e| e.to_string())?;
    let state = AppState::open(&config.db_path).await?;
    let _ = rolling_logger::info(&format!("Database ready at {:?}", config.db_path));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {} failed: {}", addr, e))?;
    log::info!("iTaskOrg server listening on {}", addr);

    let db_state = state.db_state.clone();
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {}", e))?;

    db_state.close().await;
    log::info!("Server stopped");
    Ok(())
}
