//! iTaskOrg command-line client

mod commands;
mod config;
mod error;
mod models;
mod retry;
mod store;
mod sync;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;

use commands::{ApiClient, NewTemplate, NewTicket, TaskPatch, TicketQuery};
use config::{ClientConfig, Overrides};
use models::{Preferences, Priority, Task, TicketStatus};
use store::Store;

#[derive(Parser, Debug)]
#[command(name = "itaskorg")]
#[command(about = "iTaskOrg task manager client")]
struct Cli {
    /// Server base URL, e.g. http://127.0.0.1:8787
    #[arg(long, global = true)]
    server: Option<String>,

    /// User id to act as
    #[arg(long, global = true)]
    user: Option<String>,

    /// Where the config, cache and logs live
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tasks owned by or assigned to you
    #[command(subcommand)]
    Tasks(TaskCmd),
    #[command(subcommand)]
    Subtask(SubtaskCmd),
    #[command(subcommand)]
    Templates(TemplateCmd),
    /// Help-desk tickets
    #[command(subcommand)]
    Tickets(TicketCmd),
    #[command(subcommand)]
    Teams(TeamCmd),
    #[command(subcommand)]
    Settings(SettingsCmd),
    /// Remember --server and --user as defaults
    Login,
    /// Compare the local cache with the server
    Sync {
        /// Push local-only tasks, then take the server's list
        #[arg(long)]
        fix: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCmd {
    List {
        /// Show the local cache without contacting the server
        #[arg(long)]
        cached: bool,
    },
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// Mark a task completed
    Done { id: String },
    /// Flip a task's completion
    Toggle { id: String },
    Rm { id: String },
    Show { id: String },
}

#[derive(Subcommand, Debug)]
enum SubtaskCmd {
    Add { task_id: String, title: String },
    /// Flip a subtask's completion
    Done { task_id: String, subtask_id: String },
}

#[derive(Subcommand, Debug)]
enum TemplateCmd {
    List,
    Add {
        name: String,
        task_title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// Create a task from a template
    Apply {
        id: String,
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TicketCmd {
    List {
        #[arg(long, value_enum)]
        status: Option<TicketStatus>,
        #[arg(long)]
        assigned_to: Option<String>,
        /// Only tickets you opened
        #[arg(long)]
        mine: bool,
    },
    Open {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    Status {
        id: String,
        #[arg(value_enum)]
        status: TicketStatus,
    },
    Note { id: String, content: String },
}

#[derive(Subcommand, Debug)]
enum TeamCmd {
    List,
    /// Create a team led by you
    Create {
        name: String,
        #[arg(long = "member")]
        members: Vec<String>,
    },
    /// Link a task to a team and assign it to members
    Assign {
        team_id: String,
        task_id: String,
        #[arg(required = true)]
        users: Vec<String>,
    },
    Tasks { team_id: String },
}

#[derive(Subcommand, Debug)]
enum SettingsCmd {
    Get,
    /// Set one key; VALUE is JSON if it parses, else a string. `null` removes the key.
    Set { key: String, value: String },
}

struct Session {
    config: ClientConfig,
    api: ApiClient,
    store: Store,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let config = ClientConfig::resolve(&Overrides {
            data_dir: cli.data_dir.clone(),
            server_url: cli.server.clone(),
            user_id: cli.user.clone(),
        })?;
        let api = ApiClient::new(&config.server_url)?;
        let mut store = Store::load(&config.store_path())
            .with_context(|| format!("loading {}", config.store_path().display()))?;
        store.bind_user(config.require_user()?);
        Ok(Self { config, api, store })
    }

    fn user(&self) -> Result<String> {
        Ok(self.config.require_user()?.to_string())
    }

    fn save(&self) -> Result<()> {
        self.store.save().context("saving local store")
    }
}

fn print_task(task: &Task, local_only: bool) {
    let mark = if task.completed { "x" } else { " " };
    let due = task.due_date.map(|d| format!(" due {}", d)).unwrap_or_default();
    let pending = if local_only { " (not synced)" } else { "" };
    println!(
        "[{}] {}  {} ({:?}){}{}",
        mark, task.id, task.title, task.priority, due, pending
    );
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn run_tasks(session: &mut Session, cmd: TaskCmd) -> Result<()> {
    let user = session.user()?;
    match cmd {
        TaskCmd::List { cached } => {
            if !cached {
                let tasks = session.api.list_tasks(&user).await?;
                session.store.replace_tasks(tasks);
                session.save()?;
            }
            for task in session.store.tasks() {
                print_task(task, session.store.is_local_only(&task.id));
            }
            let pending = session.store.local_only_tasks().len();
            if pending > 0 {
                println!("{} task(s) not synced; run `itaskorg sync --fix`", pending);
            }
        }
        TaskCmd::Add { title, description, due, priority } => {
            let mut draft = Task::draft(&user, &title);
            draft.description = description;
            draft.due_date = due;
            draft.priority = priority;

            let id = draft.id.clone();
            let on_server = sync::submit_task(&session.api, &mut session.store, draft).await?;
            if let Some(task) = session.store.task(&id) {
                print_task(task, !on_server);
            }
            session.save()?;
        }
        TaskCmd::Done { id } => {
            if session.store.is_local_only(&id) {
                let mut task = session.store.task(&id).cloned().context("task missing from store")?;
                task.completed = true;
                print_task(&task, true);
                session.store.upsert_task(task);
            } else {
                let patch = TaskPatch { completed: Some(true), ..Default::default() };
                let task = session.api.update_task(&id, &patch).await?;
                print_task(&task, false);
                session.store.upsert_task(task);
            }
            session.save()?;
        }
        TaskCmd::Toggle { id } => {
            let task = if session.store.is_local_only(&id) {
                let mut task = session.store.task(&id).cloned().context("task missing from store")?;
                task.completed = !task.completed;
                task
            } else {
                session.api.toggle_task(&id).await?
            };
            print_task(&task, session.store.is_local_only(&id));
            session.store.upsert_task(task);
            session.save()?;
        }
        TaskCmd::Rm { id } => {
            if !session.store.is_local_only(&id) {
                session.api.delete_task(&id).await?;
            }
            session.store.remove_task(&id);
            session.save()?;
            println!("Deleted {}", id);
        }
        TaskCmd::Show { id } => {
            let task = match session.store.task(&id) {
                Some(task) if session.store.is_local_only(&id) => task.clone(),
                _ => session.api.get_task(&id).await?,
            };
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
    }
    Ok(())
}

async fn run_subtasks(session: &mut Session, cmd: SubtaskCmd) -> Result<()> {
    let (task_id, subtask) = match cmd {
        SubtaskCmd::Add { task_id, title } => {
            let subtask = session.api.add_subtask(&task_id, &title).await?;
            (task_id, subtask)
        }
        SubtaskCmd::Done { task_id, subtask_id } => {
            let subtask = session.api.toggle_subtask(&task_id, &subtask_id).await?;
            (task_id, subtask)
        }
    };
    println!("[{}] {}  {}", if subtask.completed { "x" } else { " " }, subtask.id, subtask.title);

    let task = session.api.get_task(&task_id).await?;
    session.store.upsert_task(task);
    session.save()
}

async fn run_templates(session: &mut Session, cmd: TemplateCmd) -> Result<()> {
    let user = session.user()?;
    match cmd {
        TemplateCmd::List => {
            let templates = session.api.list_templates(&user).await?;
            for t in &templates {
                println!("{}  {} -> \"{}\" ({:?})", t.id, t.name, t.task_title, t.priority);
            }
            session.store.set_templates(templates);
            session.save()?;
        }
        TemplateCmd::Add { name, task_title, description, priority } => {
            let template = session
                .api
                .create_template(&NewTemplate {
                    user_id: &user,
                    name: &name,
                    task_title: &task_title,
                    description: &description,
                    priority,
                })
                .await?;
            println!("Created template {}", template.id);
        }
        TemplateCmd::Apply { id, title } => {
            let task = session.api.apply_template(&id, &user, title.as_deref()).await?;
            print_task(&task, false);
            session.store.upsert_task(task);
            session.save()?;
        }
    }
    Ok(())
}

async fn run_tickets(session: &mut Session, cmd: TicketCmd) -> Result<()> {
    let user = session.user()?;
    let ticket = match cmd {
        TicketCmd::List { status, assigned_to, mine } => {
            let query = TicketQuery {
                status,
                assigned_to,
                user_id: mine.then(|| user.clone()),
            };
            for t in session.api.list_tickets(&query).await? {
                println!(
                    "{}  {:<12} {}  [{}]{}",
                    t.ticket_number,
                    t.status.as_str(),
                    t.title,
                    t.category,
                    t.assigned_to.as_ref().map(|a| format!(" -> {}", a)).unwrap_or_default()
                );
            }
            return Ok(());
        }
        TicketCmd::Open { title, description, category, priority } => {
            session
                .api
                .create_ticket(&NewTicket {
                    user_id: &user,
                    title: &title,
                    description: &description,
                    priority,
                    category: category.as_deref(),
                })
                .await?
        }
        TicketCmd::Status { id, status } => session.api.set_ticket_status(&id, status).await?,
        TicketCmd::Note { id, content } => session.api.add_ticket_note(&id, &user, &content).await?,
    };
    println!("{} ({}) {}  {}", ticket.ticket_number, ticket.id, ticket.status.as_str(), ticket.title);
    Ok(())
}

async fn run_teams(session: &mut Session, cmd: TeamCmd) -> Result<()> {
    let user = session.user()?;
    match cmd {
        TeamCmd::List => {
            for team in session.api.list_teams(&user).await? {
                println!("{}  {} ({} members, {} tasks)", team.id, team.name, team.members.len(), team.tasks.len());
            }
        }
        TeamCmd::Create { name, members } => {
            let team = session.api.create_team(&name, &user, &members).await?;
            println!("Created team {} ({})", team.name, team.id);
        }
        TeamCmd::Assign { team_id, task_id, users } => {
            let assignment = session.api.assign_team_task(&team_id, &task_id, &users).await?;
            println!(
                "Task {} in {} assigned to {}",
                assignment.task.id,
                assignment.team.name,
                assignment.task.assigned_users.join(", ")
            );
        }
        TeamCmd::Tasks { team_id } => {
            for task in session.api.team_tasks(&team_id).await? {
                print_task(&task, false);
            }
        }
    }
    Ok(())
}

async fn run_settings(session: &mut Session, cmd: SettingsCmd) -> Result<()> {
    let user = session.user()?;
    let settings = match cmd {
        SettingsCmd::Get => session.api.get_settings(&user).await?,
        SettingsCmd::Set { key, value } => {
            let mut patch = Preferences::new();
            patch.insert(key, parse_value(&value));
            session.api.patch_settings(&user, &patch).await?
        }
    };
    println!("{}", serde_json::to_string_pretty(&settings)?);
    session.store.set_settings(settings);
    session.save()
}

async fn run_sync(session: &mut Session, fix: bool) -> Result<()> {
    let user = session.user()?;
    let health = session.api.health().await?;
    tracing::info!("Server schema version {}", health["schemaVersion"]);
    if fix {
        let outcome = sync::auto_fix(&session.api, &mut session.store, &user).await?;
        session.save()?;
        println!(
            "Pushed {} task(s), {} failed; {} task(s) now cached",
            outcome.pushed.len(),
            outcome.failed.len(),
            session.store.tasks().len()
        );
        if !outcome.failed.is_empty() {
            bail!("{} task(s) could not be pushed", outcome.failed.len());
        }
    } else {
        let report = sync::analyze(&session.api, &session.store, &user).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        match session.store.state().last_synced_at {
            Some(at) => println!("Last fixed at {}", at),
            None => println!("Never fixed"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut session = Session::open(&cli)?;

    if let Err(e) = rolling_logger::init_logger(session.config.log_dir(), "iTaskOrgClient") {
        eprintln!("warning: logging disabled: {}", e);
    }

    match cli.command {
        Commands::Tasks(cmd) => run_tasks(&mut session, cmd).await,
        Commands::Subtask(cmd) => run_subtasks(&mut session, cmd).await,
        Commands::Templates(cmd) => run_templates(&mut session, cmd).await,
        Commands::Tickets(cmd) => run_tickets(&mut session, cmd).await,
        Commands::Teams(cmd) => run_teams(&mut session, cmd).await,
        Commands::Settings(cmd) => run_settings(&mut session, cmd).await,
        Commands::Sync { fix } => run_sync(&mut session, fix).await,
        Commands::Login => {
            session.config.save().context("saving client config")?;
            println!("Using {} as {}", session.config.server_url, session.user()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_task_add() {
        let cli = Cli::try_parse_from([
            "itaskorg", "--user", "alice", "tasks", "add", "Pay rent", "--due", "2026-11-01", "--priority", "high",
        ])
        .unwrap();
        match cli.command {
            Commands::Tasks(TaskCmd::Add { title, due, priority, .. }) => {
                assert_eq!(title, "Pay rent");
                assert_eq!(due, NaiveDate::from_ymd_opt(2026, 11, 1));
                assert_eq!(priority, Priority::High);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_cli_parses_ticket_status() {
        let cli = Cli::try_parse_from(["itaskorg", "tickets", "status", "t1", "in-progress"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tickets(TicketCmd::Status { status: TicketStatus::InProgress, .. })
        ));
    }

    #[test]
    fn test_parse_value_falls_back_to_string() {
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("dark"), Value::String("dark".into()));
    }

    #[test]
    fn test_cli_parses_toggle_and_login() {
        let cli = Cli::try_parse_from(["itaskorg", "tasks", "toggle", "t1"]).unwrap();
        assert!(matches!(cli.command, Commands::Tasks(TaskCmd::Toggle { ref id }) if id == "t1"));

        let cli = Cli::try_parse_from(["itaskorg", "--server", "http://example.test", "login"]).unwrap();
        assert!(matches!(cli.command, Commands::Login));
    }
}
