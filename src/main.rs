mod app;
mod domain;
mod persistence;

use anyhow::{Context, Result};
use app::{parse_due_input, AppError, AppState, NewTask, TaskEdit};
use chrono::Local;
use clap::{Parser, Subcommand};
use domain::{status_badge, title_with_progress, tree_connector, tree_guides, OrphanPolicy, Priority, Task, TaskFilter, TaskId};
use persistence::{get_data_dir, init_local_dir};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV_VAR: &str = "TASKTREE_LOG";

#[derive(Parser)]
#[command(name = "tasktree")]
#[command(about = "Hierarchical task list with subtasks, filters and progress tracking", long_about = None)]
struct Cli {
    /// Data directory (defaults to TASKTREE_DIR, a local .tasktree, or the platform data dir)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .tasktree directory in the current directory
    Init,
    /// Add a task, or a subtask with --parent
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        desc: String,
        /// today, tomorrow, "in 3d", YYYY-MM-DD or "YYYY-MM-DD HH:MM". Defaults to tomorrow.
        #[arg(long)]
        due: Option<String>,
        #[arg(short, long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Parent task id, id prefix or title
        #[arg(long)]
        parent: Option<String>,
    },
    /// Show the task tree
    List {
        /// Overrides the configured default filter
        #[arg(short, long, value_enum)]
        filter: Option<TaskFilter>,
    },
    /// Show one task in detail
    Show { task: String },
    /// Change a task's title, description, due date or priority
    Edit {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        desc: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(short, long, value_enum)]
        priority: Option<Priority>,
    },
    /// Mark a task completed
    Complete { task: String },
    /// Mark a task not completed
    Reopen { task: String },
    /// Delete a task and all of its subtasks
    Delete { task: String },
    /// Show completion percentage of a task's direct subtasks
    Progress { task: String },
    /// Show or change settings
    Config {
        #[arg(long, value_enum)]
        orphan_policy: Option<OrphanPolicy>,
        #[arg(long, value_enum)]
        default_filter: Option<TaskFilter>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(Commands::Init) = cli.command {
        let current_dir = std::env::current_dir().context("Could not determine current directory")?;
        let data_dir = init_local_dir(&current_dir)?;
        println!("Initialized tasktree directory: {}", data_dir.display());
        println!();
        println!("tasktree will now use this local directory for task storage.");
        return Ok(());
    }

    let data_dir = get_data_dir(cli.dir.as_deref())?;
    tracing::debug!(dir = %data_dir.display(), "using data directory");
    let mut app = AppState::open(data_dir)?;

    match cli.command.unwrap_or(Commands::List { filter: None }) {
        Commands::Init => {}
        Commands::Add {
            title,
            desc,
            due,
            priority,
            parent,
        } => {
            let due_date = due.map(|d| parse_due_input(&d, Local::now())).transpose()?;
            let new = NewTask {
                title,
                description: desc,
                due_date,
                priority,
            };
            let added = match parent {
                None => Some(app.add_task(new, None)?),
                Some(reference) => match app.resolve_task_ref(&reference) {
                    Ok(parent) => app.add_subtask(&parent, new)?,
                    // Unknown parents go through the configured orphan policy
                    Err(AppError::UnknownTask(_)) => Some(app.add_task(new, Some(&TaskId::from(reference.as_str())))?),
                    Err(e) => return Err(e.into()),
                },
            };
            match added.as_ref().and_then(|id| app.store().get(id)) {
                Some(task) => println!("Added {}: {}", short_id(&task.id), task.title),
                None => println!("Parent task is gone, nothing added"),
            }
        }
        Commands::List { filter } => {
            if let Some(filter) = filter {
                app.set_filter(filter);
            }
            print_tree(&mut app);
        }
        Commands::Show { task } => {
            let id = app.resolve_task_ref(&task)?;
            print_details(&app, &id);
        }
        Commands::Edit {
            task,
            title,
            desc,
            due,
            priority,
        } => {
            let id = app.resolve_task_ref(&task)?;
            let edit = TaskEdit {
                title,
                description: desc,
                due_date: due.map(|d| parse_due_input(&d, Local::now())).transpose()?,
                priority,
            };
            app.edit_task(&id, edit)?;
            print_details(&app, &id);
        }
        Commands::Complete { task } => {
            let id = app.resolve_task_ref(&task)?;
            let changed = app.set_completed(&id, true);
            report_completion(&app, &changed, &id);
        }
        Commands::Reopen { task } => {
            let id = app.resolve_task_ref(&task)?;
            let changed = app.set_completed(&id, false);
            report_completion(&app, &changed, &id);
        }
        Commands::Delete { task } => {
            let id = app.resolve_task_ref(&task)?;
            let title = app.store().get(&id).map(|t| t.title.clone()).unwrap_or_default();
            let removed = app.delete_task(&id);
            match removed.len() {
                0 => println!("Nothing deleted"),
                1 => println!("Deleted {title}"),
                n => println!("Deleted {title} and {} subtasks", n - 1),
            }
        }
        Commands::Progress { task } => {
            let id = app.resolve_task_ref(&task)?;
            if let Some(task) = app.store().get(&id) {
                let done = app.store().children(&id).filter(|c| c.completed).count();
                println!(
                    "{}: {}% ({}/{} subtasks)",
                    task.title,
                    app.progress(&id),
                    done,
                    task.subtask_ids.len()
                );
            }
        }
        Commands::Config {
            orphan_policy,
            default_filter,
        } => {
            if orphan_policy.is_some() || default_filter.is_some() {
                app.update_config(orphan_policy, default_filter)?;
            }
            let config = app.config();
            println!("Data directory: {}", app.data_dir().display());
            println!("Orphan policy:  {}", config.orphan_policy.label());
            println!("Default filter: {}", config.filter().name());
        }
    }

    app.save_if_needed();
    Ok(())
}

/// Leading characters of the id, enough to reference a task from the command line
fn short_id(id: &TaskId) -> &str {
    let id = id.as_str();
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn print_tree(app: &mut AppState) {
    let filter = app.filter();
    let rows = app.visible_rows();
    if rows.is_empty() {
        println!("No tasks ({})", filter.name());
        return;
    }

    let store = app.store();
    for row in rows {
        let Some(task) = store.get(&row.id) else {
            continue;
        };
        let prefix = if row.depth == 0 {
            String::new()
        } else {
            format!("{}{} ", tree_guides(&row.ancestors_last), tree_connector(row.is_last))
        };
        println!(
            "{}{} {}  [{}]  due {}  {}",
            prefix,
            status_badge(task),
            title_with_progress(store, task),
            task.priority.label(),
            task.due_date.format("%b %d, %Y"),
            short_id(&task.id)
        );
    }
}

fn print_details(app: &AppState, id: &TaskId) {
    let store = app.store();
    let Some(task) = store.get(id) else {
        return;
    };

    println!("{}", title_with_progress(store, task));
    println!("  id:       {}", task.id);
    println!("  status:   {}", if task.completed { "completed" } else { "pending" });
    println!("  priority: {}", task.priority.label());
    println!("  due:      {}", task.due_date.format("%b %d, %Y %H:%M"));
    println!("  created:  {}", task.created_date.format("%b %d, %Y %H:%M"));
    if let Some(parent) = task.parent_id.as_ref().and_then(|p| store.get(p)) {
        println!("  parent:   {}", parent.title);
    }
    if task.has_subtasks() {
        let titles: Vec<&str> = store.children(id).map(|c: &Task| c.title.as_str()).collect();
        println!("  subtasks: {}", titles.join(", "));
    }
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
}

fn report_completion(app: &AppState, changed: &[TaskId], id: &TaskId) {
    let store = app.store();
    let Some(task) = store.get(id) else {
        return;
    };
    if changed.is_empty() {
        println!("{} is already {}", task.title, if task.completed { "completed" } else { "pending" });
        return;
    }
    println!("{} {}", status_badge(task), task.title);
    for ancestor in changed.iter().skip(1).filter_map(|a| store.get(a)) {
        println!("{} {} (updated from subtasks)", status_badge(ancestor), ancestor.title);
    }
}
