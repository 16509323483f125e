//! fieldset CLI - hierarchical settings engine for field-service apps.

use clap::Parser;
use fieldset::cli::{Cli, Commands, NodeCommands, SystemCommands, TargetCommands};
use fieldset::commands::{self, Output};
use fieldset::store::get_data_dir;
use std::path::PathBuf;
use std::process;

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let human = cli.human_readable;

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(run_command(cli.command, cli.data_dir, human));

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!(
                "{}",
                serde_json::json!({ "error": e.to_string() })
            );
        }
        process::exit(1);
    }
}

/// Route logs to stderr so JSON output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("FST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_command(
    command: Commands,
    data_dir: Option<PathBuf>,
    human: bool,
) -> Result<(), fieldset::Error> {
    let data_dir = get_data_dir(data_dir.as_deref())?;

    match command {
        Commands::Node { command } => match command {
            NodeCommands::Create {
                name,
                parent,
                value_type,
                value,
                order,
                targets,
                inherit,
                actor,
            } => {
                let result = commands::node_create(
                    &data_dir, name, parent, value_type, value, order, targets, inherit, actor,
                )
                .await?;
                output(&result, human);
            }
            NodeCommands::List { parent } => {
                let result = commands::node_list(&data_dir, parent.as_deref()).await?;
                output(&result, human);
            }
            NodeCommands::Tree => {
                let result = commands::node_tree(&data_dir).await?;
                output(&result, human);
            }
            NodeCommands::Show { id } => {
                let result = commands::node_show(&data_dir, &id).await?;
                output(&result, human);
            }
            NodeCommands::Update {
                id,
                name,
                value,
                clear_value,
                order,
                parent,
                to_root,
                add_target,
                remove_target,
                inherit,
                clear_inherit,
                hidden,
                favorite,
                actor,
            } => {
                let result = commands::node_update(
                    &data_dir,
                    &id,
                    name,
                    value,
                    clear_value,
                    order,
                    parent,
                    to_root,
                    add_target,
                    remove_target,
                    inherit,
                    clear_inherit,
                    hidden,
                    favorite,
                    actor,
                )
                .await?;
                output(&result, human);
            }
            NodeCommands::Delete { id, actor } => {
                let result = commands::node_delete(&data_dir, &id, actor.as_deref()).await?;
                output(&result, human);
            }
            NodeCommands::Duplicate { id, actor } => {
                let result = commands::node_duplicate(&data_dir, &id, actor.as_deref()).await?;
                output(&result, human);
            }
        },

        Commands::Target { command } => match command {
            TargetCommands::List => {
                let result = commands::target_list();
                output(&result, human);
            }
            TargetCommands::Show { id } => {
                let result = commands::target_show(&data_dir, &id).await?;
                output(&result, human);
            }
        },

        Commands::Resolve { id } => {
            let result = commands::resolve(&data_dir, &id).await?;
            output(&result, human);
        }

        Commands::Checklist => {
            let result = commands::checklist(&data_dir).await?;
            output(&result, human);
        }

        Commands::Watch { target_id } => {
            commands::watch(&data_dir, &target_id, human).await?;
        }

        Commands::History { limit } => {
            let result = commands::history(&data_dir, limit).await?;
            output(&result, human);
        }

        Commands::System { command } => match command {
            SystemCommands::Init => {
                let result = commands::init(&data_dir)?;
                output(&result, human);
            }
            SystemCommands::BuildInfo => {
                let result = commands::build_info();
                output(&result, human);
            }
        },
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
