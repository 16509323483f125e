//! CLI argument definitions for fieldset.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fieldset - hierarchical settings engine for field-service apps.
#[derive(Parser, Debug)]
#[command(name = "fst")]
#[command(author, version, about = "Hierarchical settings engine with live subscriptions", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Data directory for the settings tree.
    /// Defaults to the platform data dir; can also be set via FST_DATA_DIR.
    #[arg(short = 'd', long = "data-dir", global = true, env = "FST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Settings node management commands
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Target catalog commands
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },

    /// Resolve a node's effective value (follows inheritance)
    Resolve {
        /// Node id (e.g., st-a1b2)
        id: String,
    },

    /// Project the equipment revision checklist
    Checklist,

    /// Stream live emissions for a target as JSON lines (Ctrl-C to stop)
    Watch {
        /// Target id from the catalog (see `fst target list`)
        target_id: String,
    },

    /// Show the audit trail of changes
    History {
        /// Only show the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Node subcommands
#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Create a category or variable node
    Create {
        /// Display name
        name: String,

        /// Parent node id (omit for a root)
        #[arg(long)]
        parent: Option<String>,

        /// Value type (string, number, boolean, json); omit for a category
        #[arg(long = "type")]
        value_type: Option<String>,

        /// Initial value
        #[arg(long)]
        value: Option<String>,

        /// Sibling sort key
        #[arg(long, default_value_t = 0)]
        order: i64,

        /// Bind to a target id (repeatable)
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Inherit the resolved value of another node
        #[arg(long)]
        inherit: Option<String>,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },

    /// List children of a parent (roots by default)
    List {
        /// Parent node id
        #[arg(long)]
        parent: Option<String>,
    },

    /// Print the whole tree
    Tree,

    /// Show a node
    Show {
        /// Node id
        id: String,
    },

    /// Update a node
    Update {
        /// Node id
        id: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New value
        #[arg(long)]
        value: Option<String>,

        /// Clear the stored value so inheritance applies
        #[arg(long)]
        clear_value: bool,

        /// New sibling sort key
        #[arg(long)]
        order: Option<i64>,

        /// Move under a new parent
        #[arg(long)]
        parent: Option<String>,

        /// Move to the root level
        #[arg(long)]
        to_root: bool,

        /// Bind to a target id (repeatable)
        #[arg(long)]
        add_target: Vec<String>,

        /// Unbind from a target id (repeatable)
        #[arg(long)]
        remove_target: Vec<String>,

        /// Inherit the resolved value of another node
        #[arg(long)]
        inherit: Option<String>,

        /// Drop the inheritance reference
        #[arg(long)]
        clear_inherit: bool,

        /// Hide from presentation layers
        #[arg(long)]
        hidden: Option<bool>,

        /// Mark as favorite
        #[arg(long)]
        favorite: Option<bool>,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },

    /// Delete a node and all of its descendants
    Delete {
        /// Node id
        id: String,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },

    /// Deep-copy a node and its descendants
    Duplicate {
        /// Node id
        id: String,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },
}

/// Target subcommands
#[derive(Subcommand, Debug)]
pub enum TargetCommands {
    /// List the target catalog
    List,

    /// Show a target's current projection (options, value, or flag)
    Show {
        /// Target id
        id: String,
    },
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize the data directory
    Init,

    /// Show build information
    BuildInfo,
}

/// Package version baked in at compile time.
pub fn package_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Git commit baked in by build.rs.
pub fn git_commit() -> &'static str {
    env!("FST_GIT_COMMIT")
}

/// Build timestamp baked in by build.rs.
pub fn build_timestamp() -> &'static str {
    env!("FST_BUILD_TIMESTAMP")
}
