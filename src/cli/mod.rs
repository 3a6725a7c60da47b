use clap::Subcommand;

pub mod doctor;
pub mod hooks;

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap the state directory, persistent store, and embedding config
    Init {
        /// Re-initialize even when state already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Build the full index from scratch
    Index {
        /// Store write batch size
        #[arg(long, default_value = "100")]
        batch_size: usize,
    },

    /// Incrementally refresh the index
    Refresh {
        /// Use the files changed by the last commit
        #[arg(long)]
        changed: bool,

        /// Use the files changed in an explicit range (A..B or A...B)
        #[arg(long, value_name = "RANGE")]
        git_range: Option<String>,

        /// Print the planned operations without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Hybrid code search
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Per-query budget in milliseconds
        #[arg(long, default_value = "300")]
        sla_ms: u64,

        /// Override the vector-side fusion weight for this query
        #[arg(long)]
        dense_weight: Option<f32>,

        /// Override the lexical-side fusion weight for this query
        #[arg(long)]
        sparse_weight: Option<f32>,

        /// Emit a JSON object instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Symbol name lookup
    Symbol {
        name: String,

        /// Match mode
        #[arg(long, default_value = "exact", value_parser = ["exact", "prefix", "substring", "fuzzy"])]
        mode: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Maximum edit distance for fuzzy mode
        #[arg(long, default_value = "2")]
        max_distance: usize,

        #[arg(long)]
        json: bool,
    },

    /// Run health checks on the index state
    Doctor {
        /// Attempt to repair failed checks
        #[arg(long)]
        fix: bool,

        #[arg(long)]
        json: bool,
    },

    /// Manage VCS hooks that refresh the index after commits and merges
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Remove all index state from the project
    Uninstall {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum HooksAction {
    Install {
        /// Hooks to install (defaults to post-commit and post-merge)
        #[arg(long, value_delimiter = ',')]
        hooks: Option<Vec<String>>,

        /// Overwrite an existing managed block
        #[arg(long)]
        force: bool,
    },
    Uninstall {
        #[arg(long, value_delimiter = ',')]
        hooks: Option<Vec<String>>,
    },
    Status,
}
