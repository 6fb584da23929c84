use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Enumerate everything the source schema offers for migration and
    /// write the discovery document.
    Discover {
        /// JSON file with oracle+mssql connection settings.
        #[arg(long)]
        connections: Option<String>,
        /// Write the document here instead of stdout.
        #[arg(long)]
        output: Option<String>,
    },

    /// Run a migration for a selection document.
    Migrate {
        /// JSON selection document produced by the UI.
        #[arg(long)]
        selection: String,
        /// JSON file with oracle+mssql connection settings.
        #[arg(long)]
        connections: Option<String>,
        /// Optional JSON settings file (recognized options).
        #[arg(long)]
        settings: Option<String>,
        /// Answer OBJECT_EXISTS conflicts interactively.
        #[arg(long, default_value_t = false)]
        interactive: bool,
    },

    /// Analyze sequences and print the per-sequence strategy plan without
    /// deploying anything.
    Plan {
        #[arg(long)]
        connections: Option<String>,
    },

    /// Verify both connections and exit.
    TestConn {
        #[arg(long)]
        connections: Option<String>,
    },
}
