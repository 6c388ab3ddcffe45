use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the network (create database, nonce secret and main site)
    Init {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Base URL the main site's bridge endpoint is served under
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,

        /// Domain of the main site
        #[arg(long, default_value = "localhost")]
        domain: String,
    },

    /// Print a nonce for the consolidation endpoint
    Nonce {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
pub enum SiteCommands {
    /// Add a site to the network
    Add {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Domain of the new site
        #[arg(long)]
        domain: Option<String>,

        /// Path of the new site under its domain
        #[arg(long, default_value = "/")]
        path: String,

        /// Base URL of the new site (defaults to http://<domain><path>)
        #[arg(long)]
        url: Option<String>,

        /// Skip interactive prompts (requires --domain)
        #[arg(long)]
        non_interactive: bool,
    },

    /// List the sites of the network
    List {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a site and all of its content
    Remove {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Site ID to remove
        #[arg(long)]
        site_id: Option<i64>,

        /// Skip interactive prompts (requires --site-id)
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
