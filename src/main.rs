//! CodeViz - code graph extraction and visualization views
//!
//! A command-line tool for parsing Rust and Python projects into
//! declaration graphs and serving derived views of them over HTTP.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use codeviz::core::config::LoggingConfig;
use codeviz::core::projector::ViewKind;
use codeviz::storage::{ProjectStore, ProjectType};
use codeviz::{core, server, Config, LanguageRegistry};

/// CodeViz - code graph extraction and visualization views
#[derive(Parser)]
#[command(name = "codeviz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Parse a project and register its code graph
    Parse {
        /// Path to the project root
        #[arg(short, long)]
        path: PathBuf,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Language to parse (auto-detect if not specified)
        #[arg(short, long)]
        language: Option<String>,

        /// How the project reached this machine: local, upload or git
        #[arg(short = 't', long = "type", default_value = "local")]
        project_type: String,
    },

    /// Print one view of a registered project as JSON
    View {
        /// Project ID
        #[arg(short, long)]
        project: String,

        /// View to render: graph, hierarchy, modules or calls
        #[arg(short, long, default_value = "graph")]
        view: String,

        /// Write the view to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List all projects
    Projects,

    /// List supported languages
    Languages,

    /// Show server status
    Status {
        /// Host to connect to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to connect to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("codeviz={},tower_http={}", level, level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.pretty().init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Start { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            info!("Starting CodeViz server on {}:{}", config.server.host, config.server.port);
            server::run_server(config).await?;
        }

        Commands::Parse {
            path,
            name,
            language,
            project_type,
        } => {
            let project_type: ProjectType = project_type.parse()?;
            let registry = LanguageRegistry::new();

            info!("Parsing project at {:?}", path);
            let mut project = core::parse_project_with(&registry, &path, language.as_deref(), &config)?;
            if let Some(name) = name {
                project.name = name;
            }

            let store = ProjectStore::open(&config.storage)?;
            let record = store.register(&project, project_type)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::View { project, view, output } => {
            let kind: ViewKind = view.parse()?;
            let store = ProjectStore::open(&config.storage)?;
            let rendered = store.load_view(&project, kind)?;
            let json = serde_json::to_string_pretty(&rendered)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Wrote {} view to {:?}", kind, path);
                }
                None => println!("{}", json),
            }
        }

        Commands::Projects => {
            let store = ProjectStore::open(&config.storage)?;
            let projects = store.list_projects()?;

            if projects.is_empty() {
                println!("No projects found.");
            } else {
                println!("Projects:");
                for p in projects {
                    println!(
                        "  - {} (id={}, language={}, type={}, path={})",
                        p.name, p.id, p.language, p.project_type, p.path
                    );
                }
            }
        }

        Commands::Languages => {
            let registry = LanguageRegistry::new();
            println!("Supported languages:");
            for lang in registry.list_languages() {
                println!(
                    "  - {} (extensions: {})",
                    lang.language_id(),
                    lang.file_extensions().join(", ")
                );
            }
        }

        Commands::Status { host, port } => {
            let url = format!("http://{}:{}/api/v1/health", host, port);
            match reqwest::get(&url).await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        println!("Server is running at {}:{}", host, port);
                    } else {
                        println!("Server returned status: {}", resp.status());
                    }
                }
                Err(e) => {
                    println!("Failed to connect to server: {}", e);
                }
            }
        }
    }

    Ok(())
}
