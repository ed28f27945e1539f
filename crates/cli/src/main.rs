use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use generation::{GenerationClient, SessionOptions};
use project::{AspectRatio, GenerationStatus, ProjectCache};
use selection::{SelectionEditor, Surface};
use sync::ApiConfig;

#[derive(Parser)]
#[command(name = "odin-cli")]
#[command(about = "ODIN Workspace CLI - Headless project and generation operations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the bearer credential for the remote store
    Login { token: String },

    /// Forget the stored credential
    Logout,

    /// List locally cached projects
    Projects,

    /// Activate a workspace and print its state
    Open {
        /// Project id; defaults to the last active project
        project: Option<String>,
    },

    /// Rename the active project (forwarded to the remote store)
    Rename { name: String },

    /// Run a generation session against the active project
    Generate {
        /// Prompt describing the visual to generate
        #[arg(short, long)]
        prompt: String,

        /// Number of variants to request
        #[arg(long, default_value_t = 3)]
        variants: u32,

        /// Creativity weight passed to the backend (0.0 - 1.0)
        #[arg(long, default_value_t = 0.5)]
        creativity: f32,

        /// Slide image file to attach before generating
        #[arg(long)]
        slide: Option<PathBuf>,

        /// Slide surface size used when no selection is stored
        #[arg(long, default_value_t = 1600.0)]
        surface_width: f32,

        #[arg(long, default_value_t = 900.0)]
        surface_height: f32,
    },

    /// Print the stored generation results, newest first
    Results {
        project: Option<String>,
    },

    /// Delete a project locally and remotely
    Delete {
        project: Option<String>,
    },
}

fn open_cache() -> Result<ProjectCache> {
    ProjectCache::open_or_create(&project::app_data_dir().join("cache.db"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config_path = ApiConfig::default_path();
    let mut config = ApiConfig::load(&config_path);

    match cli.command {
        Commands::Login { token } => {
            config.set_token(token);
            config.save(&config_path)?;
            println!("Signed in against {}", config.base_url);
        }
        Commands::Logout => {
            config.clear_token();
            config.save(&config_path)?;
            println!("Signed out");
        }
        Commands::Projects => {
            let cache = open_cache()?;
            let projects = cache.list_projects()?;
            if projects.is_empty() {
                println!("No cached projects");
            }
            for info in projects {
                println!("{}  {}", info.id, info.name);
            }
        }
        Commands::Open { project } => {
            let cache = open_cache()?;
            let workspace = sync::activate(&config, cache, project.as_deref()).await;
            print_project(workspace.project());
        }
        Commands::Rename { name } => {
            let cache = open_cache()?;
            let mut workspace = sync::activate(&config, cache, None).await;
            match sync::rename(&config, &mut workspace, &name).await {
                Ok(()) => println!("Renamed to '{name}'"),
                Err(err) => println!("Renamed locally; remote rename failed: {err}"),
            }
        }
        Commands::Generate {
            prompt,
            variants,
            creativity,
            slide,
            surface_width,
            surface_height,
        } => {
            let cache = open_cache()?;
            let mut workspace = sync::activate(&config, cache, None).await;
            workspace.set_prompt(Some(prompt));

            if let Some(path) = slide {
                let bytes = std::fs::read(&path)?;
                sync::sync_slide_image(&config, &mut workspace, Some(bytes)).await;
            }

            if workspace.project().selection.is_none() {
                let mut editor =
                    SelectionEditor::new(Surface::new(surface_width, surface_height));
                editor.apply_preset(AspectRatio::closest(surface_width, surface_height));
                workspace.set_selection(editor.selection());
            }

            let client = GenerationClient::new(config.base_url.clone(), config.token.clone());
            let options = SessionOptions {
                variant_count: variants,
                creativity,
                source: config.result_source(),
                ..SessionOptions::default()
            };

            let session = client.start(&mut workspace, options).await?;
            info!("session open, streaming {variants} variants");
            session.drive(&mut workspace).await;

            let project = workspace.project();
            if project.generation_status == GenerationStatus::Error {
                anyhow::bail!(
                    "generation failed: {}",
                    project
                        .generation_error
                        .as_deref()
                        .unwrap_or("unknown error")
                );
            }
            println!("Received {} result(s)", project.results.len());
            print_project(project);
        }
        Commands::Results { project } => {
            let cache = open_cache()?;
            let workspace = sync::activate(&config, cache, project.as_deref()).await;
            for result in workspace.project().results.iter().rev() {
                println!(
                    "{}  {}  {}",
                    result.created_at.format("%Y-%m-%d %H:%M:%S"),
                    result.id,
                    result.description
                );
            }
        }
        Commands::Delete { project } => {
            let cache = open_cache()?;
            let workspace = sync::activate(&config, cache, project.as_deref()).await;
            let name = workspace.project().name.clone();
            sync::delete(&config, workspace).await?;
            println!("Deleted '{name}'");
        }
    }

    Ok(())
}

fn print_project(project: &project::Project) {
    println!("{}  {}", project.id, project.name);
    println!("  updated: {}", project.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(prompt) = &project.prompt {
        println!("  prompt:  {prompt}");
    }
    println!(
        "  slide:   {}",
        if project.slide_image.is_some() {
            "attached"
        } else {
            "none"
        }
    );
    println!("  results: {}", project.results.len());
}
