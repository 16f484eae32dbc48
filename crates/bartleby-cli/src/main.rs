use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use bartleby::api::{ExportFormat, ExportKind};
use bartleby::catalog::{RecordQuery, SortDirection, SEARCH_CATEGORIES};
use bartleby::pipeline::{PipelineStage, ProgressEvent};
use bartleby::{
    config_from_env, init_tracing, load_config, ApiClient, AuthSession, BartlebyError,
    BroadcastProgress, CatalogStore, ClientConfig, ConfirmPrompt, HttpBlobStore, LogFormat,
    PollPolicy, ResetOutcome, SelectedFile, UploadPipeline, UserStore, ValidationError,
};

#[derive(Parser)]
#[command(name = "bartleby")]
#[command(about = "Catalog photos and documents with the Bartleby service")]
#[command(version)]
struct Cli {
    /// Configuration file. Defaults to environment variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit log lines as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files, run the cataloging job and wait for it to finish.
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "")]
        instruction: String,
    },
    /// List inventory items.
    Inventory {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List documents.
    Documents {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Semantic search over documents.
    Search {
        query: String,
        #[arg(long, value_parser = PossibleValuesParser::new(SEARCH_CATEGORIES.iter().copied()))]
        category: Option<String>,
    },
    /// Download a CSV or XLS export.
    Export {
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(value_enum)]
        format: FormatArg,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Download the source file of a document.
    Download {
        id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete every entry of the inventory or the documents.
    Reset {
        #[arg(value_enum)]
        kind: KindArg,
        /// Inventory table to clear.
        #[arg(long)]
        table: Option<String>,
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Start a new, empty inventory table.
    CreateTable { name: String },
    Login { email: String },
    /// Sign in with a Google ID token.
    LoginGoogle { token: String },
    Logout,
    /// List exports generated for the signed-in user.
    Exports,
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long, default_value_t = false)]
    desc: bool,
}

impl FilterArgs {
    fn query(&self) -> RecordQuery {
        let mut query = RecordQuery::new();
        if let Some(category) = &self.category {
            query = query.with_category(category.as_str());
        }
        if let Some(search) = &self.search {
            query = query.with_search(search.as_str());
        }
        if let Some(column) = &self.sort {
            let direction = if self.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            query = query.sorted_by(column.as_str(), direction);
        }
        query
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Inventory,
    Documents,
}

impl From<KindArg> for ExportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Inventory => ExportKind::Inventory,
            KindArg::Documents => ExportKind::Documents,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Xls,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Xls => ExportFormat::Xls,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{}", .0.user_message())]
    Bartleby(#[from] BartlebyError),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        CliError::Bartleby(e.into())
    }
}

type CliResult<T> = Result<T, CliError>;

/// Asks on stdin. Anything but `y`/`yes` declines.
struct StdinPrompt {
    assume_yes: bool,
}

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} [y/N] ", message);
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

struct App {
    config: ClientConfig,
    api: Arc<ApiClient>,
    catalog: Arc<CatalogStore>,
}

impl App {
    fn new(config: ClientConfig) -> CliResult<Self> {
        let api = Arc::new(ApiClient::new(&config).map_err(BartlebyError::from)?);
        let catalog = Arc::new(CatalogStore::new(api.clone()));
        Ok(Self {
            config,
            api,
            catalog,
        })
    }

    fn auth(&self) -> AuthSession {
        let store = self.config.user_store_path().map(UserStore::new);
        AuthSession::new(self.api.clone(), store)
    }

    fn pipeline(&self) -> CliResult<UploadPipeline> {
        let blob_store = HttpBlobStore::from_config(&self.config)?;
        Ok(UploadPipeline::from_parts(
            Arc::new(blob_store),
            self.api.clone(),
            self.catalog.clone(),
            PollPolicy::from_config(&self.config.poll),
        ))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format, "warn");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => load_config(path).map_err(BartlebyError::from)?,
        None => config_from_env().map_err(BartlebyError::from)?,
    };
    debug!(environment = %config.environment, api_url = %config.api_url(), "Loaded configuration");
    let app = App::new(config)?;

    match cli.command {
        Commands::Process { files, instruction } => process(&app, &files, &instruction).await,
        Commands::Inventory { filter } => {
            let snapshot = app.catalog.refresh().await;
            print_json(&filter.query().apply(&snapshot.inventory))
        }
        Commands::Documents { filter } => {
            let snapshot = app.catalog.refresh().await;
            print_json(&filter.query().apply(&snapshot.documents))
        }
        Commands::Search { query, category } => {
            let results = app.catalog.search(&query, category.as_deref()).await?;
            if results.is_empty() {
                println!("No matching documents found.");
            }
            for result in results {
                println!(
                    "[{}] {} ({}% relevant)",
                    result.id,
                    result.title.as_deref().unwrap_or("Untitled"),
                    result.relevance_percent()
                );
                if let Some(excerpt) = result.excerpt.filter(|e| !e.is_empty()) {
                    println!("    {}", excerpt);
                }
            }
            Ok(())
        }
        Commands::Export { kind, format, out } => {
            let export = app.catalog.export(kind.into(), format.into()).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&export.file_name));
            write_file(&path, &export.bytes)
        }
        Commands::Download { id, out } => {
            let bytes = app.catalog.download_document(id).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(format!("document-{}", id)));
            write_file(&path, &bytes)
        }
        Commands::Reset { kind, table, yes } => {
            let prompt = StdinPrompt { assume_yes: yes };
            let outcome = match kind {
                KindArg::Inventory => {
                    app.catalog
                        .reset_inventory(table.as_deref(), &prompt)
                        .await?
                }
                KindArg::Documents => app.catalog.reset_documents(&prompt).await?,
            };
            match outcome {
                ResetOutcome::Reset => println!("Reset complete."),
                ResetOutcome::Cancelled => println!("Reset cancelled."),
            }
            Ok(())
        }
        Commands::CreateTable { name } => {
            app.catalog.create_inventory_table(&name).await?;
            println!("Created table '{}'.", name.trim());
            Ok(())
        }
        Commands::Login { email } => {
            let user = app.auth().login_email(&email).await?;
            println!("Signed in as {}", display_user(&user));
            Ok(())
        }
        Commands::LoginGoogle { token } => {
            let user = app.auth().login_google(&token).await?;
            println!("Signed in as {}", display_user(&user));
            Ok(())
        }
        Commands::Logout => {
            app.auth().logout()?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Exports => print_json(&app.auth().exports().await?),
    }
}

async fn process(app: &App, paths: &[PathBuf], instruction: &str) -> CliResult<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(SelectedFile::from_path(path).await?);
    }

    let progress = Arc::new(BroadcastProgress::default());
    let mut events = progress.subscribe();
    let pipeline = app.pipeline()?.with_progress(progress);

    let summary = pipeline.select_files(files)?;
    eprintln!("{}", summary);

    let printer = tokio::spawn(async move {
        loop {
            let timed = match events.recv().await {
                Ok(timed) => timed,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match timed.event {
                ProgressEvent::Stage { message, .. } => eprintln!("{}", message),
                ProgressEvent::Job {
                    percent, message, ..
                } => match message {
                    Some(message) => eprintln!("  {:>3}% {}", percent, message),
                    None => eprintln!("  {:>3}%", percent),
                },
                ProgressEvent::Failed { stage, error } if stage != PipelineStage::Validating => {
                    eprintln!("Failed while {}: {}", stage, error)
                }
                _ => {}
            }
        }
    });

    let result = pipeline.process(instruction).await;
    drop(pipeline);
    if let Err(e) = printer.await {
        debug!(error = %e, "Progress printer stopped");
    }

    let run = result?;
    println!(
        "Task {} complete: {} inventory items, {} documents",
        run.task_id,
        run.snapshot.inventory.len(),
        run.snapshot.documents.len()
    );
    Ok(())
}

fn display_user(user: &bartleby::api::User) -> String {
    user.name
        .clone()
        .or_else(|| user.email.clone())
        .unwrap_or_else(|| user.id_param())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> CliResult<()> {
    std::fs::write(path, bytes).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
