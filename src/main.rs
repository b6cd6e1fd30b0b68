//! `tome`: keeps a book and audiobook library in step with its downloads
//! directory.

mod cli;
mod error;

use crate::cli::BookArgs;
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tome_catalog::{BookId, CategoryKind, Database, DownloadId, Repository};
use tome_config::Config;
use tome_library::error::ErrorKind as LibraryErrorKind;
use tome_library::scan::Scanner;
use tome_library::{Context, PathGenerator};
use tome_storage::BackendHandle;
use tome_storage::backend::LocalBackend;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tome", version, about)]
struct Cli {
    /// Configuration file (.toml, .yaml or .json).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// More logging; repeat for trace output. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the staging directory on an interval until interrupted.
    Watch,
    /// Run a single scan pass and print what changed.
    Scan,
    /// List staged downloads.
    Downloads,
    /// Show one staged download and its files.
    Download { id: DownloadId },
    /// List the books in the catalog.
    Books,
    /// Show, add or edit a book.
    Book {
        #[command(subcommand)]
        command: BookCommand,
    },
    /// List the categories of one kind.
    Categories {
        #[arg(value_parser = cli::parse_kind)]
        kind: CategoryKind,
    },
    /// Add a category before any book uses it.
    AddCategory {
        #[arg(value_parser = cli::parse_kind)]
        kind: CategoryKind,
        name: String,
    },
    /// Move a staged download into the library and link it to a book.
    Associate {
        /// Staged download id, as printed by `downloads`.
        download: DownloadId,
        /// Book id to link the files to, as printed by `books`.
        book: BookId,
    },
}

#[derive(Debug, Subcommand)]
enum BookCommand {
    Show {
        id: BookId,
    },
    /// Categories named for the first time are created.
    Add {
        #[arg(long)]
        title: String,
        #[command(flatten)]
        fields: BookArgs,
    },
    /// Only the given fields and lists change.
    Edit {
        id: BookId,
        #[arg(long)]
        title: Option<String>,
        /// Empty one classification list; repeatable.
        #[arg(long, value_name = "KIND", value_parser = cli::parse_kind)]
        clear: Vec<CategoryKind>,
        #[arg(long)]
        clear_tags: bool,
        #[command(flatten)]
        fields: BookArgs,
    },
}

/// Long-lived handles every command needs.
struct App {
    backend: BackendHandle,
    db: Database,
    repo: Repository,
    ctx: Arc<Context>,
    config: Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            err.exit_code()
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let app = App::open(cli.config.as_deref()).await?;
    let result = match cli.command {
        Command::Watch => app.watch().await,
        Command::Scan => app.scan().await,
        Command::Downloads => app.downloads().await,
        Command::Download { id } => app.download(id).await,
        Command::Books => app.books().await,
        Command::Book { command } => app.book(command).await,
        Command::Categories { kind } => app.categories(kind).await,
        Command::AddCategory { kind, name } => app.add_category(kind, &name).await,
        Command::Associate { download, book } => app.associate(download, book).await,
    };
    app.db.close().await;
    result
}

impl App {
    async fn open(config: Option<&Path>) -> Result<Self> {
        let config = Config::load(config).or_raise(|| ErrorKind::Startup)?;
        let mut ctx = Context::new(&config.staging, &config.library)
            .map_err(ErrorKind::library)?
            .with_sidecar(config.layout.sidecar);
        if let Some(template) = &config.layout.template {
            let template: PathGenerator = template.parse().map_err(ErrorKind::library)?;
            ctx = ctx.with_template(template);
        }
        let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Startup)?;
        let backend: BackendHandle = Arc::new(LocalBackend::new("local"));
        Ok(Self { backend, repo: Repository::from(&db), db, ctx: Arc::new(ctx), config })
    }

    fn scanner(&self) -> Scanner {
        let interval = self.config.scan.period();
        Scanner::new(Arc::clone(&self.backend), self.repo.clone(), Arc::clone(&self.ctx), interval)
    }

    async fn watch(&self) -> Result<()> {
        let scanner = self.scanner();
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping after the current pass");
            }
            on_signal.cancel();
        });
        scanner.run(cancel).await;
        Ok(())
    }

    async fn scan(&self) -> Result<()> {
        // A fresh scanner can't have a pass in flight.
        if let Some(report) = self.scanner().run_pass().await {
            println!("{report}");
        }
        Ok(())
    }

    async fn downloads(&self) -> Result<()> {
        for download in self.repo.list_staged().await.map_err(ErrorKind::catalog)? {
            println!("{}", cli::download_line(&download));
        }
        Ok(())
    }

    async fn download(&self, id: DownloadId) -> Result<()> {
        let download = self
            .repo
            .get_download(id)
            .await
            .map_err(ErrorKind::catalog)?
            .ok_or_raise(|| ErrorKind::Missing(format!("staged download {id}")))?;
        println!("{}", cli::download_details(&download));
        Ok(())
    }

    async fn books(&self) -> Result<()> {
        for book in self.repo.list_books().await.map_err(ErrorKind::catalog)? {
            println!("{}", cli::book_line(&book));
        }
        Ok(())
    }

    async fn book(&self, command: BookCommand) -> Result<()> {
        let book = match command {
            BookCommand::Show { id } => self
                .repo
                .get_book(id)
                .await
                .map_err(ErrorKind::catalog)?
                .ok_or_raise(|| ErrorKind::Missing(format!("book {id}")))?,
            BookCommand::Add { title, fields } => {
                let book = fields.into_new_book(title);
                tome_library::catalog::create_book(&self.repo, book).await.map_err(ErrorKind::library)?
            },
            BookCommand::Edit { id, title, clear, clear_tags, fields } => {
                let update = fields.into_update(title, &clear, clear_tags);
                tome_library::catalog::update_book(&self.repo, id, update).await.map_err(ErrorKind::library)?
            },
        };
        println!("{}", cli::book_details(&book));
        Ok(())
    }

    async fn categories(&self, kind: CategoryKind) -> Result<()> {
        for category in self.repo.list_categories(kind).await.map_err(ErrorKind::catalog)? {
            println!("{}  {}", category.id, category.name);
        }
        Ok(())
    }

    async fn add_category(&self, kind: CategoryKind, name: &str) -> Result<()> {
        let category =
            tome_library::catalog::create_category(&self.repo, kind, name).await.map_err(ErrorKind::library)?;
        println!("{}  {}", category.id, category.name);
        Ok(())
    }

    async fn associate(&self, download: DownloadId, book: BookId) -> Result<()> {
        let outcome = tome_library::associate::associate(&self.backend, &self.repo, &self.ctx, download, book).await;
        match outcome {
            Ok(association) => {
                println!("{} -> {}", association.from.display(), association.to.display());
                if self.ctx.sidecar && !association.sidecar {
                    println!("metadata.json could not be written");
                }
                Ok(())
            },
            Err(err) => {
                match &*err {
                    LibraryErrorKind::Compensated => {
                        eprintln!("Linking failed; the files were moved back to staging. Safe to retry.");
                    },
                    LibraryErrorKind::Stranded { from, to } => {
                        eprintln!(
                            "Linking failed and the files could not be moved back.\n  now at:  {}\n  move to: {}",
                            to.display(),
                            from.display()
                        );
                    },
                    kind if kind.is_retryable() => {
                        eprintln!("The failure may be transient; retrying may succeed.");
                    },
                    _ => {},
                }
                Err(ErrorKind::library(err))
            },
        }
    }
}
