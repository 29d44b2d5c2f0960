//! Command-line administration tool.
//!
//! # Responsibility
//! - Run publishing actions against the configured database.
//! - Print results on stdout and failures on stderr with a non-zero exit.

use clap::{Parser, Subcommand};
use fst_core::db::migrations::latest_version;
use fst_core::import::{DirFetcher, FeedImporter, HttpFetcher};
use fst_core::repo::document_repo::DocumentListQuery;
use fst_core::{
    init_logging, open_db, DocumentId, DocumentRepository, FeedContext, MediaStore,
    PublishingService, Settings, SqliteDocumentRepository, SystemClock,
};
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "fst")]
#[command(version)]
#[command(about = "Publish regulations as RDF metadata and an Atom feed")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "FST_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the configuration.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database or migrate it to the latest schema.
    InitDb,
    /// Register a collection ("författningssamling").
    AddCollection {
        /// Full title, e.g. "Exempelmyndighetens författningssamling".
        #[arg(long)]
        title: String,
        /// Identifier prefix, e.g. "EXFS".
        #[arg(long)]
        short_name: String,
    },
    /// Rebuild the metadata post of every published document.
    RegeneratePosts,
    /// Publish documents to the feed.
    Publish {
        #[arg(required = true)]
        ids: Vec<DocumentId>,
    },
    /// Delete a document and remove it from the feed.
    Delete { id: DocumentId },
    /// Print the Atom feed.
    Feed,
    /// Print the cached metadata post of a document.
    Rdf {
        /// Document slug, e.g. "exfs/2009:1".
        slug: String,
    },
    /// Import the documents of another instance's feed.
    Import {
        /// Feed URL, or a path inside the mirror.
        feed: String,
        /// Read from a local directory mirroring the remote site instead of
        /// fetching over HTTP.
        #[arg(long)]
        mirror: Option<PathBuf>,
    },
    /// List documents awaiting publication.
    Unpublished,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        settings.storage.database_path = database;
    }
    if let Err(err) = init_logging("fst_cli", &settings.logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let conn = open_db(&settings.storage.database_path)?;
    let service = PublishingService::from_settings(&settings, SystemClock);

    match cli.command {
        Commands::InitDb => {
            println!(
                "database {} at schema version {}",
                settings.storage.database_path.display(),
                latest_version()
            );
            Ok(())
        }
        Commands::AddCollection { title, short_name } => {
            add_collection(&conn, title.as_str(), short_name.as_str())
        }
        Commands::RegeneratePosts => {
            let count = service.regenerate_all(&conn)?;
            println!("regenerated {count} metadata posts");
            Ok(())
        }
        Commands::Publish { ids } => {
            for record in service.make_published(&conn, &ids)? {
                println!("published {}", record.entry_id);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            match service.delete_document(&conn, id)? {
                Some(marker) => println!("deleted {id}, tombstone {}", marker.entry_id),
                None => println!("deleted {id}"),
            }
            Ok(())
        }
        Commands::Feed => {
            let context = FeedContext::from_settings(&settings);
            print!("{}", service.render_feed(&conn, &context)?);
            Ok(())
        }
        Commands::Rdf { slug } => {
            let post = service
                .metadata_post(&conn, slug.as_str())?
                .ok_or_else(|| format!("no metadata post for {slug}"))?;
            print!("{}", post.data);
            Ok(())
        }
        Commands::Import { feed, mirror } => {
            let media = MediaStore::new(settings.storage.media_root.clone());
            let report = match mirror {
                Some(root) => FeedImporter::new(DirFetcher::new(root), &media, &service)
                    .run(&conn, feed.as_str())?,
                None => FeedImporter::new(HttpFetcher::new()?, &media, &service)
                    .run(&conn, feed.as_str())?,
            };
            for slug in &report.imported {
                println!("imported {slug}");
            }
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.entry_id, skipped.error);
            }
            println!(
                "{} imported, {} skipped, {} placeholders",
                report.imported.len(),
                report.skipped.len(),
                report.placeholders
            );
            Ok(())
        }
        Commands::Unpublished => list_unpublished(&conn),
    }
}

fn add_collection(conn: &Connection, title: &str, short_name: &str) -> CliResult {
    let repo = SqliteDocumentRepository::new(conn);
    if let Some(existing) = repo.find_collection(short_name)? {
        return Err(format!("collection {} already exists", existing.short_name).into());
    }
    let collection = repo.create_collection(title, short_name)?;
    println!(
        "collection {} ({}) id={}",
        collection.short_name, collection.slug, collection.id
    );
    Ok(())
}

fn list_unpublished(conn: &Connection) -> CliResult {
    let repo = SqliteDocumentRepository::new(conn);
    for document in repo.list_documents(&DocumentListQuery::unpublished())? {
        let identifier = document.identifier()?;
        println!(
            "{}\t{}\t{}\t{}",
            document.id,
            identifier,
            document.role_label(),
            document.title()
        );
    }
    Ok(())
}
