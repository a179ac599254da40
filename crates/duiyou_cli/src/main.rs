//! `duiyou` command-line front end.
//!
//! # Responsibility
//! - Drive the core record store, backup transfer and cloud sync from a
//!   terminal.
//! - Keep output plain and line-oriented.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use duiyou_core::db::open_db;
use duiyou_core::sync::config::{load_config, reset_config, save_config};
use duiyou_core::transfer::discovery::{discover_backups, select_backup, BackupSelection};
use duiyou_core::transfer::export::{export_to_file, ExportOutcome, ExportTarget};
use duiyou_core::transfer::{default_export_file_name, read_backup_file};
use duiyou_core::{
    init_logging, BackupDirs, EntryKind, HttpRemoteBackup, LogLevel, NewEntry, NewPerson,
    PullOutcome, PushReport, RecordKind, RecordStore, SqliteKvStore, SyncConfig, SyncService,
    TimelineItem,
};
use log::info;
use std::path::{Path, PathBuf};

const DB_FILE_NAME: &str = "duiyou.sqlite3";

#[derive(Parser)]
#[command(name = "duiyou", version)]
#[command(about = "Track the people you care about and what you did together")]
struct Cli {
    /// Directory holding the local database and logs
    #[arg(long, env = "DUIYOU_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error); debug builds default to debug
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage people
    #[command(subcommand)]
    Person(PersonCommand),
    /// Record an event with one or more people
    Event(EntryArgs),
    /// Record a chat with one or more people
    Chat(EntryArgs),
    /// Delete a person, event or chat
    Delete { kind: KindArg, id: String },
    /// Show events and chats, newest first
    Timeline {
        #[arg(long)]
        person: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Manage the global tag set
    #[command(subcommand)]
    Tag(TagCommand),
    /// Write a backup file
    Export {
        /// Target directory instead of the platform backup folders
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Replace local data with a backup file
    Import {
        /// Backup file; the newest discovered backup when omitted
        file: Option<PathBuf>,
    },
    /// Merge a backup file into local data
    Merge { file: PathBuf },
    /// List discovered backup files
    Backups,
    /// Cloud backup operations
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Cloud endpoint configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum PersonCommand {
    Add {
        name: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    List,
}

#[derive(Args)]
struct EntryArgs {
    /// Person id; repeat for group entries
    #[arg(long = "person", required = true)]
    people: Vec<String>,
    /// When it happened; defaults to now
    #[arg(long)]
    time: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Free-form note stored as the `content` attribute
    #[arg(long)]
    note: Option<String>,
}

#[derive(Subcommand)]
enum TagCommand {
    List,
    Add { name: String },
    Rename { old: String, new: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Upload local data, replacing the cloud copy
    Push,
    /// Merge the cloud copy into local data
    Pull,
    /// Pull then push
    Now,
    Status,
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        file_name: Option<String>,
    },
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Person,
    Event,
    Chat,
}

impl From<KindArg> for RecordKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Person => RecordKind::Person,
            KindArg::Event => RecordKind::Event,
            KindArg::Chat => RecordKind::Chat,
        }
    }
}

type Store<'conn> = RecordStore<SqliteKvStore<'conn>>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    let log_dir = data_dir.join("logs");
    let log_level = cli
        .log_level
        .unwrap_or_else(|| LogLevel::build_default().as_str().to_string());
    init_logging(&log_level, &log_dir.to_string_lossy()).map_err(|err| anyhow!(err))?;

    let conn = open_db(data_dir.join(DB_FILE_NAME)).context("opening local store")?;
    let mut store = RecordStore::open(SqliteKvStore::new(&conn));
    run(cli.command, &mut store)
}

fn run(command: Command, store: &mut Store<'_>) -> Result<()> {
    match command {
        Command::Person(PersonCommand::Add { name, tags }) => {
            let person = store.create_person(NewPerson {
                tags,
                ..NewPerson::named(name)
            })?;
            println!("{}", person.id);
        }
        Command::Person(PersonCommand::List) => {
            for person in store.people() {
                println!("{}\t{}\t{}", person.id, person.name, person.tags.join(","));
            }
        }
        Command::Event(args) => create_entry(store, EntryKind::Event, args)?,
        Command::Chat(args) => create_entry(store, EntryKind::Chat, args)?,
        Command::Delete { kind, id } => store.delete(kind.into(), &id)?,
        Command::Timeline { person, tag } => {
            let items = match (person, tag) {
                (Some(person), _) => store.timeline_by_person(&person),
                (None, Some(tag)) => store.timeline_by_tag(&tag),
                (None, None) => store.timeline(),
            };
            for item in &items {
                println!("{}", timeline_line(item));
            }
        }
        Command::Tag(command) => run_tag(command, store)?,
        Command::Export { dir } => export(store, dir)?,
        Command::Import { file } => {
            let path = match file {
                Some(path) => path,
                None => newest_backup()?,
            };
            let summary = store.import_payload(&read_backup_file(&path)?)?;
            println!(
                "imported {} people, {} events, {} chats, {} tags from {}",
                summary.people,
                summary.events,
                summary.chats,
                summary.tags,
                path.display()
            );
        }
        Command::Merge { file } => {
            let report = store.merge_payload(&read_backup_file(&file)?)?;
            println!(
                "people +{} ~{}, events +{} ~{}, chats +{} ~{}, tags +{}",
                report.people.added,
                report.people.replaced,
                report.events.added,
                report.events.replaced,
                report.chats.added,
                report.chats.replaced,
                report.tags_added
            );
        }
        Command::Backups => {
            let dirs = BackupDirs::platform_default()?;
            for file in discover_backups(&dirs) {
                println!("{}\t{} bytes", file.path.display(), file.size);
            }
        }
        Command::Sync(command) => run_sync(command, store)?,
        Command::Config(command) => run_config(command, store)?,
    }
    Ok(())
}

fn create_entry(store: &mut Store<'_>, kind: EntryKind, args: EntryArgs) -> Result<()> {
    let mut input = NewEntry {
        person_ids: args.people,
        time: args.time,
        tags: args.tags,
        ..NewEntry::default()
    };
    if let Some(note) = args.note {
        input.attributes.insert("content".to_string(), note.into());
    }
    let entry = store.create_entry(kind, input)?;
    println!("{}", entry.id);
    Ok(())
}

fn run_tag(command: TagCommand, store: &mut Store<'_>) -> Result<()> {
    match command {
        TagCommand::List => {
            for tag in store.tags() {
                println!("{tag}");
            }
        }
        TagCommand::Add { name } => store.add_tag(&name)?,
        TagCommand::Rename { old, new } => store.rename_tag(&old, &new)?,
        TagCommand::Delete { name } => store.delete_tag(&name)?,
    }
    Ok(())
}

fn export(store: &Store<'_>, dir: Option<PathBuf>) -> Result<()> {
    let dirs = match dir {
        Some(dir) => BackupDirs::new(&dir, &dir),
        None => BackupDirs::platform_default()?,
    };
    let payload = store.export_payload()?;
    let file_name = default_export_file_name(Utc::now());
    match export_to_file(&payload, &file_name, &ExportTarget::Direct(dirs))? {
        ExportOutcome::Written(path) | ExportOutcome::Shared(path) => {
            info!("event=cli_export module=cli status=ok bytes={}", payload.len());
            println!("{}", path.display());
        }
        ExportOutcome::Cancelled => println!("export cancelled"),
    }
    Ok(())
}

fn newest_backup() -> Result<PathBuf> {
    let dirs = BackupDirs::platform_default()?;
    match select_backup(discover_backups(&dirs)) {
        BackupSelection::None => bail!(
            "no backup files found in {} or {}",
            dirs.primary.display(),
            dirs.secondary.display()
        ),
        BackupSelection::Single(file) => Ok(file.path),
        BackupSelection::Multiple(files) => {
            let newest = files
                .into_iter()
                .next()
                .context("backup list unexpectedly empty")?;
            eprintln!("several backups found; using newest {}", newest.path.display());
            Ok(newest.path)
        }
    }
}

fn run_sync(command: SyncCommand, store: &mut Store<'_>) -> Result<()> {
    let config = load_config(store.kv());
    let remote = HttpRemoteBackup::from_config(&config)
        .context("cloud sync is not configured; run `duiyou config set --base-url ...`")?;
    let service = SyncService::new(remote);

    match command {
        SyncCommand::Push => {
            print_push(&service.push(store)?);
        }
        SyncCommand::Pull => print_pull(&service.pull(store)?),
        SyncCommand::Now => {
            let report = service.sync(store)?;
            print_pull(&report.pull);
            print_push(&report.push);
        }
        SyncCommand::Status => {
            let status = service.status(store);
            println!("remote: {}", service.remote().object_url());
            println!("exists: {}", status.remote.exists);
            if let Some(modified) = status.remote.last_modified {
                println!("last modified: {modified}");
            }
            if let Some(size) = status.remote.size {
                println!("size: {size} bytes");
            }
            println!(
                "last sync: {}",
                status.last_sync_time.as_deref().unwrap_or("never")
            );
        }
    }
    Ok(())
}

fn print_push(report: &PushReport) {
    println!("uploaded {} bytes at {}", report.bytes, report.synced_at);
    if !report.stamp_saved {
        eprintln!("warning: upload succeeded but the local sync time was not saved");
    }
}

fn print_pull(outcome: &PullOutcome) {
    if let PullOutcome::Merged {
        stamp_saved: false, ..
    } = outcome
    {
        eprintln!("warning: merge succeeded but the local sync time was not saved");
    }
    match outcome {
        PullOutcome::Merged { report, .. } => println!(
            "merged people +{} ~{}, events +{} ~{}, chats +{} ~{}",
            report.people.added,
            report.people.replaced,
            report.events.added,
            report.events.replaced,
            report.chats.added,
            report.chats.replaced
        ),
        PullOutcome::NoBackup => println!("no cloud backup yet"),
    }
}

fn run_config(command: ConfigCommand, store: &Store<'_>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = load_config(store.kv());
            println!("remoteBaseUrl: {}", config.remote_base_url);
            println!("remoteFileName: {}", config.remote_file_name);
        }
        ConfigCommand::Set {
            base_url,
            file_name,
        } => {
            let current = load_config(store.kv());
            let config = SyncConfig {
                remote_base_url: base_url.trim().to_string(),
                remote_file_name: file_name.unwrap_or(current.remote_file_name),
            };
            println!("{}", config.object_url()?);
            save_config(store.kv(), &config)?;
        }
        ConfigCommand::Reset => reset_config(store.kv())?,
    }
    Ok(())
}

fn timeline_line(item: &TimelineItem<'_>) -> String {
    let names: Vec<&str> = item.people.iter().map(|person| person.name.as_str()).collect();
    format!(
        "{}\t{}\t{}\t{}",
        item.entry.time,
        item.kind.as_str(),
        names.join(","),
        item.entry.id
    )
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return absolute(&dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("duiyou"))
        .context("no platform data directory; pass --data-dir")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("resolving current directory")?
        .join(path))
}
