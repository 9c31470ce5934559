//! CLI entry point for `tis`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use tis::config::Config;
use tis::index::IndexFile;
use tis::query::{parse_tags, QueryEngine};
use tis::store::mover::{self, MovePlan, StoredName};

#[derive(Parser)]
#[command(
    name = "tis",
    version,
    about = "Tagged Image Storage: tag images and find them again",
    after_help = "Tags are separated by semicolons, e.g. \"cat;outdoor\"."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index file (defaults to the configured path, usually ./index.tis)
    #[arg(long, global = true, env = "TIS_INDEX", value_name = "PATH")]
    index: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new index file
    Init {
        /// Name of the folder that will hold the images
        #[arg(long, value_name = "NAME")]
        data_folder: Option<String>,
    },
    /// Show information about the index file
    Info {
        #[arg(long)]
        json: bool,
    },
    /// Add a file to the index
    AddFile {
        /// Image to add
        file: PathBuf,
        /// Tags, separated by semicolons
        tags: String,
        /// Don't move the file to the data folder
        #[arg(long)]
        no_move: bool,
        /// Name in the data folder; '*' picks a random name that keeps the extension
        #[arg(long, value_name = "NAME")]
        file_name: Option<String>,
    },
    /// List all files with the given tags
    List {
        /// Tags, separated by semicolons
        tags: String,
        /// Exclude files with any of these tags
        #[arg(long, value_name = "TAGS")]
        exclude: Option<String>,
        /// Only show files that have every tag
        #[arg(long)]
        exclusive: bool,
        /// Print all files on one line, separated by ", "
        #[arg(long, conflicts_with = "json")]
        joined: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print one random file, optionally restricted to some tags
    Random {
        /// Tags, separated by semicolons (all tags when omitted)
        tags: Option<String>,
        /// Exclude files with any of these tags
        #[arg(long, value_name = "TAGS")]
        exclude: Option<String>,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = tis::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let index_path = cli.index.unwrap_or_else(|| config.index.path.clone());

    match cli.command {
        Commands::Init { data_folder } => cmd_init(&index_path, data_folder, &config),
        Commands::Info { json } => cmd_info(&index_path, json),
        Commands::AddFile {
            file,
            tags,
            no_move,
            file_name,
        } => cmd_add_file(&index_path, file, &tags, no_move, file_name, &config),
        Commands::List {
            tags,
            exclude,
            exclusive,
            joined,
            json,
        } => cmd_list(
            &index_path,
            &tags,
            exclude.as_deref(),
            exclusive,
            joined,
            json,
        ),
        Commands::Random { tags, exclude } => {
            cmd_random(&index_path, tags.as_deref(), exclude.as_deref())
        }
        Commands::Config { save } => cmd_config(&config, save),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = tis::config::log_file_path(config);
    let log_dir = tis::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tis.log".into());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Create an empty index.
fn cmd_init(
    index_path: &Path,
    data_folder: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let data_folder = data_folder.unwrap_or_else(|| config.index.data_folder.clone());
    if data_folder.is_empty() {
        anyhow::bail!("Data folder name must not be empty");
    }
    IndexFile::create(index_path, &data_folder)?;
    println!("Index file created: {}", index_path.display());
    Ok(())
}

/// Show the data folder, counts and tags.
fn cmd_info(index_path: &Path, json: bool) -> anyhow::Result<()> {
    let index = IndexFile::open(index_path)?;
    let info = index.info();
    let size = std::fs::metadata(index.path()).map(|m| m.len()).unwrap_or(0);

    if json {
        let mut value = serde_json::to_value(&info)?;
        value["index"] = serde_json::json!(index.path().to_string_lossy());
        value["index_size"] = serde_json::json!(size);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!();
    println!("  {:<14} {}", "Index", index.path().display());
    println!("  {:<14} {}", "Index size", format_size(size, BINARY));
    println!("  {:<14} {}", "Data folder", info.data_folder);
    println!("  {:<14} {}", "Tag count", info.tag_count);
    println!("  {:<14} {}", "File count", info.file_count);
    println!("  {:<14} {}", "Tags", info.tags.join(", "));
    println!();
    Ok(())
}

/// Move a file into place and record it under its tags.
fn cmd_add_file(
    index_path: &Path,
    file: PathBuf,
    tags: &str,
    no_move: bool,
    file_name: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let tags = parse_tags(tags);
    if tags.is_empty() {
        return Err(tis::error::TisError::NoTags.into());
    }

    let mut index = IndexFile::open(index_path)?;
    let data_dir = index_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(index.data_folder());

    let name = match file_name.as_deref() {
        None => StoredName::Original,
        Some("*") => StoredName::Random(config.add.random_name_length),
        Some(n) => StoredName::Explicit(n.to_string()),
    };
    let plan = MovePlan {
        source: file,
        name,
        move_file: config.add.move_files && !no_move,
    };
    let placed = mover::place(&plan, &data_dir, &mut rand::thread_rng())?;

    if let Err(e) = index.add_file(&placed.filename, &tags) {
        if let Err(undo) = mover::restore(&plan, &placed) {
            return Err(anyhow::Error::new(e).context(format!(
                "{} is not indexed and could not be moved back: {undo}",
                placed.path.display()
            )));
        }
        return Err(e.into());
    }
    println!("Added {} to index.", placed.filename);
    Ok(())
}

/// List files matching a tag list.
fn cmd_list(
    index_path: &Path,
    tags: &str,
    exclude: Option<&str>,
    exclusive: bool,
    joined: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut index = IndexFile::open(index_path)?;
    let tags = parse_tags(tags);
    let exclude = exclude.map(parse_tags).unwrap_or_default();

    let files = QueryEngine::new(&mut index).list_by_tags(&tags, &exclude, exclusive)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if joined {
        println!("{}", files.join(", "));
    } else {
        for file in &files {
            println!("{file}");
        }
    }
    Ok(())
}

/// Print one random matching file.
fn cmd_random(
    index_path: &Path,
    tags: Option<&str>,
    exclude: Option<&str>,
) -> anyhow::Result<()> {
    let mut index = IndexFile::open(index_path)?;
    let tags = tags.map(parse_tags).unwrap_or_default();
    let exclude = exclude.map(parse_tags).unwrap_or_default();

    let pick =
        QueryEngine::new(&mut index).random_by_tags(&tags, &exclude, &mut rand::thread_rng())?;
    println!("{pick}");
    Ok(())
}

/// Print the effective configuration, optionally saving it.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if save {
        tis::config::save_config(config)?;
        if let Some(path) = tis::config::config_file_path() {
            eprintln!("Saved to {}", path.display());
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "tis", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
