//! Media Indexer CLI
//!
//! Scans folders for media files and maintains a JSON index of what was found.

use clap::{Parser, Subcommand};
use env_logger::Env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use media_indexer::config::parse_extension_list;
use media_indexer::{
    filter_by_size, get_file_info, group_by_folder, EventBus, Indexer, MediaFile, ProgressReporter,
    Result, ScanOptions, Scanner, DEFAULT_EXTENSIONS,
};

const ABOUT: &str = r#"
Media Indexer - scan folders for media files and keep an index of them

Examples:
  media_indexer scan /media/videos                 Scan a folder recursively
  media_indexer scan /media -e mkv,mp4 -v          Only mkv/mp4, list the files
  media_indexer scan /media --no-recursive         Only the top-level folder
  media_indexer index /media -o media.json         Scan and save an index
  media_indexer stats media.json                   Summarize a saved index
"#;

/// Index file written by `index` when no output is given
const DEFAULT_INDEX_NAME: &str = ".media_index.json";

/// Media file scanner and indexer
#[derive(Parser)]
#[command(name = "media_indexer")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a folder for media files
    Scan {
        /// Folder to scan
        path: PathBuf,

        /// Comma-separated extensions (e.g. mkv,mp4)
        #[arg(short = 'e', long)]
        extensions: Option<String>,

        /// Scan subdirectories (default)
        #[arg(short = 'r', long, overrides_with = "no_recursive")]
        recursive: bool,

        /// Only scan the top-level folder
        #[arg(long, overrides_with = "recursive")]
        no_recursive: bool,

        /// List every file and enable debug logging
        #[arg(short = 'v', long)]
        verbose: bool,

        /// Print the scan result as JSON
        #[arg(long)]
        json: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,

        /// Threads used to read file metadata (0 = one per CPU)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Follow symbolic links (cycles are skipped)
        #[arg(long)]
        follow_links: bool,

        /// Only report files of at least this many MB
        #[arg(long)]
        min_mb: Option<f64>,

        /// Only report files of at most this many MB
        #[arg(long)]
        max_mb: Option<f64>,
    },

    /// Show metadata for one file
    Info {
        /// Path to the media file
        path: PathBuf,
    },

    /// Scan a folder and merge the result into an index file
    Index {
        /// Folder to scan and index
        path: PathBuf,

        /// Index file (default: <path>/.media_index.json)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Comma-separated extensions (e.g. mkv,mp4)
        #[arg(short = 'e', long)]
        extensions: Option<String>,

        /// Only scan the top-level folder
        #[arg(long)]
        no_recursive: bool,
    },

    /// Show statistics for an existing index
    Stats {
        /// Path to the index file
        index_path: PathBuf,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the default media extensions
    Extensions,

    /// Watch a folder and report media files as they appear, change or disappear
    #[cfg(feature = "watch")]
    Watch {
        /// Folder to watch
        path: PathBuf,

        /// Keep this index file up to date with the changes
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Only watch the top-level folder
        #[arg(long)]
        no_recursive: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Some(Commands::Scan { verbose: true, .. }));
    env_logger::Builder::from_env(Env::default().default_filter_or(if verbose {
        "debug"
    } else {
        "info"
    }))
    .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Scan {
            path,
            extensions,
            recursive: _,
            no_recursive,
            verbose,
            json,
            progress,
            threads,
            follow_links,
            min_mb,
            max_mb,
        }) => {
            let options = ScanOptions::builder()
                .recursive(!no_recursive)
                .num_threads(threads)
                .follow_links(follow_links)
                .build();
            let extensions = extensions.as_deref().map(parse_extension_list);

            let bus = Arc::new(EventBus::new());
            let reporter = Arc::new(ProgressReporter::new(progress, 500));
            reporter.attach(&bus);
            if reporter.is_enabled() {
                let mut exts: Vec<String> = options
                    .effective_extensions(extensions.as_ref())
                    .into_iter()
                    .collect();
                exts.sort();
                reporter.report_start(&path, !no_recursive, &exts);
            }

            let scanner = Scanner::new(options).with_events(bus);
            let result = scanner.scan(&path, !no_recursive, extensions.as_ref())?;

            if json {
                let rendered = serde_json::to_string_pretty(&result)
                    .map_err(|e| media_indexer::Error::io(&path, io::Error::from(e)))?;
                println!("{}", rendered);
                return Ok(());
            }

            println!("\nScan Results for: {}", result.root_path().display());
            println!("{}", "─".repeat(50));
            println!("Files found:      {}", result.file_count());
            println!(
                "Total size:       {:.2} GB ({} bytes)",
                result.total_size_gb(),
                result.total_size_bytes()
            );
            println!("Scan duration:    {:.2}s", result.duration_ms as f64 / 1000.0);
            println!("Extensions:       {}", result.extensions_scanned.join(", "));

            if !result.errors.is_empty() {
                println!("\nWarnings: {}", result.errors.len());
                for error in result.errors.iter().take(5) {
                    println!("  - {}", error.message);
                }
                if result.errors.len() > 5 {
                    println!("  ... and {} more", result.errors.len() - 5);
                }
            }

            let listed = if min_mb.is_some() || max_mb.is_some() {
                let kept = filter_by_size(result.files(), min_mb, max_mb)?;
                println!("Matching size:    {} files", kept.len());
                kept
            } else {
                result.files().to_vec()
            };

            if verbose && !listed.is_empty() {
                println!("\n{}", "─".repeat(50));
                for group in group_by_folder(&listed) {
                    println!("{}", group.folder.display());
                    for f in &group.files {
                        println!("  {:>8.1} MB  {}", f.size_mb(), f.name);
                    }
                }
            }
            Ok(())
        }
        Some(Commands::Info { path }) => {
            let info = get_file_info(&path)?;
            print_file_info(&info);
            Ok(())
        }
        Some(Commands::Index {
            path,
            output,
            extensions,
            no_recursive,
        }) => {
            let index_file = output.unwrap_or_else(|| path.join(DEFAULT_INDEX_NAME));
            let extensions = extensions.as_deref().map(parse_extension_list);

            let mut indexer = Indexer::open(&index_file)?;
            let result = Scanner::default().scan(&path, !no_recursive, extensions.as_ref())?;
            let count = indexer.add_scan_result(&result);
            indexer.save()?;

            println!("Indexed {} files to: {}", count, index_file.display());
            if !result.errors.is_empty() {
                println!("Skipped {} unreadable entries", result.errors.len());
            }
            let stats = indexer.get_stats();
            println!(
                "Index now holds {} files, {:.2} GB",
                stats.file_count,
                stats.total_size_gb()
            );
            Ok(())
        }
        Some(Commands::Stats { index_path, json }) => {
            let mut indexer = Indexer::new(&index_path);
            indexer.load()?;
            let stats = indexer.get_stats();

            if json {
                let rendered = serde_json::to_string_pretty(&stats)
                    .map_err(|e| media_indexer::Error::io(&index_path, io::Error::from(e)))?;
                println!("{}", rendered);
                return Ok(());
            }

            println!("\nIndex Statistics: {}", index_path.display());
            println!("{}", "─".repeat(50));
            println!("File count:   {}", stats.file_count);
            println!("Total size:   {:.2} GB", stats.total_size_gb());
            println!("Updated:      {}", format_timestamp(stats.last_updated_at));
            if !stats.source_roots.is_empty() {
                println!("\nSource roots:");
                for root in &stats.source_roots {
                    println!("  {}", root);
                }
            }
            println!("\nBy extension:");
            for (ext, count) in &stats.extension_counts {
                println!("  .{}: {} files", ext, count);
            }
            Ok(())
        }
        Some(Commands::Extensions) => {
            println!("Default media file extensions:");
            let mut exts = DEFAULT_EXTENSIONS.to_vec();
            exts.sort_unstable();
            for ext in exts {
                println!("  .{}", ext);
            }
            Ok(())
        }
        #[cfg(feature = "watch")]
        Some(Commands::Watch {
            path,
            output,
            no_recursive,
        }) => watch_folder(&path, output, !no_recursive),
        None => {
            println!("{}", ABOUT);
            println!("Run 'media_indexer --help' for the full list of commands");
            Ok(())
        }
    }
}

fn print_file_info(info: &MediaFile) {
    println!("\nFile Information: {}", info.name);
    println!("{}", "─".repeat(50));
    println!("Path:         {}", info.path.display());
    println!("Extension:    {}", info.extension);
    println!(
        "Size:         {:.2} MB ({} bytes)",
        info.size_mb(),
        info.size_bytes
    );
    println!("Modified:     {}", format_timestamp(info.modified_at));
    println!("Created:      {}", format_timestamp(info.created_at));
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Print changes under `path` until interrupted, updating `output` if given.
///
/// The observer's callbacks only forward paths over a channel; this thread owns
/// the index and is the only one that mutates or saves it.
#[cfg(feature = "watch")]
fn watch_folder(path: &std::path::Path, output: Option<PathBuf>, recursive: bool) -> Result<()> {
    use media_indexer::{default_observer, WatchEvent};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::mpsc;

    let extensions: HashSet<String> = ScanOptions::default().extensions;
    let Some(mut observer) = default_observer(extensions) else {
        return Err(media_indexer::Error::InvalidArgument(
            "file watching is not available in this build".to_string(),
        ));
    };

    let mut indexer = output.map(Indexer::open).transpose()?;

    let (tx, rx) = mpsc::channel::<WatchEvent>();
    let created_tx = tx.clone();
    let modified_tx = tx.clone();
    observer.start(
        path,
        recursive,
        Arc::new(move |p: &Path| {
            created_tx.send(WatchEvent::Created(p.to_path_buf())).ok();
        }),
        Arc::new(move |p: &Path| {
            modified_tx.send(WatchEvent::Modified(p.to_path_buf())).ok();
        }),
        Arc::new(move |p: &Path| {
            tx.send(WatchEvent::Deleted(p.to_path_buf())).ok();
        }),
    )?;

    println!("Watching {} (Ctrl-C to stop)", path.display());
    for event in rx {
        match event {
            WatchEvent::Created(p) | WatchEvent::Modified(p) => match get_file_info(&p) {
                Ok(file) => {
                    println!("+ {:>8.1} MB  {}", file.size_mb(), file.path.display());
                    if let Some(indexer) = indexer.as_mut() {
                        indexer.add_file(file)?;
                        indexer.save()?;
                    }
                }
                Err(e) => log::warn!("Error reading {:?}: {}", p, e),
            },
            WatchEvent::Deleted(p) => {
                println!("-              {}", p.display());
                if let Some(indexer) = indexer.as_mut() {
                    if indexer.remove_path(&p) {
                        indexer.save()?;
                    }
                }
            }
        }
    }

    observer.stop();
    Ok(())
}
