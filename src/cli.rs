//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;


/// Upload files to an HTTP endpoint as multipart form posts.
///
/// Files are queued, validated against the size and extension policy, and
/// sent with bounded parallelism. Exits non-zero when any file fails.
#[derive(Parser, Debug)]
#[command(name = "uploader")]
#[command(author, version, about)]
pub struct Args {
    /// Files to upload
    pub files: Vec<PathBuf>,

    /// Target URL (required unless set in the config file)
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// HTTP method (default POST)
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Extra form field as NAME=VALUE (repeatable)
    #[arg(short = 'P', long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Maximum parallel uploads (0 = unlimited)
    #[arg(short = 'p', long)]
    pub max_parallel: Option<usize>,

    /// Batch window in milliseconds between start waves (0 to disable; needs a parallel limit)
    #[arg(short = 'b', long)]
    pub batch_offset: Option<u64>,

    /// Maximum file size in megabytes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_file_size: Option<u64>,

    /// Accepted extensions, e.g. ".pdf,.png" (default "*.*")
    #[arg(long)]
    pub accept: Option<String>,

    /// Reject files whose extension is not in --accept
    #[arg(long)]
    pub validate_extension: bool,

    /// Send and store cookies with each request
    #[arg(long)]
    pub with_credentials: bool,

    /// Drop uploaded and canceled files from the queue
    #[arg(long)]
    pub auto_remove: bool,

    /// Config file (default: $XDG_CONFIG_HOME/uploader/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got '{raw}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}
