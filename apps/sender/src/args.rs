//! Command-line argument parsing

use std::path::PathBuf;

use clap::Parser;
use resend_protocol::DEFAULT_PORT;

/// Send a file to a resend receiver, resuming any earlier partial transfer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Receiver host name or IP address
    pub host: String,

    /// Local file to send
    pub file: PathBuf,

    /// Receiver port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Name to store the file under on the receiver (default: the local file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = resend_protocol::CONNECT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Suppress the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Transfer name sent to the receiver.
    pub fn transfer_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        self.file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
    }
}
