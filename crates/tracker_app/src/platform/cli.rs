use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracker_core::{Msg, UploadOptions, Visibility};

#[derive(Parser, Debug)]
#[command(name = "upload-tracker")]
#[command(about = "Submit uploads and follow their progress on the media server")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./tracker.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL, overriding the configuration file
    #[arg(long, global = true)]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upload files and follow the resulting job
    Upload {
        #[arg(required = true)]
        files: Vec<String>,
        /// Move the originals to archive storage after upload
        #[arg(long)]
        migrate: bool,
        /// Audience flag sent with the upload; the server default applies when omitted
        #[arg(long)]
        made_for_kids: Option<bool>,
        #[arg(long)]
        visibility: Option<Visibility>,
        /// Title for a single-file upload
        #[arg(long)]
        name: Option<String>,
    },
    /// Follow jobs that are already running
    Watch {
        #[arg(required = true)]
        job_ids: Vec<String>,
    },
    /// Show, or with --set change, the keep-local flag of files
    KeepLocal {
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(long)]
        set: Option<bool>,
    },
    /// Merge two or three clips in the given order
    Merge {
        #[arg(required = true)]
        files: Vec<String>,
        /// Output name; defaults to "<first clip title> merged"
        #[arg(long)]
        name: Option<String>,
        /// Archive the source clips after merging
        #[arg(long)]
        archive: bool,
    },
}

impl Command {
    /// Messages a user would produce by performing this command by hand.
    pub fn into_messages(self, at: DateTime<Utc>) -> Vec<Msg> {
        match self {
            Command::Upload {
                files,
                migrate,
                made_for_kids,
                visibility,
                name,
            } => {
                let mut msgs: Vec<Msg> = files.into_iter().map(Msg::MigrationToggled).collect();
                if let Some(name) = name {
                    msgs.push(Msg::UploadNameEdited(name));
                }
                msgs.push(Msg::UploadRequested(UploadOptions {
                    migrate_files: migrate,
                    made_for_kids,
                    visibility,
                }));
                msgs
            }
            Command::Watch { job_ids } => job_ids
                .into_iter()
                .map(|job_id| Msg::WatchRequested {
                    job_id,
                    total_files_hint: 0,
                    at,
                })
                .collect(),
            Command::KeepLocal { files, set } => {
                let mut msgs: Vec<Msg> = files.into_iter().map(Msg::MigrationToggled).collect();
                if let Some(designation) = set {
                    msgs.push(Msg::KeepLocalDesignated(designation));
                }
                msgs
            }
            Command::Merge {
                files,
                name,
                archive,
            } => {
                let mut msgs: Vec<Msg> = files.into_iter().map(Msg::MergeClipAdded).collect();
                if let Some(name) = name {
                    msgs.push(Msg::MergeNameEdited(name));
                }
                msgs.push(Msg::MergeRequested {
                    archive_originals: archive,
                });
                msgs
            }
        }
    }
}
