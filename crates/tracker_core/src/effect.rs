use std::fmt;
use std::str::FromStr;

use crate::{Epoch, JobId, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitUpload(UploadSubmission),
    OpenJobStream {
        job_id: JobId,
        subscription: SubscriptionId,
    },
    CloseJobStream {
        job_id: JobId,
    },
    CloseAllStreams,
    QueryKeepLocal {
        epoch: Epoch,
        paths: Vec<String>,
    },
    SetKeepLocal {
        paths: Vec<String>,
        designation: bool,
    },
    SubmitMerge {
        paths: Vec<String>,
        new_name: String,
        archive_originals: bool,
    },
}

/// Everything the upload endpoint needs to create a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSubmission {
    pub target_files: Vec<String>,
    pub migrate_files: bool,
    pub made_for_kids: Option<bool>,
    pub visibility: Option<Visibility>,
    pub upload_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Public,
    Private,
    #[default]
    Unlisted,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "unlisted" => Ok(Visibility::Unlisted),
            other => Err(format!("unknown visibility setting: {other}")),
        }
    }
}
