/// Line-delimited JSON requests and responses.
///
/// Each stdin line is one `Request`, tagged by `op`; each gets exactly one
/// `Response` line on stdout.
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vaultkeep_core::sync::{deserialize_sections, ProposedSection, SyncRequest};
use vaultkeep_core::tasks::stats::days_before;
use vaultkeep_core::{ParaLocation, Vault, VaultError};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SyncNote(SyncRequest),
    SyncDailyNote {
        #[serde(default)]
        date: Option<NaiveDate>,
        #[serde(default, deserialize_with = "deserialize_sections")]
        sections: Vec<ProposedSection>,
        #[serde(default = "default_true")]
        preserve_modified: bool,
        #[serde(default)]
        template: Option<String>,
    },
    ExtractTasks {
        note_id: String,
        #[serde(default)]
        sections: Option<Vec<String>>,
    },
    FolderStats {
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        as_of: Option<NaiveDate>,
        #[serde(default)]
        lookback_days: Option<u32>,
    },
    WeeklySummary {
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        start_date: Option<NaiveDate>,
        #[serde(default)]
        end_date: Option<NaiveDate>,
        #[serde(default)]
        location: Option<ParaLocation>,
    },
    ProjectActivity {
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        as_of: Option<NaiveDate>,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }
}

impl From<VaultError> for Response {
    fn from(e: VaultError) -> Self {
        Response::failure(e.kind(), e.to_string())
    }
}

/// Dispatches requests to a vault.
pub struct Handler {
    vault: Vault,
    lookback_days: u32,
}

impl Handler {
    pub fn new(vault: Vault, lookback_days: u32) -> Self {
        Self {
            vault,
            lookback_days,
        }
    }

    /// Handle one raw request line.
    pub fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                log::warn!("[vaultkeep.agent] Malformed request: {}", e);
                Response::failure("invalid_request", e.to_string())
            }
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        match self.dispatch(request) {
            Ok(value) => Response::success(value),
            Err(e) => {
                log::warn!("[vaultkeep.agent] Request failed: {}", e);
                e.into()
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Value, VaultError> {
        let today = Local::now().date_naive();
        match request {
            Request::SyncNote(request) => to_value(self.vault.sync_note(&request)?),
            Request::SyncDailyNote {
                date,
                sections,
                preserve_modified,
                template,
            } => to_value(self.vault.sync_daily_note(
                date.unwrap_or(today),
                sections,
                preserve_modified,
                template,
            )?),
            Request::ExtractTasks { note_id, sections } => {
                to_value(self.vault.extract_tasks(&note_id, sections.as_deref())?)
            }
            Request::FolderStats {
                folder,
                as_of,
                lookback_days,
            } => to_value(self.vault.folder_stats(
                folder.as_deref().unwrap_or(""),
                as_of.unwrap_or(today),
                lookback_days.unwrap_or(self.lookback_days),
            )?),
            Request::WeeklySummary {
                folder,
                start_date,
                end_date,
                location,
            } => {
                let end = end_date.unwrap_or(today);
                let start = start_date.unwrap_or_else(|| days_before(end, 6));
                to_value(self.vault.weekly_summary(
                    folder.as_deref().unwrap_or(""),
                    start,
                    end,
                    location,
                )?)
            }
            Request::ProjectActivity { folder, as_of } => {
                let folder = folder.unwrap_or_else(|| self.vault.config().para_folders.projects.clone());
                to_value(self.vault.project_activity(&folder, as_of.unwrap_or(today))?)
            }
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, VaultError> {
    serde_json::to_value(value).map_err(|e| VaultError::Configuration(e.to_string()))
}
