//! Value and callback types shared by the request model, the translator
//! and the job scheduler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Callbacks
// =============================================================================

/// Zero-argument lifecycle hook, invoked once per worker right after it
/// comes up and before it accepts traffic or arms timers.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Periodic job body.
pub type JobTask = Arc<dyn Fn() + Send + Sync>;

// =============================================================================
// Query parameters
// =============================================================================

/// A decoded query parameter.
///
/// `key[]=a&key[]=b` produces a [`QueryValue::List`]; everything else is a
/// [`QueryValue::Single`], where a repeated plain key keeps the last value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    /// The value when single, the last element when a list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(s) => Some(s),
            QueryValue::List(items) => items.last().map(String::as_str),
        }
    }

    /// All values as a slice-like vector of borrowed strings.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(s) => vec![s.as_str()],
            QueryValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Single(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Single(s)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(items: Vec<String>) -> Self {
        QueryValue::List(items)
    }
}

/// Decoded query string.
pub type QueryParams = HashMap<String, QueryValue>;

// =============================================================================
// Uploaded File
// =============================================================================

/// Upload error code: no error.
pub const UPLOAD_ERR_OK: u8 = 0;

/// Upload error code: the part exceeded the configured size limit.
pub const UPLOAD_ERR_SIZE: u8 = 1;

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Temporary file on disk (empty when `error != 0`).
    pub tmp_path: PathBuf,
    /// Filename sent by the client.
    pub client_filename: String,
    /// Media type declared by the client.
    pub client_media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload error code (0 = success).
    pub error: u8,
}

impl UploadedFile {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error == UPLOAD_ERR_OK
    }

    /// Move the temporary file to `target`.
    ///
    /// Falls back to copy + remove when the target lives on another
    /// filesystem. Files that were never moved are deleted once the
    /// exchange completes.
    pub fn move_to(&self, target: impl AsRef<Path>) -> crate::core::Result<()> {
        if !self.is_ok() {
            return Err(crate::core::Error::InvalidArgument(format!(
                "cannot move upload '{}' with error code {}",
                self.client_filename, self.error
            )));
        }

        let target = target.as_ref();
        if std::fs::rename(&self.tmp_path, target).is_err() {
            std::fs::copy(&self.tmp_path, target)?;
            std::fs::remove_file(&self.tmp_path)?;
        }
        Ok(())
    }
}

/// Uploaded files grouped by form field name.
pub type UploadedFiles = HashMap<String, Vec<UploadedFile>>;
