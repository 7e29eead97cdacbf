//! Save state error types.

use thiserror::Error;

/// Save state operation error.
#[derive(Debug, Error)]
pub enum SaveStateError {
    /// The save-state file's JSON was malformed or did not match the
    /// expected schema.
    #[error("malformed save state: {0}")]
    Json(#[from] serde_json::Error),

    /// The save-state file or a `.ramdump` sidecar could not be read or
    /// written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A device record's `type` field names a kind with no registered
    /// constructor.
    #[error("no device constructor registered for kind {0:?}")]
    UnknownDeviceKind(String),

    /// A device record's `params` did not match what its kind's constructor
    /// expects.
    #[error("malformed params for device kind {0:?}")]
    MalformedParams(String),

    /// A device record's `guid` does not match any device currently
    /// registered with the [`crate::mapper::Mapper`] being restored into.
    #[error("save state references unregistered device {0:?}")]
    UnknownDevice(String),
}
