//! Turning failures into recovery requests
//!
//! Each failure is mapped to a [`Classification`] and the closed set of
//! responses the tab knows how to act on for it.

use core_types::{Location, TabId};
use services_file_io::{FileError, FileErrorKind};
use services_notification::{Classification, NotificationRequest, ResponseKind};
use text_encodings::Encoding;

/// How a failed load can be recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRecovery {
    Unrecoverable,
    /// The same load may succeed if tried again
    RetryAsIs,
    /// Another encoding may decode the file
    PickEncoding,
}

pub fn load_recovery(kind: FileErrorKind) -> LoadRecovery {
    match kind {
        FileErrorKind::PermissionDenied
        | FileErrorKind::NotMounted
        | FileErrorKind::Busy
        | FileErrorKind::TimedOut => LoadRecovery::RetryAsIs,
        FileErrorKind::EncodingDetectionFailed | FileErrorKind::InvalidData => {
            LoadRecovery::PickEncoding
        }
        _ => LoadRecovery::Unrecoverable,
    }
}

/// How a failed save can be recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRecovery {
    Unrecoverable,
    /// "Save anyway" sets ignore-modification-time
    IgnoreMtime,
    /// "Save anyway" sets force-no-backup
    SkipBackup,
    /// "Save anyway" sets ignore-invalid-characters, or pick an encoding
    IgnoreInvalidChars,
}

pub fn save_recovery(kind: FileErrorKind) -> SaveRecovery {
    match kind {
        FileErrorKind::ExternallyModified => SaveRecovery::IgnoreMtime,
        FileErrorKind::CantCreateBackup => SaveRecovery::SkipBackup,
        FileErrorKind::InvalidCharacters => SaveRecovery::IgnoreInvalidChars,
        _ => SaveRecovery::Unrecoverable,
    }
}

fn name_of(location: Option<&Location>) -> String {
    match location {
        Some(location) => location.to_string(),
        None => "standard input".to_string(),
    }
}

fn explain(kind: FileErrorKind) -> &'static str {
    match kind {
        FileErrorKind::NotFound => "The file does not exist.",
        FileErrorKind::NotDirectory => "A component of the path is not a folder.",
        FileErrorKind::IsDirectory => "The location is a folder, not a file.",
        FileErrorKind::InvalidFilename => "The file name is not valid.",
        FileErrorKind::NotSupported => "Files of this kind of location cannot be handled.",
        FileErrorKind::PermissionDenied => "You do not have the permissions necessary.",
        FileErrorKind::NoSpace => "There is not enough disk space.",
        FileErrorKind::ReadOnly => "The disk is read-only.",
        FileErrorKind::Exists => "A file with the same name already exists.",
        FileErrorKind::NameTooLong => "The file name is too long.",
        FileErrorKind::TimedOut => "The operation timed out.",
        FileErrorKind::HostNotFound => "The host could not be found.",
        FileErrorKind::NotMounted => "The location is not mounted.",
        FileErrorKind::Busy => "The file is in use.",
        FileErrorKind::NotRegularFile => "The location is not a regular file.",
        FileErrorKind::TooBig => "The file is too big.",
        FileErrorKind::Cancelled => "The operation was cancelled.",
        FileErrorKind::ExternallyModified => "The file has been changed since it was read.",
        FileErrorKind::CantCreateBackup => "A backup copy could not be created.",
        FileErrorKind::EncodingDetectionFailed => "The character encoding could not be determined.",
        FileErrorKind::InvalidCharacters => {
            "The document contains characters the chosen encoding cannot represent."
        }
        FileErrorKind::InvalidData => "The file contains invalid data.",
        FileErrorKind::Other => "An unexpected error occurred.",
    }
}

fn with_detail(request: NotificationRequest, error: &FileError) -> NotificationRequest {
    let mut secondary = explain(error.kind).to_string();
    if let Some(detail) = &error.detail {
        secondary.push(' ');
        secondary.push_str(detail);
    }
    request.with_secondary(secondary)
}

/// Request shown when opening a file failed
///
/// `retryable` is false for stream sources, which cannot be read twice.
pub fn load_error(
    tab: TabId,
    location: Option<&Location>,
    error: &FileError,
    retryable: bool,
) -> NotificationRequest {
    let responses: &[ResponseKind] = match (load_recovery(error.kind), retryable) {
        (LoadRecovery::RetryAsIs, true) => &[ResponseKind::Retry, ResponseKind::Cancel],
        (LoadRecovery::PickEncoding, true) => {
            &[ResponseKind::RetryWithEncoding, ResponseKind::Cancel]
        }
        _ => &[ResponseKind::Cancel],
    };
    let request = NotificationRequest::new(
        tab,
        Classification::LoadFailed(error.kind),
        format!("Could not open the file {}.", name_of(location)),
    )
    .with_location(location.cloned())
    .with_responses(responses);
    with_detail(request, error)
}

/// Request shown when reverting failed; always unrecoverable
pub fn revert_error(tab: TabId, location: Option<&Location>, error: &FileError) -> NotificationRequest {
    let request = NotificationRequest::new(
        tab,
        Classification::RevertFailed(error.kind),
        format!("Could not revert the file {}.", name_of(location)),
    )
    .with_location(location.cloned())
    .with_responses(&[ResponseKind::Cancel]);
    with_detail(request, error)
}

/// Request shown when a load only succeeded by substituting bytes
pub fn conversion_fallback(
    tab: TabId,
    location: Option<&Location>,
    encoding: Encoding,
    retryable: bool,
) -> NotificationRequest {
    let responses: &[ResponseKind] = if retryable {
        &[
            ResponseKind::EditAnyway,
            ResponseKind::ViewReadOnly,
            ResponseKind::RetryWithEncoding,
            ResponseKind::Cancel,
        ]
    } else {
        &[
            ResponseKind::EditAnyway,
            ResponseKind::ViewReadOnly,
            ResponseKind::Cancel,
        ]
    };
    NotificationRequest::new(
        tab,
        Classification::ConversionFallback,
        format!("There was a problem opening the file {}.", name_of(location)),
    )
    .with_secondary(format!(
        "The file was opened using the {} encoding, but some characters could not be \
         converted. Editing it may corrupt the file.",
        encoding.display_name()
    ))
    .with_location(location.cloned())
    .with_encoding(encoding)
    .with_responses(responses)
}

/// Request shown when saving failed
pub fn save_error(
    tab: TabId,
    location: &Location,
    encoding: Encoding,
    error: &FileError,
) -> NotificationRequest {
    let (primary, responses): (String, &[ResponseKind]) = match save_recovery(error.kind) {
        SaveRecovery::IgnoreMtime => (
            format!("The file {} has been modified since reading it.", location),
            &[ResponseKind::SaveAnyway, ResponseKind::Cancel],
        ),
        SaveRecovery::SkipBackup => (
            format!("Could not create a backup file while saving {}.", location),
            &[ResponseKind::SaveAnyway, ResponseKind::Cancel],
        ),
        SaveRecovery::IgnoreInvalidChars => (
            format!(
                "Could not save the file {} using the {} encoding.",
                location,
                encoding.display_name()
            ),
            &[
                ResponseKind::SaveAnyway,
                ResponseKind::RetryWithEncoding,
                ResponseKind::Cancel,
            ],
        ),
        SaveRecovery::Unrecoverable => (
            format!("Could not save the file {}.", location),
            &[ResponseKind::Cancel],
        ),
    };
    let request = NotificationRequest::new(tab, Classification::SaveFailed(error.kind), primary)
        .with_location(Some(location.clone()))
        .with_encoding(encoding)
        .with_responses(responses);
    with_detail(request, error)
}

/// Advisory shown when the location is open in another tab
pub fn already_open(tab: TabId, location: &Location) -> NotificationRequest {
    NotificationRequest::new(
        tab,
        Classification::AlreadyOpen,
        format!("This file ({}) is already open in another window.", location),
    )
    .with_secondary("Editing it here may make both copies inconsistent.")
    .with_location(Some(location.clone()))
    .with_responses(&[ResponseKind::EditAnyway, ResponseKind::Dismiss])
    .non_blocking()
}

/// Request shown when the file changed on disk behind the tab's back
pub fn externally_modified(tab: TabId, location: &Location, document_modified: bool) -> NotificationRequest {
    let secondary = if document_modified {
        "Reloading will discard your changes."
    } else {
        "Reload to see the new content."
    };
    NotificationRequest::new(
        tab,
        Classification::ExternallyModified,
        format!("The file {} changed on disk.", location),
    )
    .with_secondary(secondary)
    .with_location(Some(location.clone()))
    .with_responses(&[ResponseKind::Reload, ResponseKind::Dismiss])
}

/// Request shown when a print job could not be started
pub fn print_failed(tab: TabId, location: Option<&Location>, reason: &str) -> NotificationRequest {
    NotificationRequest::new(tab, Classification::PrintFailed, "Could not print the document.")
        .with_secondary(reason.to_string())
        .with_location(location.cloned())
        .with_responses(&[ResponseKind::Dismiss])
}
