// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the page editor.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The presentation layer picks icon and colour from the severity.

use crate::error::FolioError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something went wrong that may work on a second try.
    Transient,
    /// The user must do something (pick another file, remove pages).
    ActionRequired,
    /// Cannot be fixed by retrying: broken file, wrong format.
    Permanent,
    /// A defect in the application itself.
    Internal,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether a user-initiated retry can succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `FolioError` into a `HumanError`.
pub fn humanize_error(err: &FolioError) -> HumanError {
    match err {
        // -- Input --
        FolioError::UnsupportedDocument(detail) => HumanError {
            message: "This type of file isn't supported.".into(),
            suggestion: format!("Only PDF files and images can be added. (File type: {detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FolioError::FileTooLarge { name, limit, .. } => HumanError {
            message: format!("{name} is too large."),
            suggestion: format!(
                "Files up to {} MB can be added. Try splitting the document first.",
                limit / (1024 * 1024)
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FolioError::Decode { name, .. } => HumanError {
            message: format!("{name} couldn't be opened."),
            suggestion: "The file may be damaged or password protected. The other files were still added.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Extraction --
        FolioError::PageRender { page_index, .. } => HumanError {
            message: format!("Page {} couldn't be read.", page_index + 1),
            suggestion: "That page was left out. All other pages are available.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FolioError::BatchTooLarge { limit, .. } => HumanError {
            message: "Too many pages at once.".into(),
            suggestion: format!("Up to {limit} pages can be edited together. Try adding fewer files."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FolioError::NoSources => HumanError {
            message: "None of the files could be opened.".into(),
            suggestion: "Check that the files are PDFs or images and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FolioError::Worker(_) => HumanError {
            message: "Preparing the pages stopped unexpectedly.".into(),
            suggestion: "Try adding the files again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FolioError::Cancelled => HumanError {
            message: "Cancelled.".into(),
            suggestion: "Nothing was changed. You can start again at any time.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FolioError::ExtractionInProgress => HumanError {
            message: "Pages are still being prepared.".into(),
            suggestion: "Wait until all pages are shown, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Page model --
        FolioError::OrderInvariantViolation(_)
        | FolioError::UnknownPage(_)
        | FolioError::StaleBatch => HumanError {
            message: "That change couldn't be applied.".into(),
            suggestion: "Your page order is unchanged. If this keeps happening, please report it.".into(),
            retriable: false,
            severity: Severity::Internal,
        },

        // -- Export --
        FolioError::Reassembly(detail) => HumanError {
            message: "The combined PDF couldn't be created.".into(),
            suggestion: format!("No file was saved. Try again. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        FolioError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it on a computer first to check it works, or try a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FolioError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FolioError::Config(detail) => HumanError {
            message: "The settings file isn't valid.".into(),
            suggestion: format!("Fix or remove the settings file. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FolioError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Folio doesn't have permission to use that file.".into(),
                    suggestion: "Check the file permissions, or try a different location.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        FolioError::Serialization(_) => HumanError {
            message: "Folio had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Internal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageId, SourceIndex};

    #[test]
    fn page_render_names_one_based_page() {
        let err = FolioError::PageRender {
            source_index: SourceIndex(0),
            page_index: 1,
            reason: "bad stream".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.message, "Page 2 couldn't be read.");
        assert!(!human.retriable);
    }

    #[test]
    fn order_violation_is_internal() {
        let human = humanize_error(&FolioError::UnknownPage(PageId(3)));
        assert_eq!(human.severity, Severity::Internal);
    }

    #[test]
    fn reassembly_is_retriable() {
        let human = humanize_error(&FolioError::Reassembly("page missing".into()));
        assert!(human.retriable);
        assert!(human.suggestion.contains("page missing"));
    }

    #[test]
    fn unsupported_format_is_permanent() {
        let err = FolioError::UnsupportedDocument("application/msword".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
    }
}
