//! Subject to stream-name resolution.
//!
//! Streams are named after the first dot-delimited token of the subjects
//! they capture, upper-cased: `events.user.created` lives on `EVENTS`.

use crate::error::{Error, Result};

/// Resolves the stream name a subject (or subject filter) belongs to.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty subject or one with an
/// empty first token (leading dot).
pub fn stream_name(subject: &str) -> Result<String> {
    let first = subject.split('.').next().unwrap_or_default();
    if first.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "malformed subject `{subject}`"
        )));
    }

    Ok(first.to_ascii_uppercase())
}

/// The subject set a stream inferred from `subject` should capture.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a malformed subject.
pub fn inferred_subjects(subject: &str) -> Result<Vec<String>> {
    let first = subject.split('.').next().unwrap_or_default();
    if first.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "malformed subject `{subject}`"
        )));
    }

    Ok(vec![format!("{first}.>")])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_token_upper_cased() {
        assert_eq!(stream_name("events.user.created").unwrap(), "EVENTS");
        assert_eq!(stream_name("orders").unwrap(), "ORDERS");
    }

    #[test]
    fn wildcard_filters_resolve_on_their_first_token() {
        assert_eq!(stream_name("events.*.created").unwrap(), "EVENTS");
        assert_eq!(stream_name("events.>").unwrap(), "EVENTS");
    }

    #[test]
    fn malformed_subjects_are_rejected() {
        assert!(matches!(stream_name(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            stream_name(".events"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            inferred_subjects(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn inferred_subjects_keep_the_original_case() {
        assert_eq!(
            inferred_subjects("events.user.created").unwrap(),
            vec!["events.>".to_string()]
        );
    }
}
