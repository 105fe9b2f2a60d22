//! The `utils` module provides definitions shared across `weather-relay`:
//! the error taxonomy and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::{RelayError, SinkError, TransformError};
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("WARNING");
        logging::init("nonsense");
    }

    #[test]
    fn sink_status_error_mentions_status_and_body() {
        let err = SinkError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "sink returned status 503: unavailable");
    }

    #[test]
    fn relay_error_wraps_sink_error_transparently() {
        let err: RelayError = SinkError::InvalidUrl("nope".to_string()).into();
        assert_eq!(err.to_string(), "invalid sink url: nope");
    }

    #[test]
    fn malformed_payload_display() {
        let err = TransformError::MalformedPayload("missing field `id`".to_string());
        assert_eq!(err.to_string(), "malformed payload: missing field `id`");
    }
}
