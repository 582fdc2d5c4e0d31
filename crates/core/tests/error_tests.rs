use portfolio_dashboard_core::errors::{CoreError, NetworkErrorKind};

#[test]
fn display_messages() {
    let cases = [
        (
            CoreError::Api {
                provider: "Finnhub".into(),
                message: "bad key".into(),
            },
            "API error (Finnhub): bad key",
        ),
        (
            CoreError::Network {
                kind: NetworkErrorKind::Timeout,
                message: "took too long".into(),
            },
            "Network error (timeout): took too long",
        ),
        (CoreError::RateLimited("Yahoo Finance".into()), "Rate limited by Yahoo Finance"),
        (CoreError::Config("missing key".into()), "Configuration error: missing key"),
        (
            CoreError::Validation("No symbols provided".into()),
            "Validation failed: No symbols provided",
        ),
        (CoreError::Cache("poisoned".into()), "Cache error: poisoned"),
        (CoreError::Stream("cut off".into()), "Stream error: cut off"),
        (CoreError::Internal("panicked".into()), "Internal error: panicked"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn network_kind_display() {
    assert_eq!(NetworkErrorKind::ConnectionReset.to_string(), "connection reset");
    assert_eq!(NetworkErrorKind::ConnectionRefused.to_string(), "connection refused");
    assert_eq!(NetworkErrorKind::Dns.to_string(), "dns failure");
    assert_eq!(NetworkErrorKind::Other.to_string(), "other");
}

#[test]
fn network_kind_only_for_network_errors() {
    let timeout = CoreError::Network {
        kind: NetworkErrorKind::Timeout,
        message: String::new(),
    };
    assert_eq!(timeout.network_kind(), Some(NetworkErrorKind::Timeout));
    assert!(timeout.is_timeout());

    let reset = CoreError::Network {
        kind: NetworkErrorKind::ConnectionReset,
        message: String::new(),
    };
    assert!(!reset.is_timeout());

    assert_eq!(CoreError::RateLimited("x".into()).network_kind(), None);
}

#[test]
fn malformed_json_becomes_api_error() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: CoreError = parse_err.into();
    assert!(matches!(
        err,
        CoreError::Api { ref message, .. } if message.starts_with("Malformed response body")
    ));
}
