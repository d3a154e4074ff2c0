//! Unit tests for `AppError` display format.

use graph_engine_bridge::AppError;

#[test]
fn every_kind_carries_a_distinct_prefix() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Spawn("x".into()), "spawn failure: x"),
        (AppError::Timeout("x".into()), "timeout: x"),
        (AppError::Protocol("x".into()), "engine protocol error: x"),
        (AppError::ProcessExited("x".into()), "engine process exited: x"),
        (AppError::Mcp("x".into()), "mcp: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

/// Engine-reported failures reach the caller exactly as the engine wrote them.
#[test]
fn engine_failure_is_verbatim() {
    let err = AppError::EngineFailure("File not found: missing.gexf".into());
    assert_eq!(err.to_string(), "File not found: missing.gexf");
}

#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<toml::Value>("= broken").expect_err("invalid toml");
    let err = AppError::from(toml_err);
    assert!(err.to_string().starts_with("config: invalid config:"));
}

#[test]
fn app_error_is_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Timeout("slow".into()));
}

/// I/O failures surfaced by the stdio codec convert to `Io`.
#[test]
fn io_errors_convert_to_io() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(_)));
    assert_eq!(err.to_string(), "io: pipe closed");
}
