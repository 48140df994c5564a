/// Treats any background task outcome other than an external abort as fatal
/// for the process: a task returning `Ok(())` has exited a loop that was
/// meant to run forever, and a panic or `Err` is surfaced directly.
///
/// The wallet service is the one exception: it absorbs its own workers'
/// crashes internally before anything reaches the
/// top-level join set this helper drains.
pub fn handle_background_thread_result<T, E>(
    result: Option<Result<Result<T, E>, tokio::task::JoinError>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Some(Ok(thread_result)) => match thread_result {
            Ok(_) => Err("background task completed unexpectedly".into()),
            Err(e) => Err(format!("background task returned an error: {e}").into()),
        },
        Some(Err(e)) => Err(format!("background task panicked: {e}").into()),
        None => Err("join set drained with no remaining tasks".into()),
    }
}

/// Initializes the global `tracing` subscriber from an `EnvFilter` directive
/// string (e.g. `"relayer_node=info,relayer_wallet=debug"`). Safe to call once
/// per process; a second call is a configuration error, not a panic.
pub fn init_logger(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .try_init()
        .map_err(|e| format!("failed to initialize logger: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, snafu::Snafu)]
    #[snafu(display("boom"))]
    struct Boom;

    #[test]
    fn ok_result_is_treated_as_a_fatal_exit() {
        let result: Option<Result<Result<(), Boom>, tokio::task::JoinError>> =
            Some(Ok(Ok(())));
        assert!(handle_background_thread_result(result).is_err());
    }

    #[test]
    fn err_result_is_surfaced() {
        let result: Option<Result<Result<(), Boom>, tokio::task::JoinError>> =
            Some(Ok(Err(Boom)));
        let err = handle_background_thread_result(result).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn none_is_treated_as_an_error() {
        let result: Option<Result<Result<(), Boom>, tokio::task::JoinError>> = None;
        assert!(handle_background_thread_result(result).is_err());
    }
}
