use tracing::Level;

/// `-v` count to level: warnings by default, every `-v` one step chattier.
pub fn level_from_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs go to stderr, stdout belongs to the report.
pub fn init(verbose: u8) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level_from_verbosity(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    // only fails if a subscriber is already installed, which is fine
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_from_verbosity(0), Level::WARN);
        assert_eq!(level_from_verbosity(2), Level::DEBUG);
        assert_eq!(level_from_verbosity(9), Level::TRACE);
    }
}
