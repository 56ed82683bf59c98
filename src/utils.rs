use indicatif::ProgressStyle;

const TEMPLATE_MAP: &str =
    "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Progress bar style of a map call, one tick per joined unit.
pub(crate) fn get_style_map() -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE_MAP)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Installs a global subscriber that prints events to stderr and draws a
/// progress bar for every map call whose span is enabled.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Map calls open
/// their spans at `debug`, so `RUST_LOG=sparkmap=debug` shows the bars.
#[cfg(feature = "logging")]
pub fn init_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let indicatif = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(indicatif.get_stderr_writer()))
        .with(indicatif)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        assert!(ProgressStyle::with_template(TEMPLATE_MAP).is_ok());
    }
}
