//! Tracing subscriber setup.

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{Layer, format::FmtSpan},
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Install the global subscriber. `RUST_LOG` wins when it is set, otherwise
/// only this crate logs at `level` and everything else at `warn`.
pub fn init(level: Level) {
    let mut fmt_layer = Layer::new()
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(std::env::var("NO_COLOR").is_err());

    match level {
        Level::DEBUG => fmt_layer = fmt_layer.with_file(true).with_line_number(true),
        Level::TRACE => {
            fmt_layer = fmt_layer
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
        }
        _ => {}
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn default_directive(level: Level) -> String {
    format!("warn,xdpgw={level}")
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::default_directive;

    #[test]
    fn directive_scopes_level_to_this_crate() {
        assert_eq!(default_directive(Level::DEBUG), "warn,xdpgw=DEBUG");
        assert_eq!(default_directive(Level::INFO), "warn,xdpgw=INFO");
    }
}
