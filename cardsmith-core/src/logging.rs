use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the global logger once. Idempotent; later calls are ignored.
///
/// Honors the `RUST_LOG` filter syntax, defaulting to warn-level output so
/// lenient-mode binder skips and best-effort cleanup failures stay visible.
pub fn init_logging() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Warn);
        }

        builder.init();

        log::debug!("logging initialized");
    });
}
