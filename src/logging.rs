//! Custom logging formatter for FlashFS
//!
//! This module provides a custom tracing formatter that:
//! - Prefixes each line with an ISO-8601 UTC timestamp at millisecond
//!   precision
//! - Shows the emitting component (the tracing target)
//! - Removes ANSI color codes so log files stay grep-friendly

use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter emitting `timestamp level component: message` lines
pub struct ComponentFormatter;

impl<S, N> FormatEvent<S, N> for ComponentFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let now = std::time::SystemTime::now();
        let datetime: chrono::DateTime<chrono::Utc> = now.into();

        // Timestamp (no ANSI codes)
        write!(writer, "{} ", datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        // Level (no ANSI codes)
        write!(writer, "{:5} ", meta.level())?;

        // Component (module path target)
        write!(writer, "{}: ", meta.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Initialize tracing with the component formatter
///
/// `RUST_LOG` takes precedence over the `level` argument, matching the
/// usual `EnvFilter` behavior.
pub fn init(level: &str) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .event_format(ComponentFormatter)
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Logging initialized at level: {}", level);
}
