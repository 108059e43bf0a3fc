//! Log output
//!
//! Events are tagged with the module they belong to, either through an
//! explicit `module` field or by running inside a span that carries one
//! (`info_span!("module", module = %name)`). The text format renders that
//! as a `[name]` prefix:
//!
//! ```text
//! INFO  [foo] cloning repo=https://github.com/example/foo
//! DEBUG [foo] exec cmd=git args=["checkout", "main"]
//! ```

use crate::config::LogFormat;
use crate::types::DemodError;
use console::{style, StyledObject};
use std::fmt::{self, Write as _};
use std::io;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Field naming the module an event or span belongs to
const MODULE_FIELD: &str = "module";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level; otherwise it is `info`, or `debug`
/// when `verbose` is set. Text output is colored when console colors are
/// enabled for stderr.
pub fn init<W>(format: LogFormat, verbose: bool, writer: W) -> Result<(), DemodError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let color = console::colors_enabled_stderr();

    subscriber(format, color, filter, writer)
        .try_init()
        .map_err(|e| DemodError::Io(io::Error::other(format!("initializing logging: {}", e))))
}

/// Level used when `RUST_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Build (without installing) a subscriber for `format`.
pub fn subscriber<W>(
    format: LogFormat,
    color: bool,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (text, json) = match format {
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(ModuleFormat::new(color))
                    .with_writer(writer),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ModuleLayer)
        .with(text)
        .with(json)
}

/// Module name remembered on a span
struct ModuleName(String);

/// Stores the `module` field of new spans so formatters can find it
pub struct ModuleLayer;

impl<S> Layer<S> for ModuleLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        if let (Some(module), Some(span)) = (fields.module, ctx.span(id)) {
            span.extensions_mut().insert(ModuleName(module));
        }
    }
}

/// `LEVEL [module] message key=value...`
pub struct ModuleFormat {
    color: bool,
}

impl ModuleFormat {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint<D>(&self, value: D) -> StyledObject<D> {
        style(value).force_styling(self.color)
    }

    fn level(&self, level: Level) -> StyledObject<String> {
        let label = self.paint(format!("{:<5}", level.as_str()));
        match level {
            Level::ERROR => label.red().bold(),
            Level::WARN => label.yellow(),
            Level::INFO => label.green(),
            Level::DEBUG => label.blue(),
            _ => label.dim(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for ModuleFormat
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
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let module = fields.module.take().or_else(|| {
            ctx.event_scope()?.find_map(|span| {
                span.extensions()
                    .get::<ModuleName>()
                    .map(|name| name.0.clone())
            })
        });

        write!(writer, "{}", self.level(*event.metadata().level()))?;
        if let Some(module) = module {
            write!(writer, " {}", self.paint(format!("[{}]", module)).cyan())?;
        }
        if let Some(message) = fields.message {
            write!(writer, " {}", message)?;
        }
        for (name, value) in &fields.values {
            write!(writer, " {}={}", self.paint(name).dim(), value)?;
        }
        writeln!(writer)
    }
}

/// Splits an event's fields into message, module, and the rest
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    module: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            MODULE_FIELD => self.module = Some(value),
            name => self.values.push((name, value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let mut rendered = String::new();
        let _ = write!(rendered, "{:?}", value);
        self.push(field, rendered);
    }
}
