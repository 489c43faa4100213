use {
    crossterm::{
        QueueableCommand,
        style::{Color, ResetColor, SetForegroundColor},
    },
    std::{
        fmt::{self, Write as _},
        io::{self, Write},
    },
    tracing::{
        Event, Level, Metadata, Subscriber,
        field::{Field, Visit},
    },
    tracing_subscriber::{Layer, layer::Context},
};

/// Prints events of this workspace's crates to the terminal.
///
/// Warnings and errors are red, debug output is grey.
pub struct TermLayer;

impl TermLayer {
    fn write(color: Option<Color>, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if let Some(color) = color {
            stdout.queue(SetForegroundColor(color))?;
        }
        stdout.write_all(text.as_bytes())?;
        if color.is_some() {
            stdout.queue(ResetColor)?;
        }
        if !text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()
    }
}

impl<S: Subscriber> Layer<S> for TermLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut DebugVisitor(&mut message, &mut fields));
        if !fields.is_empty() {
            let _ = write!(message, " ({})", fields.join(", "));
        }
        let level = *event.metadata().level();
        let color = if level == Level::ERROR || level == Level::WARN {
            Some(Color::Red)
        } else if level == Level::INFO {
            None
        } else {
            Some(Color::Grey)
        };
        // Nowhere left to report a broken terminal.
        let _ = Self::write(color, &message);
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata
            .module_path()
            .is_some_and(|path| path.starts_with("tdstore"))
    }
}

struct DebugVisitor<'a>(&'a mut String, &'a mut Vec<String>);

impl Visit for DebugVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        } else {
            self.1.push(format!("{} = {:?}", field.name(), value));
        }
    }
}
