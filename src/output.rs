use std::io::{self, Write};

use clap::ValueEnum;

use crate::entry::PrintableEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    #[value(name = "json_tiny")]
    JsonTiny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    NotStarted,
    Emitting,
    Closed,
}

/// Streams entries to the output as they are discovered. The JSON modes
/// frame one array incrementally: the opening bracket goes out with the
/// first entry and the closing bracket on `finish`, so a zero-result
/// run prints nothing at all.
pub struct Renderer<W: Write> {
    format: OutputFormat,
    out: W,
    state: StreamState,
}

impl<W: Write> Renderer<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        Renderer {
            format,
            out,
            state: StreamState::NotStarted,
        }
    }

    pub fn emit(&mut self, entry: &PrintableEntry) -> io::Result<()> {
        let first = match self.state {
            StreamState::NotStarted => true,
            StreamState::Emitting => false,
            // finish() was already called
            StreamState::Closed => return Ok(()),
        };
        self.state = StreamState::Emitting;

        match self.format {
            OutputFormat::Plain => self.emit_plain(entry),
            OutputFormat::Json => self.emit_json(entry, first, true),
            OutputFormat::JsonTiny => self.emit_json(entry, first, false),
        }
    }

    /// Closes the stream. The array bracket is only emitted if at least
    /// one entry was written.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.state == StreamState::Emitting && self.format != OutputFormat::Plain {
            writeln!(self.out, "]")?;
        }
        self.state = StreamState::Closed;
        self.out.flush()
    }

    /// Best-effort per entry: a block that cannot be written is reported
    /// inline and the run continues with the remaining entries.
    fn emit_plain(&mut self, entry: &PrintableEntry) -> io::Result<()> {
        writeln!(self.out, "{}", entry.dn)?;
        if self.attribute_block(entry).is_err() {
            writeln!(self.out, "  <entry could not be rendered>")?;
        }
        writeln!(self.out)
    }

    fn attribute_block(&mut self, entry: &PrintableEntry) -> io::Result<()> {
        for (name, values) in &entry.attributes {
            writeln!(self.out, "  {}:", name)?;
            for value in values {
                writeln!(self.out, "   - {}", value)?;
            }
        }
        Ok(())
    }

    fn emit_json(&mut self, entry: &PrintableEntry, first: bool, pretty: bool) -> io::Result<()> {
        write!(self.out, "{}", if first { "[" } else { "," })?;
        if pretty {
            writeln!(self.out, "{}", serde_json::to_string_pretty(entry)?)
        } else {
            write!(self.out, "{}", serde_json::to_string(entry)?)
        }
    }
}
