//! Output formatting for text vs JSON rendering
//!
//! Command handlers build a payload and hand it to [`OutputWriter`],
//! which picks the format. Handlers never branch on the format.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads to a sink in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Render a payload to any writer.
    ///
    /// Text goes through [`Render::render_text`]; JSON is pretty-printed,
    /// except for payloads that opt into JSON lines.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                if payload.render_json_lines(w)?.is_none() {
                    serde_json::to_writer_pretty(&mut *w, payload)?;
                    writeln!(w)?;
                }
            }
        }
        Ok(())
    }
}

/// Human-readable rendering, implemented by every payload alongside
/// `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;

    /// Stream-shaped payloads write one compact JSON value per line and
    /// return `Some(count)`. The default defers to pretty JSON.
    fn render_json_lines(&self, _w: &mut dyn Write) -> Result<Option<usize>, CliError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Single {
        name: String,
        count: u32,
    }

    impl Render for Single {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "{}: {}", self.name, self.count)
        }
    }

    #[derive(Serialize)]
    struct Stream {
        items: Vec<u32>,
    }

    impl Render for Stream {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            for item in &self.items {
                writeln!(w, "#{item}")?;
            }
            Ok(())
        }

        fn render_json_lines(&self, w: &mut dyn Write) -> Result<Option<usize>, CliError> {
            for item in &self.items {
                serde_json::to_writer(&mut *w, item)?;
                writeln!(w)?;
            }
            Ok(Some(self.items.len()))
        }
    }

    fn render(format: OutputFormat, payload: &(impl Render + Serialize)) -> String {
        let mut buffer = Vec::new();
        OutputWriter::new(format)
            .render_to(&mut buffer, payload)
            .expect("render");
        String::from_utf8(buffer).expect("utf-8")
    }

    #[test]
    fn text_uses_render_text() {
        let out = render(
            OutputFormat::Text,
            &Single {
                name: "couchdb".into(),
                count: 2,
            },
        );
        assert_eq!(out, "couchdb: 2\n");
    }

    #[test]
    fn json_is_pretty_by_default() {
        let out = render(
            OutputFormat::Json,
            &Single {
                name: "solr".into(),
                count: 1,
            },
        );
        assert!(out.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(parsed["name"], "solr");
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn json_lines_when_payload_opts_in() {
        let out = render(OutputFormat::Json, &Stream { items: vec![1, 2, 3] });
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn writer_reports_format() {
        assert_eq!(OutputWriter::new(OutputFormat::Json).format(), OutputFormat::Json);
    }
}
