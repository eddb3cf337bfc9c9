use crate::ui::Layout;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lsp_types::Url;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use taplo_core::Session;
use taplo_core::relay::{EditorHost, PickerItem, SESSION_NAME};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

/// 1-based, inclusive line range of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    start: usize,
    end: usize,
}

impl FromStr for LineRange {
    type Err = String;

    /// Accepts `N` or `N:M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("invalid line number {:?}", part))
        };

        let (start, end) = match s.split_once(':') {
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => {
                let line = parse(s)?;
                (line, line)
            }
        };
        if end < start {
            return Err(format!("line range {} ends before it starts", s));
        }
        Ok(Self { start, end })
    }
}

impl LineRange {
    pub fn slice(&self, text: &str) -> String {
        text.split_inclusive('\n')
            .skip(self.start - 1)
            .take(self.end - self.start + 1)
            .collect()
    }
}

/// A file opened for a relay command.
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: String,
    pub text: String,
    pub selection: Option<String>,
}

impl Document {
    pub fn open(path: &Path, lines: Option<LineRange>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let uri = Url::from_file_path(&absolute)
            .map_err(|_| anyhow!("Cannot build a file URI for {}", absolute.display()))?;

        let selection = lines.map(|range| range.slice(&text));
        Ok(Self {
            uri: uri.to_string(),
            text,
            selection,
        })
    }
}

/// Maps a typed picker answer to an index, `-1` meaning dismissed.
pub fn choice_index(answer: &str, len: usize) -> i64 {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => (n - 1) as i64,
        _ => -1,
    }
}

/// Terminal stand-in for an editor: stdin is the clipboard, stdout receives
/// copied and inserted text, dialogs go to stderr.
pub struct TerminalHost {
    session: Option<Arc<dyn Session>>,
    document: Option<Document>,
    pick: Option<usize>,
    layout: Layout,
}

impl TerminalHost {
    pub fn new(session: Option<Arc<dyn Session>>, document: Option<Document>) -> Self {
        Self {
            session,
            document,
            pick: None,
            layout: Layout::new(),
        }
    }

    /// Answers the schema picker with `pick` instead of prompting.
    pub fn with_pick(mut self, pick: Option<usize>) -> Self {
        self.pick = pick;
        self
    }

    fn write_stdout(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            log::warn!("Failed to write output: {}", e);
        }
    }
}

#[async_trait]
impl EditorHost for TerminalHost {
    fn session(&self, name: &str) -> Option<Arc<dyn Session>> {
        if name != SESSION_NAME {
            return None;
        }
        self.session.clone()
    }

    fn document_uri(&self) -> String {
        self.document
            .as_ref()
            .map(|d| d.uri.clone())
            .unwrap_or_default()
    }

    fn selections(&self) -> Vec<String> {
        self.document
            .as_ref()
            .and_then(|d| d.selection.clone())
            .into_iter()
            .collect()
    }

    fn document_text(&self) -> String {
        self.document
            .as_ref()
            .map(|d| d.text.clone())
            .unwrap_or_default()
    }

    async fn read_clipboard(&self) -> String {
        let mut text = String::new();
        if let Err(e) = tokio::io::stdin().read_to_string(&mut text).await {
            log::warn!("Failed to read stdin: {}", e);
        }
        text
    }

    fn set_clipboard(&self, text: &str) {
        self.write_stdout(text);
    }

    fn insert(&self, text: &str) {
        self.write_stdout(text);
    }

    fn status_message(&self, message: &str) {
        self.layout.warning(message);
    }

    fn error_message(&self, message: &str) {
        self.layout.error(message);
    }

    async fn select(&self, items: Vec<PickerItem>) -> i64 {
        self.layout.section_timeline("sc", "Schemas");
        for (i, item) in items.iter().enumerate() {
            self.layout
                .row_choice(i + 1, &item.trigger, &item.annotation, &item.details);
        }
        self.layout.section_end();

        let answer = match self.pick {
            Some(n) => n.to_string(),
            None => {
                self.layout.prompt("Schema number (empty to cancel):");
                let mut line = String::new();
                if let Err(e) = BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
                    log::warn!("Failed to read answer: {}", e);
                }
                line
            }
        };
        choice_index(&answer, items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn line_range_parses_single_and_span() {
        assert_eq!("4".parse::<LineRange>(), Ok(LineRange { start: 4, end: 4 }));
        assert_eq!(
            "2:5".parse::<LineRange>(),
            Ok(LineRange { start: 2, end: 5 })
        );
        assert!("0".parse::<LineRange>().is_err());
        assert!("5:2".parse::<LineRange>().is_err());
        assert!("a:b".parse::<LineRange>().is_err());
    }

    #[test]
    fn line_range_slices_inclusive() {
        let text = "a = 1\nb = 2\nc = 3\n";
        let range: LineRange = "2:3".parse().unwrap();
        assert_eq!(range.slice(text), "b = 2\nc = 3\n");

        let past_end: LineRange = "7:9".parse().unwrap();
        assert_eq!(past_end.slice(text), "");
    }

    #[test]
    fn picker_answers() {
        assert_eq!(choice_index("1\n", 3), 0);
        assert_eq!(choice_index(" 3 ", 3), 2);
        assert_eq!(choice_index("", 3), -1);
        assert_eq!(choice_index("4", 3), -1);
        assert_eq!(choice_index("0", 3), -1);
        assert_eq!(choice_index("cargo", 3), -1);
    }

    #[test]
    fn document_carries_file_uri_and_selection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        std::fs::write(&path, "[package]\nname = \"demo\"\n").unwrap();

        let document = Document::open(&path, Some("2".parse().unwrap())).unwrap();
        assert!(document.uri.starts_with("file://"));
        assert!(document.uri.ends_with("/Cargo.toml"));
        assert_eq!(document.selection.as_deref(), Some("name = \"demo\"\n"));

        let host = TerminalHost::new(None, Some(document));
        assert_eq!(host.selections(), ["name = \"demo\"\n"]);
        assert_eq!(host.document_text(), "[package]\nname = \"demo\"\n");
    }

    #[test]
    fn missing_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Document::open(&dir.path().join("absent.toml"), None).is_err());
    }
}
