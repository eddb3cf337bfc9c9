use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use taplo_core::relay::{self, RelayOutcome};
use taplo_core::{InstallPaths, Session};

use crate::host::{Document, LineRange, TerminalHost};
use crate::lifecycle::{ensure_server, load_plugin, start_session};
use crate::ui::Layout;

pub enum RelayAction {
    CopyJson {
        file: PathBuf,
        lines: Option<LineRange>,
    },
    PasteJson,
    PasteToml,
    Schema {
        file: PathBuf,
        pick: Option<usize>,
    },
}

impl RelayAction {
    fn document(&self) -> Result<Option<Document>> {
        match self {
            Self::CopyJson { file, lines } => Ok(Some(Document::open(file, *lines)?)),
            Self::Schema { file, .. } => Ok(Some(Document::open(file, None)?)),
            Self::PasteJson | Self::PasteToml => Ok(None),
        }
    }

    fn pick(&self) -> Option<usize> {
        match self {
            Self::Schema { pick, .. } => *pick,
            _ => None,
        }
    }
}

/// Makes sure the server is installed, runs one relay action against a fresh
/// session and shuts the session down again.
pub fn handle_relay(paths: &InstallPaths, action: RelayAction) -> Result<ExitCode> {
    let layout = Layout::new();
    let document = action.document()?;

    // the blocking release client must not run inside the async runtime
    let (plugin, _) = load_plugin(paths)?;
    ensure_server(&plugin, &layout)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // borrows `plugin`, so its blocking client is dropped outside the runtime
    runtime.block_on(async {
        let session = match start_session(&plugin).await {
            Ok(session) => Some(session),
            Err(e) => {
                log::error!("Failed to start the language server: {:#}", e);
                None
            }
        };

        let host = TerminalHost::new(
            session.clone().map(|s| s as Arc<dyn Session>),
            document,
        )
        .with_pick(action.pick());

        let outcome = match &action {
            RelayAction::CopyJson { .. } => relay::copy_as_json(&host).await,
            RelayAction::PasteJson => relay::paste_as_json(&host).await,
            RelayAction::PasteToml => relay::paste_as_toml(&host).await,
            RelayAction::Schema { .. } => relay::assign_schema(&host).await,
        };
        log::debug!("Relay finished: {:?}", outcome);

        if let Some(session) = session {
            if let Err(e) = session.shutdown().await {
                log::warn!("Language server did not shut down cleanly: {}", e);
            }
        }
        Ok(exit_code(&outcome))
    })
}

fn exit_code(outcome: &RelayOutcome) -> ExitCode {
    match outcome {
        RelayOutcome::Applied | RelayOutcome::Cancelled | RelayOutcome::NoInput => {
            ExitCode::SUCCESS
        }
        RelayOutcome::NoSession | RelayOutcome::Failed(_) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_session_and_failures_exit_non_zero() {
        assert_eq!(exit_code(&RelayOutcome::Applied), ExitCode::SUCCESS);
        assert_eq!(exit_code(&RelayOutcome::Cancelled), ExitCode::SUCCESS);
        assert_eq!(exit_code(&RelayOutcome::NoInput), ExitCode::SUCCESS);
        assert_eq!(exit_code(&RelayOutcome::NoSession), ExitCode::FAILURE);
        assert_eq!(
            exit_code(&RelayOutcome::Failed("boom".into())),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn paste_actions_need_no_document() {
        assert!(RelayAction::PasteJson.document().unwrap().is_none());
        assert!(RelayAction::PasteToml.document().unwrap().is_none());
        assert_eq!(
            RelayAction::Schema {
                file: PathBuf::from("Cargo.toml"),
                pick: Some(2)
            }
            .pick(),
            Some(2)
        );
    }
}
