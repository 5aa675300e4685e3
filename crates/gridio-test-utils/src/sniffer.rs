use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gridio_api::{ConventionSniffer, SniffError};
use gridio_core::ConventionInfo;

/// What a [`ScriptedSniffer`] does when asked.
#[derive(Clone, Debug)]
enum Script {
    Report(ConventionInfo),
    Fail(String),
    Panic,
}

/// Convention sniffer with a fixed answer that records the paths it sees.
#[derive(Clone)]
pub struct ScriptedSniffer {
    script: Script,
    seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedSniffer {
    /// Always report `info`.
    pub fn reporting(info: ConventionInfo) -> Self {
        Self::with_script(Script::Report(info))
    }

    /// Always fail with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_owned()))
    }

    /// Always panic.
    pub fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            seen: Arc::default(),
        }
    }

    /// Paths sniffed so far.
    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl ConventionSniffer for ScriptedSniffer {
    fn sniff(&self, path: &Path) -> Result<ConventionInfo, SniffError> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        match &self.script {
            Script::Report(info) => Ok(*info),
            Script::Fail(message) => Err(SniffError::Other(message.clone())),
            Script::Panic => panic!("scripted sniffer fault"),
        }
    }
}
