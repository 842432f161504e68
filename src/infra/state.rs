use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::domain::{model::ForwardedPort, port::RunStateStore};

/// Session state file, relative to the project working directory.
pub const STATE_FILE: &str = ".devrig/devstate.json";

/// The whole persisted document. Unknown future fields are ignored on read;
/// the document is rewritten wholesale on every save, so the schema only
/// ever grows additively.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(rename = "ForwardedPorts", default)]
    forwarded_ports: Vec<ForwardedPort>,
}

/// File-backed run state, scoped to one working directory. Not designed for
/// concurrent multi-process writers: last writer wins.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(base_dir: &Path) -> FileStateStore {
        FileStateStore {
            path: base_dir.join(STATE_FILE),
        }
    }

    fn save(&self, content: &Content) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("can't create state directory {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(content)?;
        fs::write(&self.path, json)
            .with_context(|| format!("can't write state file {}", self.path.display()))
    }
}

impl RunStateStore for FileStateStore {
    fn forwarded_ports(&self) -> Result<Vec<ForwardedPort>, Error> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // No state file means nothing is forwarded, not a failure.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("can't read state file {}", self.path.display())
                })
            }
        };
        let content: Content = serde_json::from_slice(&bytes)
            .with_context(|| format!("can't parse state file {}", self.path.display()))?;
        Ok(content.forwarded_ports)
    }

    fn set_forwarded_ports(&self, ports: &[ForwardedPort]) -> Result<(), Error> {
        self.save(&Content {
            forwarded_ports: ports.to_vec(),
        })
    }

    fn save_exit(&self) -> Result<(), Error> {
        self.save(&Content::default())
    }
}
