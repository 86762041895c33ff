//! End-to-end generation: packets in, two scenario documents out

use std::fs;
use std::path::{Path, PathBuf};

use sippcap_capture::PacketRecord;
use tracing::{info, warn};

use crate::action::Role;
use crate::compiler::{compile, CompileOptions};
use crate::config::GeneratorSettings;
use crate::error::Result;
use crate::event::Event;
use crate::render::render;
use crate::serializer::serialize;
use crate::splitter::{split, RoleEvents};
use crate::template::DialogContext;

/// Builds UAC and UAS scenario documents from captured packets
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    settings: GeneratorSettings,
    options: CompileOptions,
    dialog: DialogContext,
}

impl ScenarioGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        let options = settings.compile_options();
        let dialog = settings.dialog_context();
        Self {
            settings,
            options,
            dialog,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn label(&self, role: Role) -> &str {
        match role {
            Role::Uac => &self.settings.uac_label,
            Role::Uas => &self.settings.uas_label,
        }
    }

    /// Partition packets into caller and callee events
    pub fn split_roles(&self, packets: &[PacketRecord]) -> Result<RoleEvents> {
        let (caller, callee) = self.settings.role_addresses()?;
        split(packets, &caller, &callee)
    }

    /// Compile, render and serialize one role
    pub fn build_document(&self, role: Role, events: &[Event]) -> Result<Vec<u8>> {
        let actions = compile(events, role, &self.options)?;
        let blocks = actions
            .iter()
            .map(|action| render(action, &self.dialog))
            .collect::<Result<Vec<_>>>()?;
        serialize(self.label(role), &self.settings.scenario_name, &blocks)
    }

    /// Produce both documents, or fail without producing either
    pub fn generate(&self, packets: &[PacketRecord]) -> Result<ScenarioPair> {
        let events = self.split_roles(packets)?;
        let uac = self.build_document(Role::Uac, &events.caller)?;
        let uas = self.build_document(Role::Uas, &events.callee)?;
        Ok(self.pair(uac, uas))
    }

    pub fn pair(&self, uac: Vec<u8>, uas: Vec<u8>) -> ScenarioPair {
        ScenarioPair {
            uac_label: self.settings.uac_label.clone(),
            uas_label: self.settings.uas_label.clone(),
            uac,
            uas,
        }
    }
}

/// The two documents of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioPair {
    pub uac_label: String,
    pub uas_label: String,
    pub uac: Vec<u8>,
    pub uas: Vec<u8>,
}

impl ScenarioPair {
    fn documents(&self) -> [(&str, &[u8]); 2] {
        [
            (self.uac_label.as_str(), self.uac.as_slice()),
            (self.uas_label.as_str(), self.uas.as_slice()),
        ]
    }

    /// Write `<label>.xml` for both roles into `dir`
    ///
    /// Both files are staged under temporary names and renamed into place.
    /// On failure every file this call created is removed again.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut created = Vec::new();
        match self.stage_and_commit(dir, &mut created) {
            Ok(paths) => {
                for path in &paths {
                    info!("wrote {}", path.display());
                }
                Ok(paths)
            }
            Err(e) => {
                warn!(error = %e, "writing scenarios failed, removing partial output");
                for path in &created {
                    let _ = fs::remove_file(path);
                }
                Err(e)
            }
        }
    }

    fn stage_and_commit(&self, dir: &Path, created: &mut Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let mut staged = Vec::new();
        for (label, bytes) in self.documents() {
            let temp = dir.join(format!(".{}.xml.tmp", label));
            created.push(temp.clone());
            fs::write(&temp, bytes)?;
            staged.push((temp, dir.join(format!("{}.xml", label))));
        }

        let mut paths = Vec::new();
        for (temp, target) in staged {
            fs::rename(&temp, &target)?;
            created.push(target.clone());
            paths.push(target);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ScenarioPair {
        ScenarioGenerator::new(GeneratorSettings::default()).pair(b"<a/>\n".to_vec(), b"<b/>\n".to_vec())
    }

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let paths = pair().write_to(&dir).unwrap();
        assert_eq!(paths, vec![dir.join("UAC.xml"), dir.join("UAS.xml")]);
        assert_eq!(fs::read(dir.join("UAS.xml")).unwrap(), b"<b/>\n");
    }

    #[test]
    fn test_failed_rename_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        // a directory in the way of the second rename
        fs::create_dir(tmp.path().join("UAS.xml")).unwrap();

        assert!(pair().write_to(tmp.path()).is_err());

        let mut names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["UAS.xml".to_string()]);
        assert!(tmp.path().join("UAS.xml").is_dir());
    }
}
