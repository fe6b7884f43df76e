use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, warn};

use crate::ident::ChallengeId;
use crate::merge::reconcile;
use crate::record::Challenge;
use crate::{Error, Result, STORE_INDENT};

/// The whole collection, keyed (and therefore ordered) by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    records: BTreeMap<ChallengeId, Challenge>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from `path`. A missing or blank file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no store yet, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        let list: Vec<Challenge> =
            serde_json::from_str(&text).map_err(|source| Error::StoreFormat {
                path: path.to_path_buf(),
                source,
            })?;

        let mut store = Self::new();
        for challenge in list {
            if store.contains(&challenge.id) {
                warn!(id = %challenge.id, "duplicate id in store file, folding entries");
            }
            store.merge(challenge)?;
        }
        Ok(store)
    }

    /// Writes every record, ascending by id. The file is replaced atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let persistence = |source: io::Error| Error::Persistence {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(persistence)?;
            }
        }

        let bytes = self.to_json().map_err(persistence)?;
        let tmp = temp_path(path);
        let mut file = fs::File::create(&tmp).map_err(persistence)?;
        file.write_all(&bytes).map_err(persistence)?;
        file.sync_all().map_err(persistence)?;
        drop(file);
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            persistence(e)
        })
    }

    fn to_json(&self) -> io::Result<Vec<u8>> {
        let list: Vec<&Challenge> = self.records.values().collect();
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(STORE_INDENT);
        let mut ser = Serializer::with_formatter(&mut buf, formatter);
        list.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }

    pub fn get(&self, id: &ChallengeId) -> Option<&Challenge> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &ChallengeId) -> bool {
        self.records.contains_key(id)
    }

    /// Whether `id` is stored with both its answer and image known.
    pub fn is_resolved(&self, id: &ChallengeId) -> bool {
        self.get(id).is_some_and(Challenge::is_resolved)
    }

    /// Reconciles `incoming` with the stored record of the same id and keeps the result.
    pub fn merge(&mut self, incoming: Challenge) -> Result<&Challenge> {
        let id = incoming.id;
        let merged = reconcile(incoming, self.records.get(&id))?;
        Ok(match self.records.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(merged);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(merged),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.records.values()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total: self.len(),
            answered: self.iter().filter(|c| c.answer.is_some()).count(),
            with_image: self.iter().filter(|c| c.image.is_some()).count(),
            resolved: self.iter().filter(|c| c.is_resolved()).count(),
            first: self.records.keys().next().copied(),
            last: self.records.keys().next_back().copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub answered: usize,
    pub with_image: usize,
    pub resolved: usize,
    pub first: Option<ChallengeId>,
    pub last: Option<ChallengeId>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
