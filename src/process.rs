use std::fmt;
use std::path::Path;

use chrono::Local;
use tokio::sync::oneshot;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ident::{ChallengeId, Schedule};
use crate::parse::extract;
use crate::record::Challenge;
use crate::request::Fetcher;
use crate::store::Store;
use crate::{info_time, Error, Result};

/// Terminal state of one id in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already resolved in the store, nothing was fetched.
    Skipped,
    Merged,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(ChallengeId, Outcome)>,
    /// Failed ids with the reason, in processing order.
    pub failed: Vec<(ChallengeId, String)>,
    /// A stop signal ended the run before the schedule was exhausted.
    pub interrupted: bool,
}

impl BatchReport {
    fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn updated(&self) -> usize {
        self.count(Outcome::Merged)
    }

    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    pub fn outcome(&self, id: &ChallengeId) -> Option<Outcome> {
        self.outcomes.iter().find(|(i, _)| i == id).map(|(_, o)| *o)
    }

    /// Items were attempted and not a single one got anywhere.
    pub fn is_total_failure(&self) -> bool {
        !self.failed.is_empty() && self.updated() + self.skipped() == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated: {}, Skipped: {}, Failed: {}",
            self.updated(),
            self.skipped(),
            self.failed.len()
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        for (id, reason) in &self.failed {
            write!(f, "\n  {id}: {reason}")?;
        }
        Ok(())
    }
}

/// Runs every id of `schedule` through fetch, extract and merge.
///
/// Resolved ids are skipped. A failing id is reported and the batch moves on.
/// The store is saved to `store_path` every `checkpoint_every` merges and once
/// more at the end; only that final save can fail the run. The stop signal is
/// checked between items.
pub async fn process_batch<F: Fetcher + ?Sized>(
    schedule: &Schedule,
    store: &mut Store,
    store_path: &Path,
    fetcher: &F,
    config: &Config,
    stop_rx: &mut oneshot::Receiver<()>,
) -> Result<BatchReport> {
    let start_time = Local::now();
    info_time!("Started batch, {} challenges stored", store.len());

    let mut report = BatchReport::default();
    let mut unsaved = 0;
    let mut fetched_any = false;

    for id in schedule {
        if stop_rx.try_recv().is_ok() {
            warn!("stop requested, finishing early");
            report.interrupted = true;
            break;
        }

        if store.is_resolved(&id) {
            report.outcomes.push((id, Outcome::Skipped));
            continue;
        }

        if fetched_any && !config.request_delay().is_zero() {
            tokio::time::sleep(config.request_delay()).await;
        }
        fetched_any = true;

        let has_image = store.get(&id).is_some_and(|c| c.image.is_some());
        match fetch_challenge(id, fetcher, has_image).await {
            Ok(challenge) => {
                // Mismatched ids can't happen here; if they do, save what we have and bail.
                if let Err(e) = store.merge(challenge) {
                    error!(%id, error = %e, "merge failed");
                    return Err(rescue(store, store_path, unsaved, e).await);
                }
                info!(%id, "merged");
                report.outcomes.push((id, Outcome::Merged));
                unsaved += 1;
            }
            Err(e) => {
                if e.is_item_failure() {
                    warn!(%id, error = %e, "challenge failed");
                } else {
                    error!(%id, error = %e, "challenge failed");
                }
                report.outcomes.push((id, Outcome::Failed));
                report.failed.push((id, e.to_string()));
            }
        }

        if config.checkpoint_every > 0 && unsaved >= config.checkpoint_every {
            match save(store, store_path).await {
                Ok(()) => {
                    info!(path = %store_path.display(), "checkpoint saved");
                    unsaved = 0;
                }
                Err(e) => warn!(error = %e, "checkpoint failed, will retry"),
            }
        }
    }

    if unsaved > 0 {
        let save_time = Local::now();
        save(store, store_path).await?;
        info_time!(save_time, "Wrote {} challenges to {}", store.len(), store_path.display());
    }

    info_time!(start_time, "Finished batch. {report}");
    Ok(report)
}

/// Writes a snapshot of the store on a blocking thread.
async fn save(store: &Store, store_path: &Path) -> Result<()> {
    let snapshot = store.clone();
    let path = store_path.to_path_buf();
    spawn_blocking(move || snapshot.save(path)).await?
}

/// Persists pending merges before `err` ends the run. `err` is returned even
/// when that save fails too.
async fn rescue(store: &Store, store_path: &Path, unsaved: usize, err: Error) -> Error {
    if unsaved > 0 {
        if let Err(save_err) = save(store, store_path).await {
            error!(error = %save_err, "couldn't save progress before aborting");
        }
    }
    err
}

/// Fetches and extracts one challenge. The image is only fetched when the
/// store doesn't already have one, and an image failure doesn't fail the item.
pub async fn fetch_challenge<F: Fetcher + ?Sized>(
    id: ChallengeId,
    fetcher: &F,
    has_image: bool,
) -> Result<Challenge> {
    let html = fetcher.page(id).await?;
    let challenge = extract(id, html).await?;
    if has_image {
        return Ok(challenge);
    }

    match fetcher.image(id).await {
        Ok(image) => Ok(challenge.with_image(image)),
        Err(e) => {
            warn!(%id, error = %e, "couldn't fetch challenge image");
            Ok(challenge)
        }
    }
}
