pub mod extract;
pub mod merge;
pub mod status;

use std::path::Path;

use tracing::{info, warn};

use crate::extract::{Corpus, MergePolicy};
use crate::store;

/// Corpus loaded for a run plus whether it is safe to write back.
pub(crate) struct LoadedCorpus {
    pub corpus: Corpus,
    pub writable: bool,
    pub warning: Option<String>,
}

/// Loads the stored corpus. An unreadable store degrades to an empty corpus
/// so the run can still export its own results; the store is then left
/// untouched rather than overwritten with the partial view.
pub(crate) fn load_corpus(db_path: &Path, policy: MergePolicy) -> LoadedCorpus {
    match store::load_problems(db_path) {
        Ok(records) => {
            info!(
                path = %db_path.display(),
                records = records.len(),
                "loaded corpus"
            );
            LoadedCorpus {
                corpus: Corpus::from_records(policy, records),
                writable: true,
                warning: None,
            }
        }
        Err(err) => {
            let detail = format!("{err:#}");
            warn!(
                path = %db_path.display(),
                error = %detail,
                "corpus load failed; starting empty"
            );
            let warning = format!(
                "corpus at {} could not be loaded ({detail}); continuing with an empty corpus",
                db_path.display()
            );
            LoadedCorpus {
                corpus: Corpus::new(policy),
                writable: false,
                warning: Some(warning),
            }
        }
    }
}
