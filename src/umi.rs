use std::collections::HashSet;
use std::io::BufRead;

use log::{debug, warn};

use crate::errors::Result;
use crate::io::get_reader;

/// Known-good UMI sequences, loaded once before processing
#[derive(Debug, Clone, Default)]
pub struct UmiWhitelist {
    umis: HashSet<String>,
}

impl UmiWhitelist {
    /// Loads one UMI per line from `path` ("-" for stdin, `.gz` accepted).
    pub fn from_path(path: &str) -> Result<Self> {
        let reader = get_reader(path)?;
        let whitelist = Self::from_reader(reader)?;
        if whitelist.is_empty() {
            warn!("UMI whitelist '{}' is empty; every record will be counted as invalid", path);
        } else {
            debug!("Loaded {} UMIs from '{}'", whitelist.len(), path);
        }
        Ok(whitelist)
    }

    /// Reads UMIs line by line. Entries are trimmed; blank lines and `#` comments are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut umis = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            umis.insert(entry.to_string());
        }
        umis.shrink_to_fit();
        Ok(Self { umis })
    }

    #[must_use]
    pub fn is_known(&self, umi: &str) -> bool {
        self.umis.contains(umi)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.umis.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.umis.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for UmiWhitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { umis: iter.into_iter().map(Into::into).collect() }
    }
}
