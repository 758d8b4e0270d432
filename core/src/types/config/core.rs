use std::path::PathBuf;

/// Runtime paths for a search engine instance.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_path: PathBuf,
}

impl Config {
    /// Directory holding the dictionary, postings, and metadata files.
    pub fn index_dir(&self) -> PathBuf {
        self.base_path.join("search_index")
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_path.join("sift.toml")
    }
}
