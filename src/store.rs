use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::ChartDocument;
use crate::error::StoreError;

const CHART_DIR: &str = "charts";
const CHART_EXT: &str = ".json.gz";

/// Where chart documents live
///
/// Every call is a single-shot operation; failures propagate to the caller
/// without retries.
#[async_trait]
pub trait ChartStore: Send + Sync {
    /// Persist a document, returning its id
    async fn save(&self, document: &ChartDocument) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ChartDocument>, StoreError>;

    /// Uniformly random subset of at most `n` documents, in no particular order
    ///
    /// Returns every document when fewer than `n` are stored.
    async fn sample(&self, n: usize) -> Result<Vec<ChartDocument>, StoreError>;

    /// Documents owned by `owner`, newest first
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ChartDocument>, StoreError>;
}

/// Pick up to `n` items uniformly without replacement
pub fn sample_uniform<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let mut rng = rand::thread_rng();
    let mut picked: Vec<T> = items.choose_multiple(&mut rng, n).cloned().collect();
    picked.shuffle(&mut rng);
    picked
}

fn newest_first(mut documents: Vec<ChartDocument>) -> Vec<ChartDocument> {
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    documents
}

/// In-process store
#[derive(Default)]
pub struct MemoryChartStore {
    documents: RwLock<Vec<ChartDocument>>,
}

impl MemoryChartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl ChartStore for MemoryChartStore {
    async fn save(&self, document: &ChartDocument) -> Result<String, StoreError> {
        let mut documents = self.documents.write().await;
        documents.retain(|d| d.id != document.id);
        documents.push(document.clone());
        Ok(document.id.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<ChartDocument>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| d.id == id).cloned())
    }

    async fn sample(&self, n: usize) -> Result<Vec<ChartDocument>, StoreError> {
        let documents = self.documents.read().await;
        Ok(sample_uniform(&documents, n))
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ChartDocument>, StoreError> {
        let documents = self.documents.read().await;
        let owned = documents
            .iter()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }
}

/// File-backed store: one gzip-compressed JSON file per document
///
/// Documents are written to `<data_dir>/charts/<id>.json.gz`.
pub struct FileChartStore {
    dir: PathBuf,
}

impl FileChartStore {
    /// Open (and create if needed) the chart directory under `data_dir`
    ///
    /// # Errors
    /// * `StoreError::Io` if the directory cannot be created
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref().join(CHART_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{CHART_EXT}"))
    }

    async fn stored_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(id) = name.strip_suffix(CHART_EXT) {
                ids.push(id.to_string());
            }
        }

        Ok(ids)
    }

    async fn load(&self, id: &str) -> Result<ChartDocument, StoreError> {
        let bytes = tokio::fs::read(self.path_for(id)).await?;
        decode(&bytes)
    }

    async fn load_all(&self) -> Result<Vec<ChartDocument>, StoreError> {
        let mut documents = Vec::new();
        for id in self.stored_ids().await? {
            match self.load(&id).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping unreadable chart {id}: {e}"),
            }
        }
        Ok(documents)
    }
}

#[async_trait]
impl ChartStore for FileChartStore {
    async fn save(&self, document: &ChartDocument) -> Result<String, StoreError> {
        let bytes = encode(document)?;
        let path = self.path_for(&document.id);
        let staging = self.dir.join(format!(".{}.tmp", document.id));

        let written = match tokio::fs::write(&staging, &bytes).await {
            Ok(()) => tokio::fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!("No staging file to remove for {}: {cleanup}", document.id);
            }
            return Err(e.into());
        }

        debug!("Stored chart {} ({} bytes)", document.id, bytes.len());
        Ok(document.id.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<ChartDocument>, StoreError> {
        // only ids we generated map onto file names
        if Uuid::parse_str(id).is_err() {
            return Ok(None);
        }

        match self.load(id).await {
            Ok(document) => Ok(Some(document)),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sample(&self, n: usize) -> Result<Vec<ChartDocument>, StoreError> {
        let mut ids = self.stored_ids().await?;
        ids.shuffle(&mut rand::thread_rng());

        // unreadable files are skipped, and the next id in the shuffle takes their place
        let mut documents = Vec::with_capacity(n.min(ids.len()));
        for id in ids {
            if documents.len() == n {
                break;
            }
            match self.load(&id).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping unreadable chart {id}: {e}"),
            }
        }
        Ok(documents)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<ChartDocument>, StoreError> {
        let owned = self
            .load_all()
            .await?
            .into_iter()
            .filter(|d| d.owner == owner)
            .collect();
        Ok(newest_first(owned))
    }
}

fn encode(document: &ChartDocument) -> Result<Vec<u8>, StoreError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, document)?;
    Ok(encoder.finish()?)
}

fn decode(bytes: &[u8]) -> Result<ChartDocument, StoreError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}
