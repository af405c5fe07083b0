//! Lazily decoded bitmaps keyed by path.
//!
//! Decoding happens on blocking worker tasks. Finished bitmaps are parked
//! in a channel and only installed when the draw path calls
//! [`ImageCache::install_ready`], so the compositor never observes an entry
//! changing mid-frame.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Decode state of one cached path.
#[derive(Debug)]
pub enum CacheEntry {
    /// Known but not yet requested.
    Pending,
    /// Decode running on a worker task.
    Loading,
    Ready(RgbaImage),
    /// Decode failed; the path is not retried until it leaves the list.
    Failed(String),
}

type Decoded = (PathBuf, Result<RgbaImage, String>);
type DecodeFn = fn(&Path) -> Result<RgbaImage, String>;

pub struct ImageCache {
    entries: HashMap<PathBuf, CacheEntry>,
    decoder: DecodeFn,
    tx: mpsc::UnboundedSender<Decoded>,
    rx: mpsc::UnboundedReceiver<Decoded>,
}

fn decode(path: &Path) -> Result<RgbaImage, String> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| e.to_string())
}

/// Run `decoder` and always produce a result, even if it panics, so no
/// entry is left loading forever.
fn decode_guarded(decoder: DecodeFn, path: &Path) -> Result<RgbaImage, String> {
    panic::catch_unwind(AssertUnwindSafe(|| decoder(path))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(format!("decoder panicked: {reason}"))
    })
}

impl ImageCache {
    pub fn new() -> Self {
        Self::with_decoder(decode)
    }

    fn with_decoder(decoder: DecodeFn) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            entries: HashMap::new(),
            decoder,
            tx,
            rx,
        }
    }

    /// Make the cache track exactly `paths`.
    ///
    /// Entries whose path left the list are dropped; new paths start
    /// pending. Returns whether anything changed.
    pub fn sync(&mut self, paths: &[PathBuf]) -> bool {
        let before = self.entries.len();
        self.entries.retain(|path, _| paths.contains(path));
        let mut changed = self.entries.len() != before;

        for path in paths {
            if !self.entries.contains_key(path) {
                self.entries.insert(path.clone(), CacheEntry::Pending);
                changed = true;
            }
        }
        changed
    }

    /// Start decoding every pending entry.
    ///
    /// Inside a tokio runtime each decode runs on a blocking worker;
    /// without one the decode runs inline.
    pub fn request_pending(&mut self) {
        let handle = tokio::runtime::Handle::try_current().ok();
        let decoder = self.decoder;
        for (path, entry) in self.entries.iter_mut() {
            if !matches!(entry, CacheEntry::Pending) {
                continue;
            }
            *entry = CacheEntry::Loading;
            let path = path.clone();
            let tx = self.tx.clone();
            match &handle {
                Some(handle) => {
                    handle.spawn_blocking(move || {
                        let result = decode_guarded(decoder, &path);
                        let _ = tx.send((path, result));
                    });
                }
                None => {
                    let result = decode_guarded(decoder, &path);
                    let _ = tx.send((path, result));
                }
            }
        }
    }

    /// Move finished decodes into the cache. Returns how many landed.
    pub fn install_ready(&mut self) -> usize {
        let mut installed = 0;
        while let Ok((path, result)) = self.rx.try_recv() {
            installed += usize::from(self.install(path, result));
        }
        installed
    }

    fn install(&mut self, path: PathBuf, result: Result<RgbaImage, String>) -> bool {
        // Results for paths dropped by `sync` are discarded.
        let Some(entry) = self.entries.get_mut(&path) else {
            return false;
        };
        if !matches!(entry, CacheEntry::Loading) {
            return false;
        }
        *entry = match result {
            Ok(img) => {
                debug!(path = %path.display(), width = img.width(), height = img.height(), "Image decoded");
                CacheEntry::Ready(img)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image decode failed");
                CacheEntry::Failed(e)
            }
        };
        true
    }

    /// Decode everything still missing and wait for it to land.
    pub async fn load_pending(&mut self) {
        self.request_pending();
        while self.loading_count() > 0 {
            match self.rx.recv().await {
                Some((path, result)) => {
                    self.install(path, result);
                }
                None => break,
            }
        }
    }

    fn loading_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Loading))
            .count()
    }

    /// The decoded bitmap, once ready.
    pub fn get(&self, path: &Path) -> Option<&RgbaImage> {
        match self.entries.get(path) {
            Some(CacheEntry::Ready(img)) => Some(img),
            _ => None,
        }
    }

    pub fn entry(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn ready_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Ready(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Failed(_)))
            .count()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}
