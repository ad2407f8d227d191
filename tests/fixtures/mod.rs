//! Test fixtures for integration testing
//!
//! Builds an images directory of real PNG files carrying generation
//! parameters, so tests exercise the directory source, the PNG metadata
//! resolver and the JSON snapshot store together.

#![allow(dead_code)]

use elo_arena::collection::{
    CollectionManager, DirectoryItemSource, PngTextMetadataResolver,
};
use elo_arena::config::{AppConfig, RatingConfig};
use elo_arena::metrics::MetricsCollector;
use elo_arena::rating::{JsonFileSnapshotStore, RatingEngine};
use elo_arena::service::AppState;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Write a 1x1 PNG, with a `parameters` text chunk naming `lora` if given
pub fn write_png(path: &Path, lora: Option<&str>) {
    let file = File::create(path).expect("create png");
    let mut encoder = png::Encoder::new(BufWriter::new(file), 1, 1);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    if let Some(lora) = lora {
        let parameters = format!(
            "masterpiece, portrait, <lora:{}:0.8>\nNegative prompt: blurry\nSteps: 20",
            lora
        );
        encoder
            .add_text_chunk("parameters".to_string(), parameters)
            .expect("add text chunk");
    }
    let mut writer = encoder.write_header().expect("png header");
    writer
        .write_image_data(&[10, 20, 30, 255])
        .expect("png data");
}

/// Temporary images and snapshot directories
pub struct TestArena {
    root: TempDir,
}

impl TestArena {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("images")).expect("images dir");
        fs::create_dir(root.path().join("snapshots")).expect("snapshots dir");
        Self { root }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.path().join("images")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.root.path().join("snapshots")
    }

    pub fn subset_dir(&self, subset: &str) -> PathBuf {
        self.images_dir().join(subset)
    }

    pub fn snapshot_path(&self, subset: &str) -> PathBuf {
        self.snapshot_dir()
            .join(format!("eloRatings-{}.json", subset))
    }

    /// Create a subset with `(file name, lora)` images; `None` writes an untagged PNG
    pub fn add_subset(&self, subset: &str, images: &[(&str, Option<&str>)]) {
        let dir = self.subset_dir(subset);
        fs::create_dir_all(&dir).expect("subset dir");
        for (name, lora) in images {
            self.add_image(subset, name, *lora);
        }
    }

    pub fn add_image(&self, subset: &str, name: &str, lora: Option<&str>) {
        write_png(&self.subset_dir(subset).join(name), lora);
    }

    pub fn add_caption(&self, subset: &str, image: &str, caption: &str) {
        let path = self.subset_dir(subset).join(image).with_extension("txt");
        fs::write(path, caption).expect("caption");
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.images_dir = self.images_dir();
        config.storage.snapshot_dir = self.snapshot_dir();
        config
    }

    /// A manager over the directories, as the service would build it
    pub fn manager(&self) -> CollectionManager {
        let directory = Arc::new(DirectoryItemSource::new(self.images_dir()));
        CollectionManager::new(
            directory.clone(),
            directory,
            Arc::new(PngTextMetadataResolver::new()),
            Arc::new(JsonFileSnapshotStore::new(self.snapshot_dir())),
            RatingEngine::new(RatingConfig::default()).expect("engine"),
            Arc::new(MetricsCollector::new().expect("metrics")),
        )
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(self.config()).expect("app state"))
    }
}

/// Four tagged images over three LoRAs plus one untagged image
pub fn standard_arena() -> TestArena {
    let arena = TestArena::new();
    arena.add_subset(
        "portraits",
        &[
            ("a.png", Some("film_grain")),
            ("b.png", Some("moody_light")),
            ("c.png", Some("film_grain")),
            ("d.png", Some("watercolor")),
            ("plain.png", None),
        ],
    );
    arena
}
