//! Tag extraction from embedded image metadata
//!
//! Generated images carry their generation parameters in a PNG `tEXt` chunk
//! with the keyword `parameters`. The tag of an item is the name of the first
//! LoRA referenced there, written as `<lora:NAME:WEIGHT>`.

use crate::types::TagName;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Keyword of the text chunk holding generation parameters
pub const PARAMETERS_KEYWORD: &str = "parameters";

static LORA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<lora:([^:]+):").expect("LoRA pattern is a valid regex")
});

/// Extract the first LoRA name from a parameters string
pub fn parse_lora_tag(parameters: &str) -> Option<TagName> {
    LORA_PATTERN
        .captures(parameters)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// Resolves the tag of an item from its metadata
pub trait MetadataResolver: Send + Sync {
    /// `None` when the metadata cannot be read or carries no tag
    fn extract_tag(&self, item_path: &Path) -> Option<TagName>;
}

/// Resolver reading the `parameters` text chunk of PNG files
#[derive(Debug, Clone, Default)]
pub struct PngTextMetadataResolver;

impl PngTextMetadataResolver {
    pub fn new() -> Self {
        Self
    }

    /// Text of the `parameters` chunk, if the file is a readable PNG carrying one
    pub fn read_parameters(&self, item_path: &Path) -> Option<String> {
        let file = match File::open(item_path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Cannot open {}: {}", item_path.display(), e);
                return None;
            }
        };

        let decoder = png::Decoder::new(BufReader::new(file));
        let reader = match decoder.read_info() {
            Ok(reader) => reader,
            Err(e) => {
                debug!("Cannot read PNG metadata of {}: {}", item_path.display(), e);
                return None;
            }
        };

        let info = reader.info();
        info.uncompressed_latin1_text
            .iter()
            .find(|chunk| chunk.keyword == PARAMETERS_KEYWORD)
            .map(|chunk| chunk.text.clone())
    }
}

impl MetadataResolver for PngTextMetadataResolver {
    fn extract_tag(&self, item_path: &Path) -> Option<TagName> {
        self.read_parameters(item_path)
            .and_then(|parameters| parse_lora_tag(&parameters))
    }
}

/// Resolver answering from a fixed file-name to tag table
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataResolver {
    tags: HashMap<String, TagName>,
}

impl StaticMetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every item whose file name is `item_id`
    pub fn with_tag(mut self, item_id: &str, tag: &str) -> Self {
        self.tags.insert(item_id.to_string(), tag.to_string());
        self
    }
}

impl MetadataResolver for StaticMetadataResolver {
    fn extract_tag(&self, item_path: &Path) -> Option<TagName> {
        let file_name = item_path.file_name()?.to_str()?;
        self.tags.get(file_name).cloned()
    }
}
