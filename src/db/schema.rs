use serde::{Deserialize, Serialize};
use std::fmt;

// ── Enums ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IndexKind {
    #[default]
    Videos,
    Photos,
    Audio,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Photos => "photos",
            Self::Audio => "audio",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "photos" => Self::Photos,
            "audio" => Self::Audio,
            _ => Self::Videos,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemType {
    Movie,
    Show,
    Season,
    Episode,
    #[default]
    Video,
    Extra,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Video => "video",
            Self::Extra => "extra",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "movie" => Self::Movie,
            "show" => Self::Show,
            "season" => Self::Season,
            "episode" => Self::Episode,
            "extra" => Self::Extra,
            _ => Self::Video,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScanStatus {
    #[default]
    Idle,
    Queued,
    Scanning,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Scanning => "scanning",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "scanning" => Self::Scanning,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Table structs ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub id: i64,
    pub name: String,
    pub kind: IndexKind,
    pub roots: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: i64,
    pub index_id: i64,
    pub item_type: ItemType,
    pub parent_id: Option<i64>,
    pub title: String,
    pub sort_title: Option<String>,
    pub year: Option<i32>,
    pub number: Option<i32>,
    pub source_path: Option<String>,
    pub added_at: String,
    pub latest_added_at: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoVersion {
    pub id: i64,
    pub item_id: i64,
    pub edition: Option<String>,
    pub container: Option<String>,
    pub resolution: Option<String>,
    pub runtime_ms: Option<i64>,
    pub metadata: serde_json::Value,
    pub added_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPart {
    pub id: i64,
    pub version_id: i64,
    pub path: String,
    pub size: i64,
    pub mtime: i64,
    pub fast_hash: String,
    pub part_index: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: i64,
    pub index_id: i64,
    pub status: ScanStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}
