use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Results kept per project; older entries are evicted first.
pub const MAX_RESULTS: usize = 12;

/// Smallest selection edge (in surface units) that survives a gesture.
pub const MIN_SELECTION_SIZE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    Ready,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Idle,
    Generating,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "square")]
    Square,
    #[serde(rename = "portrait_9x16")]
    Portrait9x16,
    #[serde(rename = "landscape_16x9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [Self::Square, Self::Portrait9x16, Self::Landscape16x9];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Portrait9x16 => "portrait_9x16",
            Self::Landscape16x9 => "landscape_16x9",
        }
    }

    pub const fn ratio(self) -> (u32, u32) {
        match self {
            Self::Square => (1, 1),
            Self::Portrait9x16 => (9, 16),
            Self::Landscape16x9 => (16, 9),
        }
    }

    /// Picks the named ratio closest to a free-form width/height.
    pub fn closest(width: f32, height: f32) -> Self {
        if width <= 0.0 || height <= 0.0 {
            return Self::Square;
        }
        let target = width / height;
        let mut best = Self::Square;
        let mut best_distance = f32::MAX;
        for candidate in Self::ALL {
            let (w, h) = candidate.ratio();
            let distance = (target - w as f32 / h as f32).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRatio {
    Custom,
    Named(AspectRatio),
}

impl SelectionRatio {
    pub fn request_ratio(self, width: f32, height: f32) -> AspectRatio {
        match self {
            Self::Named(ratio) => ratio,
            Self::Custom => AspectRatio::closest(width, height),
        }
    }
}

/// User-drawn target region in slide-surface units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub ratio: SelectionRatio,
}

impl Selection {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn meets_minimum(&self) -> bool {
        self.width >= MIN_SELECTION_SIZE && self.height >= MIN_SELECTION_SIZE
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.ratio.request_ratio(self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Mock,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: String,
    pub image: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub save_state: SaveState,
    pub slide_image: Option<String>,
    pub slide_context: Option<String>,
    pub prompt: Option<String>,
    pub results: Vec<GenerationResult>,
    pub selection: Option<Selection>,
    pub generation_status: GenerationStatus,
    pub generation_error: Option<String>,
    pub pending_slots: u32,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            save_state: SaveState::Ready,
            slide_image: None,
            slide_context: None,
            prompt: None,
            results: Vec::new(),
            selection: None,
            generation_status: GenerationStatus::Idle,
            generation_error: None,
            pending_slots: 0,
        }
    }

    /// A streaming session never survives a reload; activation always
    /// lands on an idle project no matter what was persisted.
    pub fn reset_session_state(&mut self) {
        self.generation_status = GenerationStatus::Idle;
        self.generation_error = None;
        self.pending_slots = 0;
    }

    pub fn is_generating(&self) -> bool {
        self.generation_status == GenerationStatus::Generating
    }
}
