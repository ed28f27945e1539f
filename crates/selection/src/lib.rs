//! Pointer-driven rectangle selection over a bounded slide surface.
//!
//! Synchronous and single-threaded: the host feeds pointer events in,
//! the editor keeps the current [`Selection`] consistent. Only the
//! primary pointer is honored; a gesture that releases below the
//! minimum size leaves no selection behind.

use project::{AspectRatio, Selection, SelectionRatio, MIN_SELECTION_SIZE};

/// How close (in surface units) a press must land to a handle center
/// to grab it.
pub const HANDLE_HIT_RADIUS: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The slide image's extent in surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Right,
        Self::BottomRight,
        Self::Bottom,
        Self::BottomLeft,
        Self::Left,
    ];

    /// Handle center on the selection outline.
    pub fn position(self, selection: &Selection) -> Point {
        let cx = selection.x + selection.width / 2.0;
        let cy = selection.y + selection.height / 2.0;
        match self {
            Self::TopLeft => Point::new(selection.x, selection.y),
            Self::Top => Point::new(cx, selection.y),
            Self::TopRight => Point::new(selection.right(), selection.y),
            Self::Right => Point::new(selection.right(), cy),
            Self::BottomRight => Point::new(selection.right(), selection.bottom()),
            Self::Bottom => Point::new(cx, selection.bottom()),
            Self::BottomLeft => Point::new(selection.x, selection.bottom()),
            Self::Left => Point::new(selection.x, cy),
        }
    }

    const fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    const fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    const fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    const fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Idle,
    Drawing { origin: Point },
    Moving { start: Point, initial: Selection },
    Resizing { handle: Handle, initial: Selection },
}

pub struct SelectionEditor {
    surface: Surface,
    mode: Mode,
    selection: Option<Selection>,
    active_pointer: Option<u64>,
}

impl SelectionEditor {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            mode: Mode::Idle,
            selection: None,
            active_pointer: None,
        }
    }

    pub fn with_selection(surface: Surface, selection: Selection) -> Self {
        let mut editor = Self::new(surface);
        editor.selection = Some(selection);
        editor
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn gesture_active(&self) -> bool {
        !matches!(self.mode, Mode::Idle)
    }

    pub fn pointer_down(&mut self, pointer: u64, p: Point) {
        if self.active_pointer.is_some() {
            return;
        }
        self.active_pointer = Some(pointer);

        if let Some(selection) = self.selection {
            if let Some(handle) = hit_handle(&selection, p) {
                self.mode = Mode::Resizing {
                    handle,
                    initial: selection,
                };
                return;
            }
            if selection.contains(p.x, p.y) {
                self.mode = Mode::Moving {
                    start: p,
                    initial: selection,
                };
                return;
            }
        }

        let origin = self.surface.clamp(p);
        self.mode = Mode::Drawing { origin };
        self.selection = Some(Selection {
            x: origin.x,
            y: origin.y,
            width: 0.0,
            height: 0.0,
            ratio: SelectionRatio::Custom,
        });
    }

    pub fn pointer_move(&mut self, pointer: u64, p: Point) {
        if self.active_pointer != Some(pointer) {
            return;
        }
        match self.mode {
            Mode::Idle => {}
            Mode::Drawing { origin } => {
                let p = self.surface.clamp(p);
                self.selection = Some(Selection {
                    x: origin.x.min(p.x),
                    y: origin.y.min(p.y),
                    width: (p.x - origin.x).abs(),
                    height: (p.y - origin.y).abs(),
                    ratio: SelectionRatio::Custom,
                });
            }
            Mode::Moving { start, initial } => {
                let max_x = (self.surface.width - initial.width).max(0.0);
                let max_y = (self.surface.height - initial.height).max(0.0);
                self.selection = Some(Selection {
                    x: (initial.x + p.x - start.x).clamp(0.0, max_x),
                    y: (initial.y + p.y - start.y).clamp(0.0, max_y),
                    ..initial
                });
            }
            Mode::Resizing { handle, initial } => {
                let p = self.surface.clamp(p);
                self.selection = Some(resize(&initial, handle, p));
            }
        }
    }

    pub fn pointer_up(&mut self, pointer: u64, p: Point) {
        if self.active_pointer != Some(pointer) {
            return;
        }
        self.pointer_move(pointer, p);
        self.finish_gesture();
    }

    /// Leaving the surface mid-gesture ends it exactly like a release.
    pub fn pointer_leave(&mut self, pointer: u64) {
        if self.active_pointer != Some(pointer) {
            return;
        }
        self.finish_gesture();
    }

    /// Drops the selection no matter what the machine is doing.
    pub fn clear(&mut self) {
        self.selection = None;
        self.mode = Mode::Idle;
        self.active_pointer = None;
    }

    /// Inserts a centered, maximal rectangle of a named aspect ratio.
    pub fn apply_preset(&mut self, ratio: AspectRatio) {
        let (rw, rh) = ratio.ratio();
        let scale = (self.surface.width / rw as f32).min(self.surface.height / rh as f32);
        let width = rw as f32 * scale;
        let height = rh as f32 * scale;
        if width < MIN_SELECTION_SIZE || height < MIN_SELECTION_SIZE {
            return;
        }
        self.selection = Some(Selection {
            x: (self.surface.width - width) / 2.0,
            y: (self.surface.height - height) / 2.0,
            width,
            height,
            ratio: SelectionRatio::Named(ratio),
        });
        self.mode = Mode::Idle;
        self.active_pointer = None;
    }

    fn finish_gesture(&mut self) {
        if let Mode::Drawing { .. } = self.mode {
            if let Some(selection) = self.selection {
                if !selection.meets_minimum() {
                    self.selection = None;
                }
            }
        }
        self.mode = Mode::Idle;
        self.active_pointer = None;
    }
}

fn hit_handle(selection: &Selection, p: Point) -> Option<Handle> {
    Handle::ALL.into_iter().find(|handle| {
        let center = handle.position(selection);
        (p.x - center.x).abs() <= HANDLE_HIT_RADIUS && (p.y - center.y).abs() <= HANDLE_HIT_RADIUS
    })
}

/// Recomputes the rectangle for a handle drag. Only the edges the
/// handle owns move; each is pinned so the rectangle never drops below
/// the minimum size or inverts past its anchored opposite edge.
fn resize(initial: &Selection, handle: Handle, p: Point) -> Selection {
    let mut left = initial.x;
    let mut right = initial.right();
    let mut top = initial.y;
    let mut bottom = initial.bottom();

    if handle.moves_left() {
        left = p.x.min(right - MIN_SELECTION_SIZE);
    }
    if handle.moves_right() {
        right = p.x.max(left + MIN_SELECTION_SIZE);
    }
    if handle.moves_top() {
        top = p.y.min(bottom - MIN_SELECTION_SIZE);
    }
    if handle.moves_bottom() {
        bottom = p.y.max(top + MIN_SELECTION_SIZE);
    }

    Selection {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
        // Free-form resizing breaks any named ratio.
        ratio: SelectionRatio::Custom,
    }
}
