use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Pixel dimensions shared by every sprite grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteCanvas {
    pub width: usize,
    pub height: usize,
}

impl SpriteCanvas {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub const fn pixel_count(self) -> usize {
        self.width * self.height
    }

    pub fn empty_grid(self) -> Vec<Rgba> {
        vec![TRANSPARENT; self.pixel_count()]
    }
}

impl Default for SpriteCanvas {
    fn default() -> Self {
        Self::new(32, 32)
    }
}

/// Tight box around the visible pixels of a sprite. Extremes are inclusive, so a
/// single visible pixel has zero width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: usize,
    pub y: usize,
    pub max_x: usize,
    pub max_y: usize,
    pub width: usize,
    pub height: usize,
}

impl Bounds {
    pub fn of_grid(colors: &[Rgba], canvas: SpriteCanvas) -> Option<Self> {
        if canvas.width == 0 {
            return None;
        }
        let mut visible = colors.iter().enumerate().filter(|(_, pixel)| pixel[3] > 0);
        let (first, _) = visible.next()?;
        let (mut x, mut y) = (first % canvas.width, first / canvas.width);
        let (mut max_x, mut max_y) = (x, y);
        for (index, _) in visible {
            let (px, py) = (index % canvas.width, index / canvas.width);
            x = x.min(px);
            max_x = max_x.max(px);
            y = y.min(py);
            max_y = max_y.max(py);
        }
        Some(Self { x, y, max_x, max_y, width: max_x - x, height: max_y - y })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub colors: Vec<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl Sprite {
    pub fn new(colors: Vec<Rgba>) -> Self {
        Self { colors, bounds: None }
    }

    pub fn blank(canvas: SpriteCanvas) -> Self {
        Self::new(canvas.empty_grid())
    }

    pub fn fits(&self, canvas: SpriteCanvas) -> bool {
        self.colors.len() == canvas.pixel_count()
    }

    /// Truncates or pads with transparent pixels. Returns true when the grid changed.
    pub fn normalize(&mut self, canvas: SpriteCanvas) -> bool {
        if self.fits(canvas) {
            return false;
        }
        self.colors.resize(canvas.pixel_count(), TRANSPARENT);
        self.bounds = None;
        true
    }

    pub fn refresh_bounds(&mut self, canvas: SpriteCanvas) {
        self.bounds = Bounds::of_grid(&self.colors, canvas);
    }
}

/// Sprites keyed by name. Iteration is ordered by name, which also defines the
/// default sprite picked after deletions and uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteRegistry {
    sprites: BTreeMap<String, Sprite>,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sprites.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Sprite> {
        self.sprites.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Sprite> {
        self.sprites.get_mut(name)
    }

    pub fn first_name(&self) -> Option<&str> {
        self.sprites.keys().next().map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sprites.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sprite)> {
        self.sprites.iter().map(|(name, sprite)| (name.as_str(), sprite))
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, sprite: Sprite) -> Option<Sprite> {
        self.sprites.insert(name.into(), sprite)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Sprite> {
        self.sprites.remove(name)
    }

    /// Moves `old` to `new`. Refuses when `new` is taken or `old` is missing.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        if self.sprites.contains_key(new) {
            return false;
        }
        match self.sprites.remove(old) {
            Some(sprite) => {
                self.sprites.insert(new.to_string(), sprite);
                true
            }
            None => false,
        }
    }

    /// Normalizes every grid to `canvas`, returning the names that had to be fixed.
    pub(crate) fn normalize(&mut self, canvas: SpriteCanvas) -> Vec<String> {
        self.sprites
            .iter_mut()
            .filter_map(|(name, sprite)| sprite.normalize(canvas).then(|| name.clone()))
            .collect()
    }

    pub(crate) fn size_up(&mut self, canvas: SpriteCanvas) {
        for sprite in self.sprites.values_mut() {
            sprite.refresh_bounds(canvas);
        }
    }
}
