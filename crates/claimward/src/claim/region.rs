//! Claim geometry — positions and rectangular regions.
//!
//! Claims cover full-height columns, so a region is a rectangle on the
//! x/z plane with inclusive corners and the y coordinate of a position is
//! ignored for containment.

use serde::{Deserialize, Serialize};

/// Edge length of an index chunk, in blocks (as a shift).
pub const CHUNK_SHIFT: i32 = 4;

/// A block position in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The index chunk holding this position.
    pub fn chunk(&self) -> (i32, i32) {
        (self.x >> CHUNK_SHIFT, self.z >> CHUNK_SHIFT)
    }
}

/// An inclusive rectangle on the x/z plane.
///
/// Corners are normalised on construction so `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl Region {
    /// Build a region from any two opposite corners.
    pub fn new(x1: i32, z1: i32, x2: i32, z2: i32) -> Self {
        Self {
            min_x: x1.min(x2),
            min_z: z1.min(z2),
            max_x: x1.max(x2),
            max_z: z1.max(z2),
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.max_x) - i64::from(self.min_x) + 1
    }

    pub fn length(&self) -> i64 {
        i64::from(self.max_z) - i64::from(self.min_z) + 1
    }

    /// Surface area in blocks; this is what a claim costs in claim blocks.
    pub fn area(&self) -> i64 {
        self.width() * self.length()
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.x >= self.min_x
            && position.x <= self.max_x
            && position.z >= self.min_z
            && position.z <= self.max_z
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_z <= other.max_z
            && self.max_z >= other.min_z
    }

    /// Whether `other` lies entirely within this region.
    pub fn encloses(&self, other: &Region) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_z >= self.min_z
            && other.max_z <= self.max_z
    }

    /// Every index chunk this region touches.
    pub fn chunks(&self) -> impl Iterator<Item = (i32, i32)> {
        let (min_cx, max_cx) = (self.min_x >> CHUNK_SHIFT, self.max_x >> CHUNK_SHIFT);
        let (min_cz, max_cz) = (self.min_z >> CHUNK_SHIFT, self.max_z >> CHUNK_SHIFT);
        (min_cx..=max_cx).flat_map(move |cx| (min_cz..=max_cz).map(move |cz| (cx, cz)))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) -> ({}, {})",
            self.min_x, self.min_z, self.max_x, self.max_z
        )
    }
}
