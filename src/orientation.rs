//! Orientation: накопленный поворот страницы (без физического перекодирования).
//!
//! Только четыре значения: 0/90/180/270 по часовой стрелке. Отражения (flip)
//! не представимы: конвейер захвата их не порождает, а на границе
//! `from_degrees` отбрасывает всё, что не кратно 90.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Deg0,
        Orientation::Deg90,
        Orientation::Deg180,
        Orientation::Deg270,
    ];

    #[inline]
    fn quarter_turns(self) -> u8 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 1,
            Orientation::Deg180 => 2,
            Orientation::Deg270 => 3,
        }
    }

    #[inline]
    fn from_quarter_turns(q: u8) -> Self {
        match q % 4 {
            0 => Orientation::Deg0,
            1 => Orientation::Deg90,
            2 => Orientation::Deg180,
            _ => Orientation::Deg270,
        }
    }

    /// Clockwise angle in degrees (0, 90, 180 or 270).
    pub fn degrees(self) -> u16 {
        self.quarter_turns() as u16 * 90
    }

    /// Boundary conversion. Any multiple of 90 is accepted (negative angles
    /// are counter-clockwise); everything else yields None.
    pub fn from_degrees(deg: i32) -> Option<Self> {
        if deg % 90 != 0 {
            return None;
        }
        let q = (deg / 90).rem_euclid(4) as u8;
        Some(Self::from_quarter_turns(q))
    }

    /// `(self + applied) mod 360`. Total, commutative, associative.
    pub fn compose(self, applied: Orientation) -> Orientation {
        Self::from_quarter_turns(self.quarter_turns() + applied.quarter_turns())
    }

    /// Rotation that undoes `self`.
    pub fn inverse(self) -> Orientation {
        Self::from_quarter_turns(4 - self.quarter_turns())
    }

    /// Rotate a raster clockwise by this orientation. Returns a new raster.
    pub fn apply(self, img: &DynamicImage) -> DynamicImage {
        match self {
            Orientation::Deg0 => img.clone(),
            Orientation::Deg90 => img.rotate90(),
            Orientation::Deg180 => img.rotate180(),
            Orientation::Deg270 => img.rotate270(),
        }
    }

    /// Same as `apply`, but takes ownership and skips the copy for 0°.
    pub fn apply_owned(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Deg0 => img,
            _ => self.apply(&img),
        }
    }
}

/// Fold of `compose` over a sequence of rotations.
pub fn compose_all<I: IntoIterator<Item = Orientation>>(start: Orientation, steps: I) -> Orientation {
    steps.into_iter().fold(start, Orientation::compose)
}

impl From<Orientation> for u16 {
    fn from(o: Orientation) -> u16 {
        o.degrees()
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(deg: u16) -> Result<Self, Self::Error> {
        match deg {
            0 => Ok(Orientation::Deg0),
            90 => Ok(Orientation::Deg90),
            180 => Ok(Orientation::Deg180),
            270 => Ok(Orientation::Deg270),
            other => Err(format!("unsupported transform {other} (expected 0/90/180/270)")),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
