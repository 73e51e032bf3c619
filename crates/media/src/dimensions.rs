//! Declares the [Dimensions] type, the size of a bitmap, mip level, or chunk.

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU32;

/// A width and a height in texels, both guaranteed to be non-zero.
///
/// # Example
///
/// [From<(u32, u32)>] is implemented for [Dimensions]. If either side is `0`,
/// the thread will panic. [Into::into] should really only be used if you're
/// providing the side lengths as literals (e.g. `(1024, 512).into()`).
///
/// ```
/// use media::Dimensions;
///
/// let d: Dimensions = (1024, 512).into();
/// assert_eq!(d.width(), 1024);
/// assert_eq!(d.height(), 512);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: NonZeroU32,
    height: NonZeroU32,
}

impl Dimensions {
    /// A single texel, the smallest possible size (and the last mip level).
    pub const ONE: Self = Self::from_non_zero(NonZeroU32::MIN, NonZeroU32::MIN);

    /// Construct from a width and a height.
    ///
    /// This function will return [None] if the width or height are 0. Also see
    /// [Self::from_non_zero].
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        let Some(width) = NonZeroU32::new(width) else {
            return None;
        };
        let Some(height) = NonZeroU32::new(height) else {
            return None;
        };

        Some(Self::from_non_zero(width, height))
    }

    /// Construct from a non-zero width and a height.
    pub const fn from_non_zero(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    /// The dimensions' width. This will never be `0`.
    pub const fn width(&self) -> u32 {
        self.width.get()
    }

    /// The dimensions' height. This will never be `0`.
    pub const fn height(&self) -> u32 {
        self.height.get()
    }

    /// Whether both sides are powers of two.
    ///
    /// ```
    /// use media::Dimensions;
    ///
    /// assert!(Dimensions::from((256, 64)).is_power_of_two());
    /// assert!(!Dimensions::from((256, 65)).is_power_of_two());
    /// ```
    pub const fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }

    /// Whether these dimensions are `1x1`.
    pub const fn is_one(&self) -> bool {
        self.width.get() == 1 && self.height.get() == 1
    }

    /// The size of the next mip level: each side halved (rounding down) but
    /// never below `1`.
    ///
    /// ```
    /// use media::Dimensions;
    ///
    /// let d: Dimensions = (8, 2).into();
    /// assert_eq!(d.halved(), (4, 1).into());
    /// assert_eq!(d.halved().halved(), (2, 1).into());
    /// ```
    pub const fn halved(&self) -> Self {
        let width = match NonZeroU32::new(self.width.get() / 2) {
            Some(w) => w,
            None => NonZeroU32::MIN,
        };
        let height = match NonZeroU32::new(self.height.get() / 2) {
            Some(h) => h,
            None => NonZeroU32::MIN,
        };
        Self { width, height }
    }

    /// The larger of the two sides.
    pub const fn max_side(&self) -> u32 {
        if self.width.get() > self.height.get() {
            self.width.get()
        } else {
            self.height.get()
        }
    }
}

/// When displayed, [Dimensions] will look like `WxH` (e.g. `1024x1024`).
impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// If either side is `0`, the thread will panic. [Into::into] should really
/// only be used if you're providing the side lengths as literals.
impl From<(u32, u32)> for Dimensions {
    fn from(dimensions: (u32, u32)) -> Self {
        Self::new(dimensions.0, dimensions.1).expect("Both sides must be non-zero.")
    }
}

impl From<Dimensions> for (u32, u32) {
    fn from(dimensions: Dimensions) -> Self {
        (dimensions.width(), dimensions.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sides_are_rejected() {
        assert_eq!(Dimensions::new(0, 4), None);
        assert_eq!(Dimensions::new(4, 0), None);
        assert!(Dimensions::new(1, 1).is_some());
    }

    #[test]
    fn halving_stops_at_one() {
        let mut d: Dimensions = (1024, 1).into();
        let mut steps = 0;
        while !d.is_one() {
            d = d.halved();
            steps += 1;
        }
        assert_eq!(steps, 10);
        assert_eq!(d.halved(), Dimensions::ONE);
    }

    #[test]
    fn displays_as_width_by_height() {
        assert_eq!(Dimensions::from((1920, 1080)).to_string(), "1920x1080");
    }
}
