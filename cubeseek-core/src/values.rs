//! Small value containers parsed from comma-separated parameter strings.

use crate::error::ValueError;

/// A fixed-length list of numeric values of a single kind.
///
/// Used for sub-cube region specifications and the S+C kernel lists. The
/// list cannot be resized after construction; elements are read through the
/// converting accessors.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueList {
    /// Integer-valued elements.
    Int(Vec<i64>),
    /// Float-valued elements.
    Flt(Vec<f64>),
}

impl ValueList {
    /// Parse a comma-separated string into an integer list.
    pub fn parse_int(text: &str) -> Result<Self, ValueError> {
        text.split(',')
            .map(|token| {
                let token = token.trim();
                token
                    .parse::<i64>()
                    .map_err(|_| ValueError::Parse(String::from(token), "integer"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Int)
    }

    /// Parse a comma-separated string into a float list.
    pub fn parse_flt(text: &str) -> Result<Self, ValueError> {
        text.split(',')
            .map(|token| {
                let token = token.trim();
                token
                    .parse::<f64>()
                    .map_err(|_| ValueError::Parse(String::from(token), "float"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Flt)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Flt(values) => values.len(),
        }
    }

    /// Returns `true` if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` converted to an integer (floats truncate).
    pub fn get_int(&self, i: usize) -> i64 {
        match self {
            Self::Int(values) => values[i],
            Self::Flt(values) => values[i] as i64,
        }
    }

    /// Element `i` converted to a float.
    pub fn get_flt(&self, i: usize) -> f64 {
        match self {
            Self::Int(values) => values[i] as f64,
            Self::Flt(values) => values[i],
        }
    }
}

/// A sub-cube selection given as inclusive bounds on all three axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    bounds: [i64; 6],
}

impl Region {
    /// Build a region from `[x_min, x_max, y_min, y_max, z_min, z_max]`.
    pub fn new(bounds: [i64; 6]) -> Result<Self, ValueError> {
        for axis in 0..3 {
            if bounds[2 * axis] > bounds[2 * axis + 1] {
                return Err(ValueError::MinExceedsMax(axis));
            }
        }
        Ok(Self { bounds })
    }

    /// Parse a region from a comma-separated string of six integers.
    pub fn parse(text: &str) -> Result<Self, ValueError> {
        let list = ValueList::parse_int(text)?;
        if list.len() != 6 {
            return Err(ValueError::WrongLength {
                expected: 6,
                found: list.len(),
            });
        }
        let mut bounds = [0_i64; 6];
        for (i, slot) in bounds.iter_mut().enumerate() {
            *slot = list.get_int(i);
        }
        Self::new(bounds)
    }

    /// Raw (unclipped) bounds.
    pub fn bounds(&self) -> [i64; 6] {
        self.bounds
    }

    /// Clip the bounds to `[0, axis_size - 1]` on each axis, returning the
    /// inclusive `(min, max)` pair per axis.
    pub fn clip(&self, axis_size: [usize; 3]) -> [(usize, usize); 3] {
        let mut clipped = [(0_usize, 0_usize); 3];
        for axis in 0..3 {
            let hi = axis_size[axis].saturating_sub(1) as i64;
            let min = self.bounds[2 * axis].clamp(0, hi);
            let max = self.bounds[2 * axis + 1].clamp(0, hi);
            clipped[axis] = (min as usize, max as usize);
        }
        clipped
    }

    /// Returns `true` if the voxel lies inside the region.
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        let [x0, x1, y0, y1, z0, z1] = self.bounds;
        (x as i64) >= x0
            && (x as i64) <= x1
            && (y as i64) >= y0
            && (y as i64) <= y1
            && (z as i64) >= z0
            && (z as i64) <= z1
    }
}

/// A flagging instruction describing a set of voxels to blank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlagShape {
    /// A single spatial pixel, all channels.
    Pixel {
        /// Spatial x coordinate.
        x: i64,
        /// Spatial y coordinate.
        y: i64,
    },
    /// A whole spectral channel.
    Channel {
        /// Channel index.
        z: i64,
    },
    /// A rectangular sub-cube.
    Region(Region),
    /// A spatial circle, all channels.
    Circle {
        /// Centre x coordinate.
        x: i64,
        /// Centre y coordinate.
        y: i64,
        /// Radius in pixels.
        radius: i64,
    },
}

impl FlagShape {
    /// Parse a flagging instruction of the form `kind:v1,v2,…`.
    ///
    /// Recognised kinds and their parameter counts: `pixel` (2), `channel`
    /// (1), `region` (6), `circle` (3).
    pub fn parse(text: &str) -> Result<Self, ValueError> {
        let (kind, params) = text
            .split_once(':')
            .ok_or_else(|| ValueError::UnknownShape(String::from(text)))?;
        let list = ValueList::parse_int(params)?;
        let expect = |n: usize| -> Result<(), ValueError> {
            if list.len() == n {
                Ok(())
            } else {
                Err(ValueError::WrongLength {
                    expected: n,
                    found: list.len(),
                })
            }
        };

        match kind.trim() {
            "pixel" => {
                expect(2)?;
                Ok(Self::Pixel {
                    x: list.get_int(0),
                    y: list.get_int(1),
                })
            }
            "channel" => {
                expect(1)?;
                Ok(Self::Channel { z: list.get_int(0) })
            }
            "region" => {
                expect(6)?;
                let mut bounds = [0_i64; 6];
                for (i, slot) in bounds.iter_mut().enumerate() {
                    *slot = list.get_int(i);
                }
                Ok(Self::Region(Region::new(bounds)?))
            }
            "circle" => {
                expect(3)?;
                Ok(Self::Circle {
                    x: list.get_int(0),
                    y: list.get_int(1),
                    radius: list.get_int(2),
                })
            }
            other => Err(ValueError::UnknownShape(String::from(other))),
        }
    }

    /// Returns `true` if the voxel is covered by this shape.
    pub fn covers(&self, x: usize, y: usize, z: usize) -> bool {
        match *self {
            Self::Pixel { x: px, y: py } => x as i64 == px && y as i64 == py,
            Self::Channel { z: pz } => z as i64 == pz,
            Self::Region(region) => region.contains(x, y, z),
            Self::Circle { x: cx, y: cy, radius } => {
                let dx = x as i64 - cx;
                let dy = y as i64 - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_list() {
        let list = ValueList::parse_int("0, 3, 7, 15").unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.get_int(2), 7);
        assert_eq!(list.get_flt(3), 15.0);
    }

    #[test]
    fn test_parse_flt_list() {
        let list = ValueList::parse_flt("0.0,3.5,6").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get_flt(1), 3.5);
        assert_eq!(list.get_int(1), 3);
    }

    #[test]
    fn test_parse_bad_element() {
        assert!(ValueList::parse_int("1,two,3").is_err());
        assert!(ValueList::parse_flt("1.0,,3").is_err());
    }

    #[test]
    fn test_region_parse_and_clip() {
        let region = Region::parse("5,9,0,4,0,4").unwrap();
        assert_eq!(region.clip([20, 20, 20]), [(5, 9), (0, 4), (0, 4)]);
        // Bounds beyond the cube clamp to the last voxel.
        assert_eq!(region.clip([8, 3, 2]), [(5, 7), (0, 2), (0, 1)]);
    }

    #[test]
    fn test_region_min_greater_than_max() {
        assert!(matches!(
            Region::parse("9,5,0,4,0,4"),
            Err(ValueError::MinExceedsMax(0))
        ));
    }

    #[test]
    fn test_region_wrong_length() {
        assert!(matches!(
            Region::parse("1,2,3,4"),
            Err(ValueError::WrongLength { expected: 6, .. })
        ));
    }

    #[test]
    fn test_flag_shape_parse() {
        assert_eq!(
            FlagShape::parse("pixel:3,4").unwrap(),
            FlagShape::Pixel { x: 3, y: 4 }
        );
        assert_eq!(
            FlagShape::parse("channel:7").unwrap(),
            FlagShape::Channel { z: 7 }
        );
        assert!(matches!(
            FlagShape::parse("region:0,1,0,1,0,1").unwrap(),
            FlagShape::Region(_)
        ));
        assert_eq!(
            FlagShape::parse("circle:10,10,3").unwrap(),
            FlagShape::Circle {
                x: 10,
                y: 10,
                radius: 3
            }
        );
    }

    #[test]
    fn test_flag_shape_bad_input() {
        assert!(FlagShape::parse("sphere:1,2,3").is_err());
        assert!(FlagShape::parse("pixel:1").is_err());
        assert!(FlagShape::parse("just-text").is_err());
    }

    #[test]
    fn test_flag_shape_covers() {
        let circle = FlagShape::parse("circle:5,5,2").unwrap();
        assert!(circle.covers(5, 5, 0));
        assert!(circle.covers(7, 5, 3));
        assert!(!circle.covers(8, 5, 0));

        let channel = FlagShape::parse("channel:2").unwrap();
        assert!(channel.covers(0, 0, 2));
        assert!(!channel.covers(0, 0, 1));
    }
}
