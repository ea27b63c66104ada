//! 468-point face-mesh landmarks and the named indices the asymmetry
//! formulas read.
//!
//! The numbering belongs to the landmark model. "Right"/"left" are the
//! subject's sides, so the right-side points sit on the image's left.

/// Points produced by the non-refined face-mesh topology.
pub const LANDMARK_COUNT: usize = 468;

/// Named face-mesh indices. Discriminants are the model's own numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Landmark {
    NoseTip = 1,
    UpperLipCenter = 13,
    LowerLipCenter = 17,
    RightCheekLower = 58,
    RightMouthCorner = 61,
    RightBrow = 70,
    LowerLipRightCenter = 84,
    RightCheekUpper = 93,
    LowerLipRightMid = 91,
    RightCheekMid = 132,
    RightJawMid = 136,
    RightUpperLid = 159,
    RightLowerLid = 145,
    LowerLipRightOuter = 146,
    RightJawLower = 150,
    Chin = 152,
    RightJawUpper = 172,
    LowerLipRightInner = 181,
    RightCheekTop = 234,
    LeftCheekLower = 288,
    LeftMouthCorner = 291,
    LeftBrow = 300,
    LowerLipLeftCenter = 314,
    LowerLipLeftMid = 321,
    LeftCheekUpper = 323,
    LeftCheekMid = 361,
    LeftJawMid = 365,
    LeftLowerLid = 374,
    LowerLipLeftOuter = 375,
    LeftJawLower = 379,
    LeftUpperLid = 386,
    LeftJawUpper = 397,
    LowerLipLeftInner = 405,
    LeftCheekTop = 454,
}

impl Landmark {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Outer lower-lip contour from the right mouth corner to the left one.
pub const MOUTH_CONTOUR: [Landmark; 11] = [
    Landmark::RightMouthCorner,
    Landmark::LowerLipRightOuter,
    Landmark::LowerLipRightMid,
    Landmark::LowerLipRightInner,
    Landmark::LowerLipRightCenter,
    Landmark::LowerLipCenter,
    Landmark::LowerLipLeftCenter,
    Landmark::LowerLipLeftInner,
    Landmark::LowerLipLeftMid,
    Landmark::LowerLipLeftOuter,
    Landmark::LeftMouthCorner,
];

/// Right face contour, cheekbone down to jaw.
pub const RIGHT_CHEEK: [Landmark; 7] = [
    Landmark::RightCheekTop,
    Landmark::RightCheekUpper,
    Landmark::RightCheekMid,
    Landmark::RightCheekLower,
    Landmark::RightJawUpper,
    Landmark::RightJawMid,
    Landmark::RightJawLower,
];

/// Left face contour, cheekbone down to jaw.
pub const LEFT_CHEEK: [Landmark; 7] = [
    Landmark::LeftCheekTop,
    Landmark::LeftCheekUpper,
    Landmark::LeftCheekMid,
    Landmark::LeftCheekLower,
    Landmark::LeftJawUpper,
    Landmark::LeftJawMid,
    Landmark::LeftJawLower,
];

/// Integer pixel position in crop-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

/// Exactly [`LANDMARK_COUNT`] points in model order.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    /// Returns `None` unless exactly [`LANDMARK_COUNT`] points are given.
    pub fn new(points: Vec<Point>) -> Option<Self> {
        (points.len() == LANDMARK_COUNT).then_some(Self { points })
    }

    /// Maps normalized model output to crop pixels, truncating toward zero.
    /// Points past [`LANDMARK_COUNT`] (refined iris points) are ignored.
    pub fn from_normalized(normalized: &[(f32, f32)], crop_width: u32, crop_height: u32) -> Option<Self> {
        if normalized.len() < LANDMARK_COUNT {
            return None;
        }
        let w = crop_width as f64;
        let h = crop_height as f64;
        let points = normalized[..LANDMARK_COUNT]
            .iter()
            .map(|&(x, y)| Point::new((x as f64 * w) as i32, (y as f64 * h) as i32))
            .collect();
        Some(Self { points })
    }

    pub fn point(&self, landmark: Landmark) -> Point {
        self.points[landmark.index()]
    }

    pub fn x(&self, landmark: Landmark) -> f64 {
        self.point(landmark).x as f64
    }

    pub fn y(&self, landmark: Landmark) -> f64 {
        self.point(landmark).y as f64
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
