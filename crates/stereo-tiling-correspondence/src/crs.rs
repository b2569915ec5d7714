use serde::{Deserialize, Serialize};

/// Kind of terrain coordinate reference system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrsKind {
    #[default]
    Projected,
    /// Angular units (degrees).
    Geographic,
}

/// Scale applied to geographic coordinates before triangulating.
pub const GEOGRAPHIC_PRECISION_FACTOR: f64 = 1000.0;

/// EPSG codes of the geographic 2D/3D systems met in practice.
const GEOGRAPHIC_EPSG: &[u32] = &[
    4326, // WGS 84
    4979, // WGS 84 3D
    4258, // ETRS89
    4937, // ETRS89 3D
    4269, // NAD83
    4171, // RGF93
    4283, // GDA94
    7844, // GDA2020
    4612, // JGD2000
    6668, // JGD2011
    4490, // CGCS2000
    4674, // SIRGAS 2000
    4230, // ED50
    4267, // NAD27
];

impl CrsKind {
    pub fn from_epsg(epsg: u32) -> Self {
        if GEOGRAPHIC_EPSG.contains(&epsg) {
            CrsKind::Geographic
        } else {
            CrsKind::Projected
        }
    }

    #[inline]
    pub fn precision_factor(self) -> f64 {
        match self {
            CrsKind::Projected => 1.0,
            CrsKind::Geographic => GEOGRAPHIC_PRECISION_FACTOR,
        }
    }
}
