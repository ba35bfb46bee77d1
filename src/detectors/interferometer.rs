//! # Interferometer sites
//!
//! Earth-fixed description of a ground-based L-shaped interferometer: the
//! position of its vertex (beam splitter) and the unit directions of its two
//! arms, in the geocentric Earth-fixed Cartesian frame (ITRF-like, meters).
//!
//! The detector response tensor `D = ½ (x̂ x̂ᵀ − ŷ ŷᵀ)` is precomputed at
//! construction so that the per-sample antenna pattern evaluation is a pair of
//! quadratic forms.
//!
//! Site data are the published vertex locations and arm directions of the
//! LIGO Hanford, LIGO Livingston, Virgo and KAGRA 4km/3km interferometers.

use nalgebra::{Matrix3, Vector3};

use crate::constants::{Meter, SPEED_OF_LIGHT};

/// Precomputed Earth-fixed geometry of one interferometer.
#[derive(Debug, Clone, PartialEq)]
pub struct Interferometer {
    /// Vertex position in the Earth-fixed frame, **meters**.
    pub vertex: Vector3<Meter>,

    /// Unit vector along the x arm.
    pub x_arm: Vector3<f64>,

    /// Unit vector along the y arm.
    pub y_arm: Vector3<f64>,

    /// Response tensor `½ (x xᵀ − y yᵀ)`.
    response: Matrix3<f64>,
}

impl Interferometer {
    /// Build an interferometer from its vertex and arm directions.
    ///
    /// Arm directions are normalized before the response tensor is formed.
    pub fn new(vertex: Vector3<Meter>, x_arm: Vector3<f64>, y_arm: Vector3<f64>) -> Self {
        let x_arm = x_arm.normalize();
        let y_arm = y_arm.normalize();
        let response = 0.5 * (x_arm * x_arm.transpose() - y_arm * y_arm.transpose());

        Interferometer {
            vertex,
            x_arm,
            y_arm,
            response,
        }
    }

    pub fn response(&self) -> &Matrix3<f64> {
        &self.response
    }

    /// Antenna pattern `(F+, F×)` for a source at Earth-fixed latitude/longitude
    /// and zero polarization angle.
    ///
    /// Arguments
    /// -----------------
    /// * `lat`: Earth-fixed latitude of the source, **radians**.
    /// * `lon`: Earth-fixed longitude of the source, **radians**.
    ///
    /// Return
    /// ----------
    /// * `(F+, F×)` with `F+ = XᵀDX − YᵀDY` and `F× = 2 XᵀDY`, where `X`, `Y`
    ///   are the polarization basis vectors at ψ = 0:
    ///
    /// ```text
    /// X = ( sin λ, −cos λ, 0 )
    /// Y = ( −cos λ sin φ, −sin λ sin φ, cos φ )
    /// ```
    pub fn antenna_pattern(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let x = Vector3::new(sin_lon, -cos_lon, 0.0);
        let y = Vector3::new(-cos_lon * sin_lat, -sin_lon * sin_lat, cos_lat);

        let dx = self.response * x;
        let dy = self.response * y;

        (x.dot(&dx) - y.dot(&dy), 2.0 * x.dot(&dy))
    }

    /// Arrival time at the vertex minus arrival time at the geocenter, **seconds**,
    /// for a plane wave coming from Earth-fixed `(lat, lon)`.
    pub fn geocenter_delay(&self, lat: f64, lon: f64) -> f64 {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let source_direction = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

        -self.vertex.dot(&source_direction) / SPEED_OF_LIGHT
    }

    /// Light travel time between two vertices, **seconds**.
    pub fn light_travel_time(&self, other: &Interferometer) -> f64 {
        (self.vertex - other.vertex).norm() / SPEED_OF_LIGHT
    }
}

pub(crate) fn lho() -> Interferometer {
    Interferometer::new(
        Vector3::new(-2.161_414_926_36e6, -3.834_695_178_89e6, 4.600_350_226_64e6),
        Vector3::new(-0.223_892_661_54, 0.799_830_627_46, 0.556_904_878_31),
        Vector3::new(-0.913_978_185_74, 0.026_094_039_89, -0.404_923_421_25),
    )
}

pub(crate) fn llo() -> Interferometer {
    Interferometer::new(
        Vector3::new(-7.427_604_472_38e4, -5.496_283_719_71e6, 3.224_257_017_44e6),
        Vector3::new(-0.954_574_121_53, -0.141_580_773_40, -0.262_189_113_24),
        Vector3::new(0.297_741_568_94, -0.487_910_336_47, -0.820_544_612_86),
    )
}

pub(crate) fn virgo() -> Interferometer {
    Interferometer::new(
        Vector3::new(4.546_374_099_00e6, 8.429_896_976_26e5, 4.378_576_962_41e6),
        Vector3::new(-0.700_458_214_79, 0.208_489_486_19, 0.682_561_662_77),
        Vector3::new(-0.053_792_553_68, -0.969_081_805_49, 0.240_804_517_08),
    )
}

pub(crate) fn kagra() -> Interferometer {
    Interferometer::new(
        Vector3::new(-3_777_336.024, 3_484_898.411, 3_765_313.697),
        Vector3::new(-0.375_904_0, -0.836_158_3, 0.399_418_9),
        Vector3::new(0.716_437_8, 0.011_140_76, 0.697_562_0),
    )
}
