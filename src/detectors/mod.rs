//! # Detectors & network geometry
//!
//! This module gathers the **detector network** description and the geometry provider
//! consumed by the sky dictionary. It provides:
//!
//! - [`Detector`](crate::detectors::Detector): the known ground-based interferometers,
//!   identified by a single letter (`H`, `L`, `V`, `K`).
//! - [`DetectorNetwork`](crate::detectors::DetectorNetwork): an ordered, validated, immutable
//!   sequence of unique detectors. The first element is the **reference detector**: every
//!   relative delay in the crate is measured from it.
//! - [`DetectorGeometry`](crate::detectors::DetectorGeometry): the seam through which antenna
//!   coefficients and geocenter delays are obtained for a batch of sky locations.
//! - [`EarthFixedGeometry`](crate::detectors::EarthFixedGeometry): the default provider, built on
//!   the [`Interferometer`](crate::detectors::interferometer::Interferometer) site catalog.
//!
//! ## Frames & conventions
//!
//! - Sky locations are **Earth-fixed** `(lat, lon)` in radians; no sidereal time is involved.
//! - Antenna coefficients are evaluated at polarization angle ψ = 0.
//! - Geocenter delays are `t_detector − t_geocenter` in **seconds** (negative when the detector
//!   is closer to the source than the geocenter).
//!
//! ## Layouts
//!
//! ```text
//! antenna_coefficients : nsky × (2·n_det)    row = sample, columns (2d, 2d+1) = (F+, F×) of detector d
//! geocenter_delays     : n_det × nsky        row = detector, column = sample
//! ```

pub mod interferometer;

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::constants::Radian;
use crate::skymarg_errors::SkyMargError;
use interferometer::Interferometer;

/// Known ground-based gravitational-wave interferometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Detector {
    /// LIGO Hanford
    #[serde(rename = "H")]
    H,
    /// LIGO Livingston
    #[serde(rename = "L")]
    L,
    /// Virgo
    #[serde(rename = "V")]
    V,
    /// KAGRA
    #[serde(rename = "K")]
    K,
}

impl Detector {
    /// Single-letter identifier.
    pub fn letter(&self) -> char {
        match self {
            Detector::H => 'H',
            Detector::L => 'L',
            Detector::V => 'V',
            Detector::K => 'K',
        }
    }

    /// Earth-fixed site geometry of this detector.
    pub fn interferometer(&self) -> Interferometer {
        match self {
            Detector::H => interferometer::lho(),
            Detector::L => interferometer::llo(),
            Detector::V => interferometer::virgo(),
            Detector::K => interferometer::kagra(),
        }
    }
}

impl TryFrom<char> for Detector {
    type Error = SkyMargError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'H' => Ok(Detector::H),
            'L' => Ok(Detector::L),
            'V' => Ok(Detector::V),
            'K' => Ok(Detector::K),
            other => Err(SkyMargError::UnknownDetector(other.to_string())),
        }
    }
}

impl FromStr for Detector {
    type Err = SkyMargError;

    /// Accepts the bare letter (`"H"`) or the usual instrument name (`"H1"`, `"K1"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.as_str()) {
            (Some(c), "") | (Some(c), "1") => Detector::try_from(c),
            _ => Err(SkyMargError::UnknownDetector(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Ordered sequence of unique detectors; the first one is the reference detector.
///
/// The invariants (non-empty, no duplicates) are checked by every constructor,
/// including deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Detector>", into = "Vec<Detector>")]
pub struct DetectorNetwork {
    detectors: Vec<Detector>,
}

impl DetectorNetwork {
    /// Validate and build a network.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::EmptyDetectorNetwork`] if `detectors` is empty.
    /// * [`SkyMargError::DuplicateDetector`] if a detector appears twice.
    pub fn new(detectors: Vec<Detector>) -> Result<Self, SkyMargError> {
        if detectors.is_empty() {
            return Err(SkyMargError::EmptyDetectorNetwork);
        }
        for (i, det) in detectors.iter().enumerate() {
            if detectors[..i].contains(det) {
                return Err(SkyMargError::DuplicateDetector(det.letter()));
            }
        }
        Ok(DetectorNetwork { detectors })
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Always `false`: a network holds at least one detector.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// The reference detector (first of the network).
    pub fn reference(&self) -> Detector {
        self.detectors[0]
    }

    pub fn as_slice(&self) -> &[Detector] {
        &self.detectors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detector> {
        self.detectors.iter()
    }
}

impl TryFrom<Vec<Detector>> for DetectorNetwork {
    type Error = SkyMargError;

    fn try_from(detectors: Vec<Detector>) -> Result<Self, Self::Error> {
        DetectorNetwork::new(detectors)
    }
}

impl From<DetectorNetwork> for Vec<Detector> {
    fn from(network: DetectorNetwork) -> Self {
        network.detectors
    }
}

impl FromStr for DetectorNetwork {
    type Err = SkyMargError;

    /// Parse a compact network string such as `"HLV"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let detectors = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(Detector::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        DetectorNetwork::new(detectors)
    }
}

impl TryFrom<&str> for DetectorNetwork {
    type Error = SkyMargError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for DetectorNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for det in &self.detectors {
            write!(f, "{det}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DetectorNetwork {
    type Item = &'a Detector;
    type IntoIter = std::slice::Iter<'a, Detector>;

    fn into_iter(self) -> Self::IntoIter {
        self.detectors.iter()
    }
}

/// Source of the detector-physics primitives used to build a sky dictionary.
///
/// Implementations must be deterministic: the same inputs always give the same
/// outputs, since the dictionary is only reproducible if its geometry is.
pub trait DetectorGeometry {
    /// Antenna coefficients `(F+, F×)` at ψ = 0.
    ///
    /// Return
    /// ----------
    /// * `nsky × (2·n_det)` matrix; columns `2d` and `2d + 1` hold `F+` and `F×` of the
    ///   `d`-th detector of `network`.
    fn antenna_coefficients(
        &self,
        network: &DetectorNetwork,
        lat: &[Radian],
        lon: &[Radian],
    ) -> DMatrix<f64>;

    /// Geocenter delays `t_detector − t_geocenter`, seconds.
    ///
    /// Return
    /// ----------
    /// * `n_det × nsky` matrix.
    fn geocenter_delays(
        &self,
        network: &DetectorNetwork,
        lat: &[Radian],
        lon: &[Radian],
    ) -> DMatrix<f64>;
}

/// Default geometry provider based on the built-in interferometer catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EarthFixedGeometry;

impl DetectorGeometry for EarthFixedGeometry {
    fn antenna_coefficients(
        &self,
        network: &DetectorNetwork,
        lat: &[Radian],
        lon: &[Radian],
    ) -> DMatrix<f64> {
        let sites: Vec<Interferometer> = network.iter().map(Detector::interferometer).collect();
        let mut coefficients = DMatrix::zeros(lat.len(), 2 * sites.len());

        for (i, (&la, &lo)) in lat.iter().zip(lon).enumerate() {
            for (d, site) in sites.iter().enumerate() {
                let (fplus, fcross) = site.antenna_pattern(la, lo);
                coefficients[(i, 2 * d)] = fplus;
                coefficients[(i, 2 * d + 1)] = fcross;
            }
        }
        coefficients
    }

    fn geocenter_delays(
        &self,
        network: &DetectorNetwork,
        lat: &[Radian],
        lon: &[Radian],
    ) -> DMatrix<f64> {
        let sites: Vec<Interferometer> = network.iter().map(Detector::interferometer).collect();
        DMatrix::from_fn(sites.len(), lat.len(), |d, i| {
            sites[d].geocenter_delay(lat[i], lon[i])
        })
    }
}

#[cfg(test)]
mod detectors_test {
    use super::*;

    #[test]
    fn test_network_from_str() {
        let network: DetectorNetwork = "HLV".parse().unwrap();
        assert_eq!(network.len(), 3);
        assert_eq!(network.reference(), Detector::H);
        assert_eq!(network.as_slice(), &[Detector::H, Detector::L, Detector::V]);
        assert_eq!(network.to_string(), "HLV");
    }

    #[test]
    fn test_network_validation() {
        assert_eq!(
            DetectorNetwork::new(vec![]),
            Err(SkyMargError::EmptyDetectorNetwork)
        );
        assert_eq!(
            "HLH".parse::<DetectorNetwork>(),
            Err(SkyMargError::DuplicateDetector('H'))
        );
        assert_eq!(
            "HX".parse::<DetectorNetwork>(),
            Err(SkyMargError::UnknownDetector("X".into()))
        );
    }

    #[test]
    fn test_detector_from_instrument_name() {
        assert_eq!("H1".parse::<Detector>(), Ok(Detector::H));
        assert_eq!("K".parse::<Detector>(), Ok(Detector::K));
        assert!("G2".parse::<Detector>().is_err());
        assert!("".parse::<Detector>().is_err());
    }

    #[test]
    fn test_network_serde_rejects_duplicates() {
        let network: DetectorNetwork = serde_json::from_str(r#"["L","V"]"#).unwrap();
        assert_eq!(network.to_string(), "LV");
        assert!(serde_json::from_str::<DetectorNetwork>(r#"["L","L"]"#).is_err());
    }

    #[test]
    fn test_geometry_layouts() {
        let network: DetectorNetwork = "HLV".parse().unwrap();
        let lat = [0.1, -0.4, 1.2, 0.0];
        let lon = [0.0, 2.5, 4.0, 6.0];

        let fpfc = EarthFixedGeometry.antenna_coefficients(&network, &lat, &lon);
        assert_eq!(fpfc.shape(), (4, 6));

        let delays = EarthFixedGeometry.geocenter_delays(&network, &lat, &lon);
        assert_eq!(delays.shape(), (3, 4));

        let virgo = Detector::V.interferometer();
        assert_eq!(delays[(2, 1)], virgo.geocenter_delay(lat[1], lon[1]));
        assert_eq!(fpfc[(3, 5)], virgo.antenna_pattern(lat[3], lon[3]).1);
    }
}
