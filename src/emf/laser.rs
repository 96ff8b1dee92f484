//! Laser pulse initialization.
//!
//! Pulses are summed into the field buffers at setup time: a linearly
//! polarized carrier under a longitudinal envelope that is sin²-ramped on
//! the rise and fall, unity on the flat top and zero outside. Gaussian
//! pulses additionally carry the 2D paraxial transverse profile (spot size,
//! wavefront curvature and Gouy phase) about a focal plane.

use crate::{Error, Result};

/// Transverse profile of a laser pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaserKind {
    /// Infinite plane wavefronts.
    Plane,
    /// 2D paraxial Gaussian beam.
    Gaussian {
        /// Beam waist at focus.
        w0: f64,
        /// x position of the focal plane.
        focus: f64,
        /// y position of the propagation axis.
        axis: f64,
    },
}

/// A laser pulse propagating along +x.
#[derive(Debug, Clone, PartialEq)]
pub struct Laser {
    /// Transverse profile.
    pub kind: LaserKind,
    /// Normalized peak vector potential.
    pub a0: f64,
    /// Carrier frequency (normalized units).
    pub omega0: f64,
    /// Polarization angle in the (y, z) plane; 0 = y polarized.
    pub polarization: f64,
    /// x position of the pulse front.
    pub start: f64,
    /// Full width at half maximum of the envelope. When positive it
    /// overrides `rise`/`flat`/`fall` as `rise = fall = fwhm/2, flat = 0`.
    pub fwhm: f64,
    /// Envelope rise length.
    pub rise: f64,
    /// Envelope flat-top length.
    pub flat: f64,
    /// Envelope fall length.
    pub fall: f64,
}

impl Default for Laser {
    fn default() -> Self {
        Self {
            kind: LaserKind::Plane,
            a0: 1.0,
            omega0: 10.0,
            polarization: 0.0,
            start: 0.0,
            fwhm: 0.0,
            rise: 0.0,
            flat: 0.0,
            fall: 0.0,
        }
    }
}

impl Laser {
    /// Validate the pulse parameters.
    pub fn validate(&self) -> Result<()> {
        if self.fwhm != 0.0 && self.fwhm <= 0.0 {
            return Err(Error::Config(format!(
                "laser fwhm = {} but must be positive",
                self.fwhm
            )));
        }
        if self.fwhm == 0.0 {
            if self.rise < 0.0 || self.flat < 0.0 || self.fall < 0.0 {
                return Err(Error::Config(
                    "laser rise/flat/fall lengths must be non-negative".into(),
                ));
            }
            if self.rise + self.flat + self.fall <= 0.0 {
                return Err(Error::Config(
                    "laser envelope has zero length; set fwhm or rise/flat/fall".into(),
                ));
            }
        }
        if !(self.omega0 > 0.0) {
            return Err(Error::Config(format!(
                "laser omega0 = {} but must be positive",
                self.omega0
            )));
        }
        if let LaserKind::Gaussian { w0, .. } = self.kind {
            if !(w0 > 0.0) {
                return Err(Error::Config(format!(
                    "laser W0 = {w0} but must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Envelope lengths after resolving `fwhm`.
    pub(crate) fn ramps(&self) -> (f64, f64, f64) {
        if self.fwhm > 0.0 {
            (0.5 * self.fwhm, 0.0, 0.5 * self.fwhm)
        } else {
            (self.rise, self.flat, self.fall)
        }
    }

    /// Longitudinal envelope at position x; the pulse front sits at
    /// `start` and the envelope extends backwards from it.
    pub(crate) fn envelope(&self, x: f64) -> f64 {
        let (rise, flat, fall) = self.ramps();
        let g = self.start - x;
        if g < 0.0 || g > rise + flat + fall {
            0.0
        } else if g < rise {
            let s = (std::f64::consts::FRAC_PI_2 * g / rise).sin();
            s * s
        } else if g < rise + flat {
            1.0
        } else {
            let s = (std::f64::consts::FRAC_PI_2 * (rise + flat + fall - g) / fall).sin();
            s * s
        }
    }

    /// Carrier at position x (plane pulses).
    pub(crate) fn carrier(&self, x: f64) -> f64 {
        (self.omega0 * (x - self.start)).cos()
    }

    /// Transverse amplitude and phase factor of a Gaussian beam at (x, y).
    ///
    /// In 2D the beam amplitude decays as `sqrt(W0/W(z))`; the phase picks
    /// up the wavefront curvature and half the Gouy shift.
    pub(crate) fn gauss_phase(&self, x: f64, y: f64) -> f64 {
        let LaserKind::Gaussian { w0, focus, axis } = self.kind else {
            return 1.0;
        };
        let z = x - focus;
        let r = y - axis;
        let z_r = 0.5 * self.omega0 * w0 * w0;
        let rel = 1.0 + (z / z_r) * (z / z_r);
        let curv = 0.5 * r * r * z / (z_r * z_r + z * z);
        let gouy = 0.5 * (z / z_r).atan();
        (1.0 / rel).sqrt().sqrt()
            * (-r * r / (w0 * w0 * rel)).exp()
            * (self.omega0 * (z + curv) - gouy).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let ok = Laser {
            fwhm: 2.0,
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_env = Laser::default(); // no fwhm, no ramps
        assert!(bad_env.validate().is_err());

        let bad_rise = Laser {
            rise: -1.0,
            flat: 1.0,
            ..Default::default()
        };
        assert!(bad_rise.validate().is_err());

        let bad_w0 = Laser {
            kind: LaserKind::Gaussian {
                w0: 0.0,
                focus: 0.0,
                axis: 0.0,
            },
            fwhm: 1.0,
            ..Default::default()
        };
        assert!(bad_w0.validate().is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let l = Laser {
            start: 10.0,
            rise: 2.0,
            flat: 3.0,
            fall: 2.0,
            fwhm: 0.0,
            ..Default::default()
        };
        assert_eq!(l.envelope(11.0), 0.0); // ahead of the front
        assert_eq!(l.envelope(2.9), 0.0); // behind the tail
        assert!((l.envelope(9.0) - 0.5).abs() < 1e-12); // mid rise
        assert_eq!(l.envelope(6.0), 1.0); // flat top
        assert!((l.envelope(4.0) - 0.5).abs() < 1e-12); // mid fall
    }

    #[test]
    fn test_fwhm_overrides_ramps() {
        let l = Laser {
            start: 5.0,
            fwhm: 2.0,
            rise: 100.0,
            ..Default::default()
        };
        let (rise, flat, fall) = l.ramps();
        assert_eq!((rise, flat, fall), (1.0, 0.0, 1.0));
        assert_eq!(l.envelope(4.0), 1.0); // peak between rise and fall
    }

    #[test]
    fn test_gauss_peaks_on_axis() {
        let l = Laser {
            kind: LaserKind::Gaussian {
                w0: 1.0,
                focus: 0.0,
                axis: 2.0,
            },
            omega0: 5.0,
            fwhm: 2.0,
            ..Default::default()
        };
        let on = l.gauss_phase(0.0, 2.0).abs();
        let off = l.gauss_phase(0.0, 3.5).abs();
        assert!(on > off);
        assert!((on - 1.0).abs() < 1e-12); // cos(0) at focus, on axis
    }
}
