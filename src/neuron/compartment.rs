use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::dimension::{Microns, OhmCm};
use crate::neuron::membrane::Membrane;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompartmentRole {
    Soma,
    Dendrite,
    Axon,
}

/// Which end of the parent a child compartment hangs from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentPoint {
    Proximal,
    Distal,
}

impl AttachmentPoint {
    /// Relative position along the parent, 0 or 1.
    pub fn position(&self) -> f64 {
        match self {
            AttachmentPoint::Proximal => 0.0,
            AttachmentPoint::Distal => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Index of the parent compartment within the same neuron.
    pub parent: usize,
    pub point: AttachmentPoint,
}

/// A cylindrical compartment shape.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub length: Microns,
    pub diameter: Microns,
}

impl Geometry {
    /// Lateral surface area in cm^2.
    pub fn surface_area(&self) -> f64 {
        PI * self.diameter.cm() * self.length.cm()
    }

    /// Cross-section area in cm^2.
    pub fn cross_section(&self) -> f64 {
        let radius = self.diameter.cm() / 2.0;
        PI * radius * radius
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Compartment {
    pub name: String,
    pub role: CompartmentRole,
    pub geometry: Geometry,
    pub axial_resistance: OhmCm,
    pub membrane: Membrane,
    /// `None` only for the root soma.
    pub attachment: Option<Attachment>,
}

impl Compartment {
    pub fn new(
        name: &str,
        role: CompartmentRole,
        geometry: Geometry,
        axial_resistance: OhmCm,
        membrane: Membrane,
    ) -> Compartment {
        Compartment {
            name: name.to_string(),
            role,
            geometry,
            axial_resistance,
            membrane,
            attachment: None,
        }
    }

    pub fn attach(mut self, parent: usize, point: AttachmentPoint) -> Compartment {
        self.attachment = Some(Attachment { parent, point });
        self
    }

    /// Axial resistance in ohms from the compartment's center to either end.
    pub fn half_axial_resistance(&self) -> f64 {
        self.axial_resistance.0 * self.geometry.length.cm() / 2.0 / self.geometry.cross_section()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{MicroFaradsPerSquareCm, OhmSquareCm};
    use approx::assert_relative_eq;

    fn cylinder(length: f64, diameter: f64) -> Compartment {
        Compartment::new(
            "c",
            CompartmentRole::Dendrite,
            Geometry {
                length: Microns(length),
                diameter: Microns(diameter),
            },
            OhmCm(100.0),
            Membrane::passive(OhmSquareCm(10000.0), MicroFaradsPerSquareCm(1.0)),
        )
    }

    #[test]
    fn surface_area_of_ten_micron_soma() {
        let soma = cylinder(10.0, 10.0);
        assert_relative_eq!(soma.geometry.surface_area(), PI * 1e-6, epsilon = 1e-15);
    }

    #[test]
    fn half_axial_resistance_of_thin_dendrite() {
        // Ra * (L / 2) / (pi r^2) = 100 * 50e-4 / (pi * 1e-8)
        let dendrite = cylinder(100.0, 2.0);
        assert_relative_eq!(
            dendrite.half_axial_resistance(),
            0.5 / (PI * 1e-8),
            max_relative = 1e-12
        );
    }

    #[test]
    fn attach_records_parent_and_end() {
        let child = cylinder(100.0, 2.0).attach(0, AttachmentPoint::Distal);
        let attachment = child.attachment.unwrap();
        assert_eq!(attachment.parent, 0);
        assert_eq!(attachment.point.position(), 1.0);
    }
}
