pub mod channel;
pub mod compartment;
pub mod membrane;
pub mod synapse;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::RESTING_POTENTIAL;
use crate::dimension::{MicroFaradsPerSquareCm, Microns, OhmCm, OhmSquareCm};
use crate::error::{Error, Result};
use crate::neuron::compartment::{AttachmentPoint, Compartment, CompartmentRole, Geometry};
use crate::neuron::membrane::Membrane;

/// The morphologies the builder knows how to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "Simple Soma", alias = "SimpleSoma")]
    SimpleSoma,
    #[serde(rename = "Dendrite (Passive)", alias = "PassiveDendrite")]
    PassiveDendrite,
    #[serde(rename = "Multi-Compartment", alias = "MultiCompartment")]
    MultiCompartment,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::SimpleSoma,
        ModelKind::PassiveDendrite,
        ModelKind::MultiCompartment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::SimpleSoma => "Simple Soma",
            ModelKind::PassiveDendrite => "Dendrite (Passive)",
            ModelKind::MultiCompartment => "Multi-Compartment",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModelKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Simple Soma" | "SimpleSoma" => Ok(ModelKind::SimpleSoma),
            "Dendrite (Passive)" | "PassiveDendrite" => Ok(ModelKind::PassiveDendrite),
            "Multi-Compartment" | "MultiCompartment" => Ok(ModelKind::MultiCompartment),
            _ => Err(Error::UnknownModelKind(s.to_string())),
        }
    }
}

/// A point on one compartment of one neuron in a network.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub neuron: usize,
    pub compartment: usize,
    /// Relative position along the compartment, in [0, 1].
    pub position: f64,
}

impl Site {
    pub fn soma(neuron: usize, position: f64) -> Site {
        Site {
            neuron,
            compartment: 0,
            position,
        }
    }
}

/// A tree of compartments rooted at the soma, which is always index 0.
#[derive(Clone, Debug, PartialEq)]
pub struct Neuron {
    pub kind: ModelKind,
    pub compartments: Vec<Compartment>,
}

impl Neuron {
    pub fn soma(&self) -> &Compartment {
        &self.compartments[0]
    }

    /// Index of the axon compartment, if the morphology has one.
    pub fn axon(&self) -> Option<usize> {
        self.compartments
            .iter()
            .position(|c| c.role == CompartmentRole::Axon)
    }

    /// Index of the dendrite attached directly to the soma, if any.
    pub fn first_dendrite(&self) -> Option<usize> {
        self.compartments.iter().position(|c| {
            c.role == CompartmentRole::Dendrite && c.attachment.map(|a| a.parent) == Some(0)
        })
    }

    pub fn compartment(&self, name: &str) -> Option<(usize, &Compartment)> {
        self.compartments
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
    }

    /// Determine each compartment's children.
    pub fn children(&self) -> HashMap<usize, Vec<usize>> {
        let mut children_map = HashMap::new();
        for (index, compartment) in self.compartments.iter().enumerate() {
            if let Some(attachment) = compartment.attachment {
                children_map
                    .entry(attachment.parent)
                    .or_insert_with(Vec::new)
                    .push(index);
            }
        }
        children_map
    }

    pub fn len(&self) -> usize {
        self.compartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compartments.is_empty()
    }
}

const AXIAL_RESISTANCE: OhmCm = OhmCm(100.0);

const SOMA_ONLY_GEOMETRY: Geometry = Geometry {
    length: Microns(10.0),
    diameter: Microns(10.0),
};

const CABLE_GEOMETRY: Geometry = Geometry {
    length: Microns(100.0),
    diameter: Microns(2.0),
};

/// Build a fresh neuron of the given kind. The leak conductance of every
/// compartment is `1 / membrane_resistance`, and every compartment gets the
/// same specific capacitance.
pub fn build(
    kind: ModelKind,
    membrane_resistance: OhmSquareCm,
    membrane_capacitance: MicroFaradsPerSquareCm,
) -> Result<Neuron> {
    let compartment = |name: &str, role: CompartmentRole, geometry: Geometry| {
        Compartment::new(
            name,
            role,
            geometry,
            AXIAL_RESISTANCE,
            Membrane::passive(membrane_resistance, membrane_capacitance),
        )
    };

    let compartments = match kind {
        ModelKind::SimpleSoma => vec![compartment(
            "soma",
            CompartmentRole::Soma,
            SOMA_ONLY_GEOMETRY,
        )],
        ModelKind::PassiveDendrite => vec![
            compartment("soma", CompartmentRole::Soma, CABLE_GEOMETRY),
            compartment("dend", CompartmentRole::Dendrite, CABLE_GEOMETRY)
                .attach(0, AttachmentPoint::Distal),
        ],
        ModelKind::MultiCompartment => {
            let mut soma = compartment("soma", CompartmentRole::Soma, CABLE_GEOMETRY);
            let mut axon = compartment("axon", CompartmentRole::Axon, CABLE_GEOMETRY)
                .attach(0, AttachmentPoint::Proximal);
            soma.membrane.insert_active(&RESTING_POTENTIAL);
            axon.membrane.insert_active(&RESTING_POTENTIAL);
            vec![
                soma,
                compartment("dend1", CompartmentRole::Dendrite, CABLE_GEOMETRY)
                    .attach(0, AttachmentPoint::Distal),
                compartment("dend2", CompartmentRole::Dendrite, CABLE_GEOMETRY)
                    .attach(1, AttachmentPoint::Distal),
                compartment("dend3", CompartmentRole::Dendrite, CABLE_GEOMETRY)
                    .attach(2, AttachmentPoint::Distal),
                axon,
            ]
        }
    };

    Ok(Neuron { kind, compartments })
}

/// Build from a model name such as `"Multi-Compartment"`.
pub fn build_named(
    name: &str,
    membrane_resistance: OhmSquareCm,
    membrane_capacitance: MicroFaradsPerSquareCm,
) -> Result<Neuron> {
    build(name.parse()?, membrane_resistance, membrane_capacitance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn neuron(kind: ModelKind) -> Neuron {
        build(kind, OhmSquareCm(10000.0), MicroFaradsPerSquareCm(1.0)).unwrap()
    }

    #[test]
    fn simple_soma_is_a_single_compartment() {
        let n = neuron(ModelKind::SimpleSoma);
        assert_eq!(n.len(), 1);
        assert_eq!(n.soma().name, "soma");
        assert_eq!(n.soma().geometry.length, Microns(10.0));
        assert!(n.soma().attachment.is_none());
        assert!(n.axon().is_none());
        assert!(n.first_dendrite().is_none());
    }

    #[test]
    fn passive_dendrite_hangs_from_soma_distal_end() {
        let n = neuron(ModelKind::PassiveDendrite);
        let (index, dend) = n.compartment("dend").unwrap();
        assert_eq!(index, 1);
        let attachment = dend.attachment.unwrap();
        assert_eq!(attachment.parent, 0);
        assert_eq!(attachment.point, AttachmentPoint::Distal);
        assert_eq!(n.first_dendrite(), Some(1));
        assert!(n.compartments.iter().all(|c| !c.membrane.is_active()));
    }

    #[test]
    fn multi_compartment_topology() {
        let n = neuron(ModelKind::MultiCompartment);
        let names: Vec<_> = n.compartments.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["soma", "dend1", "dend2", "dend3", "axon"]);

        let children = n.children();
        assert_eq!(children[&0], vec![1, 4]);
        assert_eq!(children[&1], vec![2]);
        assert_eq!(children[&2], vec![3]);

        let axon = n.axon().unwrap();
        assert_eq!(axon, 4);
        assert_eq!(
            n.compartments[axon].attachment.unwrap().point,
            AttachmentPoint::Proximal
        );
        for c in n.compartments.iter().skip(1) {
            assert!(c.attachment.is_some());
        }
    }

    #[test]
    fn only_soma_and_axon_are_active() {
        let n = neuron(ModelKind::MultiCompartment);
        for c in n.compartments.iter() {
            let expect_active = matches!(c.role, CompartmentRole::Soma | CompartmentRole::Axon);
            assert_eq!(c.membrane.is_active(), expect_active, "{}", c.name);
        }
    }

    #[test]
    fn electrical_parameters_are_uniform() {
        let n = build(
            ModelKind::MultiCompartment,
            OhmSquareCm(20000.0),
            MicroFaradsPerSquareCm(2.5),
        )
        .unwrap();
        for c in n.compartments.iter() {
            assert_relative_eq!(c.membrane.leak.conductance.0, 5e-5);
            assert_eq!(c.membrane.leak.reversal.0, -65.0);
            assert_eq!(c.membrane.capacitance.0, 2.5);
            assert_eq!(c.axial_resistance.0, 100.0);
        }
    }

    #[test]
    fn repeated_builds_are_identical() {
        for kind in ModelKind::ALL {
            assert_eq!(neuron(kind), neuron(kind));
        }
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        let result = build_named("Pyramidal", OhmSquareCm(10000.0), MicroFaradsPerSquareCm(1.0));
        assert!(matches!(result, Err(Error::UnknownModelKind(name)) if name == "Pyramidal"));
    }

    #[test]
    fn model_names_round_trip_through_from_str() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("MultiCompartment".parse::<ModelKind>().unwrap(), ModelKind::MultiCompartment);
    }
}
