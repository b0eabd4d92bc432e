//! Built-in device and model catalog.
//!
//! The catalog is static and read-only. A device (selected by the first
//! letter of a reference designator) fixes the node and reference counts and
//! the models it accepts; a model fixes the stamp shape, the extra dependent
//! variables it introduces and the parameters it understands.

/// Closed set of direct-stamp kinds.
///
/// Each variant corresponds to exactly one row of the stamp table applied by
/// the matrix stamper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StampKind {
    /// `R`: conductance stamp `1/value`.
    Resistor,
    /// `r`: resistance stamp with a branch current.
    ResistorBranch,
    /// `C`: admittance `s*value`.
    Capacitor,
    /// `L`: impedance `s*value` with a branch current.
    Inductor,
    /// `K`: coupling between two inductors.
    MutualInductance,
    /// `V`: independent voltage source.
    VoltageSource,
    /// `I`: independent current source.
    CurrentSource,
    /// `E`: voltage-controlled voltage source.
    Vcvs,
    /// `EZ`: VCVS with output impedance.
    VcvsZ,
    /// `F`: current-controlled current source.
    Cccs,
    /// `G`: voltage-controlled current source.
    Vccs,
    /// `g`: VCCS with its output current as a dependent variable.
    VccsBranch,
    /// `H`: current-controlled voltage source.
    Ccvs,
    /// `HZ`: CCVS with output impedance.
    CcvsZ,
    /// `N`: nullor.
    Nullor,
    /// `T`: ideal transformer.
    Transformer,
    /// `W`: gyrator.
    Gyrator,
}

impl StampKind {
    /// Controlled sources that may serve as a loop-gain reference.
    pub fn is_controlled_source(self) -> bool {
        matches!(
            self,
            StampKind::Vcvs
                | StampKind::VcvsZ
                | StampKind::Cccs
                | StampKind::Vccs
                | StampKind::VccsBranch
                | StampKind::Ccvs
                | StampKind::CcvsZ
        )
    }

    pub fn is_independent_source(self) -> bool {
        matches!(self, StampKind::VoltageSource | StampKind::CurrentSource)
    }
}

/// A parameter understood by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Whether the Laplace variable may appear in the parameter value.
    pub laplace: bool,
}

const fn param(name: &'static str, laplace: bool) -> ParamSpec {
    ParamSpec { name, laplace }
}

/// A built-in model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    /// `None` for models that are expanded from a prototype circuit.
    pub stamp: Option<StampKind>,
    /// Prefixes of the extra dependent variables, e.g. `Io` yields `Io_E1`.
    pub dep_vars: &'static [&'static str],
    pub params: &'static [ParamSpec],
}

impl ModelSpec {
    pub fn requires_expansion(&self) -> bool {
        self.stamp.is_none()
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Node count of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCount {
    Fixed(usize),
    /// Subcircuit calls take every token before the model name.
    Variable,
}

/// A built-in device type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSpec {
    pub letter: char,
    pub description: &'static str,
    pub nodes: NodeCount,
    pub refs: usize,
    /// Whether a positional value (or `value=`) must be given.
    pub value_required: bool,
    /// Accepted built-in models; the first is the default.
    pub models: &'static [&'static str],
}

impl DeviceSpec {
    pub fn default_model(&self) -> Option<&'static str> {
        self.models.first().copied()
    }

    pub fn accepts_model(&self, name: &str) -> bool {
        self.models.contains(&name)
    }
}

pub static DEVICES: &[DeviceSpec] = &[
    DeviceSpec {
        letter: 'C',
        description: "capacitor",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: true,
        models: &["C"],
    },
    DeviceSpec {
        letter: 'D',
        description: "diode",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: false,
        models: &["D"],
    },
    DeviceSpec {
        letter: 'E',
        description: "voltage-controlled voltage source",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["E", "EZ"],
    },
    DeviceSpec {
        letter: 'F',
        description: "current-controlled current source",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["F"],
    },
    DeviceSpec {
        letter: 'G',
        description: "voltage-controlled current source",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["G", "g"],
    },
    DeviceSpec {
        letter: 'H',
        description: "current-controlled voltage source",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["H", "HZ"],
    },
    DeviceSpec {
        letter: 'I',
        description: "independent current source",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: false,
        models: &["I"],
    },
    DeviceSpec {
        letter: 'K',
        description: "mutual inductance",
        nodes: NodeCount::Fixed(0),
        refs: 2,
        value_required: true,
        models: &["K"],
    },
    DeviceSpec {
        letter: 'L',
        description: "inductor",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: true,
        models: &["L"],
    },
    DeviceSpec {
        letter: 'M',
        description: "MOS transistor (small-signal)",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: false,
        models: &["MV"],
    },
    DeviceSpec {
        letter: 'N',
        description: "nullor",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: false,
        models: &["N"],
    },
    DeviceSpec {
        letter: 'O',
        description: "operational amplifier",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: false,
        models: &["OV", "OC"],
    },
    DeviceSpec {
        letter: 'Q',
        description: "bipolar transistor (small-signal)",
        nodes: NodeCount::Fixed(3),
        refs: 0,
        value_required: false,
        models: &["QV"],
    },
    DeviceSpec {
        letter: 'R',
        description: "resistor",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: true,
        models: &["R", "r"],
    },
    DeviceSpec {
        letter: 'T',
        description: "ideal transformer",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["T"],
    },
    DeviceSpec {
        letter: 'V',
        description: "independent voltage source",
        nodes: NodeCount::Fixed(2),
        refs: 0,
        value_required: false,
        models: &["V"],
    },
    DeviceSpec {
        letter: 'W',
        description: "gyrator",
        nodes: NodeCount::Fixed(4),
        refs: 0,
        value_required: true,
        models: &["W"],
    },
    DeviceSpec {
        letter: 'X',
        description: "subcircuit call",
        nodes: NodeCount::Variable,
        refs: 0,
        value_required: false,
        models: &[],
    },
];

const SOURCE_PARAMS: &[ParamSpec] = &[
    param("value", true),
    param("dc", false),
    param("dcvar", false),
    param("noise", false),
];

pub static MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "C",
        stamp: Some(StampKind::Capacitor),
        dep_vars: &[],
        params: &[param("value", false), param("vinit", false)],
    },
    ModelSpec {
        name: "L",
        stamp: Some(StampKind::Inductor),
        dep_vars: &["I"],
        params: &[param("value", false), param("iinit", false)],
    },
    ModelSpec {
        name: "R",
        stamp: Some(StampKind::Resistor),
        dep_vars: &[],
        params: &[
            param("value", false),
            param("dcvar", false),
            param("noisetemp", false),
        ],
    },
    ModelSpec {
        name: "r",
        stamp: Some(StampKind::ResistorBranch),
        dep_vars: &["I"],
        params: &[
            param("value", true),
            param("dcvar", false),
            param("noisetemp", false),
        ],
    },
    ModelSpec {
        name: "K",
        stamp: Some(StampKind::MutualInductance),
        dep_vars: &[],
        params: &[param("value", false)],
    },
    ModelSpec {
        name: "V",
        stamp: Some(StampKind::VoltageSource),
        dep_vars: &["I"],
        params: SOURCE_PARAMS,
    },
    ModelSpec {
        name: "I",
        stamp: Some(StampKind::CurrentSource),
        dep_vars: &[],
        params: SOURCE_PARAMS,
    },
    ModelSpec {
        name: "E",
        stamp: Some(StampKind::Vcvs),
        dep_vars: &["Io"],
        params: &[param("value", true)],
    },
    ModelSpec {
        name: "EZ",
        stamp: Some(StampKind::VcvsZ),
        dep_vars: &["Io"],
        params: &[param("value", true), param("zo", true)],
    },
    ModelSpec {
        name: "F",
        stamp: Some(StampKind::Cccs),
        dep_vars: &["Ii"],
        params: &[param("value", true)],
    },
    ModelSpec {
        name: "G",
        stamp: Some(StampKind::Vccs),
        dep_vars: &[],
        params: &[param("value", true)],
    },
    ModelSpec {
        name: "g",
        stamp: Some(StampKind::VccsBranch),
        dep_vars: &["Io"],
        params: &[param("value", true)],
    },
    ModelSpec {
        name: "H",
        stamp: Some(StampKind::Ccvs),
        dep_vars: &["Io", "Ii"],
        params: &[param("value", true)],
    },
    ModelSpec {
        name: "HZ",
        stamp: Some(StampKind::CcvsZ),
        dep_vars: &["Io", "Ii"],
        params: &[param("value", true), param("zo", true)],
    },
    ModelSpec {
        name: "N",
        stamp: Some(StampKind::Nullor),
        dep_vars: &["Io"],
        params: &[],
    },
    ModelSpec {
        name: "T",
        stamp: Some(StampKind::Transformer),
        dep_vars: &["Io"],
        params: &[param("value", false)],
    },
    ModelSpec {
        name: "W",
        stamp: Some(StampKind::Gyrator),
        dep_vars: &[],
        params: &[param("value", false)],
    },
    ModelSpec {
        name: "D",
        stamp: None,
        dep_vars: &[],
        params: &[param("gd", false), param("cd", false)],
    },
    ModelSpec {
        name: "QV",
        stamp: None,
        dep_vars: &[],
        params: &[
            param("gm", false),
            param("gpi", false),
            param("cpi", false),
            param("cbc", false),
            param("go", false),
        ],
    },
    ModelSpec {
        name: "MV",
        stamp: None,
        dep_vars: &[],
        params: &[
            param("gm", false),
            param("go", false),
            param("gb", false),
            param("cgs", false),
            param("cgd", false),
        ],
    },
    ModelSpec {
        name: "OV",
        stamp: None,
        dep_vars: &[],
        params: &[param("av", true), param("zo", true), param("cd", false)],
    },
    ModelSpec {
        name: "OC",
        stamp: None,
        dep_vars: &[],
        params: &[param("gm", true), param("cd", false)],
    },
];

/// Look up a device by the first letter of a reference designator.
pub fn device(letter: char) -> Option<&'static DeviceSpec> {
    let letter = letter.to_ascii_uppercase();
    DEVICES.iter().find(|d| d.letter == letter)
}

/// Look up a built-in model by exact (case-sensitive) name.
pub fn model(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.name == name)
}

/// Look up the built-in model implemented by a stamp kind.
pub fn model_for_stamp(kind: StampKind) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.stamp == Some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_device_model_exists() {
        for dev in DEVICES {
            for name in dev.models {
                assert!(model(name).is_some(), "device {} lists unknown model {}", dev.letter, name);
            }
        }
    }

    #[test]
    fn test_model_lookup_is_case_sensitive() {
        assert_eq!(model("G").and_then(|m| m.stamp), Some(StampKind::Vccs));
        assert_eq!(model("g").and_then(|m| m.stamp), Some(StampKind::VccsBranch));
        assert!(model("ez").is_none());
    }

    #[test]
    fn test_device_lookup() {
        let r = device('r').unwrap();
        assert_eq!(r.nodes, NodeCount::Fixed(2));
        assert_eq!(r.default_model(), Some("R"));
        assert_eq!(device('X').unwrap().nodes, NodeCount::Variable);
        assert!(device('Z').is_none());
    }

    #[test]
    fn test_expansion_models() {
        assert!(model("OV").unwrap().requires_expansion());
        assert!(!model("E").unwrap().requires_expansion());
        assert!(model("EZ").unwrap().param("zo").unwrap().laplace);
        assert!(!model("C").unwrap().param("value").unwrap().laplace);
    }
}
