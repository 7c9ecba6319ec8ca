//! Physical and radiative properties of scene objects.
//!
//! Properties come from a string key/value bag attached to each referenced
//! document object. Resolution never fails: absent keys and unparsable values
//! fall back to the documented defaults.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::UID;

pub const KEY_KELVIN: &str = "kelvin";
pub const KEY_TEMPERATURE_FIXED: &str = "temperature-fixed";
pub const KEY_DIFFUSE_EMISSION: &str = "diffuse-emission";
pub const KEY_THICKNESS: &str = "thickness";
pub const KEY_DENSITY: &str = "density";
pub const KEY_HEAT_CAPACITY: &str = "heat-capacity";
pub const KEY_HEAT_CONDUCTIVITY: &str = "heat-conductivity";
pub const KEY_DIFFUSE_REFLECTANCE: &str = "diffuse-reflectance";
pub const KEY_SPECULAR_REFLECTANCE: &str = "specular-reflectance";
pub const KEY_TRACEABLE: &str = "traceable";

/// Per-object record handed to the engine.
///
/// Field order and `repr(C)` layout are part of the engine contract.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    /// First vertex of this object in the global vertex array.
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// First face of this object in the global face array.
    pub indices_offset: u32,
    /// Number of faces (triangles) of this object.
    pub indices_count: u32,

    /// Initial temperature in K.
    pub kelvin: f32,
    /// Dirichlet boundary: the temperature is held at `kelvin`.
    pub temperature_fixed: bool,

    /// Thickness in m.
    pub thickness: f32,
    /// Density in kg/m^3.
    pub density: f32,
    /// Specific heat capacity in J/(kg*K).
    pub heat_capacity: f32,
    /// Thermal conductivity in W/(m*K).
    pub heat_conductivity: f32,

    pub diffuse_reflectance: f32,
    pub specular_reflectance: f32,

    pub diffuse_emission: bool,
    pub traceable: bool,
}

impl Default for ObjectProperties {
    fn default() -> Self {
        Self {
            vertex_offset: 0,
            vertex_count: 0,
            indices_offset: 0,
            indices_count: 0,
            kelvin: 0.0,
            temperature_fixed: false,
            thickness: 1.0,
            density: 1.0,
            heat_capacity: 1.0,
            heat_conductivity: 1.0,
            diffuse_reflectance: 0.5,
            specular_reflectance: 0.0,
            diffuse_emission: true,
            traceable: true,
        }
    }
}

/// Read-only string lookup over an object's attributes.
pub trait AttributeLookup {
    fn get(&self, key: &str) -> Option<&str>;
}

impl AttributeLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl AttributeLookup for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

impl<T: AttributeLookup + ?Sized> AttributeLookup for &T {
    fn get(&self, key: &str) -> Option<&str> {
        (**self).get(key)
    }
}

/// Parses a float attribute. Surrounding whitespace is ignored.
fn parse_f32(lookup: &impl AttributeLookup, key: &str) -> Option<f32> {
    lookup.get(key)?.trim().parse::<f32>().ok()
}

fn float_or(lookup: &impl AttributeLookup, key: &str, default: f32) -> f32 {
    parse_f32(lookup, key).unwrap_or(default)
}

/// Booleans are stored as floats; only exactly `1.0` is true.
fn flag_or(lookup: &impl AttributeLookup, key: &str, default: bool) -> bool {
    parse_f32(lookup, key).map_or(default, |v| v == 1.0)
}

/// Resolves a fully-defaulted property record from an attribute lookup.
///
/// Offsets and counts are left at zero; they are assigned while flattening.
pub fn resolve_properties(lookup: &impl AttributeLookup) -> ObjectProperties {
    let d = ObjectProperties::default();
    ObjectProperties {
        kelvin: float_or(lookup, KEY_KELVIN, d.kelvin),
        temperature_fixed: flag_or(lookup, KEY_TEMPERATURE_FIXED, d.temperature_fixed),
        thickness: float_or(lookup, KEY_THICKNESS, d.thickness),
        density: float_or(lookup, KEY_DENSITY, d.density),
        heat_capacity: float_or(lookup, KEY_HEAT_CAPACITY, d.heat_capacity),
        heat_conductivity: float_or(lookup, KEY_HEAT_CONDUCTIVITY, d.heat_conductivity),
        diffuse_reflectance: float_or(lookup, KEY_DIFFUSE_REFLECTANCE, d.diffuse_reflectance),
        specular_reflectance: float_or(lookup, KEY_SPECULAR_REFLECTANCE, d.specular_reflectance),
        diffuse_emission: flag_or(lookup, KEY_DIFFUSE_EMISSION, d.diffuse_emission),
        traceable: flag_or(lookup, KEY_TRACEABLE, d.traceable),
        ..d
    }
}

/// Why an object's attributes could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceIssue {
    NotReferenced,
    BlankId,
    ObjectMissing,
    NoDocument,
}

impl fmt::Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReferenceIssue::NotReferenced => {
                "Geometry is not referenced and therefore doesn't have attributes."
            }
            ReferenceIssue::BlankId => "Reference ID is blank.",
            ReferenceIssue::ObjectMissing => {
                "Referenced object no longer exists in the current document."
            }
            ReferenceIssue::NoDocument => "Referenced object is not associated with a document.",
        };
        f.write_str(text)
    }
}

fn default_true() -> bool {
    true
}

/// One geometry entry from the front end.
///
/// The paired mesh lives at the same position in the mesh list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Document id of the referenced object. `None` for geometry created on the fly.
    #[serde(default)]
    pub reference: Option<UID>,
    /// False once the referenced object was deleted from its document.
    #[serde(default = "default_true")]
    pub object_exists: bool,
    /// False if the referenced object is not attached to any document.
    #[serde(default = "default_true")]
    pub in_document: bool,
    /// User strings of the referenced object.
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl SceneObject {
    /// A valid reference carrying the given attributes.
    pub fn referenced<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            reference: Some(UID::new()),
            object_exists: true,
            in_document: true,
            attributes: Some(
                attributes
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Geometry without a document reference.
    pub fn unreferenced() -> Self {
        Self {
            reference: None,
            object_exists: false,
            in_document: false,
            attributes: None,
        }
    }

    /// Lists everything that prevents reading the attributes, in check order.
    ///
    /// Existence and document checks only run while the reference is still valid.
    pub fn reference_issues(&self) -> Vec<ReferenceIssue> {
        let mut issues = Vec::new();
        match self.reference {
            None => {
                issues.push(ReferenceIssue::NotReferenced);
                issues.push(ReferenceIssue::BlankId);
            }
            Some(id) if id.is_blank() => issues.push(ReferenceIssue::BlankId),
            Some(_) => {
                if !self.object_exists {
                    issues.push(ReferenceIssue::ObjectMissing);
                } else if !self.in_document {
                    issues.push(ReferenceIssue::NoDocument);
                }
            }
        }
        issues
    }

    /// Resolves the properties of this object.
    ///
    /// Invalid references yield the defaults together with the reasons.
    pub fn resolve(&self) -> (ObjectProperties, Vec<ReferenceIssue>) {
        let issues = self.reference_issues();
        if !issues.is_empty() {
            return (ObjectProperties::default(), issues);
        }
        let props = match &self.attributes {
            Some(bag) => resolve_properties(bag),
            None => ObjectProperties::default(),
        };
        (props, issues)
    }
}
