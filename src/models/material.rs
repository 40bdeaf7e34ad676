//! Box material and quality enums
//!
//! Quality is material-dependent: wooden boxes are graded across the full
//! range, plastic boxes only distinguish first grade from waste. Historical
//! intake data still arrives with `second`/`extra` on plastic, which is
//! collapsed to `first` before validation.

use serde::{Deserialize, Serialize};

/// Packing box material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "box_material", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Wood,
    Plastic,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Wood => "wood",
            Material::Plastic => "plastic",
        }
    }

    /// Qualities accepted for this material, after normalization.
    pub fn allowed_qualities(&self) -> &'static [Quality] {
        match self {
            Material::Wood => &[Quality::Extra, Quality::First, Quality::Second, Quality::Waste],
            Material::Plastic => &[Quality::First, Quality::Waste],
        }
    }
}

/// Packed-output quality grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "box_quality", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Extra,
    First,
    Second,
    /// Reserved grade, excluded from allocation.
    Waste,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Extra => "extra",
            Quality::First => "first",
            Quality::Second => "second",
            Quality::Waste => "waste",
        }
    }
}

/// Collapse plastic `second`/`extra` to `first`; everything else unchanged.
pub fn normalize_quality(material: Material, quality: Quality) -> Quality {
    match (material, quality) {
        (Material::Plastic, Quality::Second) | (Material::Plastic, Quality::Extra) => {
            Quality::First
        }
        (_, q) => q,
    }
}

/// Whether the (material, quality) pair is valid after normalization.
pub fn quality_valid_for(material: Material, quality: Quality) -> bool {
    material.allowed_qualities().contains(&quality)
}
