use codecity_common::RgbColor;
use serde::{Deserialize, Serialize};

/// Named colors of the city, supplied by the host at construction.
///
/// Deserializes from `#rrggbb` strings. Missing fields fall back to the
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub foundation: RgbColor,
    pub component_even: RgbColor,
    pub component_odd: RgbColor,
    pub class: RgbColor,
    pub highlighted_entity: RgbColor,
    pub component_text: RgbColor,
    pub class_text: RgbColor,
    pub communication: RgbColor,
    pub communication_arrow: RgbColor,
    pub background: RgbColor,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            foundation: RgbColor::from_hex(0xd2d2d2),
            component_even: RgbColor::from_hex(0x65a839),
            component_odd: RgbColor::from_hex(0x169e2b),
            class: RgbColor::from_hex(0x3e14a0),
            highlighted_entity: RgbColor::from_hex(0xff0000),
            component_text: RgbColor::WHITE,
            class_text: RgbColor::WHITE,
            communication: RgbColor::from_hex(0xd6d48b),
            communication_arrow: RgbColor::BLACK,
            background: RgbColor::WHITE,
        }
    }
}

impl ColorScheme {
    /// Base color of a component box at the given nesting level.
    pub fn component_for_level(&self, level: u32) -> RgbColor {
        if level % 2 == 0 {
            self.component_even
        } else {
            self.component_odd
        }
    }
}
