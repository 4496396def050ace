/// Default shader set per capability tier

use std::path::Path;
use crate::device::{CapabilityTier, PolygonMode};
use super::mask::ShaderMask;
use super::shader::{Shader, ShaderTarget};

/// Post-process fragment appended to the iso-line shader
pub const ISOLINES_PASS: &str = "scalar1.fsh";

struct DefaultShader {
    mask: ShaderMask,
    vertex: &'static str,
    fragment: &'static str,
    alpha_test: bool,
    depth_test: bool,
    polygon: Option<PolygonMode>,
    target: ShaderTarget,
}

const fn screen(mask: ShaderMask, name: &'static str, alpha_test: bool, depth_test: bool, polygon: PolygonMode) -> DefaultShader {
    DefaultShader { mask, vertex: name, fragment: name, alpha_test, depth_test, polygon: Some(polygon), target: ShaderTarget::Screen }
}

const DEFAULT_SET: [DefaultShader; 7] = [
    screen(ShaderMask::SOLID, "lambertian_lighting", true, true, PolygonMode::Fill),
    screen(ShaderMask::WIREFRAME, "wireframe", true, true, PolygonMode::Line),
    screen(ShaderMask::DOTCLOUD, "dotcloud", false, true, PolygonMode::Point),
    screen(ShaderMask::BLIT, "blit", true, true, PolygonMode::Fill),
    screen(ShaderMask::TEXTURE, "texture", true, true, PolygonMode::Fill),
    screen(ShaderMask::FONT, "font", true, false, PolygonMode::Fill),
    DefaultShader {
        mask: ShaderMask::PICKING,
        vertex: "picking",
        fragment: "picking",
        alpha_test: false,
        depth_test: true,
        polygon: None,
        target: ShaderTarget::Picking,
    },
];

fn file_name(stem: &str, suffix: &str, extension: &str) -> String {
    format!("{}{}.{}", stem, suffix, extension)
}

/// Unloaded default shaders for a tier, each with its mask set
///
/// Modern uses the base files plus the iso-line shader and its pass;
/// Programmable uses the `_21` variants; Legacy has no default set.
pub fn default_shaders(tier: CapabilityTier, directory: &Path) -> Vec<Shader> {
    let suffix = match tier {
        CapabilityTier::Modern => "",
        CapabilityTier::Programmable => "_21",
        CapabilityTier::Legacy => return Vec::new(),
    };

    let mut shaders: Vec<Shader> = DEFAULT_SET
        .iter()
        .map(|d| {
            Shader::new(directory, file_name(d.vertex, suffix, "vsh"), file_name(d.fragment, suffix, "fsh"))
                .with_mask(d.mask)
                .with_alpha_test(d.alpha_test)
                .with_depth_test(d.depth_test)
                .with_polygon(d.polygon)
                .with_target(d.target)
        })
        .collect();

    if tier == CapabilityTier::Modern {
        let mut isolines = Shader::new(directory, "scalar.vsh", "scalar0.fsh")
            .with_mask(ShaderMask::ISOLINES)
            .with_alpha_test(false)
            .with_depth_test(false)
            .with_polygon(Some(PolygonMode::Fill));
        isolines.add_pass(directory, ISOLINES_PASS);
        shaders.push(isolines);
    }
    shaders
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod tests;
