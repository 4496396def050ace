//! Unit tests for defaults.rs

use super::*;
use std::path::PathBuf;

#[test]
fn test_modern_set() {
    let shaders = default_shaders(CapabilityTier::Modern, Path::new("shader"));
    assert_eq!(shaders.len(), 8);

    let solid = &shaders[0];
    assert_eq!(solid.mask(), ShaderMask::SOLID);
    assert_eq!(solid.vertex(), Path::new("lambertian_lighting.vsh"));
    assert_eq!(solid.polygon(), Some(PolygonMode::Fill));

    let picking = shaders.iter().find(|s| s.mask() == ShaderMask::PICKING).unwrap();
    assert_eq!(picking.target(), ShaderTarget::Picking);
    assert_eq!(picking.polygon(), None);
    assert!(!picking.alpha_test());

    let font = shaders.iter().find(|s| s.mask() == ShaderMask::FONT).unwrap();
    assert!(!font.depth_test());

    let isolines = shaders.iter().find(|s| s.mask() == ShaderMask::ISOLINES).unwrap();
    assert_eq!(isolines.passes().len(), 1);
    assert_eq!(isolines.passes()[0].fragment(), Path::new(ISOLINES_PASS));
}

#[test]
fn test_programmable_set_uses_21_files() {
    let shaders = default_shaders(CapabilityTier::Programmable, Path::new("glsl"));
    assert_eq!(shaders.len(), 7);
    let source = shaders[1].source().unwrap();
    assert_eq!(source.vertex, PathBuf::from("glsl/wireframe_21.vsh"));
    assert_eq!(source.fragment, PathBuf::from("glsl/wireframe_21.fsh"));
    assert!(shaders.iter().all(|s| s.mask() != ShaderMask::ISOLINES));
}

#[test]
fn test_legacy_has_no_defaults() {
    assert!(default_shaders(CapabilityTier::Legacy, Path::new("shader")).is_empty());
}
