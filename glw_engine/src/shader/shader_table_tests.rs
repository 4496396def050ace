//! Unit tests for shader_table.rs

use super::*;
use crate::device::{CapabilityTier, HeadlessDevice};

fn shader(mask: ShaderMask) -> Shader {
    Shader::new("shader", "a.vsh", "a.fsh").with_mask(mask)
}

#[test]
fn test_request_slot_skips_default_slots() {
    let table = ShaderTable::new();
    assert_eq!(table.request_slot(), ShaderMask::from_slot(DEFAULT_SHADER_SLOTS));
}

#[test]
fn test_install_by_mask() {
    let mut table = ShaderTable::new();
    assert!(table.install(shader(ShaderMask::WIREFRAME)).unwrap().is_none());
    assert!(table.get(ShaderMask::WIREFRAME).is_some());
    assert!(table.slot(1).is_some());
    assert!(table.install(shader(ShaderMask::WIREFRAME)).unwrap().is_some());
    assert_eq!(table.len(), 1);
}

#[test]
fn test_install_rejects_multi_bit_mask() {
    let mut table = ShaderTable::new();
    assert!(table.install(shader(ShaderMask::SOLID | ShaderMask::BLIT)).is_err());
    assert!(table.install(shader(ShaderMask::empty())).is_err());
}

#[test]
fn test_user_slots_fill_up() {
    let mut table = ShaderTable::new();
    for slot in DEFAULT_SHADER_SLOTS..SHADER_TABLE_SIZE {
        let mask = table.insert_user(shader(ShaderMask::empty())).unwrap();
        assert_eq!(mask.slot(), Some(slot));
    }
    assert_eq!(table.request_slot(), None);
    assert!(matches!(
        table.insert_user(shader(ShaderMask::empty())),
        Err(Error::CapacityExceeded(_))
    ));
}

#[test]
fn test_load_pending_and_release_all() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 2, 2);
    device.fail_program_link("bad");
    let mut table = ShaderTable::new();
    table.install(shader(ShaderMask::SOLID)).unwrap();
    table.install(Shader::new("shader", "bad.vsh", "bad.fsh").with_mask(ShaderMask::BLIT)).unwrap();

    assert_eq!(table.load_pending(&mut device), 1);
    assert_eq!(table.load_pending(&mut device), 0);
    assert_eq!(device.stats().live_programs, 1);

    table.release_all(&mut device);
    assert!(table.is_empty());
    assert_eq!(device.stats().live_programs, 0);
}

#[test]
fn test_load_pending_does_not_retry_failed_pass() {
    let mut device = HeadlessDevice::new(CapabilityTier::Modern, 2, 2);
    device.fail_program_link("bad");
    let mut table = ShaderTable::new();
    let mut isolines = shader(ShaderMask::ISOLINES);
    isolines.add_pass("shader", "bad.fsh");
    isolines.add_pass("shader", "edge.fsh");
    table.install(isolines).unwrap();

    assert_eq!(table.load_pending(&mut device), 0);
    assert_eq!(device.stats().programs_created, 2);
    assert_eq!(table.load_pending(&mut device), 0);
    assert_eq!(device.stats().programs_created, 2);
    assert_eq!(device.commands().iter().filter(|c| c.starts_with("link_failed")).count(), 1);
    assert!(table.get(ShaderMask::ISOLINES).unwrap().passes()[1].is_loaded());
}
