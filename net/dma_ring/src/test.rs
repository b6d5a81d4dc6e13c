//! Tests for the cursor arithmetic and the one-slot-spare invariant.

extern crate std;

use super::*;

#[test]
fn rejects_degenerate_sizes() {
    assert!(DescriptorRing::new(0).is_err());
    assert!(DescriptorRing::new(1).is_err());
    assert!(DescriptorRing::new(2).is_ok());
}

#[test]
fn available_keeps_one_slot_spare() {
    let mut ring = DescriptorRing::new(8).unwrap();
    assert_eq!(ring.available(), 7);
    assert_eq!(ring.in_flight(), 0);

    for expected in (0..7).rev() {
        ring.advance_produced();
        assert_eq!(ring.available(), expected);
    }
    // produced - consumed is now N - 1: the ring is full.
    assert_eq!(ring.in_flight(), 7);
    assert_eq!(ring.available(), 0);
}

#[test]
fn invariant_holds_across_a_full_cycle() {
    let mut ring = DescriptorRing::new(4).unwrap();
    // Wrap the cursors around the ring several times.
    for _ in 0..10 {
        ring.advance_produced();
        ring.advance_produced();
        ring.advance_consumed();
        ring.advance_consumed();
        let delta = ring.produced() - ring.consumed();
        assert!(delta <= 3);
        assert_eq!(ring.available(), 4 - delta as usize - 1);
    }
    assert_eq!(ring.slot_index(ring.produced()), (ring.produced() % 4) as usize);
}

#[test]
fn cursors_map_to_physical_slots_mod_n() {
    let mut ring = DescriptorRing::new(4).unwrap();
    for _ in 0..5 {
        ring.advance_produced();
        ring.advance_consumed();
    }
    assert_eq!(ring.produced(), 5);
    assert_eq!(ring.slot_index(ring.produced()), 1);
    // The physical slot of cursor 5 and cursor 1 is the same descriptor.
    let a = ring.desc_at(5) as *const _;
    let b = ring.desc_at(1) as *const _;
    assert_eq!(a, b);
}

#[test]
fn reset_rewinds_both_cursors() {
    let mut ring = DescriptorRing::new(8).unwrap();
    for _ in 0..5 {
        ring.advance_produced();
    }
    ring.advance_consumed();
    ring.reset();
    assert_eq!(ring.produced(), 0);
    assert_eq!(ring.consumed(), 0);
    assert!(ring.is_empty());
    assert_eq!(ring.available(), 7);
}

#[test]
fn handle_aliases_the_same_descriptors() {
    let ring = DescriptorRing::new(2).unwrap();
    let handle = ring.handle();
    handle[0].write_buf1(0xDEAD_BEEF);
    assert_eq!(ring.desc_at(0).buf1(), 0xDEAD_BEEF);
}
