//! Tests for the two descriptor codecs and the ownership handoff rules.

extern crate std;

use bit_field::BitField;

use super::descriptors::*;
use super::*;

fn desc() -> DmaDescriptor {
    DmaDescriptor::new()
}

#[test]
fn ownership_grant_and_completion() {
    let ops = Mac100Ops;
    let d = desc();
    ops.prepare_tx_desc(&d, 0x1000, 64, true, false);
    assert!(!ops.get_tx_owner(&d));

    ops.set_tx_owner(&d);
    assert!(ops.get_tx_owner(&d));

    // The controller completes the slot: clears OWN, writes status.
    d.write_status(d.status() & !DES_OWN);
    assert!(!ops.get_tx_owner(&d));
    assert_eq!(ops.tx_status(&d), Ok(()));
}

#[test]
fn mac100_flags_live_in_the_control_word() {
    let ops = Mac100Ops;
    let d = desc();
    ops.prepare_tx_desc(&d, 0x2000, 128, true, false);
    ops.close_tx_desc(&d);

    assert!(ops.get_tx_ls(&d));
    assert!(d.control().get_bit(31), "interrupt request expected");
    assert_eq!(d.status(), 0, "normal descriptors keep status clean until write-back");

    ops.clear_tx_ic(&d);
    assert!(!d.control().get_bit(31));
    assert!(ops.get_tx_ls(&d), "clearing the interrupt request must not clear last-fragment");
}

#[test]
fn gmac_flags_survive_grant_and_completion() {
    let ops = GmacOps;
    let d = desc();
    ops.prepare_tx_desc(&d, 0x3000, 256, false, true);
    ops.close_tx_desc(&d);
    ops.set_tx_owner(&d);
    assert!(ops.get_tx_owner(&d));

    // Write-back clears OWN but preserves the high software bits,
    // as the real controller does for enhanced descriptors.
    d.write_status(d.status() & !DES_OWN);
    assert!(!ops.get_tx_owner(&d));
    assert!(ops.get_tx_ls(&d));
    assert_eq!(ops.tx_status(&d), Ok(()));
}

#[test]
fn oversized_piece_spills_into_second_buffer_pair() {
    let ops = Mac100Ops;
    let d = desc();
    ops.prepare_tx_desc(&d, 0x8000, 3000, true, false);

    assert_eq!(d.buf1(), 0x8000);
    assert_eq!(d.buf2(), 0x8000 + 2047);
    assert_eq!(d.control().get_bits(0..11), 2047);
    assert_eq!(d.control().get_bits(11..22), 3000 - 2047);

    // The gigabit core addresses the same piece with one pair.
    let ops = GmacOps;
    let d = desc();
    ops.prepare_tx_desc(&d, 0x8000, 3000, true, false);
    assert_eq!(d.buf2(), 0);
    assert_eq!(d.control().get_bits(0..13), 3000);
}

#[test]
fn tx_status_decodes_fault_kinds() {
    let ops = GmacOps;
    let d = desc();

    d.write_status(DES_ERR_SUMMARY | TDES_UNDERFLOW);
    assert_eq!(ops.tx_status(&d), Err(TxFault::Underflow));

    d.write_status(DES_ERR_SUMMARY | TDES_NO_CARRIER);
    assert_eq!(ops.tx_status(&d), Err(TxFault::NoCarrier));

    d.write_status(DES_ERR_SUMMARY);
    assert_eq!(ops.tx_status(&d), Err(TxFault::Unknown));

    d.write_status(TDES_UNDERFLOW);
    assert_eq!(ops.tx_status(&d), Ok(()), "detail bits without the summary are not faults");
}

#[test]
fn rx_status_decodes_discard_reasons_and_checksum() {
    let gmac = GmacOps;
    let mac100 = Mac100Ops;
    let d = desc();

    d.write_status(DES_ERR_SUMMARY | RDES_CRC_ERROR);
    assert_eq!(gmac.rx_status(&d), Err(DiscardReason::Crc));
    assert_eq!(mac100.rx_status(&d), Err(DiscardReason::Crc));

    d.write_status(DES_ERR_SUMMARY | RDES_RUNT);
    assert_eq!(gmac.rx_status(&d), Err(DiscardReason::Runt));

    d.write_status(RDES_LAST | RDES_FIRST | RDES_CSUM_VERIFIED);
    assert_eq!(gmac.rx_status(&d), Ok(ChecksumStatus::Unnecessary));
    // The 10/100 core has no checksum engine.
    assert_eq!(mac100.rx_status(&d), Ok(ChecksumStatus::None));
}

#[test]
fn rx_frame_len_round_trips_through_the_status_word() {
    let ops = GmacOps;
    let d = desc();
    let mut status = RDES_LAST | RDES_FIRST;
    status.set_bits(RDES_FRAME_LEN, 1518);
    d.write_status(status);
    assert_eq!(ops.get_rx_frame_len(&d), 1518);
}

#[test]
fn rx_rearm_resets_the_status_word() {
    let ops = GmacOps;
    let d = desc();
    let mut status = DES_ERR_SUMMARY | RDES_CRC_ERROR;
    status.set_bits(RDES_FRAME_LEN, 64);
    d.write_status(status);

    ops.set_rx_owner(&d);
    assert!(ops.get_rx_owner(&d));
    assert_eq!(d.status() & !DES_OWN, 0, "stale status must not leak into the next reception");
}

#[test]
fn variant_selection_yields_distinct_codecs() {
    let mac100 = MacVariant::Mac100.descriptor_ops();
    let gmac = MacVariant::Gmac.descriptor_ops();
    assert_eq!(mac100.max_buffer_len(), 2047);
    assert_eq!(gmac.max_buffer_len(), 8191);
}
