//! Register file layout, lookup and dump verification suite.

#![allow(clippy::pedantic, clippy::nursery, clippy::too_many_lines)]

use bitvec as _;
use proptest::prelude::*;
use register_model::{
    AccessMode, AccessOutcome, ErrorClass, FileId, Register, RegisterArena, RegisterError,
};
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

fn rw(width: usize, name: &str) -> Register {
    Register::new(width, name, "", AccessMode::ReadWrite).expect("non-zero width")
}

fn file_with_registers(
    arena: &mut RegisterArena,
    name: &str,
    alignment: u64,
    layout: &[(u64, usize, &str)],
) -> FileId {
    let file = arena.create_file(name, "", alignment).expect("valid alignment");
    let mut view = arena.file_mut(file).expect("live file");
    for &(address, width, register) in layout {
        view.create_register(address, width, register, "", AccessMode::ReadWrite)
            .expect("free aligned slot");
    }
    file
}

#[rstest]
#[case(0x0, true)]
#[case(0x4, true)]
#[case(0x8, true)]
#[case(0x2, false)]
fn four_byte_alignment_accepts_only_multiples_of_four(#[case] address: u64, #[case] accepted: bool) {
    let mut arena = RegisterArena::new();
    let file = arena.create_file("F", "", 4).expect("valid alignment");
    let reg = arena.insert_register(rw(32, "R"));
    let result = arena.file_mut(file).and_then(|mut f| f.add_register(address, reg));
    assert_eq!(result.is_ok(), accepted);
    if !accepted {
        assert!(matches!(result, Err(RegisterError::Unaligned { .. })));
    }
}

#[test]
fn misaligned_overlapping_register_is_refused() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 0, &[(0x0, 32, "A")]);
    let second = arena.insert_register(rw(32, "B"));
    let err = arena
        .file_mut(file)
        .and_then(|mut f| f.add_register(0x2, second))
        .expect_err("refused");
    assert_eq!(err.class(), ErrorClass::Refused);
}

#[test]
fn aligned_overlap_is_reported_as_occupied() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 0, &[(0x0, 32, "WORD")]);
    let err = arena
        .file_mut(file)
        .and_then(|mut f| f.create_register(0x2, 8, "BYTE", "", AccessMode::ReadWrite))
        .expect_err("overlaps WORD");
    assert_eq!(err, RegisterError::Occupied { address: 0x2, size: 1 });
    assert_eq!(arena.file(file).map(|f| f.registers().count()), Ok(1));
}

#[test]
fn inserted_file_is_frozen() {
    let mut arena = RegisterArena::new();
    let inner = file_with_registers(&mut arena, "A", 4, &[(0x0, 32, "R")]);
    let outer = arena.create_file("B", "", 4).expect("valid alignment");
    arena
        .file_mut(outer)
        .and_then(|mut f| f.add_register_file(0x0, inner, None))
        .expect("mapped");

    let late = arena.insert_register(rw(32, "LATE"));
    let err = arena
        .file_mut(inner)
        .and_then(|mut f| f.add_register(0x4, late))
        .expect_err("frozen");
    assert!(matches!(err, RegisterError::Frozen { .. }));
    assert_eq!(arena.file(inner).map(|f| f.fixed_size()), Ok(Some(4)));
}

#[test]
fn end_to_end_write_by_name_read_by_address() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 4, &[(0x0, 32, "R1"), (0x4, 32, "R2")]);
    let mut view = arena.file_mut(file).expect("live file");
    assert!(view
        .register_named_mut("R2")
        .expect("mapped")
        .write_u64(0xDEAD_BEEF)
        .is_completed());
    assert_eq!(view.register_at_mut(0x4).expect("mapped").read_u64(), Some(0xDEAD_BEEF));

    let mut bytes = [0_u8; 4];
    assert_eq!(view.read(0x4, &mut bytes), Ok(AccessOutcome::Completed));
    assert_eq!(u32::from_le_bytes(bytes), 0xDEAD_BEEF);
    assert_eq!(
        view.read(0x2, &mut bytes),
        Err(RegisterError::NoRegisterAt(0x2))
    );
}

#[test]
fn register_block_is_laid_out_on_successive_slots() {
    let mut arena = RegisterArena::new();
    let file = arena.create_file("F", "", 4).expect("valid alignment");
    let ids = arena
        .file_mut(file)
        .and_then(|mut f| f.create_register_block(0x4, 12, 32, "Reg", "", AccessMode::ReadWrite))
        .expect("block fits");
    assert_eq!(ids.len(), 12);

    let view = arena.file(file).expect("live file");
    for index in 0..12_u64 {
        let address = 0x4 + 4 * index;
        let register = view.register_at(address).expect("mapped");
        assert_eq!(register.name(), format!("Reg_{index}"));
    }
    assert_eq!(view.next_free_address(), 0x34);
}

#[test]
fn block_stops_at_first_refusal_without_rollback() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 4, &[(0x8, 32, "BLOCKER")]);
    let err = arena
        .file_mut(file)
        .and_then(|mut f| f.create_register_block(0x0, 4, 32, "Reg", "", AccessMode::ReadWrite))
        .expect_err("third slot is taken");
    assert!(matches!(err, RegisterError::Occupied { address: 0x8, .. }));

    let view = arena.file(file).expect("live file");
    assert_eq!(view.register_address("Reg_0"), Ok(0x0));
    assert_eq!(view.register_address("Reg_1"), Ok(0x4));
    assert!(view.register_address("Reg_2").is_err());
}

#[test]
fn nested_files_are_flattened_at_insertion() {
    let mut arena = RegisterArena::new();
    let leaf = file_with_registers(&mut arena, "Leaf", 0, &[(0x0, 32, "L0"), (0x4, 32, "L1")]);
    let middle = file_with_registers(&mut arena, "Middle", 0, &[(0x0, 32, "M0")]);
    arena
        .file_mut(middle)
        .and_then(|mut f| f.add_register_file(0x8, leaf, None))
        .expect("leaf fits");
    let top = arena.create_file("Top", "", 0).expect("valid alignment");
    arena
        .file_mut(top)
        .and_then(|mut f| f.add_register_file(0x10, middle, None))
        .expect("middle fits");

    let view = arena.file(top).expect("live file");
    let flattened: Vec<(u64, String)> = view
        .flattened()
        .map(|(address, id)| (address, arena.register(id).expect("live").name().to_owned()))
        .collect();
    assert_eq!(
        flattened,
        vec![
            (0x10, "M0".to_owned()),
            (0x18, "L0".to_owned()),
            (0x1C, "L1".to_owned()),
        ]
    );
    assert_eq!(view.register_address("L1"), Ok(0x1C));
    assert!(matches!(
        view.register_file_named("Leaf"),
        Err(RegisterError::NoRegisterFileNamed(_))
    ));
    assert_eq!(view.register_file_named("Middle").map(|f| f.fixed_size()), Ok(Some(0x10)));
}

#[test]
fn writes_through_parent_reach_shared_register() {
    let mut arena = RegisterArena::new();
    let shared = arena.insert_register(rw(16, "SHARED"));
    let child = arena.create_file("C", "", 0).expect("valid alignment");
    arena
        .file_mut(child)
        .and_then(|mut f| f.add_register(0x2, shared))
        .expect("mapped");
    let parent = arena.create_file("P", "", 0).expect("valid alignment");
    arena
        .file_mut(parent)
        .and_then(|mut f| f.add_register_file(0x4, child, None))
        .expect("mapped");

    let outcome = arena
        .file_mut(parent)
        .and_then(|mut f| f.write(0x6, &[0x34, 0x12]))
        .expect("mapped");
    assert!(outcome.is_completed());
    assert_eq!(arena.register(shared).map(Register::as_u64), Ok(0x1234));
}

#[test]
fn child_alignment_must_match_parent() {
    let mut arena = RegisterArena::new();
    let child = file_with_registers(&mut arena, "C", 8, &[(0x0, 32, "R")]);
    let parent = arena.create_file("P", "", 4).expect("valid alignment");
    let err = arena
        .file_mut(parent)
        .and_then(|mut f| f.add_register_file(0x0, child, None))
        .expect_err("alignment differs");
    assert_eq!(err, RegisterError::AlignmentMismatch { parent: 4, child: 8 });
    assert_eq!(arena.file(child).map(|f| f.is_frozen()), Ok(false));
}

#[test]
fn explicit_size_smaller_than_content_is_refused() {
    let mut arena = RegisterArena::new();
    let child = file_with_registers(&mut arena, "C", 0, &[(0x0, 32, "A"), (0x4, 32, "B")]);
    let parent = arena.create_file("P", "", 0).expect("valid alignment");
    let err = arena
        .file_mut(parent)
        .and_then(|mut f| f.add_register_file(0x0, child, Some(4)))
        .expect_err("too small");
    assert_eq!(err, RegisterError::SizeTooSmall { requested: 4, occupied: 8 });
}

#[test]
fn explicit_size_reserves_a_larger_window() {
    let mut arena = RegisterArena::new();
    let child = file_with_registers(&mut arena, "C", 0, &[(0x0, 32, "A")]);
    let parent = arena.create_file("P", "", 0).expect("valid alignment");
    let mut view = arena.file_mut(parent).expect("live file");
    view.add_register_file(0x0, child, Some(0x20)).expect("window fits");
    let err = view
        .create_register(0x10, 32, "INSIDE", "", AccessMode::ReadWrite)
        .expect_err("inside the reserved window");
    assert!(matches!(err, RegisterError::Occupied { .. }));
    let (address, _) = view
        .append_new_register(32, "AFTER", "", AccessMode::ReadWrite)
        .expect("room after the window");
    assert_eq!(address, 0x20);
}

#[test]
fn frozen_child_keeps_its_size_when_shared() {
    let mut arena = RegisterArena::new();
    let child = file_with_registers(&mut arena, "C", 0, &[(0x0, 32, "A")]);
    let first = arena.create_file("P1", "", 0).expect("valid alignment");
    let second = arena.create_file("P2", "", 0).expect("valid alignment");
    arena
        .file_mut(first)
        .and_then(|mut f| f.add_register_file(0x0, child, Some(0x8)))
        .expect("mapped");
    arena
        .file_mut(second)
        .and_then(|mut f| f.add_register_file(0x0, child, Some(0x40)))
        .expect("mapped again");
    assert_eq!(arena.file(second).map(|f| f.next_free_address()), Ok(0x8));
}

#[test]
fn unaddressed_file_insertion_rounds_to_child_size() {
    let mut arena = RegisterArena::new();
    let parent = file_with_registers(&mut arena, "P", 0, &[(0x0, 8, "FLAG")]);
    let child = file_with_registers(&mut arena, "C", 0, &[(0x0, 32, "A"), (0x4, 32, "B")]);
    let address = arena
        .file_mut(parent)
        .and_then(|mut f| f.append_register_file(child, None))
        .expect("appended");
    assert_eq!(address, 0x8);
}

#[test]
fn copies_are_owned_and_independent() {
    let mut arena = RegisterArena::new();
    let template = file_with_registers(&mut arena, "UART", 4, &[(0x0, 32, "DATA"), (0x4, 32, "CTRL")]);
    let soc = arena.create_file("SoC", "", 4).expect("valid alignment");
    let (uart0, uart1) = {
        let mut view = arena.file_mut(soc).expect("live file");
        let uart0 = view.add_register_file_copy(0x0, template, None).expect("copy 0");
        let uart1 = view.add_register_file_copy(0x100, template, None).expect("copy 1");
        (uart0, uart1)
    };
    assert_ne!(uart0, uart1);
    assert_eq!(arena.file_owner(uart0), Ok(Some(soc)));
    assert_eq!(arena.file(template).map(|f| f.is_frozen()), Ok(false));

    let mut view = arena.file_mut(soc).expect("live file");
    assert!(view.write(0x104, &[0xAA, 0, 0, 0]).expect("mapped").is_completed());
    assert_eq!(view.register_at_mut(0x4).expect("mapped").read_u64(), Some(0));
    assert_eq!(view.register_at_mut(0x104).expect("mapped").read_u64(), Some(0xAA));
}

#[test]
fn register_copy_drops_callbacks() {
    let mut arena = RegisterArena::new();
    let mut original = rw(32, "R");
    original.register_pre_write_callback(|_| false);
    let source = arena.insert_register(original);
    let file = arena.create_file("F", "", 0).expect("valid alignment");
    let copy = arena
        .file_mut(file)
        .and_then(|mut f| f.add_register_copy(0x0, source))
        .expect("copied");
    assert_eq!(arena.register(copy).map(Register::callback_count), Ok(0));
    assert_eq!(arena.register(source).map(Register::callback_count), Ok(1));
}

#[test]
fn appended_register_copy_lands_on_next_aligned_slot() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 0, &[(0x0, 16, "HALF")]);
    let mut original = rw(32, "WORD");
    original.register_post_read_callback(|_| {});
    original.register_pre_write_callback(|_| true);
    let source = arena.insert_register(original);

    let (address, copy) = arena
        .file_mut(file)
        .and_then(|mut f| f.append_register_copy(source))
        .expect("room after HALF");
    assert_eq!(address, 0x4);
    assert_ne!(copy, source);
    assert_eq!(arena.register(copy).map(Register::callback_count), Ok(0));
    assert_eq!(arena.register(source).map(Register::callback_count), Ok(2));
    assert_eq!(arena.register_owner(copy), Ok(Some(file)));
    assert_eq!(arena.file(file).and_then(|f| f.register_id_at(0x4)), Ok(copy));
}

#[test]
fn appended_block_starts_after_existing_register() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 0, &[(0x0, 8, "STATUS")]);
    let (base, ids) = arena
        .file_mut(file)
        .and_then(|mut f| f.append_register_block(3, 32, "CH", "", AccessMode::ReadWrite))
        .expect("block fits");
    assert_eq!(base, 0x4);
    assert_eq!(ids.len(), 3);

    let view = arena.file(file).expect("live file");
    for (index, id) in ids.iter().enumerate() {
        let address = base + 4 * index as u64;
        assert_eq!(view.register_id_at(address), Ok(*id));
        assert_eq!(view.register_address(&format!("CH_{index}")), Ok(address));
    }
    assert_eq!(view.next_free_address(), 0x10);
}

#[test]
fn deep_copy_of_nested_file_is_detached() {
    let mut arena = RegisterArena::new();
    let leaf = file_with_registers(&mut arena, "Leaf", 0, &[(0x0, 32, "L0")]);
    let top = file_with_registers(&mut arena, "Top", 0, &[(0x0, 32, "T0")]);
    arena
        .file_mut(top)
        .and_then(|mut f| f.add_register_file(0x8, leaf, None))
        .expect("leaf fits");

    let copy = arena.clone_file(top).expect("live file");
    assert_ne!(copy, top);
    assert_eq!(arena.file_owner(copy), Ok(None));

    let view = arena.file(copy).expect("live file");
    assert!(!view.is_frozen());
    let nested = view.register_file_at(0x8).expect("nested copy");
    assert_ne!(nested.id(), leaf);
    assert_eq!(nested.fixed_size(), Some(4));
    assert_eq!(arena.file_owner(nested.id()), Ok(Some(copy)));

    let addresses: Vec<u64> = view.flattened().map(|(address, _)| address).collect();
    assert_eq!(addresses, vec![0x0, 0x8]);
    let original_leaf = arena.file(leaf).and_then(|f| f.register_id_at(0x0)).expect("mapped");
    assert_ne!(view.register_id_at(0x8), Ok(original_leaf));

    assert!(arena
        .file_mut(copy)
        .and_then(|mut f| f.write(0x8, &[0x5A, 0, 0, 0]))
        .expect("mapped")
        .is_completed());
    assert_eq!(arena.register(original_leaf).map(Register::as_u64), Ok(0));
    assert_eq!(
        arena.file(copy).and_then(|f| f.register_at(0x8)).map(Register::as_u64),
        Ok(0x5A)
    );
}

#[test]
fn duplicate_names_resolve_to_lowest_address() {
    let mut arena = RegisterArena::new();
    let file = file_with_registers(&mut arena, "F", 0, &[(0x8, 32, "DUP"), (0x0, 32, "DUP")]);
    assert_eq!(arena.file(file).and_then(|f| f.register_address("DUP")), Ok(0x0));
}

#[test]
fn dumps_describe_the_hierarchy() {
    let mut arena = RegisterArena::new();
    let child = file_with_registers(&mut arena, "Timer", 0, &[(0x0, 32, "COUNT")]);
    let parent = file_with_registers(&mut arena, "Top", 0, &[(0x0, 16, "ID")]);
    arena
        .file_mut(parent)
        .and_then(|mut f| f.add_register_file(0x4, child, None))
        .expect("mapped");

    let view = arena.file(parent).expect("live file");
    let info = view.info();
    assert!(info.contains("|0x0 -> 0x1  |Reg.     |2 bytes|ID   |"));
    assert!(info.contains("|0x4 -> 0x7  |Reg. File|4 bytes|Timer|"));

    let recursive = view.recursive_info(0);
    assert!(recursive.starts_with("############## Register files details - level 0 ##############\n"));
    assert!(recursive.contains("############## Register files details - level 1 ##############\n"));
    assert!(recursive.ends_with(&format!("{}\n", "#".repeat(62))));

    let flat = view.flattened_info();
    assert!(flat.contains("|0x4 -> 0x7  |Reg.|4 bytes|COUNT|"));
    assert_eq!(
        view.register_info_named("COUNT"),
        arena.register(arena.file(child).and_then(|f| f.register_id_at(0x0)).expect("mapped")).map(|r| r.info(1))
    );
}

proptest! {
    #[test]
    fn property_accepted_registers_never_overlap(
        placements in prop::collection::vec((0_u64..64, prop::sample::select(vec![8_usize, 16, 32])), 1..24)
    ) {
        let mut arena = RegisterArena::new();
        let file = arena.create_file("F", "", 0).expect("valid alignment");
        let mut view = arena.file_mut(file).expect("live file");
        for (index, (address, width)) in placements.iter().enumerate() {
            let result = view.create_register(*address, *width, &format!("R{index}"), "", AccessMode::ReadWrite);
            if let Err(error) = result {
                prop_assert!(error.is_refusal());
            }
        }

        let view = arena.file(file).expect("live file");
        let mut spans: Vec<(u64, u64)> = view
            .registers()
            .map(|(address, id)| {
                let bytes = arena.register(id).expect("live").size_in_bytes() as u64;
                prop_assert_eq!(address % bytes, 0);
                Ok((address, address + bytes))
            })
            .collect::<Result<_, TestCaseError>>()?;
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0);
        }
    }
}
