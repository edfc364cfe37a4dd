use oxid_palm::memory::endian::ByteOrder;
use oxid_palm::memory::ram::{RamBank, META_NO_USER_ACCESS};
use oxid_palm::memory::rom::RomBank;
use oxid_palm::memory::{bank_index, BANK_COUNT};
use oxid_palm::{BankId, MemAccessFlags, Memory};
use oxide_core::{AccessKind, BusFault, MemoryBus};
use proptest::prelude::*;

const ROM_BASE: u32 = 0x1000_0000;

fn palm_like() -> Memory {
    let mut mem = Memory::new();
    mem.attach_ram(RamBank::new(0x4_0000, 0x2_0000, ByteOrder::host()));
    let mut image = vec![0u8; 0x8_0000];
    image[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    mem.attach_rom(RomBank::new(ROM_BASE, &image, ByteOrder::host()));
    mem
}

#[test]
fn every_slot_names_a_bundle() {
    let mem = palm_like();
    let mut ram = 0;
    let mut rom = 0;
    let mut dummy = 0;
    for index in 0..BANK_COUNT {
        match mem.bank_at(index) {
            BankId::Ram => ram += 1,
            BankId::Rom => rom += 1,
            BankId::Dummy => dummy += 1,
            other => panic!("unexpected {other:?} at bank {index:#06X}"),
        }
    }
    assert_eq!((ram, rom), (4, 8));
    assert_eq!(dummy, BANK_COUNT - 12);
    assert_eq!(mem.bank_for(0x0003_FFFF), BankId::Ram);
    assert_eq!(mem.bank_for(0x0004_0000), BankId::Dummy);
    assert_eq!(mem.bank_for(0x1007_FFFF), BankId::Rom);
    assert_eq!(mem.bank_for(0x1008_0000), BankId::Dummy);
}

#[test]
fn unmapped_space_faults_and_latches() {
    let mut mem = palm_like();
    assert_eq!(
        mem.read_long(0x5000_0000),
        Err(BusFault::bus(0x5000_0000, 4, AccessKind::Read))
    );
    assert_eq!(mem.bus_error(), Some(0x5000_0000));
    mem.ack_bus_error();
    assert_eq!(mem.bus_error(), None);

    // Full access tolerates it: reads are zero, writes vanish.
    mem.with_full_access(|m| {
        assert_eq!(m.get_long(0x5000_0000), Ok(0));
        assert_eq!(m.set_byte(0x5000_0001, 1), Ok(()));
    });
}

#[test]
fn rom_is_read_only_outside_full_access() {
    let mut mem = palm_like();
    assert_eq!(mem.get_long(ROM_BASE), Ok(0xDEAD_BEEF));
    assert_eq!(
        mem.set_word(ROM_BASE, 0),
        Err(BusFault::bus(ROM_BASE, 2, AccessKind::Write))
    );
    {
        let mut guard = mem.full_access();
        guard.set_word(ROM_BASE + 2, 0x1234).unwrap();
    }
    assert_eq!(mem.get_long(ROM_BASE), Ok(0xDEAD_1234));
    assert!(mem.set_byte(ROM_BASE, 0).is_err());
}

#[test]
fn user_mode_protections() {
    let mut mem = palm_like();
    mem.ram_mut().set_meta(0x1000, 4, META_NO_USER_ACCESS);
    mem.set_system_mode(false);

    assert!(mem.get_word(0x0010).is_err(), "low memory");
    assert!(mem.set_long(0x3_0000, 1).is_err(), "storage heap");
    assert!(mem.get_byte(0x1002).is_err(), "meta-protected");
    assert!(mem.set_long(0x1_0000, 7).is_ok());

    mem.with_full_access(|m| {
        m.set_long(0x3_0000, 0xA5A5_A5A5).unwrap();
        assert_eq!(m.get_byte(0x1002), Ok(0));
    });

    mem.set_system_mode(true);
    assert_eq!(mem.get_long(0x3_0000), Ok(0xA5A5_A5A5));
    assert_eq!(mem.get_long(0x1_0000), Ok(7));
}

#[test]
fn memory_is_big_endian_whatever_the_storage() {
    for order in [
        ByteOrder::BIG_ENDIAN,
        ByteOrder::host(),
        ByteOrder { word_swap: true, unaligned_long: false },
        ByteOrder { word_swap: false, unaligned_long: true },
    ] {
        let mut mem = Memory::new();
        mem.attach_ram(RamBank::new(0x1_0000, 0x1_0000, order));
        mem.set_long(0x200, 0x0102_0304).unwrap();
        let bytes: Vec<u8> = (0x200..0x204).map(|a| mem.get_byte(a).unwrap()).collect();
        assert_eq!(bytes, vec![1, 2, 3, 4], "{order:?}");
        assert_eq!(mem.ram().export(0x200, 4), vec![1, 2, 3, 4]);
        assert_eq!(mem.get_word(0x202), Ok(0x0304));
    }
}

// ============================================================================
//  PROPERTIES
// ============================================================================

fn bank_choice() -> impl Strategy<Value = BankId> {
    prop_oneof![
        Just(BankId::Dummy),
        Just(BankId::Ram),
        Just(BankId::Rom),
        Just(BankId::Regs),
        Just(BankId::Mapped),
    ]
}

fn bank_range() -> impl Strategy<Value = (usize, usize)> {
    (0..BANK_COUNT).prop_flat_map(|start| (Just(start), 0..=(BANK_COUNT - start).min(0x400)))
}

fn order_choice() -> impl Strategy<Value = ByteOrder> {
    (any::<bool>(), any::<bool>()).prop_map(|(word_swap, unaligned_long)| ByteOrder {
        word_swap,
        unaligned_long,
    })
}

fn flags_from(bits: [bool; 14]) -> MemAccessFlags {
    MemAccessFlags {
        validate_dummy_get: bits[0],
        validate_dummy_set: bits[1],
        validate_register_get: bits[2],
        validate_register_set: bits[3],
        validate_dram_get: bits[4],
        validate_dram_set: bits[5],
        validate_sram_get: bits[6],
        validate_sram_set: bits[7],
        validate_rom_get: bits[8],
        validate_rom_set: bits[9],
        protect_sram_set: bits[10],
        prevent_user_low_memory_get: bits[11],
        prevent_user_low_memory_set: bits[12],
        check_meta: bits[13],
    }
}

/// Opens one guard per layer, sets that layer's flags inside it, and checks
/// every level comes back exactly as it was.
fn nest(mem: &mut Memory, layers: &[MemAccessFlags]) -> Result<(), TestCaseError> {
    let Some((layer, rest)) = layers.split_first() else {
        return Ok(());
    };
    let before = mem.access_flags();
    let depth = mem.access_ctx().full_access_depth;
    {
        let mut guard = mem.full_access();
        prop_assert_eq!(guard.access_flags(), MemAccessFlags::UNRESTRICTED);
        prop_assert!(guard.access_ok());
        guard.set_access_flags(*layer);
        nest(&mut guard, rest)?;
        prop_assert_eq!(guard.access_flags(), *layer);
        prop_assert_eq!(guard.access_ctx().full_access_depth, depth + 1);
    }
    prop_assert_eq!(mem.access_flags(), before);
    prop_assert_eq!(mem.access_ctx().full_access_depth, depth);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn initialize_matches_a_plain_table(
        steps in prop::collection::vec((bank_choice(), bank_range()), 1..12),
    ) {
        let mut mem = Memory::new();
        let mut model = vec![BankId::Dummy; BANK_COUNT];
        for (bank, (start, count)) in steps {
            mem.initialize(bank, start, count);
            model[start..start + count].fill(bank);
        }
        for (index, expected) in model.iter().enumerate() {
            prop_assert_eq!(mem.bank_at(index), *expected);
        }
    }

    #[test]
    fn lookup_uses_the_top_sixteen_bits(addr in any::<u32>()) {
        let mem = palm_like();
        prop_assert_eq!(mem.bank_for(addr), mem.bank_at(bank_index(addr)));
        prop_assert_eq!(bank_index(addr), (addr >> 16) as usize);
    }

    #[test]
    fn storage_policies_round_trip(
        order in order_choice(),
        half in 0usize..32,
        byte_offset in 0usize..64,
        word in any::<u16>(),
        long in any::<u32>(),
        byte in any::<u8>(),
    ) {
        let mut buf = vec![0u8; 68];
        let even = half * 2;

        order.put16(&mut buf, even, word);
        prop_assert_eq!(order.get16(&buf, even), word);
        prop_assert_eq!(order.get8(&buf, even), (word >> 8) as u8);

        order.put32(&mut buf, even, long);
        prop_assert_eq!(order.get32(&buf, even), long);
        prop_assert_eq!(order.export(&buf, even, 4), long.to_be_bytes().to_vec());

        order.put8(&mut buf, byte_offset, byte);
        prop_assert_eq!(order.get8(&buf, byte_offset), byte);
    }

    #[test]
    fn full_access_guards_nest_and_restore(
        base in any::<[bool; 14]>(),
        layers in prop::collection::vec(any::<[bool; 14]>(), 1..5),
    ) {
        let mut mem = palm_like();
        mem.set_access_flags(flags_from(base));
        let layers: Vec<MemAccessFlags> = layers.into_iter().map(flags_from).collect();
        nest(&mut mem, &layers)?;
        prop_assert_eq!(mem.access_flags(), flags_from(base));
        prop_assert!(!mem.access_ok());
    }
}
