use cflash::board::{ControlRegister, Slot};
use cflash::chip::{BootBlock, DeviceIds, M29f160};
use cflash::geometry::Bank;
use cflash::image::{ROM_1M, ROM_256K, ROM_512K};
use cflash::protocol::FlashDevice;
use cflash::sim::{Event, SimBoard, SimFlash};
use cflash::{Error, ErrorKind, Failure, Flasher, Mismatch, ProgramOperation, Stage};

fn rom(len: u32) -> Vec<u8> {
    (0..len).map(|i| (i ^ (i >> 9) ^ (i >> 17)) as u8).collect()
}

fn bank(index: u8) -> Bank {
    Bank::new(index).unwrap()
}

fn try_connect(board: &SimBoard, slot: u8) -> cflash::Result<Flasher<SimFlash<u16>>> {
    let mut control = ControlRegister::new(board.control());
    let device = FlashDevice::<M29f160, _>::new(board.flash());
    Flasher::connect(&mut control, Slot::new(slot).unwrap(), device)
}

fn connect(board: &SimBoard, slot: u8) -> Flasher<SimFlash<u16>> {
    try_connect(board, slot).unwrap()
}

fn program(
    flasher: &mut Flasher<SimFlash<u16>>,
    data: Vec<u8>,
    index: u8,
) -> cflash::Result<Bank> {
    flasher.program(ProgramOperation {
        data,
        bank: bank(index),
        skip_verify: false,
    })
}

fn erased_sectors(board: &SimBoard) -> Vec<u32> {
    board
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::EraseSector { start } => Some(start),
            _ => None,
        })
        .collect()
}

#[test]
fn identify_erase_program_verify() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 0);
    assert_eq!(flasher.boot_block(), BootBlock::Top);
    assert_eq!(flasher.stage(), Stage::Idle);

    let data = rom(ROM_512K);
    assert_eq!(program(&mut flasher, data.clone(), 1).unwrap(), bank(1));
    assert_eq!(flasher.stage(), Stage::Done);
    assert_eq!(board.contents(0x8_0000..0x10_0000), data);
    // bank 0 untouched
    assert!(board.contents(0..0x8_0000).iter().all(|&b| b == 0xFF));

    let events = board.events();
    assert_eq!(
        &events[..8],
        &(0..8)
            .map(|i| Event::EraseSector {
                start: 0x8_0000 + i * 0x1_0000
            })
            .collect::<Vec<_>>()[..]
    );
    assert_eq!(
        events[8],
        Event::Program {
            address: 0x8_0000,
            value: u16::from_be_bytes([data[0], data[1]])
        }
    );
    assert_eq!(events.len(), 8 + (ROM_512K / 2) as usize);
}

#[test]
fn skip_verify_still_writes_everything() {
    let board = SimBoard::new(BootBlock::Bottom);
    let mut flasher = connect(&board, 0);
    let data = rom(ROM_512K);
    flasher
        .program(ProgramOperation {
            data: data.clone(),
            bank: bank(1),
            skip_verify: true,
        })
        .unwrap();
    assert_eq!(flasher.stage(), Stage::Done);
    assert_eq!(board.contents(0x8_0000..0x10_0000), data);
}

#[test]
fn small_rom_is_mirrored() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 0);
    let data = rom(ROM_256K);
    program(&mut flasher, data.clone(), 1).unwrap();

    assert_eq!(board.contents(0x8_0000..0xC_0000), data);
    assert_eq!(board.contents(0xC_0000..0x10_0000), data);
    assert_eq!(flasher.verify(data, bank(1)).unwrap(), bank(1));
}

#[test]
fn mirror_copy_is_verified() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 1);
    let data = rom(ROM_256K);
    assert_eq!(program(&mut flasher, data.clone(), 3).unwrap(), bank(3));

    // last byte of the second copy
    board.corrupt(0x1F_FFFF, 0x01);
    let expected = u16::from_be_bytes([data[0x3_FFFE], data[0x3_FFFF]]);
    match flasher.verify(data, bank(3)) {
        Err(Error::VerifyMismatch(m)) => assert_eq!(
            m,
            Mismatch {
                address: 0x1F_FFFE,
                expected,
                actual: expected ^ 0x0001,
                width: 2,
            }
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn flipped_byte_is_reported() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 0);
    let data = rom(ROM_512K);
    program(&mut flasher, data.clone(), 1).unwrap();

    board.corrupt(0x8_1235, 0x10);
    let expected = u16::from_be_bytes([data[0x1234], data[0x1235]]);
    match flasher.verify(data, bank(1)) {
        Err(Error::VerifyMismatch(m)) => assert_eq!(
            m,
            Mismatch {
                address: 0x8_1234,
                expected,
                actual: expected ^ 0x0010,
                width: 2,
            }
        ),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(flasher.stage(), Stage::Failed(Failure::Mismatch));
}

#[test]
fn full_rom_realigns_and_erases_high_bank_first() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 0);
    let data = rom(ROM_1M);
    assert_eq!(program(&mut flasher, data.clone(), 1).unwrap(), bank(0));

    let sectors = erased_sectors(&board);
    assert_eq!(sectors.len(), 16);
    assert_eq!(sectors[0], 0x8_0000);
    assert_eq!(sectors[8], 0);
    assert_eq!(board.contents(0..ROM_1M), data);
}

#[test]
fn full_rom_verify_at_odd_bank_checks_the_pair() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 1);
    let data = rom(ROM_1M);
    assert_eq!(program(&mut flasher, data.clone(), 2).unwrap(), bank(2));
    board.clear_events();

    assert_eq!(flasher.verify(data, bank(3)).unwrap(), bank(2));
    assert_eq!(flasher.stage(), Stage::Done);
    assert!(board.events().is_empty());
}

#[test]
fn bad_size_fails_before_erasing() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 0);
    let err = program(&mut flasher, vec![0; 0x6_0000], 1).unwrap_err();
    assert!(matches!(err, Error::BadImageSize(0x6_0000)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(flasher.stage(), Stage::Failed(Failure::BadSize));
    assert!(board.events().is_empty());
}

#[test]
fn unknown_device_is_rejected() {
    let ids = DeviceIds {
        manufacturer: 0x0020,
        device: 0x22D2,
    };
    let board = SimBoard::with_ids(ids, BootBlock::Top);
    match try_connect(&board, 0) {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::Identification);
            assert!(matches!(
                e,
                Error::UnknownDevice {
                    manufacturer: 0x0020,
                    device: 0x22D2
                }
            ));
        }
        Ok(_) => panic!("connected to unknown device"),
    }
    assert!(board.events().is_empty());
}

#[test]
fn overlay_refuses_connection_before_any_flash_access() {
    let board = SimBoard::new(BootBlock::Top);
    board.set_overlay(true);
    match try_connect(&board, 0) {
        Err(e) => {
            assert!(matches!(e, Error::OverlayEnabled));
            assert_eq!(e.kind(), ErrorKind::Identification);
        }
        Ok(_) => panic!("connected with bonus RAM enabled"),
    }
    assert!(board.events().is_empty());

    board.set_overlay(false);
    let mut flasher = connect(&board, 0);
    program(&mut flasher, rom(ROM_512K), 1).unwrap();
    assert_eq!(board.events().len(), 8 + (ROM_512K / 2) as usize);
}

#[test]
fn overlay_blocks_flash_access() {
    let board = SimBoard::new(BootBlock::Top);
    board.set_overlay(true);
    let mut control = ControlRegister::new(board.control());
    assert!(matches!(
        control.ensure_flash_accessible(),
        Err(Error::OverlayEnabled)
    ));
    board.set_overlay(false);
    assert!(control.ensure_flash_accessible().is_ok());
}

#[test]
fn top_boot_bank_through_upper_slot() {
    let board = SimBoard::new(BootBlock::Top);
    board.corrupt(0xF_C000, 0xFF);
    board.corrupt(0x1F_0000, 0xFF);
    board.corrupt(0x1F_C000, 0xFF);

    let mut flasher = connect(&board, 1);
    flasher.erase_bank(bank(3));

    let sectors = erased_sectors(&board);
    assert_eq!(sectors.len(), 11);
    assert_eq!(sectors[0], 0x18_0000);
    assert_eq!(&sectors[7..], &[0x1F_0000, 0x1F_8000, 0x1F_A000, 0x1F_C000]);
    assert_eq!(board.contents(0x1F_0000..0x1F_0002), vec![0xFF, 0xFF]);
    assert_eq!(board.contents(0x1F_C000..0x1F_C002), vec![0xFF, 0xFF]);
    // same window offset in slot 0
    assert_eq!(board.contents(0xF_C000..0xF_C002), vec![0x00, 0xFF]);
}

#[test]
fn program_upper_slot() {
    let board = SimBoard::new(BootBlock::Top);
    let mut flasher = connect(&board, 1);
    let data = rom(ROM_512K);
    assert_eq!(program(&mut flasher, data.clone(), 3).unwrap(), bank(3));
    assert_eq!(board.contents(0x18_0000..0x20_0000), data);
    assert!(board.contents(0x8_0000..0x10_0000).iter().all(|&b| b == 0xFF));
}

#[test]
fn bottom_boot_bank_erases_small_blocks_first() {
    let board = SimBoard::new(BootBlock::Bottom);
    let mut flasher = connect(&board, 0);
    flasher.erase_bank(bank(0));
    assert_eq!(
        erased_sectors(&board),
        vec![
            0x0, 0x4000, 0x6000, 0x8000, 0x1_0000, 0x2_0000, 0x3_0000, 0x4_0000, 0x5_0000,
            0x6_0000, 0x7_0000
        ]
    );
}

#[test]
fn erase_chip_clears_both_slots() {
    let board = SimBoard::new(BootBlock::Top);
    board.corrupt(0x10, 0xFF);
    board.corrupt(0x1F_FFFF, 0xFF);
    let mut flasher = connect(&board, 0);
    flasher.erase_chip();
    assert_eq!(board.events(), vec![Event::EraseChip]);
    assert!(board.contents(0..0x20_0000).iter().all(|&b| b == 0xFF));
}
