#![no_main]

use libfuzzer_sys::fuzz_target;
use register_model::{AccessMode, AnyValue, RegisterAccess, RegisterArena};

const WIDTHS: [usize; 5] = [1, 8, 13, 32, 64];

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mut arena = RegisterArena::new();
    let alignment = u64::from(data[0] % 3) * 4;
    let Ok(file) = arena.create_file("fuzz", "", alignment) else {
        return;
    };
    let Ok(child) = arena.create_file("child", "", alignment) else {
        return;
    };

    for (index, chunk) in data[1..].chunks(4).enumerate() {
        let address = u64::from(chunk[0] & 0x3F);
        let width = WIDTHS[usize::from(chunk.get(1).copied().unwrap_or(0)) % WIDTHS.len()];
        let target = if chunk.get(2).is_some_and(|op| op & 1 == 0) { file } else { child };
        let Ok(mut view) = arena.file_mut(target) else {
            return;
        };
        match chunk.get(3).copied().unwrap_or(0) % 5 {
            0 => {
                let _ = view.create_register(address, width, &format!("R{index}"), "", AccessMode::ReadWrite);
            }
            1 => {
                let _ = view.write(address, &chunk[..chunk.len().min(2)]);
            }
            2 => {
                let mut buffer = [0_u8; 8];
                let _ = view.read(address, &mut buffer[..chunk.len()]);
            }
            3 => {
                let _ = view.add_register_file(address, child, None);
            }
            _ => {
                if let Ok(register) = view.register_at_mut(address) {
                    let _ = register.add_field("F", usize::from(chunk[0]) % 70, width - 1);
                    let _ = register.write_any(&AnyValue::UInt(u64::from(chunk[0])));
                }
            }
        }
    }

    if let Ok(view) = arena.file(file) {
        let _ = view.recursive_info(0);
        let _ = view.flattened_info();
    }
});
