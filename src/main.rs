//! Demonstration driver: assembles a small module in memory and runs it.
//! The real front end (compiler and module loader) lives outside this crate.

use log::{info, LevelFilter};
use pretty_env_logger::env_logger::Target;

use zata_vm::opcode::Opcode;
use zata_vm::types::{create_code, create_int, create_module, create_str};
use zata_vm::vm::mem::Payload;

fn main() {
    pretty_env_logger::formatted_builder()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Info)
        .init();

    info!("starting demo module");

    // print("hello from zata"); print((2 + 3) * 7)
    let consts = vec![
        create_str("hello from zata"),
        create_int(2),
        create_int(3),
        create_int(7),
    ];
    let names = vec!["print".to_string()];

    #[rustfmt::skip]
    let words = vec![
        Opcode::LoadConst as i32, 0,
        Opcode::LoadGlobal as i32, 0,
        Opcode::Call as i32, 1,
        Opcode::Pop as i32,
        Opcode::LoadConst as i32, 1,
        Opcode::LoadConst as i32, 2,
        Opcode::BCalc as i32, 0,
        Opcode::LoadConst as i32, 3,
        Opcode::BCalc as i32, 2,
        Opcode::LoadGlobal as i32, 0,
        Opcode::Call as i32, 1,
        Opcode::Pop as i32,
        Opcode::Halt as i32,
    ];

    let code = create_code(0, consts, vec![], words, vec![]);
    let module = create_module("demo", "demo.zir", names, code, vec![]);

    let stack = zata_vm::execute_module(module, vec![]);

    for value in &stack {
        match &value.payload {
            Payload::Int(v) => info!("leftover stack value: {}", v),
            other => info!("leftover stack value of type {}", other.tag()),
        }
    }
}
