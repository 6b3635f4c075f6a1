//! Human-readable bytecode listing, used by `--debug` runs and tests.

use crate::bytecode::{Bytecode, Instruction, Opcode};

/// Format one instruction, resolving pool indices to their strings where
/// the opcode references the constant pool.
pub fn format_instruction(bc: &Bytecode, inst: &Instruction) -> String {
    match inst.opcode {
        Opcode::Nop | Opcode::Ret | Opcode::Halt | Opcode::CoroYield => {
            inst.opcode.mnemonic().to_string()
        }
        Opcode::LoadConst => format!("LOAD_CONST r{}, {}", inst.op1, inst.op2),
        Opcode::LoadConstFloat => format!(
            "LOAD_CONST_FLOAT r{}, [{}]={:?}",
            inst.op1,
            inst.op2,
            bc.constant_pool.get(inst.op2).unwrap_or("?")
        ),
        Opcode::LoadConstStr => format!(
            "LOAD_CONST_STR r{}, [{}]={:?}",
            inst.op1,
            inst.op2,
            bc.constant_pool.get(inst.op2).unwrap_or("?")
        ),
        Opcode::Move => format!("MOVE r{}, r{}", inst.op1, inst.op2),
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Eq | Opcode::Neq => {
            format!(
                "{} r{}, r{}, r{}",
                inst.opcode.mnemonic(),
                inst.op1,
                inst.op2,
                inst.op3
            )
        }
        Opcode::Jump => format!("JUMP {}", inst.op1),
        Opcode::JumpIfZero => format!("JUMP_IF_ZERO {}, r{}", inst.op1, inst.op2),
        Opcode::Call => format!("CALL {}", inst.op1),
        Opcode::CallNative => format!(
            "CALL_NATIVE r{}, [{}]={:?}, argc={}, base=r{}",
            inst.op1,
            inst.op2,
            bc.constant_pool.get(inst.op2).unwrap_or("?"),
            inst.op3,
            inst.op4
        ),
        Opcode::NewObj => format!("NEWOBJ r{}", inst.op1),
        Opcode::SetProp => format!("SETPROP r{}, r{}, r{}", inst.op1, inst.op2, inst.op3),
        Opcode::GetProp => format!("GETPROP r{}, r{}, r{}", inst.op1, inst.op2, inst.op3),
        Opcode::CoroInit => format!("CORO_INIT r{}", inst.op1),
        Opcode::CoroResume => format!("CORO_RESUME {}", inst.op1),
    }
}

/// Render the full program: instruction listing followed by the pool.
pub fn disassemble(bc: &Bytecode) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "---- bytecode ({} instructions) ----\n",
        bc.instructions.len()
    ));
    for (pc, inst) in bc.instructions.iter().enumerate() {
        out.push_str(&format!("{:4}: {}\n", pc, format_instruction(bc, inst)));
    }
    out.push_str(&format!(
        "---- constant pool ({} entries) ----\n",
        bc.constant_pool.len()
    ));
    for index in 0..bc.constant_pool.len() {
        out.push_str(&format!(
            "[{:2}] {:?}\n",
            index,
            bc.constant_pool.get(index as i32).unwrap_or("?")
        ));
    }
    out
}

/// Dump the listing to stderr (debug mode).
pub fn print_bc(bc: &Bytecode) {
    eprint!("{}", disassemble(bc));
}
