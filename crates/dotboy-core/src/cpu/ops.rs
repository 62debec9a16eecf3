//! Unprefixed opcode handlers.
//!
//! `step` is called once per machine cycle with the latched opcode; it
//! returns true on the instruction's final cycle. Step 1 is the cycle the
//! opcode byte was fetched in, so single-cycle operations do all their
//! work there, and every memory access sits in the machine cycle the
//! hardware performs it in.

use crate::bus::Bus;
use crate::interrupt::pending_mask;

use super::cpu::{Cpu, Flag, R8};

fn r8_from_code(code: u8) -> R8 {
    match code & 0x07 {
        0 => R8::B,
        1 => R8::C,
        2 => R8::D,
        3 => R8::E,
        4 => R8::H,
        5 => R8::L,
        6 => R8::HlInd,
        _ => R8::A,
    }
}

/// Branch condition encoded in bits 4..3 of the conditional opcodes.
fn cond(cpu: &Cpu, opcode: u8) -> bool {
    match opcode {
        0x20 | 0xC0 | 0xC2 | 0xC4 => !cpu.flag(Flag::Z),
        0x28 | 0xC8 | 0xCA | 0xCC => cpu.flag(Flag::Z),
        0x30 | 0xD0 | 0xD2 | 0xD4 => !cpu.flag(Flag::C),
        0x38 | 0xD8 | 0xDA | 0xDC => cpu.flag(Flag::C),
        _ => true,
    }
}

fn alu_add(cpu: &mut Cpu, a: u8, b: u8, carry_in: u8) -> u8 {
    let sum = a as u16 + b as u16 + carry_in as u16;
    let res = sum as u8;
    cpu.set_flag(Flag::Z, res == 0);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, (a & 0x0F) + (b & 0x0F) + carry_in > 0x0F);
    cpu.set_flag(Flag::C, sum > 0xFF);
    res
}

fn alu_sub(cpu: &mut Cpu, a: u8, b: u8, carry_in: u8) -> u8 {
    let res = a.wrapping_sub(b).wrapping_sub(carry_in);
    cpu.set_flag(Flag::Z, res == 0);
    cpu.set_flag(Flag::N, true);
    cpu.set_flag(Flag::H, (a & 0x0F) < (b & 0x0F) + carry_in);
    cpu.set_flag(Flag::C, (a as u16) < b as u16 + carry_in as u16);
    res
}

/// The eight accumulator operations selected by bits 5..3 of 0x80..0xBF
/// and of the immediate forms.
fn acc_op(cpu: &mut Cpu, selector: u8, v: u8) {
    let carry = cpu.flag(Flag::C) as u8;
    match selector & 0x07 {
        0 => cpu.a = alu_add(cpu, cpu.a, v, 0),
        1 => cpu.a = alu_add(cpu, cpu.a, v, carry),
        2 => cpu.a = alu_sub(cpu, cpu.a, v, 0),
        3 => cpu.a = alu_sub(cpu, cpu.a, v, carry),
        4 => {
            cpu.a &= v;
            cpu.set_flag(Flag::Z, cpu.a == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, true);
            cpu.set_flag(Flag::C, false);
        }
        5 => {
            cpu.a ^= v;
            cpu.set_flag(Flag::Z, cpu.a == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, false);
        }
        6 => {
            cpu.a |= v;
            cpu.set_flag(Flag::Z, cpu.a == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, false);
        }
        _ => {
            // CP: subtract without storing.
            let _ = alu_sub(cpu, cpu.a, v, 0);
        }
    }
}

fn inc8(cpu: &mut Cpu, v: u8) -> u8 {
    let res = v.wrapping_add(1);
    cpu.set_flag(Flag::Z, res == 0);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, v & 0x0F == 0x0F);
    res
}

fn dec8(cpu: &mut Cpu, v: u8) -> u8 {
    let res = v.wrapping_sub(1);
    cpu.set_flag(Flag::Z, res == 0);
    cpu.set_flag(Flag::N, true);
    cpu.set_flag(Flag::H, v & 0x0F == 0x00);
    res
}

fn daa(cpu: &mut Cpu) {
    let mut adjust = 0u8;
    let mut carry = cpu.flag(Flag::C);

    if !cpu.flag(Flag::N) {
        if cpu.flag(Flag::H) || cpu.a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        if carry || cpu.a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        cpu.a = cpu.a.wrapping_add(adjust);
    } else {
        if cpu.flag(Flag::H) {
            adjust |= 0x06;
        }
        if carry {
            adjust |= 0x60;
        }
        cpu.a = cpu.a.wrapping_sub(adjust);
    }

    cpu.set_flag(Flag::Z, cpu.a == 0);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, carry);
}

/// SP + signed immediate, with the 8-bit flag rules shared by ADD SP,e8
/// and LD HL,SP+e8.
fn sp_plus_e8(cpu: &mut Cpu, e: u8) -> u16 {
    let sp = cpu.sp;
    let e16 = e as i8 as i16 as u16;
    cpu.set_flag(Flag::Z, false);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, (sp & 0x0F) + (e16 & 0x0F) > 0x0F);
    cpu.set_flag(Flag::C, (sp & 0xFF) + (e16 & 0xFF) > 0xFF);
    sp.wrapping_add(e16)
}

pub(crate) fn step(cpu: &mut Cpu, bus: &mut Bus, opcode: u8) -> bool {
    let step = cpu.instr.step;
    match opcode {
        0x00 => true, // NOP

        // Prefix: the next byte selects from the CB table; no interrupt
        // window between the two fetches.
        0xCB => {
            cpu.cb_pending = true;
            true
        }

        0x10 => match step {
            1 => false,
            _ => {
                // STOP consumes its padding byte unconditionally.
                let _ = cpu.fetch8(bus);
                if bus.try_cgb_speed_switch() {
                    bus.clear_divider();
                } else {
                    cpu.stopped = true;
                }
                true
            }
        },

        0x76 => {
            // HALT bug: with IME off and something already pending, the
            // CPU does not halt and the next fetch repeats its byte.
            if !cpu.ime && pending_mask(bus.ie, bus.iflag) != 0 {
                cpu.halt_bug = true;
            } else {
                cpu.halted = true;
            }
            true
        }

        // LD rr,d16
        0x01 | 0x11 | 0x21 | 0x31 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            _ => {
                cpu.instr.hi = cpu.fetch8(bus);
                let v = cpu.instr.word();
                match opcode {
                    0x01 => cpu.set_bc(v),
                    0x11 => cpu.set_de(v),
                    0x21 => cpu.set_hl(v),
                    _ => cpu.sp = v,
                }
                true
            }
        },

        // LD (BC/DE),A and LD A,(BC/DE)
        0x02 | 0x12 => match step {
            1 => false,
            _ => {
                let addr = if opcode == 0x02 { cpu.bc() } else { cpu.de() };
                bus.write8(addr, cpu.a);
                true
            }
        },
        0x0A | 0x1A => match step {
            1 => false,
            _ => {
                let addr = if opcode == 0x0A { cpu.bc() } else { cpu.de() };
                cpu.a = bus.read8(addr);
                true
            }
        },

        // LD (HL±),A and LD A,(HL±)
        0x22 | 0x32 => match step {
            1 => false,
            _ => {
                let addr = cpu.hl();
                bus.write8(addr, cpu.a);
                cpu.set_hl(if opcode == 0x22 {
                    addr.wrapping_add(1)
                } else {
                    addr.wrapping_sub(1)
                });
                true
            }
        },
        0x2A | 0x3A => match step {
            1 => false,
            _ => {
                let addr = cpu.hl();
                cpu.a = bus.read8(addr);
                cpu.set_hl(if opcode == 0x2A {
                    addr.wrapping_add(1)
                } else {
                    addr.wrapping_sub(1)
                });
                true
            }
        },

        // LD (a16),SP
        0x08 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.fetch8(bus);
                cpu.instr.addr = cpu.instr.word();
                false
            }
            4 => {
                bus.write8(cpu.instr.addr, cpu.sp as u8);
                false
            }
            _ => {
                bus.write8(cpu.instr.addr.wrapping_add(1), (cpu.sp >> 8) as u8);
                true
            }
        },

        // INC rr / DEC rr (the adjust happens in the internal cycle)
        0x03 | 0x13 | 0x23 | 0x33 => match step {
            1 => false,
            _ => {
                match opcode {
                    0x03 => cpu.set_bc(cpu.bc().wrapping_add(1)),
                    0x13 => cpu.set_de(cpu.de().wrapping_add(1)),
                    0x23 => cpu.set_hl(cpu.hl().wrapping_add(1)),
                    _ => cpu.sp = cpu.sp.wrapping_add(1),
                }
                true
            }
        },
        0x0B | 0x1B | 0x2B | 0x3B => match step {
            1 => false,
            _ => {
                match opcode {
                    0x0B => cpu.set_bc(cpu.bc().wrapping_sub(1)),
                    0x1B => cpu.set_de(cpu.de().wrapping_sub(1)),
                    0x2B => cpu.set_hl(cpu.hl().wrapping_sub(1)),
                    _ => cpu.sp = cpu.sp.wrapping_sub(1),
                }
                true
            }
        },

        // INC/DEC (HL): read, then write back
        0x34 | 0x35 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = bus.read8(cpu.hl());
                false
            }
            _ => {
                let v = cpu.instr.lo;
                let res = if opcode == 0x34 {
                    inc8(cpu, v)
                } else {
                    dec8(cpu, v)
                };
                bus.write8(cpu.hl(), res);
                true
            }
        },

        // INC r / DEC r
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
            let r = r8_from_code(opcode >> 3);
            let v = cpu.reg8(r);
            let res = inc8(cpu, v);
            cpu.set_reg8(r, res);
            true
        }
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
            let r = r8_from_code(opcode >> 3);
            let v = cpu.reg8(r);
            let res = dec8(cpu, v);
            cpu.set_reg8(r, res);
            true
        }

        // LD (HL),d8
        0x36 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            _ => {
                bus.write8(cpu.hl(), cpu.instr.lo);
                true
            }
        },

        // LD r,d8
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => match step {
            1 => false,
            _ => {
                let v = cpu.fetch8(bus);
                cpu.set_reg8(r8_from_code(opcode >> 3), v);
                true
            }
        },

        // Accumulator rotates always clear Z.
        0x07 => {
            let carry = cpu.a & 0x80 != 0;
            cpu.a = cpu.a.rotate_left(1);
            rot_a_flags(cpu, carry);
            true
        }
        0x0F => {
            let carry = cpu.a & 0x01 != 0;
            cpu.a = cpu.a.rotate_right(1);
            rot_a_flags(cpu, carry);
            true
        }
        0x17 => {
            let carry_in = cpu.flag(Flag::C) as u8;
            let carry = cpu.a & 0x80 != 0;
            cpu.a = (cpu.a << 1) | carry_in;
            rot_a_flags(cpu, carry);
            true
        }
        0x1F => {
            let carry_in = (cpu.flag(Flag::C) as u8) << 7;
            let carry = cpu.a & 0x01 != 0;
            cpu.a = (cpu.a >> 1) | carry_in;
            rot_a_flags(cpu, carry);
            true
        }

        // ADD HL,rr (bit-11 half carry)
        0x09 | 0x19 | 0x29 | 0x39 => match step {
            1 => false,
            _ => {
                let hl = cpu.hl();
                let rr = match opcode {
                    0x09 => cpu.bc(),
                    0x19 => cpu.de(),
                    0x29 => cpu.hl(),
                    _ => cpu.sp,
                };
                let sum = hl as u32 + rr as u32;
                cpu.set_flag(Flag::N, false);
                cpu.set_flag(Flag::H, (hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF);
                cpu.set_flag(Flag::C, sum > 0xFFFF);
                cpu.set_hl(sum as u16);
                true
            }
        },

        // JR e8 / JR cc,e8 (a failed condition skips the internal cycle)
        0x18 | 0x20 | 0x28 | 0x30 | 0x38 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                opcode != 0x18 && !cond(cpu, opcode)
            }
            _ => {
                let offset = cpu.instr.lo as i8 as i16 as u16;
                cpu.pc = cpu.pc.wrapping_add(offset);
                true
            }
        },

        0x27 => {
            daa(cpu);
            true
        }
        0x2F => {
            cpu.a = !cpu.a;
            cpu.set_flag(Flag::N, true);
            cpu.set_flag(Flag::H, true);
            true
        }
        0x37 => {
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, true);
            true
        }
        0x3F => {
            let c = cpu.flag(Flag::C);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, !c);
            true
        }

        // LD r,r' and the (HL) forms
        0x40..=0x7F => {
            let dst = r8_from_code(opcode >> 3);
            let src = r8_from_code(opcode);
            match (dst, src) {
                (R8::HlInd, _) => match step {
                    1 => false,
                    _ => {
                        bus.write8(cpu.hl(), cpu.reg8(src));
                        true
                    }
                },
                (_, R8::HlInd) => match step {
                    1 => false,
                    _ => {
                        let v = bus.read8(cpu.hl());
                        cpu.set_reg8(dst, v);
                        true
                    }
                },
                _ => {
                    let v = cpu.reg8(src);
                    cpu.set_reg8(dst, v);
                    true
                }
            }
        }

        // ALU A,r and ALU A,(HL)
        0x80..=0xBF => {
            let r = r8_from_code(opcode);
            if r == R8::HlInd {
                match step {
                    1 => false,
                    _ => {
                        let v = bus.read8(cpu.hl());
                        acc_op(cpu, opcode >> 3, v);
                        true
                    }
                }
            } else {
                let v = cpu.reg8(r);
                acc_op(cpu, opcode >> 3, v);
                true
            }
        }

        // ALU A,d8
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => match step {
            1 => false,
            _ => {
                let v = cpu.fetch8(bus);
                acc_op(cpu, opcode >> 3, v);
                true
            }
        },

        // RET cc: condition is tested in its own internal cycle
        0xC0 | 0xC8 | 0xD0 | 0xD8 => match step {
            1 => false,
            2 => !cond(cpu, opcode),
            3 => {
                cpu.instr.lo = cpu.stack_pop(bus);
                false
            }
            4 => {
                cpu.instr.hi = cpu.stack_pop(bus);
                false
            }
            _ => {
                cpu.pc = cpu.instr.word();
                true
            }
        },

        // RET / RETI
        0xC9 | 0xD9 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.stack_pop(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.stack_pop(bus);
                false
            }
            _ => {
                cpu.pc = cpu.instr.word();
                if opcode == 0xD9 {
                    cpu.ime = true;
                }
                true
            }
        },

        // POP rr
        0xC1 | 0xD1 | 0xE1 | 0xF1 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.stack_pop(bus);
                false
            }
            _ => {
                cpu.instr.hi = cpu.stack_pop(bus);
                let v = cpu.instr.word();
                match opcode {
                    0xC1 => cpu.set_bc(v),
                    0xD1 => cpu.set_de(v),
                    0xE1 => cpu.set_hl(v),
                    _ => cpu.set_af(v),
                }
                true
            }
        },

        // PUSH rr
        0xC5 | 0xD5 | 0xE5 | 0xF5 => match step {
            1 | 2 => false,
            3 => {
                let v = push_source(cpu, opcode);
                cpu.stack_push(bus, (v >> 8) as u8);
                false
            }
            _ => {
                let v = push_source(cpu, opcode);
                cpu.stack_push(bus, v as u8);
                true
            }
        },

        // JP a16 / JP cc,a16
        0xC3 | 0xC2 | 0xCA | 0xD2 | 0xDA => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.fetch8(bus);
                opcode != 0xC3 && !cond(cpu, opcode)
            }
            _ => {
                cpu.pc = cpu.instr.word();
                true
            }
        },

        // CALL a16 / CALL cc,a16
        0xCD | 0xC4 | 0xCC | 0xD4 | 0xDC => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.fetch8(bus);
                opcode != 0xCD && !cond(cpu, opcode)
            }
            4 => false,
            5 => {
                cpu.stack_push(bus, (cpu.pc >> 8) as u8);
                false
            }
            _ => {
                cpu.stack_push(bus, cpu.pc as u8);
                cpu.pc = cpu.instr.word();
                true
            }
        },

        // RST: jump to a fixed vector encoded in the opcode
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => match step {
            1 | 2 => false,
            3 => {
                cpu.stack_push(bus, (cpu.pc >> 8) as u8);
                false
            }
            _ => {
                cpu.stack_push(bus, cpu.pc as u8);
                cpu.pc = (opcode & 0x38) as u16;
                true
            }
        },

        // LDH (a8),A / LDH A,(a8)
        0xE0 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            _ => {
                bus.write8(0xFF00 | cpu.instr.lo as u16, cpu.a);
                true
            }
        },
        0xF0 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            _ => {
                cpu.a = bus.read8(0xFF00 | cpu.instr.lo as u16);
                true
            }
        },

        // LD (C),A / LD A,(C)
        0xE2 => match step {
            1 => false,
            _ => {
                bus.write8(0xFF00 | cpu.c as u16, cpu.a);
                true
            }
        },
        0xF2 => match step {
            1 => false,
            _ => {
                cpu.a = bus.read8(0xFF00 | cpu.c as u16);
                true
            }
        },

        // LD (a16),A / LD A,(a16)
        0xEA => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.fetch8(bus);
                false
            }
            _ => {
                bus.write8(cpu.instr.word(), cpu.a);
                true
            }
        },
        0xFA => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => {
                cpu.instr.hi = cpu.fetch8(bus);
                false
            }
            _ => {
                cpu.a = bus.read8(cpu.instr.word());
                true
            }
        },

        // ADD SP,e8 / LD HL,SP+e8 / LD SP,HL
        0xE8 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            3 => false,
            _ => {
                cpu.sp = sp_plus_e8(cpu, cpu.instr.lo);
                true
            }
        },
        0xF8 => match step {
            1 => false,
            2 => {
                cpu.instr.lo = cpu.fetch8(bus);
                false
            }
            _ => {
                let v = sp_plus_e8(cpu, cpu.instr.lo);
                cpu.set_hl(v);
                true
            }
        },
        0xF9 => match step {
            1 => false,
            _ => {
                cpu.sp = cpu.hl();
                true
            }
        },

        // JP HL
        0xE9 => {
            cpu.pc = cpu.hl();
            true
        }

        // DI takes effect immediately and cancels a pending EI.
        0xF3 => {
            cpu.ime = false;
            cpu.cancel_ime_enable();
            true
        }
        0xFB => {
            cpu.schedule_ime_enable();
            true
        }

        // Illegal opcodes behave as NOP.
        _ => true,
    }
}

fn rot_a_flags(cpu: &mut Cpu, carry: bool) {
    cpu.set_flag(Flag::Z, false);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, carry);
}

fn push_source(cpu: &Cpu, opcode: u8) -> u16 {
    match opcode {
        0xC5 => cpu.bc(),
        0xD5 => cpu.de(),
        0xE5 => cpu.hl(),
        _ => cpu.af(),
    }
}
