//! Scanline composition through the pixel queues.
//!
//! One call renders one complete line: background/window pixels are pushed
//! into the background FIFO, the objects selected by the OAM scan feed the
//! object FIFO, and the merge pass resolves priority and palettes into
//! framebuffer ARGB.

use super::ppu::Ppu;
use super::regs::{LcdControl, TileAttrs};
use super::LCD_WIDTH;

/// DMG grayscale ramp, shade 0 (white) to 3 (black).
pub const DMG_SHADES: [u32; 4] = [0xFFFF_FFFF, 0xFFAA_AAAA, 0xFF55_5555, 0xFF00_0000];

const LCDC: usize = 0x40;
const SCY: usize = 0x42;
const SCX: usize = 0x43;
const BGP: usize = 0x47;
const OBP0: usize = 0x48;
const OBP1: usize = 0x49;
const WY: usize = 0x4A;
const WX: usize = 0x4B;

const VRAM_BANK_LEN: usize = 0x2000;

/// One background or window pixel before palette resolution.
#[derive(Copy, Clone, Default)]
pub struct BgPixel {
    pub color: u8,
    pub palette: u8,
    /// CGB tile-attribute priority bit.
    pub priority: bool,
}

/// One object pixel before palette resolution; color 0 means "no object
/// covers this dot".
#[derive(Copy, Clone, Default)]
pub struct ObjPixel {
    pub color: u8,
    pub palette: u8,
    pub obp1: bool,
    pub behind_bg: bool,
}

/// OAM entry selected for the current scanline, raw hardware coordinates.
#[derive(Copy, Clone, Default)]
pub struct SpriteEntry {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub attrs: u8,
    pub oam_index: u8,
}

#[inline]
fn scale_5bit(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

/// RGB555 (red in the low bits) to 0xAARRGGBB.
fn rgb555_to_argb(color: u16) -> u32 {
    let r = scale_5bit((color & 0x1F) as u8);
    let g = scale_5bit(((color >> 5) & 0x1F) as u8);
    let b = scale_5bit(((color >> 10) & 0x1F) as u8);
    0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

fn cram_color(cram: &[u8; 0x40], palette: u8, color: u8) -> u32 {
    let base = palette as usize * 8 + color as usize * 2;
    rgb555_to_argb(u16::from_le_bytes([cram[base], cram[base + 1]]))
}

#[inline]
fn dmg_shade(palette: u8, color: u8) -> u32 {
    DMG_SHADES[((palette >> (color * 2)) & 0x03) as usize]
}

/// Two-bit color id at `pix_x` of a 16-byte tile row pair.
#[inline]
fn tile_color(lo: u8, hi: u8, pix_x: u8) -> u8 {
    let bit = 7 - pix_x;
    (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1)
}

fn tile_row(vram: &[u8; 0x4000], bank: usize, tile_addr: u16, pix_y: u8) -> (u8, u8) {
    let offset = bank * VRAM_BANK_LEN + (tile_addr - 0x8000) as usize + pix_y as usize * 2;
    (vram[offset], vram[offset + 1])
}

/// Tile-data address for a map entry under the active addressing mode.
#[inline]
fn bg_tile_addr(lcdc: LcdControl, tile_id: u8) -> u16 {
    if lcdc.contains(LcdControl::TILE_DATA_UNSIGNED) {
        0x8000 + tile_id as u16 * 16
    } else {
        (0x9000i32 + tile_id as i8 as i32 * 16) as u16
    }
}

fn fetch_bg_window(ppu: &mut Ppu, vram: &[u8; 0x4000], io: &[u8; 0x80], cgb: bool, ly: u8) {
    let lcdc = LcdControl::from_bits_retain(io[LCDC]);
    let scy = io[SCY];
    let scx = io[SCX];
    let wy = io[WY];
    let wx = io[WX];

    // On DMG, LCDC bit 0 blanks background and window outright.
    let blanked = !cgb && !lcdc.contains(LcdControl::BG_WINDOW_ENABLE);
    let window_on_line = lcdc.contains(LcdControl::WINDOW_ENABLE) && wy <= ly;

    for x in 0..LCD_WIDTH as u8 {
        if blanked {
            ppu.bg_fifo.push(BgPixel::default());
            continue;
        }

        let in_window = window_on_line && wx <= x + 7;
        let (map_base, tile_x, tile_y, mut pix_x, mut pix_y) = if in_window {
            let col = x + 7 - wx;
            let row = ly - wy;
            let base: u16 = if lcdc.contains(LcdControl::WINDOW_TILE_MAP) {
                0x9C00
            } else {
                0x9800
            };
            (base, col / 8, row / 8, col % 8, row % 8)
        } else {
            let bx = x.wrapping_add(scx);
            let by = ly.wrapping_add(scy);
            let base: u16 = if lcdc.contains(LcdControl::BG_TILE_MAP) {
                0x9C00
            } else {
                0x9800
            };
            (base, bx / 8, by / 8, bx % 8, by % 8)
        };

        let map_offset = (map_base - 0x8000) as usize + tile_y as usize * 32 + tile_x as usize;
        let tile_id = vram[map_offset];
        let attrs = if cgb {
            TileAttrs::from_bits_retain(vram[VRAM_BANK_LEN + map_offset])
        } else {
            TileAttrs::empty()
        };

        if attrs.contains(TileAttrs::Y_FLIP) {
            pix_y = 7 - pix_y;
        }
        if attrs.contains(TileAttrs::X_FLIP) {
            pix_x = 7 - pix_x;
        }

        let bank = attrs.contains(TileAttrs::VRAM_BANK) as usize;
        let (lo, hi) = tile_row(vram, bank, bg_tile_addr(lcdc, tile_id), pix_y);

        ppu.bg_fifo.push(BgPixel {
            color: tile_color(lo, hi, pix_x),
            palette: attrs.cgb_palette(),
            priority: attrs.contains(TileAttrs::PRIORITY),
        });
    }
}

fn fetch_objects(ppu: &mut Ppu, vram: &[u8; 0x4000], io: &[u8; 0x80], cgb: bool, ly: u8) {
    let lcdc = LcdControl::from_bits_retain(io[LCDC]);
    if !lcdc.contains(LcdControl::OBJ_ENABLE) {
        for _ in 0..LCD_WIDTH {
            ppu.obj_fifo.push(ObjPixel::default());
        }
        return;
    }

    let height: i16 = if lcdc.contains(LcdControl::OBJ_SIZE) {
        16
    } else {
        8
    };

    for x in 0..LCD_WIDTH as i16 {
        let mut pixel = ObjPixel::default();

        for entry in ppu.scan.as_slice() {
            let pix_x = x + 8 - entry.x as i16;
            if !(0..8).contains(&pix_x) {
                continue;
            }

            let attrs = TileAttrs::from_bits_retain(entry.attrs);
            let mut pix_x = pix_x as u8;
            if attrs.contains(TileAttrs::X_FLIP) {
                pix_x = 7 - pix_x;
            }

            let mut row = ly as i16 + 16 - entry.y as i16;
            if attrs.contains(TileAttrs::Y_FLIP) {
                row = height - 1 - row;
            }

            let mut tile = entry.tile;
            if height == 16 {
                tile &= 0xFE;
                if row >= 8 {
                    tile += 1;
                    row -= 8;
                }
            }

            // Objects always use unsigned 0x8000 addressing.
            let bank = (cgb && attrs.contains(TileAttrs::VRAM_BANK)) as usize;
            let (lo, hi) = tile_row(vram, bank, 0x8000 + tile as u16 * 16, row as u8);
            let color = tile_color(lo, hi, pix_x);
            if color == 0 {
                // Transparent here; a lower-priority object may still show.
                continue;
            }

            pixel = ObjPixel {
                color,
                palette: attrs.cgb_palette(),
                obp1: attrs.contains(TileAttrs::DMG_PALETTE),
                behind_bg: attrs.contains(TileAttrs::PRIORITY),
            };
            break;
        }

        ppu.obj_fifo.push(pixel);
    }
}

fn merge(ppu: &mut Ppu, io: &[u8; 0x80], cgb: bool, ly: u8) {
    let lcdc = LcdControl::from_bits_retain(io[LCDC]);
    let bgp = io[BGP];
    let obp0 = io[OBP0];
    let obp1 = io[OBP1];
    let row = ly as usize * LCD_WIDTH;

    for x in 0..LCD_WIDTH {
        let bg = ppu.bg_fifo.pop().expect("background FIFO underrun");
        let obj = ppu.obj_fifo.pop().expect("object FIFO underrun");

        let obj_wins = obj.color != 0
            && if cgb {
                // LCDC bit 0 clear strips all background priority on CGB.
                !lcdc.contains(LcdControl::BG_WINDOW_ENABLE)
                    || bg.color == 0
                    || (!obj.behind_bg && !bg.priority)
            } else {
                !obj.behind_bg || bg.color == 0
            };

        ppu.framebuffer[row + x] = if obj_wins {
            if cgb {
                cram_color(&ppu.obj_cram, obj.palette, obj.color)
            } else {
                dmg_shade(if obj.obp1 { obp1 } else { obp0 }, obj.color)
            }
        } else if cgb {
            cram_color(&ppu.bg_cram, bg.palette, bg.color)
        } else {
            dmg_shade(bgp, bg.color)
        };
    }
}

/// Render the scanline `ly` using the latched OAM scan result.
pub(super) fn draw_scanline(
    ppu: &mut Ppu,
    vram: &[u8; 0x4000],
    io: &[u8; 0x80],
    cgb: bool,
    ly: u8,
) {
    ppu.bg_fifo.clear();
    ppu.obj_fifo.clear();
    fetch_bg_window(ppu, vram, io, cgb, ly);
    fetch_objects(ppu, vram, io, cgb, ly);
    merge(ppu, io, cgb, ly);
}
