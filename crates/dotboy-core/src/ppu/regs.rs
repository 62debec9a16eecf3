use bitflags::bitflags;

bitflags! {
    /// LCDC (FF40).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct LcdControl: u8 {
        /// DMG: background + window display. CGB: background/window
        /// master priority (clear = objects always in front).
        const BG_WINDOW_ENABLE = 1 << 0;
        const OBJ_ENABLE       = 1 << 1;
        /// Clear = 8x8 objects, set = 8x16.
        const OBJ_SIZE         = 1 << 2;
        /// Clear = 0x9800 map, set = 0x9C00.
        const BG_TILE_MAP      = 1 << 3;
        /// Set = unsigned tile ids from 0x8000, clear = signed from 0x9000.
        const TILE_DATA_UNSIGNED = 1 << 4;
        const WINDOW_ENABLE    = 1 << 5;
        const WINDOW_TILE_MAP  = 1 << 6;
        const LCD_ENABLE       = 1 << 7;
    }
}

bitflags! {
    /// STAT (FF41). Bits 2..0 are composed by the PPU; 6..3 are the
    /// software-writable interrupt source enables.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct LcdStatus: u8 {
        const MODE_LOW    = 1 << 0;
        const MODE_HIGH   = 1 << 1;
        const LYC_EQUAL   = 1 << 2;
        const HBLANK_IRQ  = 1 << 3;
        const VBLANK_IRQ  = 1 << 4;
        const OAM_IRQ     = 1 << 5;
        const LYC_IRQ     = 1 << 6;
    }
}

bitflags! {
    /// OAM attribute byte, also the CGB background tile attribute layout.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TileAttrs: u8 {
        const CGB_PALETTE = 0x07;
        const VRAM_BANK   = 1 << 3;
        /// DMG objects: clear = OBP0, set = OBP1.
        const DMG_PALETTE = 1 << 4;
        const X_FLIP      = 1 << 5;
        const Y_FLIP      = 1 << 6;
        /// Objects: render behind nonzero background. Background tiles
        /// (CGB): priority over objects.
        const PRIORITY    = 1 << 7;
    }
}

impl TileAttrs {
    #[inline]
    pub fn cgb_palette(self) -> u8 {
        self.bits() & Self::CGB_PALETTE.bits()
    }
}
