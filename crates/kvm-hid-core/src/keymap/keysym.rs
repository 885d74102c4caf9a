//! Unicode character to X11 KeySym conversion.
//!
//! Keymap files index their entries by KeySym, so typing text first turns each
//! character into the KeySym an X11 keyboard layout would use for it.  The rules
//! follow libxkbcommon's `xkb_utf32_to_keysym`:
//!
//! 1. Control characters with a dedicated function key (`BackSpace`, `Tab`,
//!    `Linefeed`, `Return`, `Escape`, `Delete`) map to their `0xFFxx` KeySym.
//! 2. Other C0/C1 control characters, surrogates and values past U+10FFFF have
//!    no KeySym.
//! 3. Latin-1 (U+0020–U+007E, U+00A0–U+00FF) maps to the identical value.
//! 4. Characters that X11 assigned a *legacy* KeySym before Unicode KeySyms
//!    existed use that value (Latin-2 `0x01xx`, Cyrillic `0x06xx`, the Euro sign).
//! 5. Everything else uses the Unicode KeySym `0x0100_0000 | codepoint`.
//!
//! Reference: https://gitlab.freedesktop.org/xorg/proto/xorgproto/-/blob/master/include/X11/keysymdef.h
//!
//! Only the legacy blocks used by the shipped European and Cyrillic layouts are
//! tabulated here; a layout file that indexes another legacy block by its old
//! KeySym will not match, and its characters are skipped while typing.

/// Offset added to a code point to form its Unicode KeySym.
pub const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

/// Legacy Latin-2 KeySyms (`0x01A1`–`0x01FF`) and their code points.
const LATIN2: &[(u32, u32)] = &[
    (0x01A1, 0x0104), // Aogonek
    (0x01A2, 0x02D8), // breve
    (0x01A3, 0x0141), // Lstroke
    (0x01A5, 0x013D), // Lcaron
    (0x01A6, 0x015A), // Sacute
    (0x01A9, 0x0160), // Scaron
    (0x01AA, 0x015E), // Scedilla
    (0x01AB, 0x0164), // Tcaron
    (0x01AC, 0x0179), // Zacute
    (0x01AE, 0x017D), // Zcaron
    (0x01AF, 0x017B), // Zabovedot
    (0x01B1, 0x0105), // aogonek
    (0x01B2, 0x02DB), // ogonek
    (0x01B3, 0x0142), // lstroke
    (0x01B5, 0x013E), // lcaron
    (0x01B6, 0x015B), // sacute
    (0x01B7, 0x02C7), // caron
    (0x01B9, 0x0161), // scaron
    (0x01BA, 0x015F), // scedilla
    (0x01BB, 0x0165), // tcaron
    (0x01BC, 0x017A), // zacute
    (0x01BD, 0x02DD), // doubleacute
    (0x01BE, 0x017E), // zcaron
    (0x01BF, 0x017C), // zabovedot
    (0x01C0, 0x0154), // Racute
    (0x01C3, 0x0102), // Abreve
    (0x01C5, 0x0139), // Lacute
    (0x01C6, 0x0106), // Cacute
    (0x01C8, 0x010C), // Ccaron
    (0x01CA, 0x0118), // Eogonek
    (0x01CC, 0x011A), // Ecaron
    (0x01CF, 0x010E), // Dcaron
    (0x01D0, 0x0110), // Dstroke
    (0x01D1, 0x0143), // Nacute
    (0x01D2, 0x0147), // Ncaron
    (0x01D5, 0x0150), // Odoubleacute
    (0x01D8, 0x0158), // Rcaron
    (0x01D9, 0x016E), // Uring
    (0x01DB, 0x0170), // Udoubleacute
    (0x01DE, 0x0162), // Tcedilla
    (0x01E0, 0x0155), // racute
    (0x01E3, 0x0103), // abreve
    (0x01E5, 0x013A), // lacute
    (0x01E6, 0x0107), // cacute
    (0x01E8, 0x010D), // ccaron
    (0x01EA, 0x0119), // eogonek
    (0x01EC, 0x011B), // ecaron
    (0x01EF, 0x010F), // dcaron
    (0x01F0, 0x0111), // dstroke
    (0x01F1, 0x0144), // nacute
    (0x01F2, 0x0148), // ncaron
    (0x01F5, 0x0151), // odoubleacute
    (0x01F8, 0x0159), // rcaron
    (0x01F9, 0x016F), // uring
    (0x01FB, 0x0171), // udoubleacute
    (0x01FE, 0x0163), // tcedilla
    (0x01FF, 0x02D9), // abovedot
];

/// Lowercase Cyrillic letters in legacy KeySym order (`0x06C0`–`0x06DF`).
///
/// The uppercase block `0x06E0`–`0x06FF` uses the same order, shifted down by
/// 0x20 in code point.
const CYRILLIC_LOWER: [u32; 32] = [
    0x044E, 0x0430, 0x0431, 0x0446, 0x0434, 0x0435, 0x0444, 0x0433, // yu a be tse de ie ef ghe
    0x0445, 0x0438, 0x0439, 0x043A, 0x043B, 0x043C, 0x043D, 0x043E, // ha i shorti ka el em en o
    0x043F, 0x044F, 0x0440, 0x0441, 0x0442, 0x0443, 0x0436, 0x0432, // pe ya er es te u zhe ve
    0x044C, 0x044B, 0x0437, 0x0448, 0x044D, 0x0449, 0x0447, 0x044A, // softsign yeru ze sha e shcha che hardsign
];

const CYRILLIC_LOWER_BASE: u32 = 0x06C0;
const CYRILLIC_UPPER_BASE: u32 = 0x06E0;
const CYRILLIC_IO: (u32, u32) = (0x06A3, 0x0451);
const CYRILLIC_CAPITAL_IO: (u32, u32) = (0x06B3, 0x0401);
const EURO_SIGN: (u32, u32) = (0x20AC, 0x20AC);

/// Converts a character to its X11 KeySym.
///
/// Returns `None` when the character has no KeySym (most control characters,
/// which X11 leaves unassigned).
pub fn char_to_keysym(ch: char) -> Option<u32> {
    let cp = ch as u32;

    match cp {
        0x08 => return Some(0xFF08), // BackSpace
        0x09 => return Some(0xFF09), // Tab
        0x0A => return Some(0xFF0A), // Linefeed
        0x0D => return Some(0xFF0D), // Return
        0x1B => return Some(0xFF1B), // Escape
        0x7F => return Some(0xFFFF), // Delete
        0x00..=0x1F | 0x80..=0x9F => return None,
        0x20..=0x7E | 0xA0..=0xFF => return Some(cp),
        _ => {}
    }

    if let Some(legacy) = legacy_keysym(cp) {
        return Some(legacy);
    }

    // `char` excludes surrogates and values past U+10FFFF already.
    Some(UNICODE_KEYSYM_BASE | cp)
}

/// Converts a KeySym back to the character it produces, if any.
///
/// Function-key KeySyms (`0xFFxx`) other than the control characters handled
/// by [`char_to_keysym`] return `None`.
pub fn keysym_to_char(keysym: u32) -> Option<char> {
    let cp = match keysym {
        0xFF08 => 0x08,
        0xFF09 => 0x09,
        0xFF0A => 0x0A,
        0xFF0D => 0x0D,
        0xFF1B => 0x1B,
        0xFFFF => 0x7F,
        0x20..=0x7E | 0xA0..=0xFF => keysym,
        k if k & 0xFF00_0000 == UNICODE_KEYSYM_BASE => k & 0x00FF_FFFF,
        k => legacy_codepoint(k)?,
    };
    char::from_u32(cp)
}

fn legacy_keysym(cp: u32) -> Option<u32> {
    if let Some(&(keysym, _)) = LATIN2.iter().find(|&&(_, c)| c == cp) {
        return Some(keysym);
    }
    if let Some(i) = CYRILLIC_LOWER.iter().position(|&c| c == cp) {
        return Some(CYRILLIC_LOWER_BASE + i as u32);
    }
    if let Some(i) = CYRILLIC_LOWER.iter().position(|&c| c - 0x20 == cp) {
        return Some(CYRILLIC_UPPER_BASE + i as u32);
    }
    [CYRILLIC_IO, CYRILLIC_CAPITAL_IO, EURO_SIGN]
        .iter()
        .find(|&&(_, c)| c == cp)
        .map(|&(keysym, _)| keysym)
}

fn legacy_codepoint(keysym: u32) -> Option<u32> {
    if let Some(&(_, cp)) = LATIN2.iter().find(|&&(k, _)| k == keysym) {
        return Some(cp);
    }
    match keysym {
        k if (CYRILLIC_LOWER_BASE..CYRILLIC_UPPER_BASE).contains(&k) => {
            Some(CYRILLIC_LOWER[(k - CYRILLIC_LOWER_BASE) as usize])
        }
        k if (CYRILLIC_UPPER_BASE..CYRILLIC_UPPER_BASE + 0x20).contains(&k) => {
            Some(CYRILLIC_LOWER[(k - CYRILLIC_UPPER_BASE) as usize] - 0x20)
        }
        _ => [CYRILLIC_IO, CYRILLIC_CAPITAL_IO, EURO_SIGN]
            .iter()
            .find(|&&(k, _)| k == keysym)
            .map(|&(_, cp)| cp),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
