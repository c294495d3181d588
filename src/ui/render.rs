use crate::config::Theme;

/// RGBA colour with straight alpha.
pub type Rgba = (u8, u8, u8, u8);

pub struct Palette {
    pub background: [u8; 3],
    pub text: Rgba,
    pub dim_text: Rgba,
    pub bar: Rgba,
    pub error: Rgba,
}

pub fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            background: [30, 30, 30],
            text: (224, 224, 224, 255),
            dim_text: (176, 176, 176, 255),
            bar: (60, 60, 60, 230),
            error: (255, 80, 80, 255),
        },
        Theme::Light => Palette {
            background: [240, 240, 240],
            text: (20, 20, 20, 255),
            dim_text: (80, 80, 80, 255),
            bar: (210, 210, 210, 230),
            error: (190, 20, 20, 255),
        },
    }
}

// 5x7 bitmap font for ASCII 32..127, one byte per column, LSB = top row.
static FONT_5X7: [[u8; 5]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x5F, 0x00, 0x00], [0x00, 0x07, 0x00, 0x07, 0x00], [0x14, 0x7F, 0x14, 0x7F, 0x14],
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], [0x23, 0x13, 0x08, 0x64, 0x62], [0x36, 0x49, 0x55, 0x22, 0x50], [0x00, 0x05, 0x03, 0x00, 0x00],
    [0x00, 0x1C, 0x22, 0x41, 0x00], [0x00, 0x41, 0x22, 0x1C, 0x00], [0x14, 0x08, 0x3E, 0x08, 0x14], [0x08, 0x08, 0x3E, 0x08, 0x08],
    [0x00, 0x50, 0x30, 0x00, 0x00], [0x08, 0x08, 0x08, 0x08, 0x08], [0x00, 0x60, 0x60, 0x00, 0x00], [0x20, 0x10, 0x08, 0x04, 0x02],
    [0x3E, 0x51, 0x49, 0x45, 0x3E], [0x00, 0x42, 0x7F, 0x40, 0x00], [0x42, 0x61, 0x51, 0x49, 0x46], [0x21, 0x41, 0x45, 0x4B, 0x31],
    [0x18, 0x14, 0x12, 0x7F, 0x10], [0x27, 0x45, 0x45, 0x45, 0x39], [0x3C, 0x4A, 0x49, 0x49, 0x30], [0x01, 0x71, 0x09, 0x05, 0x03],
    [0x36, 0x49, 0x49, 0x49, 0x36], [0x06, 0x49, 0x49, 0x29, 0x1E], [0x00, 0x36, 0x36, 0x00, 0x00], [0x00, 0x56, 0x36, 0x00, 0x00],
    [0x08, 0x14, 0x22, 0x41, 0x00], [0x14, 0x14, 0x14, 0x14, 0x14], [0x00, 0x41, 0x22, 0x14, 0x08], [0x02, 0x01, 0x51, 0x09, 0x06],
    [0x3E, 0x41, 0x5D, 0x55, 0x1E], [0x7E, 0x11, 0x11, 0x11, 0x7E], [0x7F, 0x49, 0x49, 0x49, 0x36], [0x3E, 0x41, 0x41, 0x41, 0x22],
    [0x7F, 0x41, 0x41, 0x22, 0x1C], [0x7F, 0x49, 0x49, 0x49, 0x41], [0x7F, 0x09, 0x09, 0x09, 0x01], [0x3E, 0x41, 0x49, 0x49, 0x7A],
    [0x7F, 0x08, 0x08, 0x08, 0x7F], [0x00, 0x41, 0x7F, 0x41, 0x00], [0x20, 0x40, 0x41, 0x3F, 0x01], [0x7F, 0x08, 0x14, 0x22, 0x41],
    [0x7F, 0x40, 0x40, 0x40, 0x40], [0x7F, 0x02, 0x0C, 0x02, 0x7F], [0x7F, 0x04, 0x08, 0x10, 0x7F], [0x3E, 0x41, 0x41, 0x41, 0x3E],
    [0x7F, 0x09, 0x09, 0x09, 0x06], [0x3E, 0x41, 0x51, 0x21, 0x5E], [0x7F, 0x09, 0x19, 0x29, 0x46], [0x46, 0x49, 0x49, 0x49, 0x31],
    [0x01, 0x01, 0x7F, 0x01, 0x01], [0x3F, 0x40, 0x40, 0x40, 0x3F], [0x1F, 0x20, 0x40, 0x20, 0x1F], [0x3F, 0x40, 0x38, 0x40, 0x3F],
    [0x63, 0x14, 0x08, 0x14, 0x63], [0x07, 0x08, 0x70, 0x08, 0x07], [0x61, 0x51, 0x49, 0x45, 0x43], [0x00, 0x7F, 0x41, 0x41, 0x00],
    [0x02, 0x04, 0x08, 0x10, 0x20], [0x00, 0x41, 0x41, 0x7F, 0x00], [0x04, 0x02, 0x01, 0x02, 0x04], [0x40, 0x40, 0x40, 0x40, 0x40],
    [0x00, 0x01, 0x02, 0x04, 0x00], [0x20, 0x54, 0x54, 0x54, 0x78], [0x7F, 0x48, 0x44, 0x44, 0x38], [0x38, 0x44, 0x44, 0x44, 0x20],
    [0x38, 0x44, 0x44, 0x48, 0x7F], [0x38, 0x54, 0x54, 0x54, 0x18], [0x08, 0x7E, 0x09, 0x01, 0x02], [0x0C, 0x52, 0x52, 0x52, 0x3E],
    [0x7F, 0x08, 0x04, 0x04, 0x78], [0x00, 0x44, 0x7D, 0x40, 0x00], [0x20, 0x40, 0x44, 0x3D, 0x00], [0x7F, 0x10, 0x28, 0x44, 0x00],
    [0x00, 0x41, 0x7F, 0x40, 0x00], [0x7C, 0x04, 0x18, 0x04, 0x78], [0x7C, 0x08, 0x04, 0x04, 0x78], [0x38, 0x44, 0x44, 0x44, 0x38],
    [0x7C, 0x14, 0x14, 0x14, 0x08], [0x08, 0x14, 0x14, 0x18, 0x7C], [0x7C, 0x08, 0x04, 0x04, 0x08], [0x48, 0x54, 0x54, 0x54, 0x20],
    [0x04, 0x3F, 0x44, 0x40, 0x20], [0x3C, 0x40, 0x40, 0x20, 0x7C], [0x1C, 0x20, 0x40, 0x20, 0x1C], [0x3C, 0x40, 0x30, 0x40, 0x3C],
    [0x44, 0x28, 0x10, 0x28, 0x44], [0x0C, 0x50, 0x50, 0x50, 0x3C], [0x44, 0x64, 0x54, 0x4C, 0x44], [0x00, 0x08, 0x36, 0x41, 0x00],
    [0x00, 0x00, 0x7F, 0x00, 0x00], [0x00, 0x41, 0x36, 0x08, 0x00], [0x10, 0x08, 0x08, 0x10, 0x08], [0x00, 0x00, 0x00, 0x00, 0x00],
];

pub const GLYPH_ADVANCE: u32 = 6;
pub const GLYPH_HEIGHT: u32 = 7;

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

fn blend(dst: u32, color: Rgba) -> u32 {
    let a = color.3 as u32;
    if a == 255 {
        return rgb(color.0, color.1, color.2);
    }
    let (dr, dg, db) = unpack_rgb(dst);
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
    rgb(mix(color.0, dr), mix(color.1, dg), mix(color.2, db))
}

fn put(buf: &mut [u32], stride: u32, buf_h: u32, x: i32, y: i32, color: Rgba) {
    if x >= 0 && y >= 0 && (x as u32) < stride && (y as u32) < buf_h {
        let off = (y as u32 * stride + x as u32) as usize;
        buf[off] = blend(buf[off], color);
    }
}

fn draw_char(buf: &mut [u32], stride: u32, buf_h: u32, ch: char, px: i32, py: i32, scale: u32, color: Rgba) {
    let idx = (ch as u32).wrapping_sub(32) as usize;
    let Some(glyph) = FONT_5X7.get(idx) else {
        return;
    };
    for (col, bits) in glyph.iter().enumerate() {
        for row in 0..GLYPH_HEIGHT {
            if bits & (1 << row) == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let x = px + (col as u32 * scale + sx) as i32;
                    let y = py + (row * scale + sy) as i32;
                    put(buf, stride, buf_h, x, y, color);
                }
            }
        }
    }
}

/// Width in pixels of `text` at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_ADVANCE * scale
}

/// Draw a string. Returns the x position after the last character.
pub fn draw_text(buf: &mut [u32], stride: u32, buf_h: u32, text: &str, px: i32, py: i32, scale: u32, color: Rgba) -> i32 {
    let mut x = px;
    for ch in text.chars() {
        draw_char(buf, stride, buf_h, ch, x, py, scale, color);
        x += (GLYPH_ADVANCE * scale) as i32;
    }
    x
}

/// Fill a rectangle, alpha-blended over what is already there.
pub fn fill_rect(buf: &mut [u32], stride: u32, buf_h: u32, rx: i32, ry: i32, rw: u32, rh: u32, color: Rgba) {
    for row in 0..rh as i32 {
        for col in 0..rw as i32 {
            put(buf, stride, buf_h, rx + col, ry + row, color);
        }
    }
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h)
}

/// Nearest-neighbour blit of an RGBA8 image into the framebuffer, scaled so
/// it fits inside `area_h` rows and centred horizontally.
pub fn blit_fit(dst: &mut [u32], dst_w: u32, area_h: u32, src: &[u8], src_w: u32, src_h: u32) {
    if src_w == 0 || src_h == 0 || dst_w == 0 || area_h == 0 {
        return;
    }
    let scale = fit_scale(src_w as f32, src_h as f32, dst_w as f32, area_h as f32);
    let draw_w = src_w as f32 * scale;
    let draw_h = src_h as f32 * scale;
    let x0 = (dst_w as f32 - draw_w) / 2.0;
    let y0 = (area_h as f32 - draw_h) / 2.0;

    let dx_start = x0.max(0.0) as u32;
    let dy_start = y0.max(0.0) as u32;
    let dx_end = ((x0 + draw_w).ceil() as u32).min(dst_w);
    let dy_end = ((y0 + draw_h).ceil() as u32).min(area_h);
    let inv_scale = 1.0 / scale;

    for dy in dy_start..dy_end {
        let sy = ((dy as f32 - y0) * inv_scale) as u32;
        if sy >= src_h {
            continue;
        }
        for dx in dx_start..dx_end {
            let sx = ((dx as f32 - x0) * inv_scale) as u32;
            if sx >= src_w {
                continue;
            }
            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;
            let Some(px) = src.get(si..si + 4) else {
                continue;
            };
            if px[3] > 0 {
                dst[di] = blend(dst[di], (px[0], px[1], px[2], px[3]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_packing() {
        assert_eq!(rgb(0x12, 0x34, 0x56), 0x00123456);
        assert_eq!(unpack_rgb(0x00123456), (0x12, 0x34, 0x56));
    }

    #[test]
    fn blend_half_alpha() {
        let out = blend(rgb(0, 0, 0), (255, 255, 255, 128));
        let (r, _, _) = unpack_rgb(out);
        assert!((127..=129).contains(&r));
    }

    #[test]
    fn text_advances_per_char() {
        let mut buf = vec![0u32; 100 * 20];
        let end = draw_text(&mut buf, 100, 20, "Hi", 0, 0, 1, (255, 255, 255, 255));
        assert_eq!(end, 12);
        assert_eq!(text_width("Hi", 2), 24);
        assert!(buf.iter().any(|&p| p != 0));
    }

    #[test]
    fn glyphs_follow_the_font_table() {
        assert_eq!(FONT_5X7.len(), 96);

        let white = (255, 255, 255, 255);
        let mut buf = vec![0u32; 6 * 7];
        draw_text(&mut buf, 6, 7, " ", 0, 0, 1, white);
        assert!(buf.iter().all(|&p| p == 0));

        // '!' is a single column at x = 2 with a gap above the dot.
        draw_text(&mut buf, 6, 7, "!", 0, 0, 1, white);
        let lit: Vec<(usize, usize)> = (0..buf.len())
            .filter(|&i| buf[i] != 0)
            .map(|i| (i % 6, i / 6))
            .collect();
        assert_eq!(lit, [(2, 0), (2, 1), (2, 2), (2, 3), (2, 4), (2, 6)]);

        // Outside the table draws nothing.
        let mut buf = vec![0u32; 6 * 7];
        draw_text(&mut buf, 6, 7, "\u{e9}", 0, 0, 1, white);
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn blit_centres_and_scales() {
        // 2x1 red image into a 4x4 area: scaled 2x, rows 1..3.
        let src = [255, 0, 0, 255, 255, 0, 0, 255];
        let mut buf = vec![0u32; 16];
        blit_fit(&mut buf, 4, 4, &src, 2, 1);
        let red = rgb(255, 0, 0);
        assert!(buf[..4].iter().all(|&p| p == 0));
        assert!(buf[4..12].iter().all(|&p| p == red));
        assert!(buf[12..].iter().all(|&p| p == 0));
    }

    #[test]
    fn fill_rect_clips() {
        let mut buf = vec![0u32; 4];
        fill_rect(&mut buf, 2, 2, -1, -1, 10, 10, (0, 255, 0, 255));
        assert!(buf.iter().all(|&p| p == rgb(0, 255, 0)));
    }
}
