/// Anchor used when fitting a bitmap onto a larger or smaller canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    TopLeft,
    TopRight,
    #[default]
    Center,
    BottomLeft,
    BottomRight,
}

/// An owned RGBA8 image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub pixel_data: Vec<u8>,
}

impl Bitmap {
    /// A fully transparent bitmap.
    pub fn new(width: usize, height: usize) -> Self {
        Bitmap {
            width,
            height,
            pixel_data: vec![0; width * height * 4],
        }
    }

    pub fn filled(width: usize, height: usize, color: [u8; 4]) -> Self {
        let mut pixel_data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            pixel_data.extend_from_slice(&color);
        }
        Bitmap {
            width,
            height,
            pixel_data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixel_data[i],
            self.pixel_data[i + 1],
            self.pixel_data[i + 2],
            self.pixel_data[i + 3],
        ])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: [u8; 4]) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) * 4;
            self.pixel_data[i..i + 4].copy_from_slice(&color);
        }
    }

    /// Composites `src` over this bitmap with its top-left corner at `(dx, dy)`.
    /// Parts of `src` outside this bitmap are clipped.
    pub fn alpha_composite(&mut self, src: &Bitmap, dx: i32, dy: i32) {
        for sy in 0..src.height {
            let ty = dy as i64 + sy as i64;
            if ty < 0 || ty >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let tx = dx as i64 + sx as i64;
                if tx < 0 || tx >= self.width as i64 {
                    continue;
                }
                let si = (sy * src.width + sx) * 4;
                let ti = (ty as usize * self.width + tx as usize) * 4;
                let over = blend_over(&src.pixel_data[si..si + 4], &self.pixel_data[ti..ti + 4]);
                self.pixel_data[ti..ti + 4].copy_from_slice(&over);
            }
        }
    }

    /// Places this bitmap on a `width` x `height` canvas filled with `background`.
    /// Oversized images are cropped from the alignment anchor.
    pub fn fit_to_canvas(
        &self,
        width: usize,
        height: usize,
        alignment: Alignment,
        background: [u8; 4],
    ) -> Bitmap {
        let mut canvas = Bitmap::filled(width, height, background);
        let (dx, dy) = alignment.offset(self.width, self.height, width, height);
        canvas.alpha_composite(self, dx, dy);
        canvas
    }
}

impl Alignment {
    fn offset(&self, src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> (i32, i32) {
        let right = dst_w as i32 - src_w as i32;
        let bottom = dst_h as i32 - src_h as i32;
        match self {
            Alignment::TopLeft => (0, 0),
            Alignment::TopRight => (right, 0),
            Alignment::Center => (right / 2, bottom / 2),
            Alignment::BottomLeft => (0, bottom),
            Alignment::BottomRight => (right, bottom),
        }
    }
}

// Porter-Duff "over" on straight (non-premultiplied) alpha, integer math.
fn blend_over(src: &[u8], dst: &[u8]) -> [u8; 4] {
    let sa = src[3] as u32;
    if sa == 255 {
        return [src[0], src[1], src[2], src[3]];
    }
    if sa == 0 {
        return [dst[0], dst[1], dst[2], dst[3]];
    }
    let da = dst[3] as u32;
    // Both scaled by 255.
    let dst_weight = da * (255 - sa);
    let out_a = sa * 255 + dst_weight;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (src[c] as u32 * sa * 255 + dst[c] as u32 * dst_weight + out_a / 2) / out_a;
        out[c] = value.min(255) as u8;
    }
    out[3] = ((out_a + 127) / 255) as u8;
    out
}
