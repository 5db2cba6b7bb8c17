/// Straight (non-premultiplied) RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional). Anything else
    /// falls back to opaque white.
    pub fn from_hex(s: &str) -> Self {
        fn byte(s: &str, i: usize) -> Option<u8> {
            u8::from_str_radix(s.get(i..i + 2)?, 16).ok()
        }

        let h = s.trim().trim_start_matches('#');
        match h.len() {
            6 => match (byte(h, 0), byte(h, 2), byte(h, 4)) {
                (Some(r), Some(g), Some(b)) => Self::rgb(r, g, b),
                _ => Self::WHITE,
            },
            8 => match (byte(h, 0), byte(h, 2), byte(h, 4), byte(h, 6)) {
                (Some(r), Some(g), Some(b), Some(a)) => Self::new(r, g, b, a),
                _ => Self::WHITE,
            },
            _ => Self::WHITE,
        }
    }

    pub fn alpha_f64(self) -> f64 {
        f64::from(self.a) / 255.0
    }

    /// Scales the alpha channel by `opacity` (clamped to [0,1]).
    pub fn with_opacity(self, opacity: f64) -> Self {
        let op = opacity.clamp(0.0, 1.0);
        Self {
            a: (f64::from(self.a) * op).round().clamp(0.0, 255.0) as u8,
            ..self
        }
    }

    pub fn lerp(a: Rgba, b: Rgba, t: f64) -> Rgba {
        fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
            let a = f64::from(a);
            let b = f64::from(b);
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        }

        let t = t.clamp(0.0, 1.0);
        Rgba {
            r: lerp_u8(a.r, b.r, t),
            g: lerp_u8(a.g, b.g, t),
            b: lerp_u8(a.b, b.b, t),
            a: lerp_u8(a.a, b.a, t),
        }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}
