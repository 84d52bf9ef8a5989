use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

/// How the shell should paint a vector layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub point_radius: f64,
    pub point_fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f64,
    pub fill: Rgba,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            point_radius: 6.0,
            point_fill: Rgba::opaque(255, 255, 255),
            stroke: Rgba::opaque(0, 0, 255),
            stroke_width: 2.0,
            fill: Rgba {
                r: 255,
                g: 255,
                b: 255,
                a: 0.3,
            },
        }
    }
}

impl LayerStyle {
    /// Default style with a stroke color that stays the same for a name.
    pub fn keyed(name: &str) -> Self {
        Self {
            stroke: layer_color(name),
            ..Self::default()
        }
    }
}

/// Deterministic, saturated stroke color via CRC32 of the layer name.
pub fn layer_color(name: &str) -> Rgba {
    let hash = crc32fast::hash(name.as_bytes());
    let hue = f64::from(hash % 360);
    let (r, g, b) = hsl_to_rgb(hue, 0.75, 0.45);
    Rgba::opaque(r, g, b)
}

/// Convert HSL (h: 0..360, s/l: 0..1) to RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s.abs() < f64::EPSILON {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    let h = h / 360.0;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
