use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Class colour palette
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
///
/// Returned as plain RGB so both the SVG report and the egui viewer can use
/// the same colour for the same class.
pub fn generate_palette(n: usize) -> Vec<[u8; 3]> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            ]
        })
        .collect()
}

/// Colour for one class of a job with `class_count` classes.
pub fn class_color(class: usize, class_count: usize) -> [u8; 3] {
    generate_palette(class_count)
        .get(class)
        .copied()
        .unwrap_or([128, 128, 128])
}
