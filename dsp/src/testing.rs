/// Relative plus absolute tolerance comparison.
pub fn isclose(a: f32, b: f32, rtol: f32, atol: f32) -> bool {
    (a - b).abs() <= a.abs().max(b.abs()) * rtol + atol
}
