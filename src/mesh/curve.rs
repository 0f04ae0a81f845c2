//! Piecewise-linear height response curve

use serde::{Deserialize, Serialize};

/// A single curve key
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Remaps normalized elevation before it is scaled by the height multiplier.
///
/// Keys are kept sorted by time. Inputs before the first key or after the
/// last one clamp to that key's value; an empty curve is the identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct HeightCurve {
    keys: Vec<Keyframe>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl From<Vec<Keyframe>> for HeightCurve {
    fn from(keys: Vec<Keyframe>) -> Self {
        Self::new(keys)
    }
}

impl From<HeightCurve> for Vec<Keyframe> {
    fn from(curve: HeightCurve) -> Self {
        curve.keys
    }
}

impl HeightCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Identity on `[0, 1]`
    pub fn linear() -> Self {
        Self::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(1.0, 1.0)])
    }

    /// Always returns `value`
    pub fn constant(value: f32) -> Self {
        Self::new(vec![Keyframe::new(0.0, value)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return t,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; exists because t < last.time
        let upper = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }
        a.value + (b.value - a.value) * ((t - a.time) / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_is_identity() {
        let curve = HeightCurve::linear();
        for t in [0.0, 0.25, 0.5, 0.9, 1.0] {
            assert!((curve.evaluate(t) - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_clamps_outside_keys() {
        let curve = HeightCurve::linear();
        assert_eq!(curve.evaluate(-3.0), 0.0);
        assert_eq!(curve.evaluate(7.0), 1.0);
    }

    #[test]
    fn test_flat_water_then_ramp() {
        // Typical terrain curve: everything under 0.4 stays at sea level
        let curve = HeightCurve::new(vec![
            Keyframe::new(1.0, 1.0),
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.4, 0.0),
        ]);
        assert_eq!(curve.evaluate(0.2), 0.0);
        assert_eq!(curve.evaluate(0.4), 0.0);
        assert!((curve.evaluate(0.7) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_and_constant() {
        assert_eq!(HeightCurve::new(Vec::new()).evaluate(0.3), 0.3);
        assert_eq!(HeightCurve::constant(2.0).evaluate(0.3), 2.0);
    }

    #[test]
    fn test_serde_as_key_list() {
        let json = r#"[{"time":1.0,"value":2.0},{"time":0.0,"value":0.0}]"#;
        let curve: HeightCurve = serde_json::from_str(json).unwrap();
        assert_eq!(curve.keys()[0].time, 0.0);
        assert_eq!(curve.evaluate(0.5), 1.0);
    }
}
