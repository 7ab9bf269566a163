//! Serde support for floats that may be NaN or infinite.
//!
//! JSON has no literal for non-finite numbers, so they are written as the
//! strings `"NaN"`, `"Infinity"` and `"-Infinity"` and read back from them.
//! Finite values stay plain numbers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Number {
    Finite(f64),
    Special(String),
}

impl Number {
    fn encode(value: f64) -> Self {
        if value.is_finite() {
            Number::Finite(value)
        } else if value.is_nan() {
            Number::Special("NaN".into())
        } else if value > 0.0 {
            Number::Special("Infinity".into())
        } else {
            Number::Special("-Infinity".into())
        }
    }

    fn decode(self) -> Result<f64, String> {
        match self {
            Number::Finite(value) => Ok(value),
            Number::Special(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(format!("expected a number, NaN or Infinity, got '{other}'")),
            },
        }
    }
}

/// `#[serde(with = "...")]` for a single `f64`.
pub mod float {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Number::encode(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Number::deserialize(deserializer)?.decode().map_err(D::Error::custom)
    }
}

/// `#[serde(with = "...")]` for an [`Image`](crate::prelude::Image), stored as
/// its `[rows, cols]` shape and row-major samples.
pub mod image {
    use serde::de::Error as _;

    use super::*;
    use crate::prelude::Image;

    #[derive(Serialize, Deserialize)]
    struct Plane {
        dim: [usize; 2],
        data: Vec<Number>,
    }

    pub fn serialize<S: Serializer>(image: &Image, serializer: S) -> Result<S::Ok, S::Error> {
        let (rows, cols) = image.dim();
        Plane {
            dim: [rows, cols],
            data: image.iter().map(|&v| Number::encode(v as f64)).collect(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Image, D::Error> {
        let plane = Plane::deserialize(deserializer)?;
        let values = plane
            .data
            .into_iter()
            .map(|n| n.decode().map(|v| v as f32))
            .collect::<Result<Vec<f32>, String>>()
            .map_err(D::Error::custom)?;
        Image::from_shape_vec((plane.dim[0], plane.dim[1]), values).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::Image;
    use ndarray::array;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::float")]
        value: f64,
        #[serde(with = "super::image")]
        plane: Image,
    }

    #[test]
    fn non_finite_values_survive_json() {
        let sample = Sample {
            value: f64::NAN,
            plane: array![[1.5, f32::NAN], [f32::INFINITY, -f32::INFINITY]],
        };
        let text = serde_json::to_string(&sample).unwrap();
        assert!(!text.contains("null"));

        let back: Sample = serde_json::from_str(&text).unwrap();
        assert!(back.value.is_nan());
        assert_eq!(back.plane.dim(), (2, 2));
        assert_eq!(back.plane[[0, 0]], 1.5);
        assert!(back.plane[[0, 1]].is_nan());
        assert_eq!(back.plane[[1, 0]], f32::INFINITY);
        assert_eq!(back.plane[[1, 1]], f32::NEG_INFINITY);
    }

    #[test]
    fn unknown_strings_and_bad_shapes_are_rejected() {
        assert!(serde_json::from_str::<Sample>(r#"{"value":"nan?","plane":{"dim":[1,1],"data":[0.0]}}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"value":1.0,"plane":{"dim":[2,2],"data":[0.0]}}"#).is_err());
    }
}
