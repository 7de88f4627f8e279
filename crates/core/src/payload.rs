use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::types::{
    CupcakeChanges, NewCupcake, DEFAULT_IMAGE, MAX_FLAVOR_LEN, MAX_IMAGE_LEN, MAX_SIZE_LEN,
};

/// JSON body accepted by the create and update endpoints.
///
/// Every key must be present, but `image` may be `null`, so its presence is
/// tracked separately from its value.
#[derive(Debug, Default, Deserialize)]
pub struct CupcakePayload {
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rating")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub image: Option<Option<String>>,
}

impl CupcakePayload {
    /// Validates the payload for creation.
    pub fn into_new_cupcake(self) -> Result<NewCupcake, PayloadError> {
        let (flavor, size, rating, image) = self.into_parts()?;
        let image = image.filter(|value| !value.is_empty());
        if let Some(value) = &image {
            check_len("image", value, MAX_IMAGE_LEN)?;
        }
        Ok(NewCupcake {
            flavor,
            size,
            rating,
            image,
        })
    }

    /// Validates the payload as a full overwrite of an existing cupcake.
    ///
    /// The image is stored as given, empty strings included; only `null`
    /// falls back to [`DEFAULT_IMAGE`] since the column is `NOT NULL`.
    pub fn into_changes(self) -> Result<CupcakeChanges, PayloadError> {
        let (flavor, size, rating, image) = self.into_parts()?;
        let image = image.unwrap_or_else(|| DEFAULT_IMAGE.to_string());
        check_len("image", &image, MAX_IMAGE_LEN)?;
        Ok(CupcakeChanges {
            flavor,
            size,
            rating,
            image,
        })
    }

    fn into_parts(self) -> Result<(String, String, f64, Option<String>), PayloadError> {
        let mut missing = Vec::new();
        if self.flavor.is_none() {
            missing.push("flavor");
        }
        if self.size.is_none() {
            missing.push("size");
        }
        if self.rating.is_none() {
            missing.push("rating");
        }
        if self.image.is_none() {
            missing.push("image");
        }

        match (self.flavor, self.size, self.rating, self.image) {
            (Some(flavor), Some(size), Some(rating), Some(image)) => {
                check_len("flavor", &flavor, MAX_FLAVOR_LEN)?;
                check_len("size", &size, MAX_SIZE_LEN)?;
                Ok((flavor, size, rating, image))
            }
            _ => Err(PayloadError::MissingFields(missing)),
        }
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), PayloadError> {
    if value.chars().count() > max {
        return Err(PayloadError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Reasons a well-formed JSON body is still rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Display text is part of the public API response.
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RatingValue {
    Number(f64),
    Text(String),
}

// HTML forms submit the rating as text, so numeric strings are accepted too.
fn deserialize_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = match Option::<RatingValue>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RatingValue::Number(value)) => value,
        Some(RatingValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("rating must be a number (got {text:?})")))?,
    };

    if !rating.is_finite() {
        return Err(D::Error::custom("rating must be a finite number"));
    }
    Ok(Some(rating))
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
