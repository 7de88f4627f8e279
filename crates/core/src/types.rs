use serde::Serialize;

/// Image substituted when a cupcake is created without one.
pub const DEFAULT_IMAGE: &str = "https://tinyurl.com/demo-cupcake";

/// Maximum lengths, in characters, enforced on input and by the schema.
pub const MAX_FLAVOR_LEN: usize = 20;
pub const MAX_SIZE_LEN: usize = 20;
pub const MAX_IMAGE_LEN: usize = 200;

/// A persisted cupcake.
///
/// The serialized form is exactly `{id, flavor, size, rating, image}`; it is
/// what every JSON endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cupcake {
    pub id: i64,
    pub flavor: String,
    pub size: String,
    pub rating: f64,
    pub image: String,
}

/// Values required to create a cupcake. The id is assigned by storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCupcake {
    pub flavor: String,
    pub size: String,
    pub rating: f64,
    pub image: Option<String>,
}

impl NewCupcake {
    /// Image that will be stored for this cupcake.
    pub fn resolved_image(&self) -> String {
        resolve_image(self.image.as_deref())
    }
}

/// Full replacement of a cupcake's mutable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CupcakeChanges {
    pub flavor: String,
    pub size: String,
    pub rating: f64,
    pub image: String,
}

/// Maps an absent or empty image to [`DEFAULT_IMAGE`].
pub fn resolve_image(image: Option<&str>) -> String {
    match image {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_IMAGE.to_string(),
    }
}
