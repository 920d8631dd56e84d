pub mod marketplace;
pub mod profile;

pub use profile::{FieldKind, FieldTarget, FormProfile, ProfileInfo, ValueTransform};

/// Get a form profile by ID
pub fn get_profile(id: &str) -> Option<&'static FormProfile> {
    match id {
        "marketplace" => Some(&marketplace::PROFILE),
        _ => None,
    }
}

/// Get all supported form profiles
pub fn all_profiles() -> Vec<ProfileInfo> {
    vec![marketplace::PROFILE.info()]
}
