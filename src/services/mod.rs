//! Dashboard services. Every operation takes the verified admin as `actor`.

pub mod blog;
pub mod promo_codes;
pub mod redemptions;
pub mod stats;

pub use blog::BlogService;
pub use promo_codes::PromoCodeService;
pub use redemptions::RedemptionService;

#[cfg(test)]
pub(crate) fn test_actor() -> crate::auth::AdminIdentity {
    crate::auth::AdminIdentity {
        id: "user-admin".to_string(),
        email: "admin@example.com".to_string(),
        name: "Test Admin".to_string(),
        picture: String::new(),
        given_name: "Test".to_string(),
        family_name: "Admin".to_string(),
    }
}
