pub mod budget;
pub mod contribution;
pub mod expense;
pub mod family;
pub mod family_membership;
pub mod goal;
pub mod streak;
pub mod user_profile;
