pub mod branches;
pub mod health;
pub mod orders;
pub mod routing;
