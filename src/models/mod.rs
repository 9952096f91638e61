pub mod enums;
pub mod identity;
pub mod medication;
pub mod profile;
pub mod risk;

pub use identity::*;
pub use medication::*;
pub use profile::*;
pub use risk::*;
