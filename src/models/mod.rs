pub mod claim;
pub mod enums;
pub mod invoice;
pub mod product;

pub use claim::*;
pub use enums::*;
pub use invoice::*;
pub use product::*;
