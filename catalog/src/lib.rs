pub mod model;
pub mod store;

pub use model::{Product, ProductCandidate, ProductDetails, ProductId, ScrapedProduct, UserInterest};
pub use store::ProductStore;
