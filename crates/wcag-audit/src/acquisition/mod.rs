//! Document acquisition: turning an audit source into something the rule
//! engine can evaluate.
//!
//! Three backends exist. Supplied markup and fetched markup both become a
//! [`StaticDocument`]; the dynamic backend renders the page in a browser and
//! yields a [`LiveDocument`]. Backend choice is made by
//! [`crate::dispatcher::Backend::select`].

pub mod dynamic;
pub mod fetch;
pub mod markup;

pub use dynamic::{DynamicAcquisition, LiveDocument};
pub use fetch::{FetchedPage, Fetcher};
pub use markup::StaticDocument;
