pub mod dataframe;
pub mod node;

pub use dataframe::DataFrame;
pub use node::ProcessingNode;
