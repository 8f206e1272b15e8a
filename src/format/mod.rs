pub mod annotation;
pub mod channels;
pub mod container;
pub mod meta;
pub mod reader;

pub use annotation::{
    AnnotationCodec, AnnotationInterval, AnnotationWriter, DenseAnnotation, RunEncoder,
    RunLengthTable,
};
pub use channels::ChannelNameResolver;
pub use container::DatasetWriter;
pub use reader::{ContainerReader, Recording};
