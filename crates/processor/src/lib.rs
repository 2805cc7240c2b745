mod error;
mod multiprocessor;
mod transfer;

pub use error::ProcessorError;
pub use multiprocessor::Multiprocessor;
pub use transfer::Processor;
