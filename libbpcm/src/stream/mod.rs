pub mod analysis;
pub mod reader;

pub use analysis::Stats;
pub use reader::BitstreamReader;
