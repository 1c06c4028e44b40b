pub mod error;
pub mod header;
pub mod section;
pub mod option;
pub mod date;
pub mod writer;
pub mod reader;
pub mod validate;
pub mod discfile;

pub use error::{DiscFileError, ErrorKind, Result};
pub use header::{FileHeader, FormatGeneration};
pub use section::{ChunkType, SectionType};
pub use option::{OptionId, OptionKind, OptionTag, OptionValue};
pub use date::DateStamp;
pub use writer::{DiscWriter, PendingChunk, PendingSection};
pub use reader::{LegacyReader, ModernReader, OptionEntry};
pub use validate::{StructureReport, LegacyReport};
pub use discfile::{DiscFile, DiscFileOptions, Mode};
