// Adapters layer: concrete implementations behind the domain ports (record sources, renderers)
// plus the NFe reader and the PDF writer they share.

pub mod nfe;
pub mod pdf;
pub mod render;
pub mod source;

pub use self::nfe::NfeXmlParser;
pub use self::source::{InMemorySource, JsonFileSource};
