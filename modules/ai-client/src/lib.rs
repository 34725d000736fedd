pub mod openai;
pub mod traits;
pub mod util;

pub use openai::{OpenAi, StructuredOutput};
pub use traits::EmbedAgent;
