pub mod engine;
pub mod stream;

pub use engine::{RecognitionEngine, RecognitionEvent, RecognitionTask};
pub use stream::{StreamingRecognizer, TaskEvent};
