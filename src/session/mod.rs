//! Session recording: binary format, filename allocation, writer and reader.

pub mod format;
pub mod naming;
pub mod reader;
pub mod writer;

pub use format::{DeltaTime, FrameLayout, MAX_PAYLOAD_LEN, SessionHeader};
pub use naming::{Allocation, allocate_file_name, session_file_name};
pub use reader::{Frame, SessionReader};
pub use writer::Session;
