use super::processor::Processor;
use std::fmt;

// Debug proxy that calls the standalone debug function
impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_processor(self, f)
    }
}
